//! Dashboard HTTP handler and view rendering.

use std::sync::{Arc, Mutex};

use axum::{
    extract::{FromRef, State},
    response::{IntoResponse, Response},
};
use maud::{Markup, html};
use rusqlite::Connection;

use crate::{
    AppState, Error,
    dashboard::{
        cards::{recent_activity_view, stats_cards_view},
        stats::{Activity, DashboardStats, RECENT_PER_KIND, dashboard_stats, recent_activity},
    },
    donor::{count_donors, get_recent_donors, get_total_donations},
    endpoints,
    finance::{get_all_finance_records, get_recent_finance_records},
    html::{BUTTON_SECONDARY_STYLE, PAGE_CONTAINER_STYLE, base, link},
    ledger::get_total_returned_by_loan,
    navigation::NavBar,
    timezone::local_today,
};

/// The state needed for displaying the dashboard page.
#[derive(Debug, Clone)]
pub struct DashboardState {
    /// The database connection for reading donors, records and returns.
    pub db_connection: Arc<Mutex<Connection>>,
    /// The local timezone as a canonical timezone name, e.g. "Asia/Karachi".
    pub local_timezone: String,
    pub organisation_name: String,
}

impl FromRef<AppState> for DashboardState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            local_timezone: state.local_timezone.clone(),
            organisation_name: state.organisation_name.clone(),
        }
    }
}

/// Display a page with the foundation's totals and the latest entries.
pub async fn get_dashboard_page(State(state): State<DashboardState>) -> Result<Response, Error> {
    let today = local_today(&state.local_timezone)?;

    let connection = state
        .db_connection
        .lock()
        .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
        .map_err(|_| Error::DatabaseLockError)?;

    let total_funds = get_total_donations(&connection)
        .inspect_err(|error| tracing::error!("could not sum donations: {error}"))?;
    let donor_count = count_donors(&connection)
        .inspect_err(|error| tracing::error!("could not count donors: {error}"))?;
    let records = get_all_finance_records(&connection)
        .inspect_err(|error| tracing::error!("could not get finance records: {error}"))?;
    let total_returned = get_total_returned_by_loan(&connection)
        .inspect_err(|error| tracing::error!("could not sum loan returns: {error}"))?;

    let recent_donors = get_recent_donors(RECENT_PER_KIND, &connection)?;
    let recent_records = get_recent_finance_records(RECENT_PER_KIND, &connection)?;

    drop(connection);

    let stats = dashboard_stats(total_funds, donor_count, &records, &total_returned, today);
    let activity = recent_activity(recent_donors, recent_records);

    let nav_bar = NavBar::new(endpoints::DASHBOARD_VIEW);

    if stats.donor_count == 0 && records.is_empty() {
        return Ok(dashboard_no_data_view(nav_bar, &state.organisation_name).into_response());
    }

    Ok(dashboard_view(nav_bar, &state.organisation_name, &stats, &activity).into_response())
}

fn dashboard_view(
    nav_bar: NavBar,
    organisation_name: &str,
    stats: &DashboardStats,
    activity: &[Activity],
) -> Markup {
    let content = html! {
        (nav_bar.into_html())

        div class=(PAGE_CONTAINER_STYLE)
        {
            div class="w-full max-w-5xl"
            {
                h1 class="text-2xl font-bold mb-6" { (organisation_name) }

                (stats_cards_view(stats))
                (recent_activity_view(activity))
            }
        }
    };

    base("Dashboard", &content)
}

fn dashboard_no_data_view(nav_bar: NavBar, organisation_name: &str) -> Markup {
    let content = html! {
        (nav_bar.into_html())

        div class=(PAGE_CONTAINER_STYLE)
        {
            div class="w-full max-w-xl text-center"
            {
                h1 class="text-2xl font-bold mb-4" { (organisation_name) }

                p class="mb-6"
                {
                    "Nothing has been recorded yet. Start by "
                    (link(endpoints::NEW_DONOR_VIEW, "registering a donation"))
                    " or "
                    (link(endpoints::NEW_RECORD_VIEW, "entering a loan or expense"))
                    "."
                }

                a href=(endpoints::NEW_DONOR_VIEW) class=(BUTTON_SECONDARY_STYLE) { "Register Donation" }
            }
        }
    };

    base("Dashboard", &content)
}

#[cfg(test)]
mod dashboard_page_tests {
    use std::sync::{Arc, Mutex};

    use axum::{extract::State, http::StatusCode};
    use rusqlite::Connection;
    use scraper::{Html, Selector};
    use time::{OffsetDateTime, macros::date};

    use crate::{
        Error,
        db::initialize,
        donor::test_helpers::insert_donor,
        finance::test_helpers::{insert_expense, insert_loan},
        ledger::{NewLoanReturn, record_return},
        money::Money,
        test_utils::{assert_valid_html, parse_html_document},
    };

    use super::{DashboardState, get_dashboard_page};

    fn get_test_state() -> DashboardState {
        let connection = Connection::open_in_memory().unwrap();
        initialize(&connection).unwrap();

        DashboardState {
            db_connection: Arc::new(Mutex::new(connection)),
            local_timezone: "Etc/UTC".to_owned(),
            organisation_name: "Test Foundation".to_owned(),
        }
    }

    fn text_of(html: &Html, selector: &str) -> String {
        html.select(&Selector::parse(selector).unwrap())
            .next()
            .unwrap_or_else(|| panic!("nothing matched {selector}"))
            .text()
            .collect::<String>()
    }

    #[tokio::test]
    async fn shows_totals() {
        let state = get_test_state();
        {
            let connection = state.db_connection.lock().unwrap();
            insert_donor("Ayesha", "0300-1", "5000", date!(2025 - 01 - 01), &connection);
            let loan = insert_loan("Imran", Some("0321-5"), "1000", date!(2025 - 01 - 02), &connection);
            insert_expense("Pharmacy", None, "500", date!(2025 - 01 - 03), &connection);
            record_return(
                loan.id,
                NewLoanReturn {
                    return_amount: Money::from_whole(250),
                    return_date: OffsetDateTime::now_utc().date(),
                    payment_method: None,
                    remarks: None,
                },
                None,
                &connection,
            )
            .unwrap();
        }

        let response = get_dashboard_page(State(state)).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let html = parse_html_document(response).await;
        assert_valid_html(&html);
        assert_eq!(text_of(&html, "#total-funds"), "Rs 5,000.00");
        assert_eq!(text_of(&html, "#total-loans"), "Rs 1,000.00");
        assert_eq!(text_of(&html, "#total-expenses"), "Rs 500.00");
        assert_eq!(text_of(&html, "#outstanding-loans"), "Rs 750.00");
        assert_eq!(text_of(&html, "#available-balance"), "Rs 3,750.00");
        assert_eq!(text_of(&html, "#recovery-rate"), "25%");
        assert_eq!(
            html.select(&Selector::parse("#recent-activity tbody tr").unwrap())
                .count(),
            3
        );
    }

    #[tokio::test]
    async fn empty_database_shows_getting_started() {
        let response = get_dashboard_page(State(get_test_state())).await.unwrap();

        let html = parse_html_document(response).await;
        assert_valid_html(&html);
        assert!(html.select(&Selector::parse("#total-funds").unwrap()).next().is_none());
        assert!(text_of(&html, "h1").contains("Test Foundation"));
    }

    #[tokio::test]
    async fn oversized_stored_amounts_fail_without_poisoning_the_lock() {
        let state = get_test_state();
        {
            let connection = state.db_connection.lock().unwrap();
            insert_donor("Ayesha", "0300-1", "5000", date!(2025 - 01 - 01), &connection);
            insert_donor("Bilal", "0333-7", "5000", date!(2025 - 01 - 02), &connection);
            connection
                .execute(
                    "UPDATE donor SET total_amount = '79228162514264337593543950335'",
                    (),
                )
                .unwrap();
        }

        let first = get_dashboard_page(State(state.clone())).await;
        let second = get_dashboard_page(State(state.clone())).await;

        assert!(first.is_err());
        assert!(second.is_err());
        assert_ne!(second.err(), Some(Error::DatabaseLockError));
        assert!(!state.db_connection.is_poisoned());
    }
}
