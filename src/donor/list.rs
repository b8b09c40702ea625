//! The page listing donors grouped by mobile number.

use std::sync::{Arc, Mutex};

use axum::{
    extract::{FromRef, Query, State},
    response::{IntoResponse, Response},
};
use maud::{Markup, html};
use rusqlite::Connection;
use serde::Deserialize;

use crate::{
    AppState, Error,
    aggregation::{DonorGroup, group_donors},
    donor::core::get_all_donors,
    endpoints,
    html::{
        BUTTON_SECONDARY_STYLE, FORM_TEXT_INPUT_STYLE, PAGE_CONTAINER_STYLE, TABLE_CELL_STYLE,
        TABLE_HEADER_STYLE, TABLE_ROW_STYLE, TABLE_STYLE, base, link,
    },
    money::Money,
    navigation::NavBar,
};

/// The state needed for the donors page.
#[derive(Debug, Clone)]
pub struct DonorsPageState {
    /// The database connection for reading donors.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for DonorsPageState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// The search box on the donors page.
#[derive(Debug, Default, Deserialize)]
pub struct DonorSearch {
    /// Matched against donor names and mobile numbers.
    #[serde(default)]
    pub q: Option<String>,
}

/// Renders the donor groups, optionally narrowed down by a search query.
pub async fn get_donors_page(
    State(state): State<DonorsPageState>,
    Query(search): Query<DonorSearch>,
) -> Result<Response, Error> {
    let donors = {
        let connection = state
            .db_connection
            .lock()
            .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
            .map_err(|_| Error::DatabaseLockError)?;

        get_all_donors(&connection)
            .inspect_err(|error| tracing::error!("could not get donors: {error}"))?
    };

    let query = search.q.unwrap_or_default();
    let groups: Vec<DonorGroup> = group_donors(&donors)
        .into_iter()
        .filter(|group| group.matches(&query))
        .collect();

    Ok(donors_view(&groups, &query).into_response())
}

fn donors_view(groups: &[DonorGroup], query: &str) -> Markup {
    let nav_bar = NavBar::new(endpoints::DONORS_VIEW).into_html();
    let total: Money = groups.iter().map(|group| group.total_amount).sum();
    let donation_count: usize = groups.iter().map(|group| group.donation_count).sum();

    let content = html! {
        (nav_bar)

        div class=(PAGE_CONTAINER_STYLE)
        {
            div class="w-full max-w-5xl"
            {
                div class="flex flex-wrap justify-between items-center gap-4 mb-4"
                {
                    h1 class="text-2xl font-bold" { "Donors" }

                    a href=(endpoints::NEW_DONOR_VIEW) class=(BUTTON_SECONDARY_STYLE) { "Register Donation" }
                }

                form method="get" action=(endpoints::DONORS_VIEW) class="flex gap-2 mb-4"
                {
                    input
                        type="search"
                        name="q"
                        value=(query)
                        placeholder="Search by name or mobile number"
                        class=(FORM_TEXT_INPUT_STYLE);

                    button type="submit" class=(BUTTON_SECONDARY_STYLE) { "Search" }
                }

                p class="mb-4 text-sm text-gray-600 dark:text-gray-400"
                {
                    (groups.len()) " donors, " (donation_count) " donations, " (total) " in total"
                }

                @if groups.is_empty() {
                    p { "No donors found." }
                } @else {
                    div class="relative overflow-x-auto shadow-md sm:rounded-lg"
                    {
                        table class=(TABLE_STYLE)
                        {
                            thead class=(TABLE_HEADER_STYLE)
                            {
                                tr
                                {
                                    th scope="col" class=(TABLE_CELL_STYLE) { "Name" }
                                    th scope="col" class=(TABLE_CELL_STYLE) { "Mobile" }
                                    th scope="col" class=(TABLE_CELL_STYLE) { "Donations" }
                                    th scope="col" class=(TABLE_CELL_STYLE) { "Total" }
                                    th scope="col" class=(TABLE_CELL_STYLE) { "Latest" }
                                }
                            }

                            tbody
                            {
                                @for group in groups {
                                    tr class=(TABLE_ROW_STYLE) data-donor-group=(group.key)
                                    {
                                        td class=(TABLE_CELL_STYLE) { (group.display_name()) }
                                        td class=(TABLE_CELL_STYLE)
                                        {
                                            (link(&endpoints::donor_history_url(&group.mobile_no), &group.mobile_no))
                                        }
                                        td class=(TABLE_CELL_STYLE) { (group.donation_count) }
                                        td class=(TABLE_CELL_STYLE) { (group.total_amount) }
                                        td class=(TABLE_CELL_STYLE) { (group.latest_donation) }
                                    }
                                }
                            }
                        }
                    }
                }
            }
        }
    };

    base("Donors", &content)
}
