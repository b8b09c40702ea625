//! The donation history of a single mobile number.

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
    aggregation::{DonationSummary, display_name, summarize_donations},
    donor::core::{Donor, get_donors_by_mobile},
    endpoints,
    html::{
        CARD_STYLE, PAGE_CONTAINER_STYLE, TABLE_CELL_STYLE, TABLE_HEADER_STYLE, TABLE_ROW_STYLE,
        TABLE_STYLE, base, link, or_fallback,
    },
    navigation::NavBar,
};

/// The state needed for the donor history page.
#[derive(Debug, Clone)]
pub struct DonorHistoryState {
    /// The database connection for reading donors.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for DonorHistoryState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct DonorHistoryQuery {
    #[serde(default)]
    pub mobile_no: String,
}

/// Renders every donation made from one mobile number with their totals.
///
/// # Errors
/// Returns [Error::NotFound] if no donation was made from the number.
pub async fn get_donor_history_page(
    State(state): State<DonorHistoryState>,
    Query(query): Query<DonorHistoryQuery>,
) -> Result<Response, Error> {
    let donations = {
        let connection = state
            .db_connection
            .lock()
            .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
            .map_err(|_| Error::DatabaseLockError)?;

        get_donors_by_mobile(&query.mobile_no, &connection)?
    };

    if donations.is_empty() {
        tracing::debug!("no donations from {:?}", query.mobile_no);
        return Err(Error::NotFound);
    }

    let summary = summarize_donations(&donations);

    Ok(donor_history_view(&query.mobile_no, &donations, &summary).into_response())
}

fn donor_history_view(mobile_no: &str, donations: &[Donor], summary: &DonationSummary) -> Markup {
    let nav_bar = NavBar::new(endpoints::DONOR_HISTORY_VIEW).into_html();
    let name = display_name(&summary.names);

    let content = html! {
        (nav_bar)

        div class=(PAGE_CONTAINER_STYLE)
        {
            div class="w-full max-w-5xl"
            {
                p class="mb-2" { (link(endpoints::DONORS_VIEW, "Back to donors")) }

                h1 class="text-2xl font-bold" { (name) }
                p class="mb-6 text-gray-600 dark:text-gray-400" { (mobile_no) }

                dl class="grid grid-cols-1 sm:grid-cols-3 gap-4 mb-6"
                {
                    div class=(CARD_STYLE)
                    {
                        dt class="text-sm text-gray-500 dark:text-gray-400" { "Total donated" }
                        dd id="donor-total" class="text-xl font-semibold" { (summary.total_amount) }
                    }
                    div class=(CARD_STYLE)
                    {
                        dt class="text-sm text-gray-500 dark:text-gray-400" { "Donations" }
                        dd id="donor-count" class="text-xl font-semibold" { (summary.donation_count) }
                    }
                    div class=(CARD_STYLE)
                    {
                        dt class="text-sm text-gray-500 dark:text-gray-400" { "Average donation" }
                        dd id="donor-average" class="text-xl font-semibold" { (summary.average_amount) }
                    }
                }

                @if summary.names.len() > 1 {
                    p class="mb-4 text-sm" { "Names used: " (summary.names.join(", ")) }
                }

                div class="relative overflow-x-auto shadow-md sm:rounded-lg"
                {
                    table class=(TABLE_STYLE)
                    {
                        thead class=(TABLE_HEADER_STYLE)
                        {
                            tr
                            {
                                th scope="col" class=(TABLE_CELL_STYLE) { "Date" }
                                th scope="col" class=(TABLE_CELL_STYLE) { "Name" }
                                th scope="col" class=(TABLE_CELL_STYLE) { "Amount" }
                                th scope="col" class=(TABLE_CELL_STYLE) { "Method" }
                                th scope="col" class=(TABLE_CELL_STYLE) { "Purpose" }
                                th scope="col" class=(TABLE_CELL_STYLE) { "Remarks" }
                            }
                        }

                        tbody
                        {
                            @for donation in donations {
                                tr class=(TABLE_ROW_STYLE)
                                {
                                    td class=(TABLE_CELL_STYLE) { (donation.donation_date) }
                                    td class=(TABLE_CELL_STYLE) { (donation.name) }
                                    td class=(TABLE_CELL_STYLE) { (donation.total_amount) }
                                    td class=(TABLE_CELL_STYLE) { (donation.payment_method) }
                                    td class=(TABLE_CELL_STYLE) { (donation.purpose) }
                                    td class=(TABLE_CELL_STYLE) { (or_fallback(donation.remarks.as_deref(), "-")) }
                                }
                            }
                        }
                    }
                }
            }
        }
    };

    base("Donor History", &content)
}
