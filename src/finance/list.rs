//! The page listing loans and expenses with their groups by mobile number.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use axum::{
    extract::{FromRef, Query, State},
    response::{IntoResponse, Response},
};
use maud::{Markup, html};
use rusqlite::Connection;
use serde::Deserialize;
use time::Date;

use crate::{
    AppState, Error,
    aggregation::{FinanceGroup, group_finance_records},
    contact::normalize_mobile,
    database_id::DatabaseId,
    endpoints,
    finance::core::{FinanceRecord, get_all_finance_records},
    html::{
        BADGE_STYLE, BUTTON_SECONDARY_STYLE, FORM_RADIO_GROUP_STYLE,
        FORM_RADIO_LABEL_ACTIVE_STYLE, FORM_RADIO_LABEL_STYLE, FORM_TEXT_INPUT_STYLE,
        PAGE_CONTAINER_STYLE, TABLE_CELL_STYLE, TABLE_HEADER_STYLE, TABLE_ROW_STYLE, TABLE_STYLE,
        base, link,
    },
    ledger::{get_total_returned_by_loan, loan_balance},
    money::Money,
    navigation::NavBar,
    timezone::local_today,
};

/// The state needed for the records page.
#[derive(Debug, Clone)]
pub struct RecordsPageState {
    /// The database connection for reading loans and expenses.
    pub db_connection: Arc<Mutex<Connection>>,
    /// The local timezone as a canonical timezone name, e.g. "Asia/Karachi".
    pub local_timezone: String,
}

impl FromRef<AppState> for RecordsPageState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            local_timezone: state.local_timezone.clone(),
        }
    }
}

/// Which records to show.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KindFilter {
    #[default]
    All,
    Loan,
    Expense,
}

impl KindFilter {
    fn as_str(&self) -> &'static str {
        match self {
            KindFilter::All => "all",
            KindFilter::Loan => "loan",
            KindFilter::Expense => "expense",
        }
    }

    fn label(&self) -> &'static str {
        match self {
            KindFilter::All => "All",
            KindFilter::Loan => "Loans",
            KindFilter::Expense => "Expenses",
        }
    }

    fn accepts(&self, record: &FinanceRecord) -> bool {
        match self {
            KindFilter::All => true,
            KindFilter::Loan => record.is_loan(),
            KindFilter::Expense => !record.is_loan(),
        }
    }
}

/// The filters on the records page.
#[derive(Debug, Default, Deserialize)]
pub struct RecordFilter {
    #[serde(default)]
    pub kind: KindFilter,
    #[serde(default)]
    pub q: Option<String>,
}

/// Whether the record's recipient, purpose or category contains `query`
/// ignoring case, or its mobile number contains the digits of `query`.
fn record_matches(record: &FinanceRecord, query: &str) -> bool {
    let query = query.trim().to_lowercase();

    if query.is_empty() {
        return true;
    }

    let text_matches = [&record.recipient_name, &record.purpose, &record.category]
        .iter()
        .any(|field| field.to_lowercase().contains(&query));

    let mobile_matches = record.mobile_no.as_deref().is_some_and(|mobile_no| {
        let digits = normalize_mobile(&query);

        mobile_no.contains(&query)
            || (!digits.is_empty() && normalize_mobile(mobile_no).contains(&digits))
    });

    text_matches || mobile_matches
}

/// Renders loans and expenses, newest first, followed by their groups.
pub async fn get_records_page(
    State(state): State<RecordsPageState>,
    Query(filter): Query<RecordFilter>,
) -> Result<Response, Error> {
    let today = local_today(&state.local_timezone)?;

    let (records, total_returned) = {
        let connection = state
            .db_connection
            .lock()
            .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
            .map_err(|_| Error::DatabaseLockError)?;

        let records = get_all_finance_records(&connection)
            .inspect_err(|error| tracing::error!("could not get finance records: {error}"))?;
        let total_returned = get_total_returned_by_loan(&connection)
            .inspect_err(|error| tracing::error!("could not get loan returns: {error}"))?;

        (records, total_returned)
    };

    let query = filter.q.unwrap_or_default();
    let records: Vec<FinanceRecord> = records
        .into_iter()
        .filter(|record| filter.kind.accepts(record) && record_matches(record, &query))
        .collect();
    let groups = group_finance_records(&records);

    Ok(records_view(&records, &groups, &total_returned, filter.kind, &query, today).into_response())
}

fn kind_tabs(active: KindFilter, query: &str) -> Markup {
    html! {
        div class={ (FORM_RADIO_GROUP_STYLE) " w-full mb-4" }
        {
            @for kind in [KindFilter::All, KindFilter::Loan, KindFilter::Expense] {
                a
                    href=(endpoints::with_query(endpoints::RECORDS_VIEW, &[("kind", kind.as_str()), ("q", query)]))
                    class=(if kind == active { FORM_RADIO_LABEL_ACTIVE_STYLE } else { FORM_RADIO_LABEL_STYLE })
                    aria-current=[(kind == active).then_some("page")]
                {
                    (kind.label())
                }
            }
        }
    }
}

fn records_table(
    records: &[FinanceRecord],
    total_returned: &HashMap<DatabaseId, Money>,
    today: Date,
) -> Markup {
    html! {
        div class="relative overflow-x-auto shadow-md sm:rounded-lg mb-8"
        {
            table class=(TABLE_STYLE)
            {
                thead class=(TABLE_HEADER_STYLE)
                {
                    tr
                    {
                        th scope="col" class=(TABLE_CELL_STYLE) { "Date" }
                        th scope="col" class=(TABLE_CELL_STYLE) { "Recipient" }
                        th scope="col" class=(TABLE_CELL_STYLE) { "Type" }
                        th scope="col" class=(TABLE_CELL_STYLE) { "Category" }
                        th scope="col" class=(TABLE_CELL_STYLE) { "Amount" }
                        th scope="col" class=(TABLE_CELL_STYLE) { "Remaining" }
                        th scope="col" class=(TABLE_CELL_STYLE) { "Status" }
                    }
                }

                tbody
                {
                    @for record in records {
                        @let balance = record.loan_terms().map(|terms| {
                            let returned = total_returned.get(&record.id).copied().unwrap_or_default();
                            loan_balance(terms, returned, today)
                        });

                        tr class=(TABLE_ROW_STYLE) data-record-id=(record.id)
                        {
                            td class=(TABLE_CELL_STYLE) { (record.record_date) }
                            td class=(TABLE_CELL_STYLE)
                            {
                                (link(&endpoints::format_endpoint(endpoints::RECORD_VIEW, record.id), &record.recipient_name))
                            }
                            td class=(TABLE_CELL_STYLE) { span class=(BADGE_STYLE) { (record.kind.label()) } }
                            td class=(TABLE_CELL_STYLE) { (record.category) }
                            td class=(TABLE_CELL_STYLE) { (record.total_amount) }
                            @match balance {
                                Some(balance) => {
                                    td class=(TABLE_CELL_STYLE) { (balance.remaining) }
                                    td class=(TABLE_CELL_STYLE)
                                    {
                                        span class=(balance.status.badge_style()) { (balance.status) }
                                    }
                                }
                                None => {
                                    td class=(TABLE_CELL_STYLE) { "-" }
                                    td class=(TABLE_CELL_STYLE) { "-" }
                                }
                            }
                        }
                    }
                }
            }
        }
    }
}

fn groups_table(groups: &[FinanceGroup]) -> Markup {
    html! {
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
                        th scope="col" class=(TABLE_CELL_STYLE) { "Loans" }
                        th scope="col" class=(TABLE_CELL_STYLE) { "Expenses" }
                        th scope="col" class=(TABLE_CELL_STYLE) { "Total" }
                        th scope="col" class=(TABLE_CELL_STYLE) { "Latest" }
                        th scope="col" class=(TABLE_CELL_STYLE) { "Categories" }
                    }
                }

                tbody
                {
                    @for group in groups {
                        tr class=(TABLE_ROW_STYLE) data-finance-group=(group.mobile_label())
                        {
                            td class=(TABLE_CELL_STYLE) { (group.display_name()) }
                            td class=(TABLE_CELL_STYLE) { (group.mobile_label()) }
                            td class=(TABLE_CELL_STYLE) { (group.loan_count) }
                            td class=(TABLE_CELL_STYLE) { (group.expense_count) }
                            td class=(TABLE_CELL_STYLE) { (group.total_amount) }
                            td class=(TABLE_CELL_STYLE) { (group.latest_record_date) }
                            td class=(TABLE_CELL_STYLE)
                            {
                                @if !group.loan_categories.is_empty() {
                                    div { "Loans: " (group.loan_categories.join(", ")) }
                                }
                                @if !group.expense_categories.is_empty() {
                                    div { "Expenses: " (group.expense_categories.join(", ")) }
                                }
                            }
                        }
                    }
                }
            }
        }
    }
}

fn records_view(
    records: &[FinanceRecord],
    groups: &[FinanceGroup],
    total_returned: &HashMap<DatabaseId, Money>,
    kind: KindFilter,
    query: &str,
    today: Date,
) -> Markup {
    let nav_bar = NavBar::new(endpoints::RECORDS_VIEW).into_html();
    let total: Money = records.iter().map(|record| record.total_amount).sum();

    let content = html! {
        (nav_bar)

        div class=(PAGE_CONTAINER_STYLE)
        {
            div class="w-full max-w-6xl"
            {
                div class="flex flex-wrap justify-between items-center gap-4 mb-4"
                {
                    h1 class="text-2xl font-bold" { "Loans & Expenses" }

                    div class="flex gap-2"
                    {
                        a
                            href=(endpoints::with_query(endpoints::NEW_RECORD_VIEW, &[("kind", "loan")]))
                            class=(BUTTON_SECONDARY_STYLE)
                        {
                            "New Loan"
                        }
                        a
                            href=(endpoints::with_query(endpoints::NEW_RECORD_VIEW, &[("kind", "expense")]))
                            class=(BUTTON_SECONDARY_STYLE)
                        {
                            "New Expense"
                        }
                    }
                }

                (kind_tabs(kind, query))

                form method="get" action=(endpoints::RECORDS_VIEW) class="flex gap-2 mb-4"
                {
                    input type="hidden" name="kind" value=(kind.as_str());
                    input
                        type="search"
                        name="q"
                        value=(query)
                        placeholder="Search name, purpose, category or mobile"
                        class=(FORM_TEXT_INPUT_STYLE);

                    button type="submit" class=(BUTTON_SECONDARY_STYLE) { "Search" }
                }

                p class="mb-4 text-sm text-gray-600 dark:text-gray-400"
                {
                    (records.len()) " records, " (total) " in total"
                }

                @if records.is_empty() {
                    p { "No records found." }
                } @else {
                    (records_table(records, total_returned, today))

                    h2 class="text-xl font-bold mb-4" { "By mobile number" }

                    (groups_table(groups))
                }
            }
        }
    };

    base("Loans & Expenses", &content)
}
