//! The page showing one loan or expense.
//!
//! For loans this includes the return history, the current balance and the
//! form for recording a return.

use std::sync::{Arc, Mutex};

use axum::{
    extract::{FromRef, Path, State},
    response::{IntoResponse, Response},
};
use maud::{Markup, html};
use rusqlite::Connection;
use time::Date;

use crate::{
    AppState, Error,
    aggregation::{PersonStats, person_stats},
    database_id::DatabaseId,
    endpoints,
    finance::core::{FinanceRecord, LoanTerms, get_finance_record, get_finance_records_by_mobile},
    html::{
        BADGE_STYLE, BUTTON_SECONDARY_STYLE, CARD_STYLE, FORM_LABEL_STYLE, FORM_TEXT_INPUT_STYLE,
        PAGE_CONTAINER_STYLE, TABLE_CELL_STYLE, TABLE_HEADER_STYLE, TABLE_ROW_STYLE, TABLE_STYLE,
        base, labelled_input, link, or_fallback, submit_button,
    },
    ledger::{LoanBalance, LoanReturn, get_loan_returns, get_total_returned_by_loan, loan_balance},
    navigation::NavBar,
    payment::PaymentMethod,
    timezone::local_today,
};

/// The state needed for the record page.
#[derive(Debug, Clone)]
pub struct RecordPageState {
    /// The database connection for reading records and loan returns.
    pub db_connection: Arc<Mutex<Connection>>,
    /// The local timezone as a canonical timezone name, e.g. "Asia/Karachi".
    pub local_timezone: String,
}

impl FromRef<AppState> for RecordPageState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            local_timezone: state.local_timezone.clone(),
        }
    }
}

/// The ledger of a loan as shown on its page.
struct LoanLedger<'a> {
    terms: &'a LoanTerms,
    balance: LoanBalance,
    returns: Vec<LoanReturn>,
}

/// Renders the details of a loan or expense.
///
/// # Errors
/// Returns [Error::NotFound] if there is no record with the ID `record_id`.
pub async fn get_record_page(
    State(state): State<RecordPageState>,
    Path(record_id): Path<DatabaseId>,
) -> Result<Response, Error> {
    let today = local_today(&state.local_timezone)?;

    let connection = state
        .db_connection
        .lock()
        .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
        .map_err(|_| Error::DatabaseLockError)?;

    let record = get_finance_record(record_id, &connection)?;
    let total_returned = get_total_returned_by_loan(&connection)?;

    let returns = if record.is_loan() {
        get_loan_returns(record.id, &connection)?
    } else {
        Vec::new()
    };

    let stats = match &record.mobile_no {
        Some(mobile_no) => {
            let records = get_finance_records_by_mobile(mobile_no, &connection)?;
            Some(person_stats(&records, &total_returned, today))
        }
        None => None,
    };

    drop(connection);

    let ledger = record.loan_terms().map(|terms| LoanLedger {
        terms,
        balance: loan_balance(
            terms,
            total_returned.get(&record.id).copied().unwrap_or_default(),
            today,
        ),
        returns,
    });

    Ok(record_view(&record, ledger.as_ref(), stats.as_ref(), today).into_response())
}

fn detail_row(label: &str, value: &str) -> Markup {
    html! {
        div class="flex justify-between gap-4 py-2 border-b border-gray-200 dark:border-gray-700"
        {
            dt class="text-gray-500 dark:text-gray-400" { (label) }
            dd class="text-right" { (value) }
        }
    }
}

fn record_details(record: &FinanceRecord) -> Markup {
    let mobile_no = or_fallback(record.mobile_no.as_deref(), "None");

    html! {
        dl class={ (CARD_STYLE) " mb-6" }
        {
            (detail_row("Recipient", &record.recipient_name))
            (detail_row("Mobile number", mobile_no))
            (detail_row("Amount", &record.total_amount.to_string()))
            (detail_row("Purpose", &record.purpose))
            (detail_row("Category", &record.category))
            (detail_row("Payment method", record.payment_method.label()))
            (detail_row("Date", &record.record_date.to_string()))
            (detail_row("Remarks", or_fallback(record.remarks.as_deref(), "None")))
        }
    }
}

fn loan_terms_details(terms: &LoanTerms) -> Markup {
    let repayment_type = terms
        .repayment_type
        .map(|repayment_type| repayment_type.label())
        .unwrap_or("Not set");
    let return_date = terms
        .return_date
        .map(|date| date.to_string())
        .unwrap_or_else(|| "Not set".to_owned());
    let installment_amount = terms
        .installment_amount
        .map(|amount| amount.to_string())
        .unwrap_or_else(|| "Not set".to_owned());
    let total_installments = terms
        .total_installments
        .map(|count| count.to_string())
        .unwrap_or_else(|| "Not set".to_owned());

    html! {
        h2 class="text-xl font-bold mb-2" { "Loan terms" }

        dl class={ (CARD_STYLE) " mb-6" }
        {
            (detail_row("Repayment type", repayment_type))
            (detail_row("Expected return date", &return_date))
            (detail_row("Interest rate", &format!("{}%", terms.interest_rate.normalize())))
            (detail_row("Installment amount", &installment_amount))
            (detail_row("Number of installments", &total_installments))
            (detail_row("Owed when entered", &terms.opening_balance.to_string()))
            (detail_row("Collateral", or_fallback(terms.collateral.as_deref(), "None")))
        }
    }
}

fn balance_cards(balance: &LoanBalance) -> Markup {
    html! {
        div class="grid grid-cols-1 sm:grid-cols-3 gap-4 mb-6"
        {
            div class=(CARD_STYLE)
            {
                p class="text-sm text-gray-500 dark:text-gray-400" { "Total returned" }
                p id="total-returned" class="text-xl font-semibold" { (balance.total_returned) }
            }
            div class=(CARD_STYLE)
            {
                p class="text-sm text-gray-500 dark:text-gray-400" { "Remaining" }
                p id="remaining" class="text-xl font-semibold" { (balance.remaining) }
            }
            div class=(CARD_STYLE)
            {
                p class="text-sm text-gray-500 dark:text-gray-400" { "Status" }
                p id="status" { span class=(balance.status.badge_style()) { (balance.status) } }
            }
        }
    }
}

fn returns_table(returns: &[LoanReturn]) -> Markup {
    html! {
        h2 class="text-xl font-bold mb-2" { "Return history" }

        @if returns.is_empty() {
            p class="mb-6" { "Nothing has been returned yet." }
        } @else {
            div class="relative overflow-x-auto shadow-md sm:rounded-lg mb-6"
            {
                table class=(TABLE_STYLE)
                {
                    thead class=(TABLE_HEADER_STYLE)
                    {
                        tr
                        {
                            th scope="col" class=(TABLE_CELL_STYLE) { "Date" }
                            th scope="col" class=(TABLE_CELL_STYLE) { "Amount" }
                            th scope="col" class=(TABLE_CELL_STYLE) { "Remaining after" }
                            th scope="col" class=(TABLE_CELL_STYLE) { "Method" }
                            th scope="col" class=(TABLE_CELL_STYLE) { "Remarks" }
                        }
                    }

                    tbody
                    {
                        @for loan_return in returns {
                            tr class=(TABLE_ROW_STYLE) data-return-id=(loan_return.id)
                            {
                                td class=(TABLE_CELL_STYLE) { (loan_return.return_date) }
                                td class=(TABLE_CELL_STYLE) { (loan_return.return_amount) }
                                td class=(TABLE_CELL_STYLE) { (loan_return.remaining_after_return) }
                                td class=(TABLE_CELL_STYLE)
                                {
                                    (or_fallback(loan_return.payment_method.as_ref().map(PaymentMethod::label), "-"))
                                }
                                td class=(TABLE_CELL_STYLE) { (or_fallback(loan_return.remarks.as_deref(), "-")) }
                            }
                        }
                    }
                }
            }
        }
    }
}

fn return_form(record_id: DatabaseId, balance: &LoanBalance, today: Date) -> Markup {
    let today = today.to_string();
    let remaining = balance.remaining.to_input_value();

    html! {
        h2 class="text-xl font-bold mb-2" { "Record a return" }

        form
            hx-post=(endpoints::format_endpoint(endpoints::LOAN_RETURNS_API, record_id))
            hx-target-error="#alert-container"
            class="w-full max-w-md space-y-4 mb-6"
        {
            input type="hidden" name="expected_remaining" value=(remaining);

            div
            {
                label for="return_amount" class=(FORM_LABEL_STYLE) { "Amount" }

                input
                    id="return_amount"
                    name="return_amount"
                    type="number"
                    step="0.01"
                    min="0.01"
                    max=(remaining)
                    required
                    class=(FORM_TEXT_INPUT_STYLE);
            }

            div
            {
                label for="return_date" class=(FORM_LABEL_STYLE) { "Date" }

                input
                    id="return_date"
                    name="return_date"
                    type="date"
                    value=(today)
                    max=(today)
                    required
                    class=(FORM_TEXT_INPUT_STYLE);
            }

            div
            {
                label for="payment_method" class=(FORM_LABEL_STYLE) { "Payment method" }

                select id="payment_method" name="payment_method" class=(FORM_TEXT_INPUT_STYLE)
                {
                    option value="" { "Not recorded" }
                    @for method in PaymentMethod::ALL {
                        option value=(method.label()) { (method.label()) }
                    }
                }
            }

            (labelled_input("remarks", "Remarks (optional)", "text", None, false))

            (submit_button("Record Return"))
        }
    }
}

fn person_stats_cards(mobile_no: &str, stats: &PersonStats) -> Markup {
    html! {
        h2 class="text-xl font-bold mb-2" { "Everything paid to " (mobile_no) }

        dl id="person-stats" class={ (CARD_STYLE) " mb-6" }
        {
            (detail_row("Records", &stats.record_count.to_string()))
            (detail_row("Total amount", &stats.total_amount.to_string()))
            (detail_row("Loans", &stats.loan_count.to_string()))
            (detail_row("Expenses", &stats.expense_count.to_string()))
            (detail_row("Active loans", &stats.active_loans.to_string()))
            (detail_row("Completed loans", &stats.completed_loans.to_string()))
            (detail_row("Overdue loans", &stats.overdue_loans.to_string()))
        }
    }
}

fn record_view(
    record: &FinanceRecord,
    ledger: Option<&LoanLedger>,
    stats: Option<&PersonStats>,
    today: Date,
) -> Markup {
    let nav_bar = NavBar::new(endpoints::RECORD_VIEW).into_html();
    let title = format!("{} #{}", record.kind.label(), record.id);

    let content = html! {
        (nav_bar)

        div class=(PAGE_CONTAINER_STYLE)
        {
            div class="w-full max-w-3xl"
            {
                p class="mb-2" { (link(endpoints::RECORDS_VIEW, "Back to loans & expenses")) }

                div class="flex flex-wrap justify-between items-center gap-4 mb-4"
                {
                    h1 class="text-2xl font-bold"
                    {
                        (record.recipient_name) " "
                        span class=(BADGE_STYLE) { (record.kind.label()) }
                    }

                    @if ledger.is_some() {
                        a
                            href=(endpoints::format_endpoint(endpoints::LOAN_STATEMENT, record.id))
                            class=(BUTTON_SECONDARY_STYLE)
                            download
                        {
                            "Download Statement"
                        }
                    }
                }

                @if let Some(ledger) = ledger {
                    (balance_cards(&ledger.balance))
                }

                (record_details(record))

                @if let Some(ledger) = ledger {
                    (loan_terms_details(ledger.terms))
                    (returns_table(&ledger.returns))

                    @if ledger.balance.remaining.is_positive() {
                        (return_form(record.id, &ledger.balance, today))
                    }
                }

                @if let (Some(mobile_no), Some(stats)) = (&record.mobile_no, stats) {
                    (person_stats_cards(mobile_no, stats))
                }
            }
        }
    };

    base(&title, &content)
}

#[cfg(test)]
mod record_page_tests {
    use std::sync::{Arc, Mutex};

    use axum::{
        extract::{Path, State},
        http::StatusCode,
    };
    use rusqlite::Connection;
    use scraper::{Html, Selector};
    use time::{OffsetDateTime, macros::date};

    use crate::{
        Error,
        db::initialize,
        endpoints,
        finance::test_helpers::{insert_expense, insert_loan},
        ledger::{NewLoanReturn, record_return},
        money::Money,
        test_utils::{assert_hx_endpoint, assert_valid_html, must_get_form, parse_html_document},
    };

    use super::{RecordPageState, get_record_page};

    fn get_test_state() -> RecordPageState {
        let connection = Connection::open_in_memory().unwrap();
        initialize(&connection).unwrap();

        RecordPageState {
            db_connection: Arc::new(Mutex::new(connection)),
            local_timezone: "Etc/UTC".to_owned(),
        }
    }

    fn add_return(loan_id: i64, amount: i64, state: &RecordPageState) {
        record_return(
            loan_id,
            NewLoanReturn {
                return_amount: Money::from_whole(amount),
                return_date: OffsetDateTime::now_utc().date(),
                payment_method: None,
                remarks: None,
            },
            None,
            &state.db_connection.lock().unwrap(),
        )
        .unwrap();
    }

    fn text_of(html: &Html, selector: &str) -> String {
        html.select(&Selector::parse(selector).unwrap())
            .next()
            .unwrap_or_else(|| panic!("nothing matched {selector}"))
            .text()
            .collect::<String>()
    }

    #[tokio::test]
    async fn loan_page_shows_balance_and_return_form() {
        let state = get_test_state();
        let loan = insert_loan(
            "Imran",
            Some("0321-5"),
            "1000",
            date!(2025 - 01 - 01),
            &state.db_connection.lock().unwrap(),
        );
        add_return(loan.id, 400, &state);

        let response = get_record_page(State(state), Path(loan.id)).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let html = parse_html_document(response).await;
        assert_valid_html(&html);
        assert_eq!(text_of(&html, "#total-returned"), "Rs 400.00");
        assert_eq!(text_of(&html, "#remaining"), "Rs 600.00");
        assert_eq!(
            html.select(&Selector::parse("tr[data-return-id]").unwrap()).count(),
            1
        );

        let form = must_get_form(&html);
        assert_hx_endpoint(
            &form,
            &endpoints::format_endpoint(endpoints::LOAN_RETURNS_API, loan.id),
            "hx-post",
        );
        let expected = form
            .select(&Selector::parse("input[name=expected_remaining]").unwrap())
            .next()
            .and_then(|input| input.value().attr("value"))
            .unwrap();
        assert_eq!(expected, "600");
    }

    #[tokio::test]
    async fn completed_loan_has_no_return_form() {
        let state = get_test_state();
        let loan = insert_loan(
            "Imran",
            None,
            "100",
            date!(2025 - 01 - 01),
            &state.db_connection.lock().unwrap(),
        );
        add_return(loan.id, 100, &state);

        let response = get_record_page(State(state), Path(loan.id)).await.unwrap();

        let html = parse_html_document(response).await;
        assert!(text_of(&html, "#status").contains("Completed"));
        assert!(html.select(&Selector::parse("form").unwrap()).next().is_none());
    }

    #[tokio::test]
    async fn expense_page_has_no_ledger() {
        let state = get_test_state();
        let expense = insert_expense(
            "Pharmacy",
            Some("0321-5"),
            "80",
            date!(2025 - 01 - 01),
            &state.db_connection.lock().unwrap(),
        );

        let response = get_record_page(State(state), Path(expense.id)).await.unwrap();

        let html = parse_html_document(response).await;
        assert_valid_html(&html);
        assert!(html.select(&Selector::parse("#remaining").unwrap()).next().is_none());
        assert!(text_of(&html, "#person-stats").contains("Rs 80.00"));
    }

    #[tokio::test]
    async fn missing_record_is_not_found() {
        let result = get_record_page(State(get_test_state()), Path(99)).await;

        assert_eq!(result.err(), Some(Error::NotFound));
    }
}
