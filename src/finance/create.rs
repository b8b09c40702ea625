//! The page and endpoint for entering a loan or an expense.

use std::sync::{Arc, Mutex};

use axum::{
    extract::{FromRef, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
// Must use axum_extra's Form since that parses an empty string as None instead
// of crashing like axum::Form.
use axum_extra::extract::Form;
use maud::{Markup, html};
use rusqlite::Connection;
use serde::Deserialize;
use time::Date;

use crate::{
    AppState, Error,
    alert::Alert,
    endpoints,
    finance::core::{
        CATEGORIES, FinanceRecordForm, NewFinanceRecord, RepaymentType, create_finance_record,
    },
    html::{
        FORM_CONTAINER_STYLE, FORM_LABEL_STYLE, FORM_RADIO_GROUP_STYLE,
        FORM_RADIO_LABEL_ACTIVE_STYLE, FORM_RADIO_LABEL_STYLE, FORM_TEXT_INPUT_STYLE, base,
        labelled_input, labelled_select, submit_button,
    },
    navigation::NavBar,
    payment::PaymentMethod,
    timezone::local_today,
};

/// The state needed for the new record page.
#[derive(Debug, Clone)]
pub struct NewRecordPageState {
    /// The local timezone as a canonical timezone name, e.g. "Asia/Karachi".
    pub local_timezone: String,
}

impl FromRef<AppState> for NewRecordPageState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            local_timezone: state.local_timezone.clone(),
        }
    }
}

/// Which kind of record the new record page is for.
#[derive(Debug, Default, Deserialize)]
pub struct NewRecordQuery {
    /// "loan" or "expense", anything else shows the loan form.
    #[serde(default)]
    pub kind: Option<String>,
}

/// Renders the page for entering a loan or an expense.
pub async fn get_new_record_page(
    State(state): State<NewRecordPageState>,
    Query(query): Query<NewRecordQuery>,
) -> Result<Response, Error> {
    let today = local_today(&state.local_timezone)?;
    let is_loan = query.kind.as_deref() != Some("expense");

    Ok(new_record_view(is_loan, today).into_response())
}

fn kind_tabs(is_loan: bool) -> Markup {
    let style = |is_active: bool| {
        if is_active {
            FORM_RADIO_LABEL_ACTIVE_STYLE
        } else {
            FORM_RADIO_LABEL_STYLE
        }
    };

    html! {
        div class={ (FORM_RADIO_GROUP_STYLE) " w-full mb-6" }
        {
            a
                href=(endpoints::with_query(endpoints::NEW_RECORD_VIEW, &[("kind", "loan")]))
                class=(style(is_loan))
                aria-current=[is_loan.then_some("page")]
            {
                "Loan"
            }
            a
                href=(endpoints::with_query(endpoints::NEW_RECORD_VIEW, &[("kind", "expense")]))
                class=(style(!is_loan))
                aria-current=[(!is_loan).then_some("page")]
            {
                "Expense"
            }
        }
    }
}

fn loan_fields() -> Markup {
    html! {
        fieldset class="space-y-4 md:space-y-6"
        {
            legend class="text-lg font-semibold mb-2" { "Loan terms" }

            div
            {
                label for="repayment_type" class=(FORM_LABEL_STYLE) { "Repayment type" }

                select id="repayment_type" name="repayment_type" class=(FORM_TEXT_INPUT_STYLE)
                {
                    option value="" { "Not decided" }
                    @for repayment_type in [RepaymentType::Installment, RepaymentType::OneTime] {
                        option value=(repayment_type.as_str()) { (repayment_type.label()) }
                    }
                }
            }

            (labelled_input("return_date", "Expected return date", "date", None, false))
            (labelled_input("interest_rate", "Interest rate (%)", "number", Some("0"), false))
            (labelled_input("installment_amount", "Installment amount", "number", None, false))

            div
            {
                label for="total_installments" class=(FORM_LABEL_STYLE) { "Number of installments" }

                input
                    id="total_installments"
                    name="total_installments"
                    type="number"
                    min="1"
                    step="1"
                    class=(FORM_TEXT_INPUT_STYLE);
            }

            div
            {
                label for="remaining_amount" class=(FORM_LABEL_STYLE) { "Remaining amount" }

                input
                    id="remaining_amount"
                    name="remaining_amount"
                    type="number"
                    step="0.01"
                    min="0"
                    placeholder="Defaults to the loan amount"
                    class=(FORM_TEXT_INPUT_STYLE);
            }

            (labelled_input("collateral", "Collateral", "text", None, false))
        }
    }
}

fn new_record_view(is_loan: bool, today: Date) -> Markup {
    let nav_bar = NavBar::new(endpoints::NEW_RECORD_VIEW).into_html();
    let payment_methods: Vec<&str> = PaymentMethod::ALL.iter().map(|method| method.label()).collect();
    let (title, kind) = if is_loan {
        ("New Loan", "loan")
    } else {
        ("New Expense", "expense")
    };
    let amount_label = if is_loan { "Loan amount" } else { "Expense amount" };
    let today = today.to_string();

    let content = html! {
        (nav_bar)

        div class=(FORM_CONTAINER_STYLE)
        {
            h1 class="text-2xl font-bold mb-6" { (title) }

            (kind_tabs(is_loan))

            form
                hx-post=(endpoints::RECORDS_API)
                hx-swap="none"
                hx-target-error="#alert-container"
                hx-on--after-request="if(event.detail.successful) this.reset()"
                class="w-full space-y-4 md:space-y-6"
            {
                input type="hidden" name="kind" value=(kind);

                (labelled_input("recipient_name", "Recipient name", "text", None, true))

                div
                {
                    label for="mobile_no" class=(FORM_LABEL_STYLE) { "Mobile number (optional)" }

                    input
                        id="mobile_no"
                        name="mobile_no"
                        type="tel"
                        class=(FORM_TEXT_INPUT_STYLE);
                }

                (labelled_input("total_amount", amount_label, "number", None, true))
                (labelled_input("purpose", "Purpose", "text", None, true))
                (labelled_select("category", "Category", &CATEGORIES, None, true))
                (labelled_select("payment_method", "Payment method", &payment_methods, None, true))

                div
                {
                    label for="record_date" class=(FORM_LABEL_STYLE) { "Date" }

                    input
                        id="record_date"
                        name="record_date"
                        type="date"
                        value=(today)
                        max=(today)
                        required
                        class=(FORM_TEXT_INPUT_STYLE);
                }

                @if is_loan {
                    (loan_fields())
                }

                div
                {
                    label for="remarks" class=(FORM_LABEL_STYLE) { "Remarks (optional)" }

                    textarea id="remarks" name="remarks" rows="3" class=(FORM_TEXT_INPUT_STYLE) {}
                }

                (submit_button(&format!("Save {}", if is_loan { "Loan" } else { "Expense" })))
            }
        }
    };

    base(title, &content)
}

/// The state needed to save a loan or expense.
#[derive(Debug, Clone)]
pub struct CreateRecordState {
    /// The database connection for managing loans and expenses.
    pub db_connection: Arc<Mutex<Connection>>,
    /// The local timezone as a canonical timezone name, e.g. "Asia/Karachi".
    pub local_timezone: String,
}

impl FromRef<AppState> for CreateRecordState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            local_timezone: state.local_timezone.clone(),
        }
    }
}

/// A route handler for saving a loan or expense.
///
/// Success is only reported once the row has been written. Any failure,
/// including a database error, is shown as an error alert and the form keeps
/// its input.
pub async fn create_record_endpoint(
    State(state): State<CreateRecordState>,
    Form(form): Form<FinanceRecordForm>,
) -> Response {
    let today = match local_today(&state.local_timezone) {
        Ok(today) => today,
        Err(error) => return error.into_alert_response(),
    };

    let new_record = match NewFinanceRecord::from_form(&form, today) {
        Ok(new_record) => new_record,
        Err(error) => {
            tracing::debug!("rejected {:?} record form: {error}", form.kind);
            return error.into_alert_response();
        }
    };

    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Error::DatabaseLockError.into_alert_response();
        }
    };

    match create_finance_record(new_record, &connection) {
        Ok(record) => {
            tracing::info!(
                "saved {} #{} of {}",
                record.kind.as_str(),
                record.id,
                record.total_amount
            );

            (
                StatusCode::CREATED,
                Alert::Success {
                    message: format!("{} saved", record.kind.label()),
                    details: format!(
                        "{} to {} was saved as record #{}.",
                        record.total_amount, record.recipient_name, record.id
                    ),
                }
                .into_html(),
            )
                .into_response()
        }
        Err(error) => {
            tracing::error!("could not save {} record: {error}", form.kind);
            error.into_alert_response()
        }
    }
}

#[cfg(test)]
mod new_record_page_tests {
    use axum::{
        extract::{Query, State},
        http::StatusCode,
    };
    use scraper::Selector;

    use crate::{
        endpoints,
        test_utils::{
            assert_form_input, assert_form_submit_button, assert_hx_endpoint, assert_valid_html,
            must_get_form, parse_html_document,
        },
    };

    use super::{NewRecordPageState, NewRecordQuery, get_new_record_page};

    async fn render(kind: Option<&str>) -> scraper::Html {
        let state = NewRecordPageState {
            local_timezone: "Etc/UTC".to_owned(),
        };
        let query = NewRecordQuery {
            kind: kind.map(str::to_owned),
        };

        let response = get_new_record_page(State(state), Query(query)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        parse_html_document(response).await
    }

    fn kind_value(html: &scraper::Html) -> String {
        html.select(&Selector::parse("input[name=kind]").unwrap())
            .next()
            .and_then(|input| input.value().attr("value"))
            .unwrap_or_default()
            .to_owned()
    }

    #[tokio::test]
    async fn loan_form_has_loan_terms() {
        let html = render(Some("loan")).await;
        assert_valid_html(&html);

        let form = must_get_form(&html);
        assert_hx_endpoint(&form, endpoints::RECORDS_API, "hx-post");
        assert_form_input(&form, "recipient_name", "text");
        assert_form_input(&form, "total_amount", "number");
        assert_form_input(&form, "record_date", "date");
        assert_form_submit_button(&form);
        assert_eq!(kind_value(&html), "loan");
        assert!(
            html.select(&Selector::parse("input[name=remaining_amount]").unwrap())
                .next()
                .is_some()
        );
    }

    #[tokio::test]
    async fn expense_form_has_no_loan_terms() {
        let html = render(Some("expense")).await;
        assert_valid_html(&html);

        assert_eq!(kind_value(&html), "expense");
        assert!(
            html.select(&Selector::parse("[name=repayment_type]").unwrap())
                .next()
                .is_none()
        );
    }

    #[tokio::test]
    async fn defaults_to_loan() {
        let html = render(None).await;

        assert_eq!(kind_value(&html), "loan");
    }
}

#[cfg(test)]
mod create_record_endpoint_tests {
    use std::sync::{Arc, Mutex};

    use axum::{extract::State, http::StatusCode};
    use axum_extra::extract::Form;
    use rusqlite::Connection;
    use time::OffsetDateTime;

    use crate::{
        db::initialize,
        finance::core::{FinanceRecordForm, RecordKind, get_all_finance_records},
        money::Money,
        test_utils::parse_html_fragment,
    };

    use super::{CreateRecordState, create_record_endpoint};

    fn get_test_state() -> CreateRecordState {
        let connection = Connection::open_in_memory().unwrap();
        initialize(&connection).unwrap();

        CreateRecordState {
            db_connection: Arc::new(Mutex::new(connection)),
            local_timezone: "Etc/UTC".to_owned(),
        }
    }

    fn loan_form() -> FinanceRecordForm {
        FinanceRecordForm {
            kind: "loan".to_owned(),
            recipient_name: "Imran".to_owned(),
            mobile_no: Some("0321-5550000".to_owned()),
            total_amount: "1000".to_owned(),
            purpose: "Shop stock".to_owned(),
            category: "Other".to_owned(),
            payment_method: "Cash".to_owned(),
            record_date: Some(OffsetDateTime::now_utc().date()),
            repayment_type: Some("one_time".to_owned()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn saves_loan_with_full_remaining() {
        let state = get_test_state();

        let response = create_record_endpoint(State(state.clone()), Form(loan_form())).await;

        assert_eq!(response.status(), StatusCode::CREATED);
        let records = get_all_finance_records(&state.db_connection.lock().unwrap()).unwrap();
        assert_eq!(records.len(), 1);
        let RecordKind::Loan(terms) = &records[0].kind else {
            panic!("want a loan, got {:?}", records[0].kind);
        };
        assert_eq!(terms.opening_balance, Money::from_whole(1000));
    }

    #[tokio::test]
    async fn saves_expense_without_mobile() {
        let state = get_test_state();
        let form = FinanceRecordForm {
            kind: "expense".to_owned(),
            mobile_no: None,
            repayment_type: None,
            ..loan_form()
        };

        let response = create_record_endpoint(State(state.clone()), Form(form)).await;

        assert_eq!(response.status(), StatusCode::CREATED);
        let records = get_all_finance_records(&state.db_connection.lock().unwrap()).unwrap();
        assert_eq!(records[0].kind, RecordKind::Expense);
    }

    #[tokio::test]
    async fn remaining_above_total_is_rejected_without_writing() {
        let state = get_test_state();
        let form = FinanceRecordForm {
            remaining_amount: Some("1500".to_owned()),
            ..loan_form()
        };

        let response = create_record_endpoint(State(state.clone()), Form(form)).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let records = get_all_finance_records(&state.db_connection.lock().unwrap()).unwrap();
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn store_failure_is_not_reported_as_success() {
        let state = get_test_state();
        state
            .db_connection
            .lock()
            .unwrap()
            .execute_batch("DROP TABLE loan_return; DROP TABLE finance_record;")
            .unwrap();

        let response = create_record_endpoint(State(state), Form(loan_form())).await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let html = parse_html_fragment(response).await;
        let text = html.root_element().text().collect::<String>();
        assert!(!text.contains("saved as record"), "got {text:?}");
        assert!(text.contains("Something went wrong"), "got {text:?}");
    }
}
