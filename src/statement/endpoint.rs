//! Defines the route handler for downloading a loan statement.
use std::sync::{Arc, Mutex};

use axum::{
    extract::{FromRef, Path, State},
    http::header::{CONTENT_DISPOSITION, CONTENT_TYPE},
    response::{IntoResponse, Response},
};
use rusqlite::Connection;

use crate::{
    AppState, Error,
    database_id::DatabaseId,
    finance::get_finance_record,
    ledger::get_loan_returns,
    statement::document::{render_loan_statement, statement_file_name},
    timezone::local_today,
};

/// The state needed to generate a loan statement.
#[derive(Debug, Clone)]
pub struct StatementState {
    /// The database connection for reading the loan and its returns.
    pub db_connection: Arc<Mutex<Connection>>,
    /// The local timezone as a canonical timezone name, e.g. "Asia/Karachi".
    pub local_timezone: String,
    pub organisation_name: String,
}

impl FromRef<AppState> for StatementState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            local_timezone: state.local_timezone.clone(),
            organisation_name: state.organisation_name.clone(),
        }
    }
}

/// Sends the statement for the loan `record_id` as an HTML file download.
///
/// # Errors
/// Returns [Error::NotFound] if there is no such record and
/// [Error::NotALoan] if the record is an expense.
pub async fn get_loan_statement(
    State(state): State<StatementState>,
    Path(record_id): Path<DatabaseId>,
) -> Result<Response, Error> {
    let today = local_today(&state.local_timezone)?;

    let (loan, returns) = {
        let connection = state
            .db_connection
            .lock()
            .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
            .map_err(|_| Error::DatabaseLockError)?;

        let loan = get_finance_record(record_id, &connection)?;
        let returns = get_loan_returns(record_id, &connection)?;

        (loan, returns)
    };

    let document = render_loan_statement(&loan, &returns, today, &state.organisation_name)
        .inspect_err(|error| tracing::debug!("no statement for record #{record_id}: {error}"))?;
    let file_name = statement_file_name(&loan.recipient_name, today);

    tracing::info!("Generated statement {file_name} for loan #{record_id}");

    Ok((
        [
            (CONTENT_TYPE, "text/html; charset=utf-8".to_owned()),
            (
                CONTENT_DISPOSITION,
                format!("attachment; filename=\"{file_name}\""),
            ),
        ],
        document,
    )
        .into_response())
}

#[cfg(test)]
mod loan_statement_tests {
    use std::sync::{Arc, Mutex};

    use axum::{
        extract::{Path, State},
        http::StatusCode,
    };
    use rusqlite::Connection;
    use time::{OffsetDateTime, macros::date};

    use crate::{
        Error,
        db::initialize,
        finance::test_helpers::{insert_expense, insert_loan},
        test_utils::{assert_content_type, get_header},
    };

    use super::{StatementState, get_loan_statement};

    fn get_test_state() -> StatementState {
        let connection = Connection::open_in_memory().unwrap();
        initialize(&connection).unwrap();

        StatementState {
            db_connection: Arc::new(Mutex::new(connection)),
            local_timezone: "Etc/UTC".to_owned(),
            organisation_name: "Sahara Foundation".to_owned(),
        }
    }

    #[tokio::test]
    async fn downloads_statement_as_attachment() {
        let state = get_test_state();
        let loan = insert_loan(
            "Imran Ali",
            None,
            "1000",
            date!(2025 - 01 - 01),
            &state.db_connection.lock().unwrap(),
        );

        let response = get_loan_statement(State(state), Path(loan.id))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_content_type(&response, "text/html; charset=utf-8");
        let today = OffsetDateTime::now_utc().date();
        assert_eq!(
            get_header(&response, "content-disposition"),
            format!("attachment; filename=\"Loan_Details_Imran_Ali_{today}.html\"")
        );
    }

    #[tokio::test]
    async fn expense_has_no_statement() {
        let state = get_test_state();
        let expense = insert_expense(
            "Pharmacy",
            None,
            "80",
            date!(2025 - 01 - 01),
            &state.db_connection.lock().unwrap(),
        );

        let result = get_loan_statement(State(state), Path(expense.id)).await;

        assert_eq!(result.err(), Some(Error::NotALoan(expense.id)));
    }

    #[tokio::test]
    async fn missing_record_is_not_found() {
        let result = get_loan_statement(State(get_test_state()), Path(42)).await;

        assert_eq!(result.err(), Some(Error::NotFound));
    }
}
