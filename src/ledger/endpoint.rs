//! Defines the endpoint for recording a loan return.
use std::sync::{Arc, Mutex};

use axum::{
    extract::{FromRef, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
// Must use axum_extra's Form since that parses an empty string as None instead
// of crashing like axum::Form.
use axum_extra::extract::Form;
use axum_htmx::HxRedirect;
use rusqlite::Connection;

use crate::{
    AppState, Error,
    database_id::DatabaseId,
    endpoints,
    ledger::core::{LoanReturnForm, NewLoanReturn, record_return},
    money::Money,
    timezone::local_today,
    validation::optional_text,
};

/// The state needed to record a loan return.
#[derive(Debug, Clone)]
pub struct RecordReturnState {
    /// The database connection for managing the ledger.
    pub db_connection: Arc<Mutex<Connection>>,
    /// The local timezone as a canonical timezone name, e.g. "Asia/Karachi".
    pub local_timezone: String,
}

impl FromRef<AppState> for RecordReturnState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            local_timezone: state.local_timezone.clone(),
        }
    }
}

/// A route handler for recording a return on a loan, redirects to the loan's page on success.
pub async fn record_return_endpoint(
    State(state): State<RecordReturnState>,
    Path(loan_id): Path<DatabaseId>,
    Form(form): Form<LoanReturnForm>,
) -> Response {
    let today = match local_today(&state.local_timezone) {
        Ok(today) => today,
        Err(error) => return error.into_alert_response(),
    };

    let new_return = match NewLoanReturn::from_form(&form, today) {
        Ok(new_return) => new_return,
        Err(error) => {
            tracing::debug!("rejected loan return for loan #{loan_id}: {error}");
            return error.into_alert_response();
        }
    };

    let expected_remaining = match optional_text(form.expected_remaining.as_deref())
        .map(|text| text.parse::<Money>())
        .transpose()
    {
        Ok(expected_remaining) => expected_remaining,
        Err(error) => return error.into_alert_response(),
    };

    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Error::DatabaseLockError.into_alert_response();
        }
    };

    if let Err(error) = record_return(loan_id, new_return, expected_remaining, &connection) {
        match error {
            Error::SqlError(_) => tracing::error!("could not record return on loan #{loan_id}: {error}"),
            _ => tracing::info!("rejected return on loan #{loan_id}: {error}"),
        }

        return error.into_alert_response();
    }

    (
        HxRedirect(endpoints::format_endpoint(endpoints::RECORD_VIEW, loan_id)),
        StatusCode::SEE_OTHER,
    )
        .into_response()
}
