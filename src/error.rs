//! Defines the app level error type and conversions to rendered HTML pages and alerts.
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use time::Date;

use crate::{
    alert::Alert, database_id::DatabaseId, internal_server_error::InternalServerError,
    money::Money, not_found::NotFoundError,
};

/// The errors that may occur in the application.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    /// A required form field was left blank.
    ///
    /// Holds the human readable label of the field, e.g. "Donor name".
    #[error("{0} cannot be empty")]
    EmptyField(&'static str),

    /// An amount could not be parsed as a decimal number with at most two
    /// decimal places.
    #[error("\"{0}\" is not a valid amount")]
    InvalidAmount(String),

    /// An amount that must be zero or more was negative.
    #[error("{0} cannot be negative")]
    NegativeAmount(&'static str),

    /// An amount that must be strictly positive was zero or negative.
    #[error("{0} must be greater than zero")]
    NonPositiveAmount(&'static str),

    /// A date in the future was used for a donation, record or loan return.
    ///
    /// These record events that have already happened, therefore future
    /// dates are not allowed.
    #[error("{0} is a date in the future, which is not allowed")]
    FutureDate(Date),

    /// The interest rate was not a percentage between 0 and 100.
    #[error("\"{0}\" is not a valid interest rate")]
    InvalidInterestRate(String),

    /// The number of installments was not a positive whole number.
    #[error("\"{0}\" is not a valid number of installments")]
    InvalidInstallmentCount(String),

    /// The payment method is not one of the known methods.
    #[error("\"{0}\" is not a known payment method")]
    InvalidPaymentMethod(String),

    /// The record kind was neither "loan" nor "expense".
    #[error("\"{0}\" is not a known record kind")]
    InvalidRecordKind(String),

    /// The repayment type was neither "installment" nor "one_time".
    #[error("\"{0}\" is not a known repayment type")]
    InvalidRepaymentType(String),

    /// The amount still owed when a loan is entered cannot be more than the
    /// amount lent.
    #[error("remaining amount {remaining} is more than the loan amount {total}")]
    OpeningBalanceExceedsTotal { remaining: Money, total: Money },

    /// A loan return was larger than the amount still owed on the loan.
    #[error("return of {amount} on loan #{loan_id} exceeds the remaining {remaining}")]
    ReturnExceedsRemaining {
        loan_id: DatabaseId,
        amount: Money,
        remaining: Money,
    },

    /// A loan operation was attempted on an expense record.
    #[error("record #{0} is not a loan")]
    NotALoan(DatabaseId),

    /// The loan balance changed between the user loading the page and
    /// submitting a return.
    ///
    /// Nothing was written. The client should refresh the page and retry.
    #[error("the balance of loan #{loan_id} changed from {expected} to {actual}")]
    RaceConflict {
        loan_id: DatabaseId,
        expected: Money,
        actual: Money,
    },

    /// The requested resource was not found.
    ///
    /// For HTTP request handlers, the client should check that the parameters
    /// (e.g., ID) are correct and that the resource has been created.
    ///
    /// Internally, this error may occur when a query returns no rows.
    #[error("the requested resource could not be found")]
    NotFound,

    /// An unhandled/unexpected SQL error.
    #[error("an unexpected SQL error occurred: {0}")]
    SqlError(rusqlite::Error),

    /// An error occurred while getting the local timezone from a canonical timezone string.
    #[error("invalid timezone {0}")]
    InvalidTimezoneError(String),

    /// Could not acquire the database lock
    #[error("could not acquire the database lock")]
    DatabaseLockError,

    /// A sum of stored amounts did not fit in a decimal.
    #[error("a total of stored amounts is too large to calculate")]
    AmountOverflow,
}

impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        match value {
            rusqlite::Error::QueryReturnedNoRows => Error::NotFound,
            error => {
                tracing::error!("an unhandled SQL error occurred: {}", error);
                Error::SqlError(error)
            }
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        match self {
            Error::NotFound | Error::NotALoan(_) => NotFoundError.into_response(),
            Error::InvalidTimezoneError(timezone) => {
                InternalServerError::Timezone(timezone).into_response()
            }
            Error::DatabaseLockError => InternalServerError::DatabaseBusy.into_response(),
            Error::AmountOverflow => {
                tracing::error!("a total of stored amounts overflowed");
                InternalServerError::AmountOverflow.into_response()
            }
            // Any errors that are not handled above are not intended to be shown to the client.
            error => {
                tracing::error!("An unexpected error occurred: {}", error);
                InternalServerError::Unexpected.into_response()
            }
        }
    }
}

impl Error {
    /// The HTTP status code to send with an alert for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::EmptyField(_)
            | Error::InvalidAmount(_)
            | Error::NegativeAmount(_)
            | Error::NonPositiveAmount(_)
            | Error::FutureDate(_)
            | Error::InvalidInterestRate(_)
            | Error::InvalidInstallmentCount(_)
            | Error::InvalidPaymentMethod(_)
            | Error::InvalidRecordKind(_)
            | Error::InvalidRepaymentType(_)
            | Error::OpeningBalanceExceedsTotal { .. }
            | Error::ReturnExceedsRemaining { .. }
            | Error::NotALoan(_) => StatusCode::BAD_REQUEST,
            Error::RaceConflict { .. } => StatusCode::CONFLICT,
            Error::NotFound => StatusCode::NOT_FOUND,
            Error::SqlError(_)
            | Error::InvalidTimezoneError(_)
            | Error::DatabaseLockError
            | Error::AmountOverflow => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Convert the error into an HTTP response with an HTML alert.
    pub fn into_alert_response(self) -> Response {
        let status_code = self.status_code();

        let alert = match self {
            Error::InvalidTimezoneError(timezone) => Alert::Error {
                message: "Invalid Timezone Settings".to_owned(),
                details: format!(
                    "Could not get local timezone \"{timezone}\". Check your server settings and \
                    ensure the timezone has been set to valid, canonical timezone string"
                ),
            },
            Error::FutureDate(date) => Alert::Error {
                message: "Invalid date".to_owned(),
                details: format!(
                    "{date} is a date in the future, which is not allowed. \
                    Change the date to today or earlier."
                ),
            },
            Error::ReturnExceedsRemaining {
                loan_id,
                amount,
                remaining,
            } => Alert::Error {
                message: "Return is more than the amount owed".to_owned(),
                details: format!(
                    "A return of {amount} was entered for loan #{loan_id}, \
                    but only {remaining} is still owed. Nothing was saved."
                ),
            },
            Error::RaceConflict { .. } => Alert::Error {
                message: "The loan was updated by someone else".to_owned(),
                details: "Another return was recorded while you had this page open. \
                    Nothing was saved, refresh the page and retry."
                    .to_owned(),
            },
            Error::NotALoan(record_id) => Alert::Error {
                message: "Not a loan".to_owned(),
                details: format!("Record #{record_id} is an expense, returns can only be recorded for loans."),
            },
            Error::NotFound => Alert::Error {
                message: "Record not found".to_owned(),
                details: "The record could not be found. \
                    Try refreshing the page to see if it still exists."
                    .to_owned(),
            },
            error if error.status_code() == StatusCode::BAD_REQUEST => Alert::Error {
                message: "Please check the form".to_owned(),
                details: capitalise_first(&error.to_string()),
            },
            _ => Alert::Error {
                message: "Something went wrong".to_owned(),
                details: "The record was not saved. \
                    An unexpected error occurred, check the server logs for more details."
                    .to_owned(),
            },
        };

        (status_code, alert.into_html()).into_response()
    }
}

fn capitalise_first(text: &str) -> String {
    let mut chars = text.chars();

    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod alert_response_tests {
    use axum::http::StatusCode;
    use scraper::Selector;

    use crate::{
        Error,
        money::Money,
        test_utils::{assert_valid_html, parse_html_fragment},
    };

    async fn alert_text(error: Error) -> (StatusCode, String) {
        let response = error.into_alert_response();
        let status = response.status();
        let html = parse_html_fragment(response).await;
        assert_valid_html(&html);

        let text = html
            .select(&Selector::parse("[role=alert]").unwrap())
            .next()
            .expect("No alert found")
            .text()
            .collect::<String>();

        (status, text)
    }

    #[tokio::test]
    async fn validation_errors_are_bad_requests_with_the_reason() {
        let (status, text) = alert_text(Error::EmptyField("Donor name")).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(text.contains("Donor name cannot be empty"), "got {text:?}");
    }

    #[tokio::test]
    async fn exceeding_remaining_names_loan_and_amounts() {
        let (status, text) = alert_text(Error::ReturnExceedsRemaining {
            loan_id: 7,
            amount: Money::from_whole(1),
            remaining: Money::ZERO,
        })
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(text.contains("#7"), "got {text:?}");
        assert!(text.contains("Rs 1.00"), "got {text:?}");
        assert!(text.contains("Rs 0.00"), "got {text:?}");
    }

    #[tokio::test]
    async fn race_conflict_asks_to_refresh() {
        let (status, text) = alert_text(Error::RaceConflict {
            loan_id: 1,
            expected: Money::from_whole(600),
            actual: Money::from_whole(100),
        })
        .await;

        assert_eq!(status, StatusCode::CONFLICT);
        assert!(text.contains("refresh the page and retry"), "got {text:?}");
    }

    #[tokio::test]
    async fn store_errors_never_look_like_success() {
        let (status, text) = alert_text(Error::DatabaseLockError).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(text.contains("Something went wrong"), "got {text:?}");
        assert!(text.contains("not saved"), "got {text:?}");
    }
}
