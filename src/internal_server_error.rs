//! The page shown when a request fails on the server side.
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};

use crate::html::error_view;

/// Why a page could not be served, phrased for the person at the desk.
#[derive(Debug, Clone, PartialEq)]
pub enum InternalServerError {
    /// The configured timezone name is not a canonical timezone.
    Timezone(String),
    /// Another request is holding the ledger database.
    DatabaseBusy,
    /// A total over the stored amounts could not be calculated.
    AmountOverflow,
    /// Anything else, details are only written to the server logs.
    Unexpected,
}

impl InternalServerError {
    fn description(&self) -> &'static str {
        match self {
            InternalServerError::Timezone(_) => "Invalid Timezone Settings",
            InternalServerError::DatabaseBusy => "The ledger is busy.",
            InternalServerError::AmountOverflow => "A total is too large to show.",
            InternalServerError::Unexpected => "Sorry, something went wrong.",
        }
    }

    fn fix(&self) -> String {
        match self {
            InternalServerError::Timezone(timezone) => format!(
                "Could not get local timezone \"{timezone}\". Check your server settings and \
                ensure the timezone has been set to a valid, canonical timezone string."
            ),
            InternalServerError::DatabaseBusy => {
                "No changes were lost. Wait a moment and reload the page.".to_owned()
            }
            InternalServerError::AmountOverflow => {
                "One of the stored amounts is far larger than expected. \
                Check the most recent donations and records."
                    .to_owned()
            }
            InternalServerError::Unexpected => {
                "Try again in a moment. If the problem continues, check the server logs.".to_owned()
            }
        }
    }
}

impl IntoResponse for InternalServerError {
    fn into_response(self) -> Response {
        let page = error_view("Internal Server Error", "500", self.description(), &self.fix());

        (StatusCode::INTERNAL_SERVER_ERROR, Html(page.into_string())).into_response()
    }
}

pub async fn get_internal_server_error_page() -> Response {
    InternalServerError::Unexpected.into_response()
}

#[cfg(test)]
mod internal_server_error_tests {
    use axum::{http::StatusCode, response::IntoResponse};

    use crate::test_utils::{assert_valid_html, parse_html_document};

    use super::InternalServerError;

    #[tokio::test]
    async fn timezone_page_names_the_setting() {
        let response = InternalServerError::Timezone("Mars/Olympus".to_owned()).into_response();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let html = parse_html_document(response).await;
        assert_valid_html(&html);
        assert!(html.root_element().text().collect::<String>().contains("Mars/Olympus"));
    }

    #[tokio::test]
    async fn busy_page_asks_for_a_reload() {
        let response = InternalServerError::DatabaseBusy.into_response();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let html = parse_html_document(response).await;
        assert!(html.root_element().text().collect::<String>().contains("reload the page"));
    }
}
