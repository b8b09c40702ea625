//! Application router configuration.

use axum::{
    Router,
    response::Redirect,
    routing::{get, post},
};

use crate::{
    AppState,
    dashboard::get_dashboard_page,
    donor::{create_donor_endpoint, get_donor_history_page, get_donors_page, get_new_donor_page},
    endpoints,
    finance::{create_record_endpoint, get_new_record_page, get_record_page, get_records_page},
    internal_server_error::get_internal_server_error_page,
    ledger::record_return_endpoint,
    not_found::get_404_not_found,
    statement::get_loan_statement,
};

/// Return a router with all the app's routes.
pub fn build_router(state: AppState) -> Router {
    let pages = Router::new()
        .route(endpoints::ROOT, get(get_index_page))
        .route(endpoints::DASHBOARD_VIEW, get(get_dashboard_page))
        .route(endpoints::DONORS_VIEW, get(get_donors_page))
        .route(endpoints::NEW_DONOR_VIEW, get(get_new_donor_page))
        .route(endpoints::DONOR_HISTORY_VIEW, get(get_donor_history_page))
        .route(endpoints::RECORDS_VIEW, get(get_records_page))
        .route(endpoints::NEW_RECORD_VIEW, get(get_new_record_page))
        .route(endpoints::RECORD_VIEW, get(get_record_page))
        .route(endpoints::LOAN_STATEMENT, get(get_loan_statement))
        .route(
            endpoints::INTERNAL_ERROR_VIEW,
            get(get_internal_server_error_page),
        );

    let api = Router::new()
        .route(endpoints::DONORS_API, post(create_donor_endpoint))
        .route(endpoints::RECORDS_API, post(create_record_endpoint))
        .route(endpoints::LOAN_RETURNS_API, post(record_return_endpoint));

    pages
        .merge(api)
        .fallback(get_404_not_found)
        .with_state(state)
}

/// The root path '/' redirects to the dashboard page.
async fn get_index_page() -> Redirect {
    Redirect::to(endpoints::DASHBOARD_VIEW)
}


#[cfg(test)]
mod router_tests {
    use axum::http::StatusCode;
    use axum_test::TestServer;
    use rusqlite::Connection;

    use crate::{AppState, endpoints};

    use super::build_router;

    fn get_test_server() -> TestServer {
        let connection = Connection::open_in_memory().expect("Could not open database in memory.");
        let state = AppState::new(connection, "Etc/UTC", "Test Foundation")
            .expect("Could not create app state.");

        TestServer::new(build_router(state))
    }

    #[tokio::test]
    async fn pages_render() {
        let server = get_test_server();

        for page in [
            endpoints::DASHBOARD_VIEW,
            endpoints::DONORS_VIEW,
            endpoints::NEW_DONOR_VIEW,
            endpoints::RECORDS_VIEW,
            endpoints::NEW_RECORD_VIEW,
        ] {
            server.get(page).await.assert_status_ok();
        }
    }

    #[tokio::test]
    async fn unknown_route_is_not_found() {
        let server = get_test_server();

        server
            .get("/not-a-page")
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn error_page_is_internal_server_error() {
        let server = get_test_server();

        server
            .get(endpoints::INTERNAL_ERROR_VIEW)
            .await
            .assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn donation_shows_in_history() {
        let server = get_test_server();
        let form = [
            ("name", "Ayesha"),
            ("mobile_no", "0300-1234567"),
            ("payment_method", "Cash"),
            ("total_amount", "1,500"),
            ("purpose", "Zakat"),
            ("remarks", ""),
            ("donation_date", "2025-01-01"),
        ];

        server
            .post(endpoints::DONORS_API)
            .form(&form)
            .await
            .assert_status(StatusCode::CREATED);

        let history = server
            .get(endpoints::DONOR_HISTORY_VIEW)
            .add_query_param("mobile_no", "0300 1234567")
            .await;

        history.assert_status_ok();
        assert!(history.text().contains("Rs 1,500.00"));
    }

    #[tokio::test]
    async fn loan_ledger_round_trip() {
        let server = get_test_server();
        let loan_form = [
            ("kind", "loan"),
            ("recipient_name", "Imran Ali"),
            ("mobile_no", "0321-5550000"),
            ("total_amount", "1000"),
            ("purpose", "Shop stock"),
            ("category", "Other"),
            ("payment_method", "Cash"),
            ("record_date", "2025-01-01"),
            ("repayment_type", "one_time"),
            ("return_date", ""),
            ("remaining_amount", ""),
        ];

        server
            .post(endpoints::RECORDS_API)
            .form(&loan_form)
            .await
            .assert_status(StatusCode::CREATED);

        let returns_api = endpoints::format_endpoint(endpoints::LOAN_RETURNS_API, 1);
        let record_page = endpoints::format_endpoint(endpoints::RECORD_VIEW, 1);

        let response = server
            .post(&returns_api)
            .form(&[("return_amount", "400"), ("return_date", "2025-02-01")])
            .await;
        response.assert_status(StatusCode::SEE_OTHER);
        assert_eq!(response.header("hx-redirect"), record_page.as_str());

        server
            .post(&returns_api)
            .form(&[("return_amount", "700"), ("return_date", "2025-02-02")])
            .await
            .assert_status(StatusCode::BAD_REQUEST);

        server
            .post(&returns_api)
            .form(&[
                ("return_amount", "100"),
                ("return_date", "2025-02-02"),
                ("expected_remaining", "1000"),
            ])
            .await
            .assert_status(StatusCode::CONFLICT);

        let page = server.get(&record_page).await;
        page.assert_status_ok();
        assert!(page.text().contains("Rs 600.00"));

        let statement = server
            .get(&endpoints::format_endpoint(endpoints::LOAN_STATEMENT, 1))
            .await;
        statement.assert_status_ok();
        assert!(
            statement
                .header("content-disposition")
                .to_str()
                .unwrap()
                .starts_with("attachment; filename=\"Loan_Details_Imran_Ali_")
        );
    }
}
