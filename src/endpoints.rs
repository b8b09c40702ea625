//! The API endpoints URIs.
//!
//! For endpoints that take a parameter, e.g., '/records/{record_id}', use [format_endpoint].

/// The root route which redirects to the dashboard.
pub const ROOT: &str = "/";
/// The overview of funds, loans and expenses.
pub const DASHBOARD_VIEW: &str = "/dashboard";
/// The page listing donors grouped by mobile number.
pub const DONORS_VIEW: &str = "/donors";
/// The page for registering a donation.
pub const NEW_DONOR_VIEW: &str = "/donors/new";
/// The donation history of one mobile number, given as the `mobile_no` query parameter.
pub const DONOR_HISTORY_VIEW: &str = "/donors/history";
/// The page listing loans and expenses.
pub const RECORDS_VIEW: &str = "/records";
/// The page for entering a loan or expense.
pub const NEW_RECORD_VIEW: &str = "/records/new";
/// The details of a single loan or expense.
pub const RECORD_VIEW: &str = "/records/{record_id}";
/// The downloadable statement for a loan.
pub const LOAN_STATEMENT: &str = "/records/{record_id}/statement";
/// The page to display when an internal server error occurs.
pub const INTERNAL_ERROR_VIEW: &str = "/error";

/// The route to register a donation.
pub const DONORS_API: &str = "/api/donors";
/// The route to create a loan or expense.
pub const RECORDS_API: &str = "/api/records";
/// The route to record a return against a loan.
pub const LOAN_RETURNS_API: &str = "/api/records/{record_id}/returns";

/// Replace the parameter in `endpoint_path` with `id`.
///
/// A parameter is the first substring that starts with '{' and ends with '}',
/// e.g. '{record_id}' in '/records/{record_id}'. If there is no parameter,
/// `endpoint_path` is returned unchanged.
pub fn format_endpoint(endpoint_path: &str, id: i64) -> String {
    let Some(start) = endpoint_path.find('{') else {
        return endpoint_path.to_owned();
    };

    let end = endpoint_path[start..]
        .find('}')
        .map(|offset| start + offset + 1)
        .unwrap_or(endpoint_path.len());

    format!("{}{}{}", &endpoint_path[..start], id, &endpoint_path[end..])
}

/// The URL of a page with `params` encoded as the query string.
///
/// Empty values are left out so that filter forms produce tidy URLs.
pub fn with_query(endpoint_path: &str, params: &[(&str, &str)]) -> String {
    let params: Vec<_> = params
        .iter()
        .filter(|(_, value)| !value.is_empty())
        .collect();

    if params.is_empty() {
        return endpoint_path.to_owned();
    }

    match serde_urlencoded::to_string(&params) {
        Ok(query) => format!("{endpoint_path}?{query}"),
        Err(error) => {
            tracing::error!("could not encode query parameters {params:?}: {error}");
            endpoint_path.to_owned()
        }
    }
}

/// The URL of the donation history for `mobile_no`.
pub fn donor_history_url(mobile_no: &str) -> String {
    with_query(DONOR_HISTORY_VIEW, &[("mobile_no", mobile_no)])
}
