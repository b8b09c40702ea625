//! The page and endpoint for registering a donation.

use std::sync::{Arc, Mutex};

use axum::{
    extract::{FromRef, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
// Must use axum_extra's Form since that parses an empty string as None instead
// of crashing like axum::Form.
use axum_extra::extract::Form;
use maud::{Markup, html};
use rusqlite::Connection;
use time::Date;

use crate::{
    AppState, Error,
    alert::Alert,
    donor::core::{DonorForm, NewDonor, create_donor},
    endpoints,
    html::{
        FORM_CONTAINER_STYLE, FORM_LABEL_STYLE, FORM_TEXT_INPUT_STYLE, base, labelled_input,
        labelled_select, submit_button,
    },
    navigation::NavBar,
    payment::PaymentMethod,
    timezone::local_today,
};

/// The state needed for the donor registration page.
#[derive(Debug, Clone)]
pub struct NewDonorPageState {
    /// The local timezone as a canonical timezone name, e.g. "Asia/Karachi".
    pub local_timezone: String,
}

impl FromRef<AppState> for NewDonorPageState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            local_timezone: state.local_timezone.clone(),
        }
    }
}

/// Renders the page for registering a donation.
pub async fn get_new_donor_page(
    State(state): State<NewDonorPageState>,
) -> Result<Response, Error> {
    let today = local_today(&state.local_timezone)?;

    Ok(new_donor_view(today).into_response())
}

fn new_donor_view(today: Date) -> Markup {
    let nav_bar = NavBar::new(endpoints::NEW_DONOR_VIEW).into_html();
    let payment_methods: Vec<&str> = PaymentMethod::ALL.iter().map(|method| method.label()).collect();
    let today = today.to_string();

    let content = html! {
        (nav_bar)

        div class=(FORM_CONTAINER_STYLE)
        {
            h1 class="text-2xl font-bold mb-6" { "Register Donation" }

            form
                hx-post=(endpoints::DONORS_API)
                hx-swap="none"
                hx-target-error="#alert-container"
                hx-on--after-request="if(event.detail.successful) this.reset()"
                class="w-full space-y-4 md:space-y-6"
            {
                (labelled_input("name", "Donor name", "text", None, true))
                (labelled_input("mobile_no", "Mobile number", "tel", None, true))
                (labelled_select("payment_method", "Payment method", &payment_methods, None, true))
                (labelled_input("total_amount", "Amount", "number", None, true))
                (labelled_input("purpose", "Purpose", "text", None, true))

                div
                {
                    label for="donation_date" class=(FORM_LABEL_STYLE) { "Donation date" }

                    input
                        id="donation_date"
                        name="donation_date"
                        type="date"
                        value=(today)
                        max=(today)
                        required
                        class=(FORM_TEXT_INPUT_STYLE);
                }

                div
                {
                    label for="remarks" class=(FORM_LABEL_STYLE) { "Remarks (optional)" }

                    textarea
                        id="remarks"
                        name="remarks"
                        rows="3"
                        class=(FORM_TEXT_INPUT_STYLE)
                    {}
                }

                (submit_button("Register Donation"))
            }
        }
    };

    base("Register Donation", &content)
}

/// The state needed to register a donation.
#[derive(Debug, Clone)]
pub struct CreateDonorState {
    /// The database connection for managing donors.
    pub db_connection: Arc<Mutex<Connection>>,
    /// The local timezone as a canonical timezone name, e.g. "Asia/Karachi".
    pub local_timezone: String,
}

impl FromRef<AppState> for CreateDonorState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            local_timezone: state.local_timezone.clone(),
        }
    }
}

/// A route handler for registering a donation.
///
/// Responds with a success alert once the donation is saved, the page clears
/// the form itself. Any error is shown as an alert and the form keeps its input.
pub async fn create_donor_endpoint(
    State(state): State<CreateDonorState>,
    Form(form): Form<DonorForm>,
) -> Response {
    let today = match local_today(&state.local_timezone) {
        Ok(today) => today,
        Err(error) => return error.into_alert_response(),
    };

    let new_donor = match NewDonor::from_form(&form, today) {
        Ok(new_donor) => new_donor,
        Err(error) => {
            tracing::debug!("rejected donor form: {error}");
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

    match create_donor(new_donor, &connection) {
        Ok(donor) => {
            tracing::info!("registered donation #{} of {}", donor.id, donor.total_amount);

            (
                StatusCode::CREATED,
                Alert::Success {
                    message: "Donation registered".to_owned(),
                    details: format!(
                        "{} from {} was saved.",
                        donor.total_amount, donor.name
                    ),
                }
                .into_html(),
            )
                .into_response()
        }
        Err(error) => {
            tracing::error!("could not save donation: {error}");
            error.into_alert_response()
        }
    }
}
