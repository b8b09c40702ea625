//! Alert messages for telling the user whether a form submission worked.
//!
//! Alerts are swapped out-of-band into the `#alert-container` element that
//! [crate::html::base] renders on every page.

use axum::response::{IntoResponse, Response};
use maud::{Markup, html};

/// A success or error message.
#[derive(Debug, Clone, PartialEq)]
pub enum Alert {
    Success { message: String, details: String },
    Error { message: String, details: String },
    ErrorSimple { message: String },
}

impl Alert {
    pub fn into_html(self) -> Markup {
        let (container_style, icon_style, message, details) = match self {
            Alert::Success { message, details } => (
                "flex items-start p-4 mb-4 text-green-800 border border-green-300 \
                rounded-lg bg-green-50 dark:bg-gray-800 dark:text-green-400 \
                dark:border-green-800",
                "text-green-500",
                message,
                details,
            ),
            Alert::Error { message, details } => (
                "flex items-start p-4 mb-4 text-red-800 border border-red-300 \
                rounded-lg bg-red-50 dark:bg-gray-800 dark:text-red-400 \
                dark:border-red-800",
                "text-red-500",
                message,
                details,
            ),
            Alert::ErrorSimple { message } => (
                "flex items-start p-4 mb-4 text-red-800 border border-red-300 \
                rounded-lg bg-red-50 dark:bg-gray-800 dark:text-red-400 \
                dark:border-red-800",
                "text-red-500",
                message,
                String::new(),
            ),
        };

        html! {
            div
                id="alert-container"
                hx-swap-oob="true"
                class="w-full max-w-md px-4"
                style="position: fixed; bottom: 1rem; left: 50%; transform: translateX(-50%); z-index: 9999;"
            {
                div class=(container_style) role="alert"
                {
                    span class={"shrink-0 me-3 font-bold " (icon_style)} { "!" }

                    div class="flex-1"
                    {
                        p class="font-medium" { (message) }

                        @if !details.is_empty() {
                            p class="mt-1 text-sm" { (details) }
                        }
                    }

                    button
                        type="button"
                        class="ms-3 text-sm font-semibold"
                        aria-label="Dismiss"
                        onclick="this.closest('[role=alert]').remove()"
                    {
                        "×"
                    }
                }
            }
        }
    }
}

impl IntoResponse for Alert {
    fn into_response(self) -> Response {
        self.into_html().into_response()
    }
}
