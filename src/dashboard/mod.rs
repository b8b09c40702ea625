//! Dashboard module
//!
//! Provides an overview page with the foundation's totals and the latest
//! donations, loans and expenses.

mod cards;
mod handlers;
mod stats;

pub use handlers::get_dashboard_page;
