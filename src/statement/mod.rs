//! Downloadable loan statements.

mod document;
mod endpoint;

pub use endpoint::get_loan_statement;
