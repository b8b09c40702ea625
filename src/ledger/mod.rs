//! The loan return ledger and loan status.

mod core;
mod endpoint;
mod status;

pub use core::{
    LoanBalance, LoanReturn, NewLoanReturn, create_loan_return_table, get_loan_returns,
    get_total_returned_by_loan, loan_balance, record_return,
};
pub use endpoint::record_return_endpoint;
pub use status::LoanStatus;
