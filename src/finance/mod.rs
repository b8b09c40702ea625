//! Loans and expenses paid out by the foundation.
//!
//! Both are stored as finance records. Loans carry their repayment terms and
//! have their returns tracked by [crate::ledger].

mod core;
mod create;
mod detail;
mod list;

pub use core::{
    FinanceRecord, LoanTerms, NewFinanceRecord, RecordKind, RepaymentType, create_finance_record,
    create_finance_record_table, get_all_finance_records, get_finance_record,
    get_recent_finance_records,
};
pub use create::{create_record_endpoint, get_new_record_page};
pub use detail::get_record_page;
pub use list::get_records_page;

#[cfg(test)]
pub(crate) use core::{get_finance_records_by_mobile, test_helpers};
