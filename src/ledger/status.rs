//! Loan status, derived from the balance and due date rather than stored.

use std::fmt::Display;

use time::Date;

use crate::{finance::RepaymentType, money::Money};

/// Where a loan stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoanStatus {
    ActiveInstallment,
    ActiveOneTime,
    /// Active with no repayment type on record.
    Active,
    Overdue,
    Completed,
}

impl LoanStatus {
    pub fn label(&self) -> &'static str {
        match self {
            LoanStatus::ActiveInstallment => "Active (Installment)",
            LoanStatus::ActiveOneTime => "Active (One Time)",
            LoanStatus::Active => "Active",
            LoanStatus::Overdue => "Overdue",
            LoanStatus::Completed => "Completed",
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(
            self,
            LoanStatus::ActiveInstallment | LoanStatus::ActiveOneTime | LoanStatus::Active
        )
    }

    /// Tailwind classes for the status badge.
    pub fn badge_style(&self) -> &'static str {
        match self {
            LoanStatus::Completed => {
                "inline-flex items-center px-2.5 py-0.5 text-xs font-semibold \
                text-green-800 bg-green-100 rounded-full dark:bg-green-900 dark:text-green-300"
            }
            LoanStatus::Overdue => {
                "inline-flex items-center px-2.5 py-0.5 text-xs font-semibold \
                text-red-800 bg-red-100 rounded-full dark:bg-red-900 dark:text-red-300"
            }
            _ => {
                "inline-flex items-center px-2.5 py-0.5 text-xs font-semibold \
                text-blue-800 bg-blue-100 rounded-full dark:bg-blue-900 dark:text-blue-300"
            }
        }
    }
}

impl Display for LoanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Work out the status of a loan.
///
/// A loan with nothing left to pay is completed even if it was paid late.
/// Otherwise it is overdue once `today` is after the expected return date,
/// and active until then.
pub fn derive_loan_status(
    remaining: Money,
    return_date: Option<Date>,
    repayment_type: Option<RepaymentType>,
    today: Date,
) -> LoanStatus {
    if !remaining.is_positive() {
        return LoanStatus::Completed;
    }

    if return_date.is_some_and(|return_date| return_date < today) {
        return LoanStatus::Overdue;
    }

    match repayment_type {
        Some(RepaymentType::Installment) => LoanStatus::ActiveInstallment,
        Some(RepaymentType::OneTime) => LoanStatus::ActiveOneTime,
        None => LoanStatus::Active,
    }
}
