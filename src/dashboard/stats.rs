//! The figures shown on the dashboard.

use std::collections::HashMap;

use rust_decimal::{Decimal, RoundingStrategy};
use time::{Date, OffsetDateTime};

use crate::{
    database_id::DatabaseId,
    donor::Donor,
    endpoints,
    finance::{FinanceRecord, RecordKind},
    ledger::{LoanStatus, loan_balance},
    money::Money,
};

/// How many donations and how many finance records are read for the recent
/// activity feed.
pub(super) const RECENT_PER_KIND: u32 = 5;

/// The most rows shown in the recent activity feed.
pub(super) const RECENT_ACTIVITY_LIMIT: usize = 6;

/// The foundation's totals.
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardStats {
    /// The sum of all donations.
    pub total_funds: Money,
    pub total_loans: Money,
    pub total_expenses: Money,
    /// The amount still owed on loans that are not completed.
    pub outstanding_loans: Money,
    /// Funds less expenses and the money still out on loan.
    pub available_balance: Money,
    pub donor_count: u64,
    pub loan_count: usize,
    pub expense_count: usize,
    /// The share of lent money that has come back, as a whole percentage.
    pub recovery_rate: Decimal,
    /// The share of funds spent or out on loan, as a whole percentage.
    pub utilisation_rate: Decimal,
}

/// Works out the dashboard totals.
///
/// `total_returned` maps loan IDs to the sum of their returns, loans missing
/// from the map have had nothing returned.
pub fn dashboard_stats(
    total_funds: Money,
    donor_count: u64,
    records: &[FinanceRecord],
    total_returned: &HashMap<DatabaseId, Money>,
    today: Date,
) -> DashboardStats {
    let mut total_loans = Money::ZERO;
    let mut total_expenses = Money::ZERO;
    let mut outstanding_loans = Money::ZERO;
    let mut loan_count = 0;
    let mut expense_count = 0;

    for record in records {
        match &record.kind {
            RecordKind::Loan(terms) => {
                loan_count += 1;
                total_loans += record.total_amount;

                let returned = total_returned.get(&record.id).copied().unwrap_or_default();
                let balance = loan_balance(terms, returned, today);

                if balance.status != LoanStatus::Completed {
                    outstanding_loans += balance.remaining;
                }
            }
            RecordKind::Expense => {
                expense_count += 1;
                total_expenses += record.total_amount;
            }
        }
    }

    DashboardStats {
        total_funds,
        total_loans,
        total_expenses,
        outstanding_loans,
        available_balance: total_funds - total_expenses - outstanding_loans,
        donor_count,
        loan_count,
        expense_count,
        recovery_rate: percentage(total_loans - outstanding_loans, total_loans),
        utilisation_rate: percentage(total_expenses + outstanding_loans, total_funds),
    }
}

/// `part` as a whole percentage of `whole`, half rounded away from zero.
///
/// Zero when `whole` is not positive.
fn percentage(part: Money, whole: Money) -> Decimal {
    if !whole.is_positive() {
        return Decimal::ZERO;
    }

    part.as_decimal()
        .checked_div(whole.as_decimal())
        .and_then(|ratio| ratio.checked_mul(Decimal::ONE_HUNDRED))
        .map(|percent| percent.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero))
        .unwrap_or(Decimal::ZERO)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityKind {
    Donation,
    Loan,
    Expense,
}

impl ActivityKind {
    pub fn label(&self) -> &'static str {
        match self {
            ActivityKind::Donation => "Donation",
            ActivityKind::Loan => "Loan",
            ActivityKind::Expense => "Expense",
        }
    }
}

/// One row of the recent activity feed.
#[derive(Debug, Clone, PartialEq)]
pub struct Activity {
    pub kind: ActivityKind,
    pub name: String,
    pub amount: Money,
    pub date: Date,
    pub created_at: OffsetDateTime,
    /// Where the row links to.
    pub url: String,
}

impl From<Donor> for Activity {
    fn from(donor: Donor) -> Self {
        Self {
            kind: ActivityKind::Donation,
            url: endpoints::donor_history_url(&donor.mobile_no),
            name: donor.name,
            amount: donor.total_amount,
            date: donor.donation_date,
            created_at: donor.created_at,
        }
    }
}

impl From<FinanceRecord> for Activity {
    fn from(record: FinanceRecord) -> Self {
        let kind = match record.kind {
            RecordKind::Loan(_) => ActivityKind::Loan,
            RecordKind::Expense => ActivityKind::Expense,
        };

        Self {
            kind,
            url: endpoints::format_endpoint(endpoints::RECORD_VIEW, record.id),
            name: record.recipient_name,
            amount: record.total_amount,
            date: record.record_date,
            created_at: record.created_at,
        }
    }
}

/// Merges recent donations and finance records into one feed, the most
/// recently entered first.
pub fn recent_activity(donors: Vec<Donor>, records: Vec<FinanceRecord>) -> Vec<Activity> {
    let mut activity: Vec<Activity> = donors
        .into_iter()
        .map(Activity::from)
        .chain(records.into_iter().map(Activity::from))
        .collect();

    activity.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    activity.truncate(RECENT_ACTIVITY_LIMIT);

    activity
}

#[cfg(test)]
mod dashboard_stats_tests {
    use std::collections::HashMap;

    use rust_decimal::Decimal;
    use time::macros::date;

    use crate::{
        finance::{FinanceRecord, RecordKind},
        finance::test_helpers::loan_terms,
        money::Money,
        payment::PaymentMethod,
    };

    use super::dashboard_stats;

    const TODAY: time::Date = date!(2025 - 06 - 01);

    fn record(id: i64, amount: i64, kind: RecordKind) -> FinanceRecord {
        FinanceRecord {
            id,
            recipient_name: format!("Person {id}"),
            mobile_no: None,
            total_amount: Money::from_whole(amount),
            purpose: "Support".to_owned(),
            category: "Medical".to_owned(),
            payment_method: PaymentMethod::Cash,
            remarks: None,
            record_date: date!(2025 - 01 - 01),
            created_at: time::OffsetDateTime::UNIX_EPOCH,
            kind,
        }
    }

    fn loan(id: i64, amount: i64) -> FinanceRecord {
        record(id, amount, RecordKind::Loan(loan_terms(&amount.to_string())))
    }

    #[test]
    fn computes_totals_and_rates() {
        let records = [loan(1, 1000), loan(2, 200), record(3, 100, RecordKind::Expense)];
        let returned = HashMap::from([(1, Money::from_whole(400)), (2, Money::from_whole(200))]);

        let stats = dashboard_stats(Money::from_whole(1000), 4, &records, &returned, TODAY);

        assert_eq!(stats.total_loans, Money::from_whole(1200));
        assert_eq!(stats.total_expenses, Money::from_whole(100));
        assert_eq!(stats.outstanding_loans, Money::from_whole(600));
        assert_eq!(stats.available_balance, Money::from_whole(300));
        assert_eq!(stats.donor_count, 4);
        assert_eq!(stats.loan_count, 2);
        assert_eq!(stats.expense_count, 1);
        assert_eq!(stats.recovery_rate, Decimal::from(50));
        assert_eq!(stats.utilisation_rate, Decimal::from(70));
    }

    #[test]
    fn rates_are_zero_without_loans_or_funds() {
        let stats = dashboard_stats(Money::ZERO, 0, &[], &HashMap::new(), TODAY);

        assert_eq!(stats.recovery_rate, Decimal::ZERO);
        assert_eq!(stats.utilisation_rate, Decimal::ZERO);
        assert_eq!(stats.available_balance, Money::ZERO);
    }

    #[test]
    fn rates_round_half_away_from_zero() {
        let records = [loan(1, 3)];
        let returned = HashMap::from([(1, Money::from_whole(2))]);

        let stats = dashboard_stats(Money::from_whole(8), 1, &records, &returned, TODAY);

        // 2/3 recovered, 1/8 utilised
        assert_eq!(stats.recovery_rate, Decimal::from(67));
        assert_eq!(stats.utilisation_rate, Decimal::from(13));
    }
}
