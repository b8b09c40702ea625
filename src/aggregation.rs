//! Grouping of donations, loans and expenses by the mobile number of the person involved.
//!
//! Mobile numbers are normalized before grouping so "0300 1234567" and
//! "0300-1234567" land in the same group. All sums are exact decimal sums.

use std::{cmp::Ordering, collections::HashMap};

use rust_decimal::{Decimal, RoundingStrategy};
use time::Date;

use crate::{
    contact::normalize_mobile,
    database_id::DatabaseId,
    donor::Donor,
    finance::FinanceRecord,
    ledger::{LoanStatus, loan_balance},
    money::Money,
};

/// The label for the group of records entered without a mobile number.
pub const NO_NUMBER_LABEL: &str = "No Number";

/// All the donations made from one mobile number.
#[derive(Debug, Clone, PartialEq)]
pub struct DonorGroup {
    /// The normalized mobile number shared by the group.
    pub key: String,
    /// The mobile number as it was entered on the most recent donation.
    pub mobile_no: String,
    /// The distinct names used, most recent first.
    pub names: Vec<String>,
    pub donation_count: usize,
    pub total_amount: Money,
    pub latest_donation: Date,
}

impl DonorGroup {
    pub fn display_name(&self) -> String {
        display_name(&self.names)
    }

    /// Whether a name or the mobile number contains `query`, ignoring case.
    pub fn matches(&self, query: &str) -> bool {
        matches_person(&self.names, Some(&self.mobile_no), query)
    }
}

/// All the loans and expenses paid to one mobile number.
#[derive(Debug, Clone, PartialEq)]
pub struct FinanceGroup {
    /// The normalized mobile number, `None` for records without one.
    pub key: Option<String>,
    /// The mobile number as it was entered on the most recent record.
    pub mobile_no: Option<String>,
    /// The distinct recipient names, most recent first.
    pub names: Vec<String>,
    pub loan_count: usize,
    pub expense_count: usize,
    pub total_amount: Money,
    pub latest_record_date: Date,
    /// The distinct categories of the group's loans.
    pub loan_categories: Vec<String>,
    /// The distinct categories of the group's expenses.
    pub expense_categories: Vec<String>,
}

impl FinanceGroup {
    pub fn record_count(&self) -> usize {
        self.loan_count + self.expense_count
    }

    pub fn display_name(&self) -> String {
        display_name(&self.names)
    }

    pub fn mobile_label(&self) -> &str {
        self.mobile_no.as_deref().unwrap_or(NO_NUMBER_LABEL)
    }

    /// Whether a name or the mobile number contains `query`, ignoring case.
    pub fn matches(&self, query: &str) -> bool {
        matches_person(&self.names, self.mobile_no.as_deref(), query)
    }
}

/// The name to show for a group of records.
///
/// One name is shown as is, two are joined with a comma and more are shown
/// as the first name and how many others there are, e.g. "Ali +2 more".
pub fn display_name(names: &[String]) -> String {
    match names {
        [] => String::new(),
        [name] => name.clone(),
        [first, second] => format!("{first}, {second}"),
        [first, rest @ ..] => format!("{first} +{} more", rest.len()),
    }
}

fn matches_person(names: &[String], mobile_no: Option<&str>, query: &str) -> bool {
    let query = query.trim().to_lowercase();

    if query.is_empty() {
        return true;
    }

    names.iter().any(|name| name.to_lowercase().contains(&query))
        || mobile_no.is_some_and(|mobile_no| {
            mobile_no.contains(&query)
                || (!normalize_mobile(&query).is_empty()
                    && normalize_mobile(mobile_no).contains(&normalize_mobile(&query)))
        })
}

fn push_distinct(values: &mut Vec<String>, value: &str) {
    if !values.iter().any(|existing| existing == value) {
        values.push(value.to_owned());
    }
}

/// Group donations by mobile number.
///
/// Groups are ordered by the number of donations, largest first. Ties go to
/// the group with the more recent donation, then to the smaller mobile number
/// so the order is stable.
pub fn group_donors(donors: &[Donor]) -> Vec<DonorGroup> {
    let mut sorted: Vec<&Donor> = donors.iter().collect();
    sorted.sort_by(|a, b| {
        b.donation_date
            .cmp(&a.donation_date)
            .then_with(|| b.id.cmp(&a.id))
    });

    let mut groups: Vec<DonorGroup> = Vec::new();
    let mut index_by_key: HashMap<String, usize> = HashMap::new();

    for donor in sorted {
        let key = normalize_mobile(&donor.mobile_no);

        match index_by_key.get(&key) {
            Some(&index) => {
                let group = &mut groups[index];
                push_distinct(&mut group.names, &donor.name);
                group.donation_count += 1;
                group.total_amount += donor.total_amount;
            }
            None => {
                index_by_key.insert(key.clone(), groups.len());
                groups.push(DonorGroup {
                    key,
                    mobile_no: donor.mobile_no.clone(),
                    names: vec![donor.name.clone()],
                    donation_count: 1,
                    total_amount: donor.total_amount,
                    latest_donation: donor.donation_date,
                });
            }
        }
    }

    groups.sort_by(|a, b| {
        b.donation_count
            .cmp(&a.donation_count)
            .then_with(|| b.latest_donation.cmp(&a.latest_donation))
            .then_with(|| a.key.cmp(&b.key))
    });

    groups
}

/// Group loans and expenses by mobile number.
///
/// Records without a mobile number form one group with no key. Groups are
/// ordered like [group_donors], with the group without a number last among
/// otherwise equal groups.
pub fn group_finance_records(records: &[FinanceRecord]) -> Vec<FinanceGroup> {
    let mut sorted: Vec<&FinanceRecord> = records.iter().collect();
    sorted.sort_by(|a, b| {
        b.record_date
            .cmp(&a.record_date)
            .then_with(|| b.id.cmp(&a.id))
    });

    let mut groups: Vec<FinanceGroup> = Vec::new();
    let mut index_by_key: HashMap<Option<String>, usize> = HashMap::new();

    for record in sorted {
        let key = record
            .mobile_no
            .as_deref()
            .map(normalize_mobile)
            .filter(|key| !key.is_empty());

        let index = match index_by_key.get(&key) {
            Some(&index) => index,
            None => {
                index_by_key.insert(key.clone(), groups.len());
                groups.push(FinanceGroup {
                    mobile_no: key.as_ref().and(record.mobile_no.clone()),
                    key,
                    names: Vec::new(),
                    loan_count: 0,
                    expense_count: 0,
                    total_amount: Money::ZERO,
                    latest_record_date: record.record_date,
                    loan_categories: Vec::new(),
                    expense_categories: Vec::new(),
                });
                groups.len() - 1
            }
        };

        let group = &mut groups[index];
        push_distinct(&mut group.names, &record.recipient_name);
        group.total_amount += record.total_amount;

        if record.is_loan() {
            group.loan_count += 1;
            push_distinct(&mut group.loan_categories, &record.category);
        } else {
            group.expense_count += 1;
            push_distinct(&mut group.expense_categories, &record.category);
        }
    }

    groups.sort_by(|a, b| {
        b.record_count()
            .cmp(&a.record_count())
            .then_with(|| b.latest_record_date.cmp(&a.latest_record_date))
            .then_with(|| match (&a.key, &b.key) {
                (Some(a), Some(b)) => a.cmp(b),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            })
    });

    groups
}

/// Totals over the donations from one mobile number.
#[derive(Debug, Clone, PartialEq)]
pub struct DonationSummary {
    pub donation_count: usize,
    pub total_amount: Money,
    /// The mean donation rounded to the paisa, zero when there are no donations.
    pub average_amount: Money,
    pub names: Vec<String>,
}

pub fn summarize_donations(donations: &[Donor]) -> DonationSummary {
    let total_amount: Money = donations.iter().map(|donor| donor.total_amount).sum();
    let average_amount = match donations.len() {
        0 => Money::ZERO,
        count => Money::new(
            (total_amount.as_decimal() / Decimal::from(count))
                .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero),
        ),
    };
    let mut names = Vec::new();
    for donor in donations {
        push_distinct(&mut names, &donor.name);
    }

    DonationSummary {
        donation_count: donations.len(),
        total_amount,
        average_amount,
        names,
    }
}

/// How much has been paid to one person and how their loans stand.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PersonStats {
    pub record_count: usize,
    pub total_amount: Money,
    pub loan_count: usize,
    pub expense_count: usize,
    pub active_loans: usize,
    pub completed_loans: usize,
    pub overdue_loans: usize,
}

/// Count the records of one person and the status of their loans.
///
/// `total_returned` maps loan IDs to the sum of their returns, loans missing
/// from it have had nothing returned.
pub fn person_stats(
    records: &[FinanceRecord],
    total_returned: &HashMap<DatabaseId, Money>,
    today: Date,
) -> PersonStats {
    let mut stats = PersonStats::default();

    for record in records {
        stats.record_count += 1;
        stats.total_amount += record.total_amount;

        let Some(terms) = record.loan_terms() else {
            stats.expense_count += 1;
            continue;
        };

        stats.loan_count += 1;
        let returned = total_returned.get(&record.id).copied().unwrap_or_default();

        match loan_balance(terms, returned, today).status {
            LoanStatus::Completed => stats.completed_loans += 1,
            LoanStatus::Overdue => stats.overdue_loans += 1,
            _ => stats.active_loans += 1,
        }
    }

    stats
}


#[cfg(test)]
mod group_donors_tests {
    use rusqlite::Connection;
    use time::macros::date;

    use crate::{
        db::initialize,
        donor::{get_all_donors, test_helpers::insert_donor},
        money::Money,
    };

    use super::group_donors;

    fn get_test_connection() -> Connection {
        let connection = Connection::open_in_memory().unwrap();
        initialize(&connection).unwrap();
        connection
    }

    #[test]
    fn groups_by_mobile_number() {
        let connection = get_test_connection();
        insert_donor("Ayesha", "0300-1", "100", date!(2025 - 01 - 01), &connection);
        insert_donor("Ayesha", "0300-1", "200", date!(2025 - 01 - 02), &connection);
        insert_donor("Bilal", "0300-2", "50", date!(2025 - 01 - 03), &connection);

        let groups = group_donors(&get_all_donors(&connection).unwrap());

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].mobile_no, "0300-1");
        assert_eq!(groups[0].donation_count, 2);
        assert_eq!(groups[0].total_amount, Money::from_whole(300));
        assert_eq!(groups[0].latest_donation, date!(2025 - 01 - 02));
        assert_eq!(groups[1].donation_count, 1);
        assert_eq!(groups[1].total_amount, Money::from_whole(50));
    }

    #[test]
    fn differently_formatted_numbers_share_a_group() {
        let connection = get_test_connection();
        insert_donor("Ayesha", "0300 1234567", "100", date!(2025 - 01 - 01), &connection);
        insert_donor("Ayesha K.", "0300-1234567", "0.10", date!(2025 - 01 - 02), &connection);

        let groups = group_donors(&get_all_donors(&connection).unwrap());

        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].total_amount, "100.10".parse().unwrap());
        assert_eq!(groups[0].names, ["Ayesha K.", "Ayesha"]);
        assert_eq!(groups[0].display_name(), "Ayesha K., Ayesha");
    }

    #[test]
    fn ties_go_to_most_recent_then_number() {
        let connection = get_test_connection();
        insert_donor("Old", "0300-9", "10", date!(2025 - 01 - 01), &connection);
        insert_donor("Recent", "0300-8", "10", date!(2025 - 02 - 01), &connection);
        insert_donor("Same day B", "0300-2", "10", date!(2025 - 01 - 01), &connection);

        let groups = group_donors(&get_all_donors(&connection).unwrap());

        let order: Vec<_> = groups.iter().map(|group| group.key.as_str()).collect();
        assert_eq!(order, ["03008", "03002", "03009"]);
    }

    #[test]
    fn search_matches_name_or_number() {
        let connection = get_test_connection();
        insert_donor("Ayesha Khan", "0300-1234567", "10", date!(2025 - 01 - 01), &connection);

        let groups = group_donors(&get_all_donors(&connection).unwrap());

        assert!(groups[0].matches("khan"));
        assert!(groups[0].matches("0300 123"));
        assert!(groups[0].matches(""));
        assert!(!groups[0].matches("bilal"));
    }
}
