//! The loan return ledger.
//!
//! A loan's balance is never stored. It is the loan's opening balance minus
//! the sum of its returns, and each return keeps a snapshot of the balance
//! right after it was made. Returns are appended inside an immediate write
//! transaction which re-reads the balance, so two returns racing on the same
//! loan are applied one after the other and the second sees the first.

use std::collections::HashMap;

use rusqlite::{Connection, Row, Transaction, TransactionBehavior, params};
use serde::Deserialize;
use time::{Date, OffsetDateTime};

use crate::{
    Error,
    database_id::DatabaseId,
    finance::{LoanTerms, get_finance_record},
    ledger::status::{LoanStatus, derive_loan_status},
    money::Money,
    payment::PaymentMethod,
    validation::{optional_text, past_date, positive_amount},
};

/// A repayment against a loan. Never updated or deleted.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq)]
pub struct LoanReturn {
    pub id: DatabaseId,
    pub loan_id: DatabaseId,
    pub return_date: Date,
    pub return_amount: Money,
    /// The loan balance immediately after this return.
    pub remaining_after_return: Money,
    pub payment_method: Option<PaymentMethod>,
    pub remarks: Option<String>,
    pub created_at: OffsetDateTime,
}

/// The raw form data for recording a loan return.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoanReturnForm {
    #[serde(default)]
    pub return_amount: String,
    #[serde(default)]
    pub return_date: Option<Date>,
    #[serde(default)]
    pub payment_method: Option<String>,
    #[serde(default)]
    pub remarks: Option<String>,
    /// The balance the user saw when they opened the form.
    #[serde(default)]
    pub expected_remaining: Option<String>,
}

/// A validated loan return that has not been saved yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NewLoanReturn {
    /// The amount paid back, must be greater than zero.
    pub return_amount: Money,
    /// The date the money was received.
    pub return_date: Date,
    /// How the money was paid, if recorded.
    pub payment_method: Option<PaymentMethod>,
    /// Any notes about the return.
    pub remarks: Option<String>,
}

impl NewLoanReturn {
    /// Validate the submitted form.
    ///
    /// # Errors
    /// Returns an error if the amount is missing, unparseable or not more than
    /// zero, if the date is missing or after `today`, or if the payment method
    /// is not known.
    pub fn from_form(form: &LoanReturnForm, today: Date) -> Result<Self, Error> {
        let return_amount = positive_amount(&form.return_amount, "Return amount")?;
        let return_date = past_date(form.return_date, "Return date", today)?;
        let payment_method = optional_text(form.payment_method.as_deref())
            .map(|text| text.parse::<PaymentMethod>())
            .transpose()?;

        Ok(Self {
            return_amount,
            return_date,
            payment_method,
            remarks: optional_text(form.remarks.as_deref()),
        })
    }
}

/// The state of a loan derived from its returns.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoanBalance {
    pub total_returned: Money,
    pub remaining: Money,
    pub status: LoanStatus,
}

/// Derive the balance and status of a loan given the sum of its returns.
pub fn loan_balance(terms: &LoanTerms, total_returned: Money, today: Date) -> LoanBalance {
    let remaining = terms.opening_balance - total_returned;

    LoanBalance {
        total_returned,
        remaining,
        status: derive_loan_status(remaining, terms.return_date, terms.repayment_type, today),
    }
}

pub fn create_loan_return_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute_batch(
        "CREATE TABLE IF NOT EXISTS loan_return (
            id INTEGER PRIMARY KEY,
            loan_id INTEGER NOT NULL,
            return_date TEXT NOT NULL,
            return_amount TEXT NOT NULL,
            remaining_after_return TEXT NOT NULL,
            payment_method TEXT,
            remarks TEXT,
            created_at TEXT NOT NULL,
            FOREIGN KEY(loan_id) REFERENCES finance_record(id) ON UPDATE CASCADE ON DELETE RESTRICT
        );

        CREATE INDEX IF NOT EXISTS idx_loan_return_loan_id ON loan_return(loan_id);",
    )
}

fn map_row_to_loan_return(row: &Row) -> Result<LoanReturn, rusqlite::Error> {
    Ok(LoanReturn {
        id: row.get(0)?,
        loan_id: row.get(1)?,
        return_date: row.get(2)?,
        return_amount: row.get(3)?,
        remaining_after_return: row.get(4)?,
        payment_method: row.get(5)?,
        remarks: row.get(6)?,
        created_at: row.get(7)?,
    })
}

/// Record a repayment of `new_return` against the loan `loan_id`.
///
/// The balance check and the insert happen in one immediate transaction, so
/// either the return is appended with a correct balance snapshot or nothing is
/// written. If `expected_remaining` is given and the balance has changed from
/// it, the return is rejected so the user can review the new balance.
///
/// # Errors
/// - [Error::NonPositiveAmount] if the amount is zero or less.
/// - [Error::NotFound] if there is no record `loan_id`.
/// - [Error::NotALoan] if the record is an expense.
/// - [Error::RaceConflict] if the balance differs from `expected_remaining`.
/// - [Error::ReturnExceedsRemaining] if the amount is more than is owed.
/// - [Error::SqlError] if the database fails.
pub fn record_return(
    loan_id: DatabaseId,
    new_return: NewLoanReturn,
    expected_remaining: Option<Money>,
    connection: &Connection,
) -> Result<LoanReturn, Error> {
    if !new_return.return_amount.is_positive() {
        return Err(Error::NonPositiveAmount("Return amount"));
    }

    let transaction = Transaction::new_unchecked(connection, TransactionBehavior::Immediate)?;

    let loan = get_finance_record(loan_id, &transaction)?;
    let terms = loan.loan_terms().ok_or(Error::NotALoan(loan_id))?;
    let remaining = terms.opening_balance - get_total_returned(loan_id, &transaction)?;

    if let Some(expected) = expected_remaining.filter(|expected| *expected != remaining) {
        tracing::warn!(
            "Balance of loan #{loan_id} changed from {expected} to {remaining} before the return was saved"
        );
        return Err(Error::RaceConflict {
            loan_id,
            expected,
            actual: remaining,
        });
    }

    if new_return.return_amount > remaining {
        return Err(Error::ReturnExceedsRemaining {
            loan_id,
            amount: new_return.return_amount,
            remaining,
        });
    }

    let remaining_after_return = remaining - new_return.return_amount;
    let created_at = OffsetDateTime::now_utc();

    transaction.execute(
        "INSERT INTO loan_return
            (loan_id, return_date, return_amount, remaining_after_return, payment_method, remarks, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            loan_id,
            new_return.return_date,
            new_return.return_amount,
            remaining_after_return,
            new_return.payment_method,
            new_return.remarks,
            created_at,
        ],
    )?;
    let id = transaction.last_insert_rowid();

    transaction.commit()?;

    tracing::info!(
        "Recorded return #{id} of {} on loan #{loan_id}, {remaining_after_return} remaining",
        new_return.return_amount
    );

    Ok(LoanReturn {
        id,
        loan_id,
        return_date: new_return.return_date,
        return_amount: new_return.return_amount,
        remaining_after_return,
        payment_method: new_return.payment_method,
        remarks: new_return.remarks,
        created_at,
    })
}

/// The returns for a loan, oldest return date first.
pub fn get_loan_returns(
    loan_id: DatabaseId,
    connection: &Connection,
) -> Result<Vec<LoanReturn>, Error> {
    connection
        .prepare(
            "SELECT id, loan_id, return_date, return_amount, remaining_after_return,
                payment_method, remarks, created_at
            FROM loan_return WHERE loan_id = ?1
            ORDER BY return_date ASC, id ASC",
        )?
        .query_map([loan_id], map_row_to_loan_return)?
        .map(|maybe_return| maybe_return.map_err(Error::from))
        .collect()
}

/// The sum of all returns made on the loan `loan_id`.
pub fn get_total_returned(loan_id: DatabaseId, connection: &Connection) -> Result<Money, Error> {
    let amounts: Result<Vec<Money>, rusqlite::Error> = connection
        .prepare("SELECT return_amount FROM loan_return WHERE loan_id = ?1")?
        .query_map([loan_id], |row| row.get(0))?
        .collect();

    Money::checked_sum(amounts?)
}

/// The sum of returns for every loan that has at least one return.
pub fn get_total_returned_by_loan(
    connection: &Connection,
) -> Result<HashMap<DatabaseId, Money>, Error> {
    let mut totals = HashMap::new();
    let mut statement = connection.prepare("SELECT loan_id, return_amount FROM loan_return")?;
    let rows = statement.query_map((), |row| Ok((row.get(0)?, row.get(1)?)))?;

    for row in rows {
        let (loan_id, amount): (DatabaseId, Money) = row?;
        let total = totals.entry(loan_id).or_insert(Money::ZERO);
        *total = total.checked_add(amount)?;
    }

    Ok(totals)
}



#[cfg(test)]
mod concurrent_return_tests {
    use std::{
        path::PathBuf,
        sync::{Arc, Barrier},
        thread,
    };

    use rusqlite::Connection;
    use time::macros::date;

    use crate::{
        Error,
        db::initialize,
        finance::test_helpers::insert_loan,
        money::Money,
    };

    use super::{NewLoanReturn, get_total_returned, record_return};

    struct TempDatabase(PathBuf);

    impl TempDatabase {
        fn new(name: &str) -> Self {
            let path = std::env::temp_dir().join(format!(
                "foundation_ledger_{name}_{}.sqlite",
                std::process::id()
            ));
            let _ = std::fs::remove_file(&path);
            Self(path)
        }
    }

    impl Drop for TempDatabase {
        fn drop(&mut self) {
            let _ = std::fs::remove_file(&self.0);
        }
    }

    fn race_two_returns(database: &TempDatabase, amount: i64) -> Vec<Result<Money, Error>> {
        let connection = Connection::open(&database.0).unwrap();
        initialize(&connection).unwrap();
        let loan = insert_loan("Imran", None, "1000", date!(2025 - 01 - 01), &connection);
        drop(connection);

        let barrier = Arc::new(Barrier::new(2));
        let handles: Vec<_> = (0..2)
            .map(|_| {
                let barrier = barrier.clone();
                let path = database.0.clone();

                thread::spawn(move || {
                    let connection = Connection::open(path).unwrap();
                    barrier.wait();

                    record_return(
                        loan.id,
                        NewLoanReturn {
                            return_amount: Money::from_whole(amount),
                            return_date: date!(2025 - 02 - 01),
                            payment_method: None,
                            remarks: None,
                        },
                        None,
                        &connection,
                    )
                    .map(|loan_return| loan_return.remaining_after_return)
                })
            })
            .collect();

        let results = handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .collect();

        let connection = Connection::open(&database.0).unwrap();
        let returned = get_total_returned(loan.id, &connection).unwrap();
        assert!(returned <= Money::from_whole(1000), "returned {returned}");

        results
    }

    #[test]
    fn two_half_returns_end_at_zero() {
        let database = TempDatabase::new("two_halves");

        let mut results = race_two_returns(&database, 500);
        results.sort_by_key(|result| result.as_ref().ok().copied());

        assert_eq!(results, vec![Ok(Money::ZERO), Ok(Money::from_whole(500))]);
    }

    #[test]
    fn second_oversized_return_is_rejected() {
        let database = TempDatabase::new("oversized");

        let results = race_two_returns(&database, 600);

        let successes = results.iter().filter(|result| result.is_ok()).count();
        assert_eq!(successes, 1);
        assert!(results.iter().any(|result| matches!(
            result,
            Err(Error::ReturnExceedsRemaining { remaining, .. }) if *remaining == Money::from_whole(400)
        )));
    }
}
