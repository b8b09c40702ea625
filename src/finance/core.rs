//! Loan and expense records and their storage.
//!
//! Both kinds of disbursement live in one table. In Rust they share the
//! common fields of [FinanceRecord] while the loan-only fields are carried by
//! [RecordKind::Loan], so an expense can never hold a repayment schedule.

use std::{fmt::Display, str::FromStr};

use rusqlite::{
    Connection, Row, ToSql, params,
    types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, Type, ValueRef},
};
use rust_decimal::Decimal;
use serde::Deserialize;
use time::{Date, OffsetDateTime};

use crate::{
    Error,
    contact::normalize_mobile,
    database_id::DatabaseId,
    money::Money,
    payment::PaymentMethod,
    validation::{
        non_negative_amount, optional_text, past_date, payment_method, positive_amount,
        required_text,
    },
};

/// The categories offered when recording a loan or expense.
pub const CATEGORIES: [&str; 10] = [
    "Food & Ration",
    "Medical",
    "Education",
    "Utilities",
    "Transportation",
    "Clothing",
    "Shelter",
    "Emergency",
    "Administrative",
    "Other",
];

/// How a loan is expected to be paid back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RepaymentType {
    /// Paid back in regular installments.
    Installment,
    /// Paid back in one go.
    OneTime,
}

impl RepaymentType {
    /// The value used in forms and the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            RepaymentType::Installment => "installment",
            RepaymentType::OneTime => "one_time",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            RepaymentType::Installment => "Installment",
            RepaymentType::OneTime => "One Time",
        }
    }
}

impl Display for RepaymentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for RepaymentType {
    type Err = Error;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        match text.trim() {
            "installment" => Ok(RepaymentType::Installment),
            "one_time" => Ok(RepaymentType::OneTime),
            other => Err(Error::InvalidRepaymentType(other.to_owned())),
        }
    }
}

impl ToSql for RepaymentType {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for RepaymentType {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        RepaymentType::from_str(value.as_str()?).map_err(|error| FromSqlError::Other(Box::new(error)))
    }
}

/// The terms that only apply to loans.
#[derive(Debug, Clone, PartialEq)]
pub struct LoanTerms {
    /// How the loan will be paid back, if agreed.
    pub repayment_type: Option<RepaymentType>,
    /// When the loan is expected to be paid back in full.
    pub return_date: Option<Date>,
    /// Interest as a percentage, e.g. 5 for 5%.
    pub interest_rate: Decimal,
    /// The agreed amount of each installment.
    pub installment_amount: Option<Money>,
    /// The agreed number of installments.
    pub total_installments: Option<u32>,
    /// The amount owed when the loan was entered.
    ///
    /// This is the loan amount unless part of the loan had already been
    /// returned before it was recorded. It never changes afterwards, the
    /// current balance is derived from the loan returns.
    pub opening_balance: Money,
    /// Anything held against the loan.
    pub collateral: Option<String>,
}

/// Whether a record is a loan or an expense.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordKind {
    /// Money lent that is expected back.
    Loan(LoanTerms),
    /// Money spent.
    Expense,
}

impl RecordKind {
    /// The value used in forms, URLs and the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::Loan(_) => "loan",
            RecordKind::Expense => "expense",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            RecordKind::Loan(_) => "Loan",
            RecordKind::Expense => "Expense",
        }
    }
}

/// A loan disbursement or an expense.
#[derive(Debug, Clone, PartialEq)]
pub struct FinanceRecord {
    pub id: DatabaseId,
    pub recipient_name: String,
    pub mobile_no: Option<String>,
    pub total_amount: Money,
    pub purpose: String,
    pub category: String,
    pub payment_method: PaymentMethod,
    pub remarks: Option<String>,
    /// The date the money was paid out.
    pub record_date: Date,
    pub created_at: OffsetDateTime,
    pub kind: RecordKind,
}

impl FinanceRecord {
    /// The loan terms, or `None` for an expense.
    pub fn loan_terms(&self) -> Option<&LoanTerms> {
        match &self.kind {
            RecordKind::Loan(terms) => Some(terms),
            RecordKind::Expense => None,
        }
    }

    pub fn is_loan(&self) -> bool {
        matches!(self.kind, RecordKind::Loan(_))
    }
}

/// The raw form data for entering a loan or an expense.
///
/// The loan fields are ignored when `kind` is "expense".
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FinanceRecordForm {
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub recipient_name: String,
    #[serde(default)]
    pub mobile_no: Option<String>,
    #[serde(default)]
    pub total_amount: String,
    #[serde(default)]
    pub purpose: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub payment_method: String,
    #[serde(default)]
    pub remarks: Option<String>,
    #[serde(default)]
    pub record_date: Option<Date>,
    #[serde(default)]
    pub repayment_type: Option<String>,
    #[serde(default)]
    pub return_date: Option<Date>,
    #[serde(default)]
    pub interest_rate: Option<String>,
    #[serde(default)]
    pub installment_amount: Option<String>,
    #[serde(default)]
    pub total_installments: Option<String>,
    /// The amount still owed, defaults to the loan amount when blank.
    #[serde(default)]
    pub remaining_amount: Option<String>,
    #[serde(default)]
    pub collateral: Option<String>,
}

/// A validated loan or expense that has not been saved yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NewFinanceRecord {
    /// Who the money was paid to.
    pub recipient_name: String,
    /// The recipient's mobile number as entered, if they gave one.
    pub mobile_no: Option<String>,
    /// The amount lent or spent.
    pub total_amount: Money,
    /// What the money is for.
    pub purpose: String,
    /// One of the expense categories, or free text for older records.
    pub category: String,
    /// How the money was paid out.
    pub payment_method: PaymentMethod,
    /// Any notes about the record.
    pub remarks: Option<String>,
    /// The date the money was paid out.
    pub record_date: Date,
    /// Whether this is a loan, with its terms, or an expense.
    pub kind: RecordKind,
}

impl NewFinanceRecord {
    /// Validate the submitted form.
    ///
    /// Loans must lend a positive amount, expenses may be zero. The interest
    /// rate must be a percentage between 0 and 100 and the remaining amount,
    /// if given, cannot exceed the loan amount.
    ///
    /// # Errors
    /// Returns the first problem found with the form.
    pub fn from_form(form: &FinanceRecordForm, today: Date) -> Result<Self, Error> {
        let is_loan = match form.kind.trim() {
            "loan" => true,
            "expense" => false,
            "" => return Err(Error::EmptyField("Record type")),
            other => return Err(Error::InvalidRecordKind(other.to_owned())),
        };

        let recipient_name = required_text(&form.recipient_name, "Recipient name")?;
        let total_amount = if is_loan {
            positive_amount(&form.total_amount, "Loan amount")?
        } else {
            non_negative_amount(&form.total_amount, "Expense amount")?
        };
        let purpose = required_text(&form.purpose, "Purpose")?;
        let category = required_text(&form.category, "Category")?;
        let payment_method = payment_method(&form.payment_method, "Payment method")?;
        let record_date = past_date(form.record_date, "Date", today)?;

        let kind = if is_loan {
            RecordKind::Loan(parse_loan_terms(form, total_amount)?)
        } else {
            RecordKind::Expense
        };

        Ok(Self {
            recipient_name,
            mobile_no: optional_text(form.mobile_no.as_deref()),
            total_amount,
            purpose,
            category,
            payment_method,
            remarks: optional_text(form.remarks.as_deref()),
            record_date,
            kind,
        })
    }
}

fn parse_loan_terms(form: &FinanceRecordForm, total_amount: Money) -> Result<LoanTerms, Error> {
    let repayment_type = optional_text(form.repayment_type.as_deref())
        .map(|text| RepaymentType::from_str(&text))
        .transpose()?;

    let interest_rate = match optional_text(form.interest_rate.as_deref()) {
        None => Decimal::ZERO,
        Some(text) => {
            let rate = Decimal::from_str(&text)
                .map_err(|_| Error::InvalidInterestRate(text.clone()))?;

            if rate < Decimal::ZERO || rate > Decimal::ONE_HUNDRED {
                return Err(Error::InvalidInterestRate(text));
            }

            rate
        }
    };

    let installment_amount = optional_text(form.installment_amount.as_deref())
        .map(|text| non_negative_amount(&text, "Installment amount"))
        .transpose()?;

    let total_installments = optional_text(form.total_installments.as_deref())
        .map(|text| match text.parse::<u32>() {
            Ok(count) if count > 0 => Ok(count),
            _ => Err(Error::InvalidInstallmentCount(text)),
        })
        .transpose()?;

    let opening_balance = match optional_text(form.remaining_amount.as_deref()) {
        None => total_amount,
        Some(text) => non_negative_amount(&text, "Remaining amount")?,
    };

    if opening_balance > total_amount {
        return Err(Error::OpeningBalanceExceedsTotal {
            remaining: opening_balance,
            total: total_amount,
        });
    }

    Ok(LoanTerms {
        repayment_type,
        return_date: form.return_date,
        interest_rate,
        installment_amount,
        total_installments,
        opening_balance,
        collateral: optional_text(form.collateral.as_deref()),
    })
}

pub fn create_finance_record_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute_batch(
        "CREATE TABLE IF NOT EXISTS finance_record (
            id INTEGER PRIMARY KEY,
            kind TEXT NOT NULL CHECK (kind IN ('loan', 'expense')),
            recipient_name TEXT NOT NULL,
            mobile_no TEXT,
            mobile_key TEXT,
            total_amount TEXT NOT NULL,
            purpose TEXT NOT NULL,
            category TEXT NOT NULL,
            payment_method TEXT NOT NULL,
            remarks TEXT,
            record_date TEXT NOT NULL,
            created_at TEXT NOT NULL,
            repayment_type TEXT CHECK (repayment_type IN ('installment', 'one_time')),
            return_date TEXT,
            interest_rate TEXT,
            installment_amount TEXT,
            total_installments INTEGER CHECK (total_installments > 0),
            opening_balance TEXT,
            collateral TEXT,
            CHECK (
                (kind = 'loan' AND opening_balance IS NOT NULL AND interest_rate IS NOT NULL)
                OR (
                    kind = 'expense'
                    AND repayment_type IS NULL
                    AND return_date IS NULL
                    AND interest_rate IS NULL
                    AND installment_amount IS NULL
                    AND total_installments IS NULL
                    AND opening_balance IS NULL
                    AND collateral IS NULL
                )
            )
        );

        CREATE INDEX IF NOT EXISTS idx_finance_record_mobile_key ON finance_record(mobile_key);
        CREATE INDEX IF NOT EXISTS idx_finance_record_kind ON finance_record(kind);",
    )
}

const FINANCE_RECORD_COLUMNS: &str = "id, kind, recipient_name, mobile_no, total_amount, \
    purpose, category, payment_method, remarks, record_date, created_at, repayment_type, \
    return_date, interest_rate, installment_amount, total_installments, opening_balance, \
    collateral";

fn map_row_to_finance_record(row: &Row) -> Result<FinanceRecord, rusqlite::Error> {
    let kind: String = row.get(1)?;

    let kind = match kind.as_str() {
        "loan" => {
            let interest_rate: String = row.get(13)?;
            let interest_rate = Decimal::from_str(&interest_rate).map_err(|error| {
                rusqlite::Error::FromSqlConversionFailure(13, Type::Text, Box::new(error))
            })?;

            RecordKind::Loan(LoanTerms {
                repayment_type: row.get(11)?,
                return_date: row.get(12)?,
                interest_rate,
                installment_amount: row.get(14)?,
                total_installments: row.get(15)?,
                opening_balance: row.get(16)?,
                collateral: row.get(17)?,
            })
        }
        "expense" => RecordKind::Expense,
        other => {
            return Err(rusqlite::Error::FromSqlConversionFailure(
                1,
                Type::Text,
                Box::new(Error::InvalidRecordKind(other.to_owned())),
            ));
        }
    };

    Ok(FinanceRecord {
        id: row.get(0)?,
        recipient_name: row.get(2)?,
        mobile_no: row.get(3)?,
        total_amount: row.get(4)?,
        purpose: row.get(5)?,
        category: row.get(6)?,
        payment_method: row.get(7)?,
        remarks: row.get(8)?,
        record_date: row.get(9)?,
        created_at: row.get(10)?,
        kind,
    })
}

fn mobile_key(mobile_no: Option<&str>) -> Option<String> {
    mobile_no
        .map(normalize_mobile)
        .filter(|key| !key.is_empty())
}

/// Save a loan or expense.
///
/// # Errors
/// Returns [Error::SqlError] if the insert fails.
pub fn create_finance_record(
    record: NewFinanceRecord,
    connection: &Connection,
) -> Result<FinanceRecord, Error> {
    let created_at = OffsetDateTime::now_utc();
    let terms = match &record.kind {
        RecordKind::Loan(terms) => Some(terms),
        RecordKind::Expense => None,
    };

    connection.execute(
        "INSERT INTO finance_record (
            kind, recipient_name, mobile_no, mobile_key, total_amount, purpose, category,
            payment_method, remarks, record_date, created_at, repayment_type, return_date,
            interest_rate, installment_amount, total_installments, opening_balance, collateral
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)",
        params![
            record.kind.as_str(),
            record.recipient_name,
            record.mobile_no,
            mobile_key(record.mobile_no.as_deref()),
            record.total_amount,
            record.purpose,
            record.category,
            record.payment_method,
            record.remarks,
            record.record_date,
            created_at,
            terms.and_then(|terms| terms.repayment_type),
            terms.and_then(|terms| terms.return_date),
            terms.map(|terms| terms.interest_rate.to_string()),
            terms.and_then(|terms| terms.installment_amount),
            terms.and_then(|terms| terms.total_installments),
            terms.map(|terms| terms.opening_balance),
            terms.and_then(|terms| terms.collateral.clone()),
        ],
    )?;

    let id = connection.last_insert_rowid();

    Ok(FinanceRecord {
        id,
        recipient_name: record.recipient_name,
        mobile_no: record.mobile_no,
        total_amount: record.total_amount,
        purpose: record.purpose,
        category: record.category,
        payment_method: record.payment_method,
        remarks: record.remarks,
        record_date: record.record_date,
        created_at,
        kind: record.kind,
    })
}

/// Get a record by its ID.
///
/// # Errors
/// Returns [Error::NotFound] if there is no record with the ID `id`.
pub fn get_finance_record(id: DatabaseId, connection: &Connection) -> Result<FinanceRecord, Error> {
    connection
        .query_row(
            &format!("SELECT {FINANCE_RECORD_COLUMNS} FROM finance_record WHERE id = ?1"),
            [id],
            map_row_to_finance_record,
        )
        .map_err(Error::from)
}

/// Every loan and expense, most recently entered first.
pub fn get_all_finance_records(connection: &Connection) -> Result<Vec<FinanceRecord>, Error> {
    connection
        .prepare(&format!(
            "SELECT {FINANCE_RECORD_COLUMNS} FROM finance_record ORDER BY created_at DESC, id DESC"
        ))?
        .query_map((), map_row_to_finance_record)?
        .map(|maybe_record| maybe_record.map_err(Error::from))
        .collect()
}

/// Every record for the mobile number `mobile_no`, newest record date first.
pub fn get_finance_records_by_mobile(
    mobile_no: &str,
    connection: &Connection,
) -> Result<Vec<FinanceRecord>, Error> {
    connection
        .prepare(&format!(
            "SELECT {FINANCE_RECORD_COLUMNS} FROM finance_record WHERE mobile_key = ?1 \
            ORDER BY record_date DESC, id DESC"
        ))?
        .query_map([normalize_mobile(mobile_no)], map_row_to_finance_record)?
        .map(|maybe_record| maybe_record.map_err(Error::from))
        .collect()
}

/// The `limit` most recently entered records.
pub fn get_recent_finance_records(
    limit: u32,
    connection: &Connection,
) -> Result<Vec<FinanceRecord>, Error> {
    connection
        .prepare(&format!(
            "SELECT {FINANCE_RECORD_COLUMNS} FROM finance_record \
            ORDER BY created_at DESC, id DESC LIMIT ?1"
        ))?
        .query_map([limit], map_row_to_finance_record)?
        .map(|maybe_record| maybe_record.map_err(Error::from))
        .collect()
}
