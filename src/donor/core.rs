//! Donor records and their storage.
//!
//! Each row is one contribution. The same person donating twice produces two
//! rows which are tied together by their mobile number.

use rusqlite::{Connection, Row, params};
use serde::Deserialize;
use time::{Date, OffsetDateTime};

use crate::{
    Error,
    contact::{has_digits, normalize_mobile},
    database_id::DatabaseId,
    money::Money,
    payment::PaymentMethod,
    validation::{non_negative_amount, optional_text, past_date, payment_method, required_text},
};

/// A single donation.
#[derive(Debug, Clone, PartialEq)]
pub struct Donor {
    pub id: DatabaseId,
    pub name: String,
    /// The mobile number as it was entered.
    pub mobile_no: String,
    pub payment_method: PaymentMethod,
    pub total_amount: Money,
    pub purpose: String,
    pub remarks: Option<String>,
    pub donation_date: Date,
    pub created_at: OffsetDateTime,
}

/// The raw form data for registering a donation.
///
/// All fields default to empty so that a missing field is reported as a
/// validation error rather than a deserialization failure.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DonorForm {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub mobile_no: String,
    #[serde(default)]
    pub payment_method: String,
    #[serde(default)]
    pub total_amount: String,
    #[serde(default)]
    pub purpose: String,
    #[serde(default)]
    pub remarks: Option<String>,
    #[serde(default)]
    pub donation_date: Option<Date>,
}

/// A validated donation that has not been saved yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NewDonor {
    /// The donor's name as they gave it.
    pub name: String,
    /// The donor's mobile number as entered, used to group their donations.
    pub mobile_no: String,
    /// How the donation was paid.
    pub payment_method: PaymentMethod,
    /// The amount donated.
    pub total_amount: Money,
    /// What the donation is for, e.g. "Zakat".
    pub purpose: String,
    /// Any notes about the donation.
    pub remarks: Option<String>,
    /// The date the donation was received.
    pub donation_date: Date,
}

impl NewDonor {
    /// Validate the submitted form.
    ///
    /// # Errors
    /// Returns the first problem found: a blank required field, a mobile
    /// number without digits, an unparseable or negative amount, an unknown
    /// payment method or a donation date after `today`.
    pub fn from_form(form: &DonorForm, today: Date) -> Result<Self, Error> {
        let name = required_text(&form.name, "Donor name")?;
        let mobile_no = required_text(&form.mobile_no, "Mobile number")?;
        if !has_digits(&mobile_no) {
            return Err(Error::EmptyField("Mobile number"));
        }
        let payment_method = payment_method(&form.payment_method, "Payment method")?;
        let total_amount = non_negative_amount(&form.total_amount, "Donation amount")?;
        let purpose = required_text(&form.purpose, "Purpose")?;
        let donation_date = past_date(form.donation_date, "Donation date", today)?;

        Ok(Self {
            name,
            mobile_no,
            payment_method,
            total_amount,
            purpose,
            remarks: optional_text(form.remarks.as_deref()),
            donation_date,
        })
    }
}

pub fn create_donor_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute_batch(
        "CREATE TABLE IF NOT EXISTS donor (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            mobile_no TEXT NOT NULL,
            mobile_key TEXT NOT NULL,
            payment_method TEXT NOT NULL,
            total_amount TEXT NOT NULL,
            purpose TEXT NOT NULL,
            remarks TEXT,
            donation_date TEXT NOT NULL,
            created_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_donor_mobile_key ON donor(mobile_key);",
    )
}

const DONOR_COLUMNS: &str = "id, name, mobile_no, payment_method, total_amount, purpose, \
    remarks, donation_date, created_at";

fn map_row_to_donor(row: &Row) -> Result<Donor, rusqlite::Error> {
    Ok(Donor {
        id: row.get(0)?,
        name: row.get(1)?,
        mobile_no: row.get(2)?,
        payment_method: row.get(3)?,
        total_amount: row.get(4)?,
        purpose: row.get(5)?,
        remarks: row.get(6)?,
        donation_date: row.get(7)?,
        created_at: row.get(8)?,
    })
}

/// Save a donation.
///
/// # Errors
/// Returns [Error::SqlError] if the insert fails.
pub fn create_donor(donor: NewDonor, connection: &Connection) -> Result<Donor, Error> {
    let created_at = OffsetDateTime::now_utc();

    connection.execute(
        "INSERT INTO donor
            (name, mobile_no, mobile_key, payment_method, total_amount, purpose, remarks, donation_date, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            donor.name,
            donor.mobile_no,
            normalize_mobile(&donor.mobile_no),
            donor.payment_method,
            donor.total_amount,
            donor.purpose,
            donor.remarks,
            donor.donation_date,
            created_at,
        ],
    )?;

    let id = connection.last_insert_rowid();

    Ok(Donor {
        id,
        name: donor.name,
        mobile_no: donor.mobile_no,
        payment_method: donor.payment_method,
        total_amount: donor.total_amount,
        purpose: donor.purpose,
        remarks: donor.remarks,
        donation_date: donor.donation_date,
        created_at,
    })
}

/// Every donation, newest donation date first.
pub fn get_all_donors(connection: &Connection) -> Result<Vec<Donor>, Error> {
    connection
        .prepare(&format!(
            "SELECT {DONOR_COLUMNS} FROM donor ORDER BY donation_date DESC, id DESC"
        ))?
        .query_map((), map_row_to_donor)?
        .map(|maybe_donor| maybe_donor.map_err(Error::from))
        .collect()
}

/// Every donation made from the mobile number `mobile_no`, newest first.
///
/// The number is normalized first, so any formatting of the same number
/// finds the same donations.
pub fn get_donors_by_mobile(mobile_no: &str, connection: &Connection) -> Result<Vec<Donor>, Error> {
    connection
        .prepare(&format!(
            "SELECT {DONOR_COLUMNS} FROM donor WHERE mobile_key = ?1 \
            ORDER BY donation_date DESC, id DESC"
        ))?
        .query_map([normalize_mobile(mobile_no)], map_row_to_donor)?
        .map(|maybe_donor| maybe_donor.map_err(Error::from))
        .collect()
}

/// The `limit` most recently entered donations.
pub fn get_recent_donors(limit: u32, connection: &Connection) -> Result<Vec<Donor>, Error> {
    connection
        .prepare(&format!(
            "SELECT {DONOR_COLUMNS} FROM donor ORDER BY created_at DESC, id DESC LIMIT ?1"
        ))?
        .query_map([limit], map_row_to_donor)?
        .map(|maybe_donor| maybe_donor.map_err(Error::from))
        .collect()
}

/// The number of donations received.
pub fn count_donors(connection: &Connection) -> Result<u64, Error> {
    let count: i64 = connection.query_row("SELECT COUNT(1) FROM donor", (), |row| row.get(0))?;

    Ok(u64::try_from(count).unwrap_or_default())
}

/// The sum of every donation received.
///
/// Amounts are summed as decimals in Rust since SQLite would sum the TEXT
/// column as floating point.
pub fn get_total_donations(connection: &Connection) -> Result<Money, Error> {
    let amounts: Result<Vec<Money>, rusqlite::Error> = connection
        .prepare("SELECT total_amount FROM donor")?
        .query_map((), |row| row.get(0))?
        .collect();

    Money::checked_sum(amounts?)
}

#[cfg(test)]
pub(crate) mod test_helpers {
    use std::str::FromStr;

    use rusqlite::Connection;
    use time::Date;

    use crate::{money::Money, payment::PaymentMethod};

    use super::{Donor, NewDonor, create_donor};

    pub fn insert_donor(
        name: &str,
        mobile_no: &str,
        amount: &str,
        donation_date: Date,
        connection: &Connection,
    ) -> Donor {
        create_donor(
            NewDonor {
                name: name.to_owned(),
                mobile_no: mobile_no.to_owned(),
                payment_method: PaymentMethod::Cash,
                total_amount: Money::from_str(amount).unwrap(),
                purpose: "General".to_owned(),
                remarks: None,
                donation_date,
            },
            connection,
        )
        .expect("Could not create donor")
    }
}
