//! The ways money can change hands.

use std::{fmt::Display, str::FromStr};

use rusqlite::{
    ToSql,
    types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef},
};

use crate::Error;

/// How a donation, disbursement or loan return was paid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum PaymentMethod {
    Cash,
    Easypaisa,
    JazzCash,
    BankTransfer,
    Cheque,
    Other,
}

impl PaymentMethod {
    /// Every payment method in the order they are offered in forms.
    pub const ALL: [PaymentMethod; 6] = [
        PaymentMethod::Cash,
        PaymentMethod::Easypaisa,
        PaymentMethod::JazzCash,
        PaymentMethod::BankTransfer,
        PaymentMethod::Cheque,
        PaymentMethod::Other,
    ];

    /// The label shown to users and stored in the database.
    pub fn label(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "Cash",
            PaymentMethod::Easypaisa => "Easypaisa",
            PaymentMethod::JazzCash => "JazzCash",
            PaymentMethod::BankTransfer => "Bank Transfer",
            PaymentMethod::Cheque => "Cheque",
            PaymentMethod::Other => "Other",
        }
    }
}

impl Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for PaymentMethod {
    type Err = Error;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let text = text.trim();

        PaymentMethod::ALL
            .into_iter()
            .find(|method| method.label().eq_ignore_ascii_case(text))
            .ok_or_else(|| Error::InvalidPaymentMethod(text.to_owned()))
    }
}

impl ToSql for PaymentMethod {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.label()))
    }
}

impl FromSql for PaymentMethod {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let text = value.as_str()?;

        PaymentMethod::from_str(text).map_err(|error| FromSqlError::Other(Box::new(error)))
    }
}
