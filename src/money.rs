//! Exact decimal amounts of money.
//!
//! Amounts are kept as [Decimal] from parsing through to storage so that sums
//! over donations, loans and returns never pick up binary floating point
//! error. SQLite stores them as TEXT for the same reason.

use std::{
    fmt::{self, Display},
    iter::Sum,
    ops::{Add, AddAssign, Sub},
    str::FromStr,
    sync::OnceLock,
};

use numfmt::{Formatter, Precision};
use rusqlite::{
    ToSql,
    types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef},
};
use rust_decimal::{Decimal, RoundingStrategy, prelude::ToPrimitive};

use crate::Error;

/// The currency prefix used when displaying amounts.
pub const CURRENCY_SYMBOL: &str = "Rs";

/// The largest number of decimal places an entered amount may have.
const MAX_DECIMAL_PLACES: u32 = 2;

/// The largest amount that may be entered or stored, one quadrillion rupees.
///
/// Sums of amounts below this stay far inside [Decimal]'s range and the
/// whole part always fits the thousands separator formatter.
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(0xA4C6_8000, 0x0003_8D7E, 0, false, 0);

/// An exact amount of money in the foundation's currency.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Money(Decimal);

impl Money {
    /// Zero rupees.
    pub const ZERO: Money = Money(Decimal::ZERO);

    /// Wrap an exact decimal amount.
    pub fn new(amount: Decimal) -> Self {
        Self(amount)
    }

    /// Create an amount from a whole number of rupees.
    pub fn from_whole(rupees: i64) -> Self {
        Self(Decimal::from(rupees))
    }

    /// The amount as a plain decimal.
    pub fn as_decimal(&self) -> Decimal {
        self.0
    }

    /// Whether the amount is exactly zero.
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Whether the amount is strictly greater than zero.
    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }

    /// Whether the amount is strictly less than zero.
    pub fn is_negative(&self) -> bool {
        self.0 < Decimal::ZERO
    }

    /// Add two amounts, failing with [Error::AmountOverflow] instead of panicking.
    pub fn checked_add(self, rhs: Money) -> Result<Money, Error> {
        self.0
            .checked_add(rhs.0)
            .map(Money)
            .ok_or(Error::AmountOverflow)
    }

    /// Sum `amounts`, failing with [Error::AmountOverflow] instead of panicking.
    pub fn checked_sum(amounts: impl IntoIterator<Item = Money>) -> Result<Money, Error> {
        amounts
            .into_iter()
            .try_fold(Money::ZERO, |total, amount| total.checked_add(amount))
    }

    /// The amount as a plain decimal string for form inputs, e.g. "1234.50".
    pub fn to_input_value(&self) -> String {
        self.0
            .round_dp_with_strategy(MAX_DECIMAL_PLACES, RoundingStrategy::MidpointAwayFromZero)
            .to_string()
    }
}

impl FromStr for Money {
    type Err = Error;

    /// Parse user input such as "1,250.50" or " 300 ".
    ///
    /// Thousands separators are ignored. More than two decimal places, empty
    /// input and anything that is not a plain decimal number are rejected with
    /// [Error::InvalidAmount].
    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let cleaned: String = text.trim().chars().filter(|c| *c != ',').collect();

        let amount = Decimal::from_str(&cleaned)
            .map_err(|_| Error::InvalidAmount(text.trim().to_owned()))?;

        if amount.normalize().scale() > MAX_DECIMAL_PLACES || amount.abs() > MAX_AMOUNT {
            return Err(Error::InvalidAmount(text.trim().to_owned()));
        }

        Ok(Self(amount))
    }
}

impl Display for Money {
    /// Formats as "Rs 1,234.50", or "-Rs 1,234.50" for negative amounts.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rounded = self
            .0
            .round_dp_with_strategy(MAX_DECIMAL_PLACES, RoundingStrategy::MidpointAwayFromZero);
        let sign = if rounded < Decimal::ZERO { "-" } else { "" };
        let magnitude = rounded.abs();
        let whole = magnitude.trunc().to_u64().unwrap_or(u64::MAX);
        let cents = (magnitude.fract() * Decimal::ONE_HUNDRED)
            .to_u64()
            .unwrap_or_default();

        write!(
            f,
            "{sign}{CURRENCY_SYMBOL} {}.{cents:02}",
            get_thousands_separator_formatter().fmt_string(whole)
        )
    }
}

fn get_thousands_separator_formatter() -> &'static Formatter {
    static FORMATTER: OnceLock<Formatter> = OnceLock::new();

    FORMATTER.get_or_init(|| {
        Formatter::new()
            .separator(',')
            .unwrap()
            .precision(Precision::Decimals(0))
    })
}

impl Add for Money {
    type Output = Money;

    fn add(self, rhs: Self) -> Self::Output {
        Money(self.0 + rhs.0)
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Self) -> Self::Output {
        Money(self.0 - rhs.0)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Money::ZERO, Add::add)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

impl ToSql for Money {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.0.to_string()))
    }
}

impl FromSql for Money {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value {
            ValueRef::Text(text) => {
                let text = std::str::from_utf8(text).map_err(|error| FromSqlError::Other(error.into()))?;
                let amount =
                    Decimal::from_str(text).map_err(|error| FromSqlError::Other(error.into()))?;
                bounded(amount)
            }
            ValueRef::Integer(integer) => bounded(Decimal::from(integer)),
            _ => Err(FromSqlError::InvalidType),
        }
    }
}

fn bounded(amount: Decimal) -> FromSqlResult<Money> {
    if amount.abs() > MAX_AMOUNT {
        return Err(FromSqlError::OutOfRange(amount.trunc().to_i64().unwrap_or(i64::MAX)));
    }

    Ok(Money(amount))
}

#[cfg(test)]
mod money_tests {
    use std::str::FromStr;

    use rust_decimal::Decimal;

    use crate::Error;

    use super::{MAX_AMOUNT, Money};

    #[test]
    fn parses_plain_and_separated_amounts() {
        assert_eq!(Money::from_str("1250.5"), Ok(Money::new(Decimal::new(12505, 1))));
        assert_eq!(Money::from_str(" 1,250.50 "), Ok(Money::new(Decimal::new(125050, 2))));
        assert_eq!(Money::from_str("0"), Ok(Money::ZERO));
    }

    #[test]
    fn rejects_garbage_and_fractions_of_cents() {
        assert_eq!(
            Money::from_str("abc"),
            Err(Error::InvalidAmount("abc".to_owned()))
        );
        assert_eq!(Money::from_str(""), Err(Error::InvalidAmount("".to_owned())));
        assert_eq!(
            Money::from_str("1.005"),
            Err(Error::InvalidAmount("1.005".to_owned()))
        );
    }

    #[test]
    fn rejects_amounts_above_the_ceiling() {
        assert_eq!(
            Money::from_str("79228162514264337593543950335"),
            Err(Error::InvalidAmount("79228162514264337593543950335".to_owned()))
        );
        assert_eq!(
            Money::from_str("1000000000000000.01"),
            Err(Error::InvalidAmount("1000000000000000.01".to_owned()))
        );
        assert_eq!(
            Money::from_str("-1000000000000001"),
            Err(Error::InvalidAmount("-1000000000000001".to_owned()))
        );
    }

    #[test]
    fn accepts_the_ceiling() {
        assert_eq!(
            Money::from_str("1,000,000,000,000,000"),
            Ok(Money::new(MAX_AMOUNT))
        );
    }

    #[test]
    fn displays_the_ceiling_exactly() {
        assert_eq!(
            Money::new(MAX_AMOUNT).to_string(),
            "Rs 1,000,000,000,000,000.00"
        );
        assert_eq!(
            Money::from_str("999,999,999,999,999.99").unwrap().to_string(),
            "Rs 999,999,999,999,999.99"
        );
    }

    #[test]
    fn checked_sum_reports_overflow() {
        let huge = Money::new(Decimal::MAX);

        assert_eq!(Money::checked_sum([huge, huge]), Err(Error::AmountOverflow));
        assert_eq!(
            Money::checked_sum([Money::from_whole(2), Money::from_whole(3)]),
            Ok(Money::from_whole(5))
        );
    }

    #[test]
    fn trailing_zeros_do_not_count_as_decimal_places() {
        assert_eq!(Money::from_str("1.500"), Ok(Money::new(Decimal::new(15, 1))));
    }

    #[test]
    fn displays_with_currency_and_separators() {
        assert_eq!(Money::from_whole(0).to_string(), "Rs 0.00");
        assert_eq!(Money::from_whole(1000).to_string(), "Rs 1,000.00");
        assert_eq!(Money::new(Decimal::new(123456789, 2)).to_string(), "Rs 1,234,567.89");
        assert_eq!(Money::new(Decimal::new(-5050, 2)).to_string(), "-Rs 50.50");
    }

    #[test]
    fn sums_exactly() {
        let amounts = [
            Money::from_str("0.10").unwrap(),
            Money::from_str("0.20").unwrap(),
        ];

        let total: Money = amounts.iter().sum();

        assert_eq!(total, Money::from_str("0.3").unwrap());
    }

    #[test]
    fn sum_is_independent_of_order() {
        let mut amounts: Vec<Money> = ["400", "0.35", "199.65", "12.01", "87.99"]
            .iter()
            .map(|text| Money::from_str(text).unwrap())
            .collect();

        let forwards: Money = amounts.iter().sum();
        amounts.reverse();
        let backwards: Money = amounts.iter().sum();

        assert_eq!(forwards, backwards);
        assert_eq!(forwards, Money::from_whole(700));
    }
}
