//! Checks shared by the donor, finance record and loan return forms.
//!
//! Every check here runs before the database is touched, so a rejected form
//! never has a side effect.

use std::str::FromStr;

use time::Date;

use crate::{Error, money::Money, payment::PaymentMethod};

/// Trim `value` and reject it if nothing is left.
pub fn required_text(value: &str, field: &'static str) -> Result<String, Error> {
    let value = value.trim();

    if value.is_empty() {
        Err(Error::EmptyField(field))
    } else {
        Ok(value.to_owned())
    }
}

/// Trim `value`, treating blank input as absent.
pub fn optional_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_owned)
}

/// Parse an amount that may be zero but not negative.
pub fn non_negative_amount(value: &str, field: &'static str) -> Result<Money, Error> {
    let amount = parse_amount(value, field)?;

    if amount.is_negative() {
        Err(Error::NegativeAmount(field))
    } else {
        Ok(amount)
    }
}

/// Parse an amount that must be more than zero.
pub fn positive_amount(value: &str, field: &'static str) -> Result<Money, Error> {
    let amount = parse_amount(value, field)?;

    if amount.is_positive() {
        Ok(amount)
    } else {
        Err(Error::NonPositiveAmount(field))
    }
}

fn parse_amount(value: &str, field: &'static str) -> Result<Money, Error> {
    if value.trim().is_empty() {
        return Err(Error::EmptyField(field));
    }

    Money::from_str(value)
}

pub fn payment_method(value: &str, field: &'static str) -> Result<PaymentMethod, Error> {
    if value.trim().is_empty() {
        return Err(Error::EmptyField(field));
    }

    PaymentMethod::from_str(value)
}

/// Require a date no later than `today`.
pub fn past_date(date: Option<Date>, field: &'static str, today: Date) -> Result<Date, Error> {
    let date = date.ok_or(Error::EmptyField(field))?;

    if date > today {
        tracing::error!("Tried to record {field} with a future date {date}");
        return Err(Error::FutureDate(date));
    }

    Ok(date)
}

#[cfg(test)]
mod validation_tests {
    use time::macros::date;

    use crate::{Error, money::Money, payment::PaymentMethod};

    use super::{
        non_negative_amount, optional_text, past_date, payment_method, positive_amount,
        required_text,
    };

    #[test]
    fn required_text_is_trimmed() {
        assert_eq!(required_text("  Ali  ", "Name"), Ok("Ali".to_owned()));
        assert_eq!(required_text("   ", "Name"), Err(Error::EmptyField("Name")));
    }

    #[test]
    fn blank_optional_text_is_none() {
        assert_eq!(optional_text(Some("  ")), None);
        assert_eq!(optional_text(None), None);
        assert_eq!(optional_text(Some(" note ")), Some("note".to_owned()));
    }

    #[test]
    fn amounts_respect_sign_rules() {
        assert_eq!(non_negative_amount("0", "Amount"), Ok(Money::ZERO));
        assert_eq!(
            non_negative_amount("-1", "Amount"),
            Err(Error::NegativeAmount("Amount"))
        );
        assert_eq!(
            positive_amount("0", "Amount"),
            Err(Error::NonPositiveAmount("Amount"))
        );
        assert_eq!(positive_amount("", "Amount"), Err(Error::EmptyField("Amount")));
        assert_eq!(positive_amount("12.5", "Amount").map(|m| m.to_string()), Ok("Rs 12.50".to_owned()));
    }

    #[test]
    fn payment_method_is_required() {
        assert_eq!(payment_method("", "Payment method"), Err(Error::EmptyField("Payment method")));
        assert_eq!(payment_method("Cash", "Payment method"), Ok(PaymentMethod::Cash));
    }

    #[test]
    fn future_dates_are_rejected() {
        let today = date!(2025 - 03 - 10);

        assert_eq!(past_date(Some(today), "Date", today), Ok(today));
        assert_eq!(
            past_date(Some(date!(2025 - 03 - 11)), "Date", today),
            Err(Error::FutureDate(date!(2025 - 03 - 11)))
        );
        assert_eq!(past_date(None, "Date", today), Err(Error::EmptyField("Date")));
    }
}
