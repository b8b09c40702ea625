//! Mobile numbers as the key that ties records to a person.

/// Reduce a mobile number to the form used for grouping and lookups.
///
/// Spaces, dashes, brackets and any other punctuation are dropped so that
/// "0300 1234567" and "0300-1234567" refer to the same person. A leading "+"
/// is kept since it changes the meaning of the digits that follow.
pub fn normalize_mobile(raw: &str) -> String {
    let raw = raw.trim();
    let mut key = String::with_capacity(raw.len());

    if raw.starts_with('+') {
        key.push('+');
    }

    key.extend(raw.chars().filter(char::is_ascii_digit));

    if key == "+" { String::new() } else { key }
}

/// Whether `raw` contains at least one digit to identify a person by.
pub fn has_digits(raw: &str) -> bool {
    raw.chars().any(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod normalize_mobile_tests {
    use super::{has_digits, normalize_mobile};

    #[test]
    fn strips_punctuation_and_whitespace() {
        assert_eq!(normalize_mobile(" 0300-123 4567 "), "03001234567");
        assert_eq!(normalize_mobile("(0300) 1234567"), "03001234567");
    }

    #[test]
    fn keeps_leading_plus() {
        assert_eq!(normalize_mobile("+92 300 1234567"), "+923001234567");
    }

    #[test]
    fn distinct_numbers_stay_distinct() {
        assert_ne!(normalize_mobile("0300-1"), normalize_mobile("0300-2"));
    }

    #[test]
    fn no_digits_is_empty() {
        assert_eq!(normalize_mobile("+"), "");
        assert_eq!(normalize_mobile("n/a"), "");
        assert!(!has_digits("n/a"));
        assert!(has_digits("0300"));
    }
}
