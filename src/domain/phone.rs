use crate::error::LipaError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Length of a subscriber number once the trunk prefix and country code are
/// removed (e.g. `712345678`).
const SUBSCRIBER_DIGITS: usize = 9;

/// A payer phone number in international form, digits only
/// (e.g. `254712345678`).
///
/// Both the initiation handler and the callback reconciler build keys through
/// [`PhoneNumber::normalize`], so formatting differences between the two never
/// cause a missed match.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PhoneNumber(String);

impl PhoneNumber {
    pub fn normalize(raw: &str, country_code: &str) -> Result<Self, LipaError> {
        let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();

        if digits.len() < SUBSCRIBER_DIGITS {
            return Err(LipaError::ValidationError(format!(
                "Invalid phone number: {:?}",
                raw
            )));
        }

        let national_len = SUBSCRIBER_DIGITS + 1;
        let normalized = if digits.len() == national_len && digits.starts_with('0') {
            format!("{}{}", country_code, &digits[1..])
        } else if digits.len() == SUBSCRIBER_DIGITS {
            format!("{}{}", country_code, digits)
        } else {
            digits
        };

        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PhoneNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn norm(raw: &str) -> String {
        PhoneNumber::normalize(raw, "254").unwrap().to_string()
    }

    #[test]
    fn test_equivalent_formats() {
        assert_eq!(norm("0712345678"), "254712345678");
        assert_eq!(norm("254712345678"), "254712345678");
        assert_eq!(norm("+254 712 345 678"), "254712345678");
        assert_eq!(norm("712345678"), "254712345678");
        assert_eq!(norm("(0712) 345-678"), "254712345678");
    }

    #[test]
    fn test_foreign_numbers_kept_verbatim() {
        assert_eq!(norm("+255 712 345 678"), "255712345678");
    }

    #[test]
    fn test_rejects_short_or_empty() {
        assert!(matches!(
            PhoneNumber::normalize("", "254"),
            Err(LipaError::ValidationError(_))
        ));
        assert!(PhoneNumber::normalize("phone", "254").is_err());
        assert!(PhoneNumber::normalize("12345", "254").is_err());
    }
}
