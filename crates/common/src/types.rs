use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Maximum accepted length of a booking reference.
const MAX_REF_LEN: usize = 64;

/// Error returned when a string is not a usable booking reference.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid booking reference {value:?}: {reason}")]
pub struct InvalidBookingRef {
    pub value: String,
    pub reason: &'static str,
}

/// Client-generated booking reference.
///
/// The reference correlates a draft, a payment and a final booking record.
/// It is generated once per checkout attempt and never reused, so every
/// write in the pipeline is keyed by it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BookingRef(String);

impl BookingRef {
    /// Parses and validates a booking reference.
    ///
    /// Accepts ASCII letters, digits, `-` and `_`, up to 64 characters.
    pub fn parse(value: impl Into<String>) -> Result<Self, InvalidBookingRef> {
        let value = value.into();
        if value.is_empty() {
            return Err(InvalidBookingRef {
                value,
                reason: "must not be empty",
            });
        }
        if value.len() > MAX_REF_LEN {
            return Err(InvalidBookingRef {
                value,
                reason: "must be at most 64 characters",
            });
        }
        if !value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(InvalidBookingRef {
                value,
                reason: "may only contain letters, digits, '-' and '_'",
            });
        }
        Ok(Self(value))
    }

    /// Generates a fresh reference with the given prefix, e.g. `TT-9F2C41AB`.
    pub fn generate(prefix: &str) -> Self {
        let suffix = Uuid::new_v4().simple().to_string()[..8].to_ascii_uppercase();
        Self(format!("{prefix}-{suffix}"))
    }

    /// Returns the reference as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for BookingRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for BookingRef {
    type Error = InvalidBookingRef;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl TryFrom<&str> for BookingRef {
    type Error = InvalidBookingRef;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<BookingRef> for String {
    fn from(value: BookingRef) -> Self {
        value.0
    }
}

impl AsRef<str> for BookingRef {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_typical_references() {
        let r = BookingRef::parse("TT-1001").unwrap();
        assert_eq!(r.as_str(), "TT-1001");
        assert!(BookingRef::parse("abc_123").is_ok());
    }

    #[test]
    fn parse_rejects_bad_input() {
        assert!(BookingRef::parse("").is_err());
        assert!(BookingRef::parse("TT 1001").is_err());
        assert!(BookingRef::parse("a".repeat(65)).is_err());
        assert!(BookingRef::parse("TT/1001").is_err());
    }

    #[test]
    fn generate_uses_prefix_and_is_unique() {
        let a = BookingRef::generate("TT");
        let b = BookingRef::generate("TT");
        assert!(a.as_str().starts_with("TT-"));
        assert_eq!(a.as_str().len(), 11);
        assert_ne!(a, b);
    }

    #[test]
    fn serde_validates_on_deserialize() {
        let r: BookingRef = serde_json::from_str("\"TT-1001\"").unwrap();
        assert_eq!(r.as_str(), "TT-1001");
        assert_eq!(serde_json::to_string(&r).unwrap(), "\"TT-1001\"");

        let bad: Result<BookingRef, _> = serde_json::from_str("\"not valid!\"");
        assert!(bad.is_err());
    }
}
