//! Core type definitions with validation.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Validation errors for core types.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    /// The provided value was empty.
    #[error("{field} cannot be empty")]
    Empty { field: &'static str },

    /// A completed interval must end strictly after it starts.
    #[error("end time {end} must be after start time {start}")]
    EndNotAfterStart {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    /// Feeding amounts must be finite and non-negative.
    #[error("invalid amount: {value}")]
    InvalidAmount { value: f64 },

    /// A string did not name a known variant.
    #[error("invalid {field}: {value}")]
    UnknownVariant { field: &'static str, value: String },
}

/// Generates a validated string ID newtype with common trait implementations.
macro_rules! define_string_id {
    (
        $(#[$meta:meta])*
        $name:ident, $field_name:literal
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Creates a new ID after validation.
            pub fn new(id: impl Into<String>) -> Result<Self, ValidationError> {
                let id = id.into();
                if id.trim().is_empty() {
                    return Err(ValidationError::Empty { field: $field_name });
                }
                Ok(Self(id))
            }

            /// Returns the ID as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = ValidationError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

define_string_id!(
    /// A validated subject (baby) identifier.
    ///
    /// Subject IDs scope every log read and write. Logs without one are
    /// legacy entries shared by all subjects.
    SubjectId, "subject ID"
);

define_string_id!(
    /// A validated activity log identifier.
    ///
    /// Log IDs give entries an identity independent of their timestamp, so
    /// two logs started in the same millisecond can still be told apart.
    LogId, "log ID"
);

impl LogId {
    /// Generates a fresh random log ID.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

/// Truncates an instant to millisecond precision.
///
/// Stored timestamps are epoch milliseconds; truncating up front keeps the
/// in-memory value identical to what a reload returns.
pub fn truncate_to_millis(instant: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(instant.timestamp_millis()).unwrap_or(instant)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subject_id_rejects_empty() {
        assert!(SubjectId::new("").is_err());
        assert!(SubjectId::new("   ").is_err());
        assert!(SubjectId::new("baby-1").is_ok());
    }

    #[test]
    fn subject_id_serde_roundtrip() {
        let id = SubjectId::new("baby-1").unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"baby-1\"");
        let parsed: SubjectId = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn subject_id_serde_rejects_empty() {
        let result: Result<SubjectId, _> = serde_json::from_str("\"\"");
        assert!(result.is_err());
    }

    #[test]
    fn generated_log_ids_are_unique() {
        let a = LogId::generate();
        let b = LogId::generate();
        assert_ne!(a, b);
        assert!(!a.as_str().is_empty());
    }

    #[test]
    fn truncate_to_millis_drops_sub_millisecond_precision() {
        let instant = DateTime::parse_from_rfc3339("2025-03-01T08:00:00.123456789Z")
            .unwrap()
            .with_timezone(&Utc);
        let truncated = truncate_to_millis(instant);
        assert_eq!(truncated.timestamp_millis(), instant.timestamp_millis());
        assert_eq!(truncated.timestamp_subsec_nanos(), 123_000_000);
    }
}
