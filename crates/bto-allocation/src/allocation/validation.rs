use chrono::NaiveDate;

use super::inventory::FlatType;

/// Construction-time failures for domain records.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("identity '{0}' is not a valid NRIC")]
    MalformedIdentity(String),
    #[error("missing required field {0}")]
    MissingField(&'static str),
    #[error("unrecognised {field} '{value}'")]
    UnknownValue { field: &'static str, value: String },
    #[error("{field} must not be negative (found {value})")]
    NegativeCount { field: &'static str, value: i64 },
    #[error("application window closes ({close}) before it opens ({open})")]
    InvertedWindow { open: NaiveDate, close: NaiveDate },
    #[error("officer capacity must be between 1 and {max} (found {found})")]
    OfficerCapacity { max: u8, found: i64 },
    #[error("project must offer at least one flat type")]
    NoFlatTypes,
    #[error("{0} is listed more than once")]
    DuplicateFlatType(FlatType),
    #[error("withdrawal pending without a recorded prior status")]
    MissingPriorStatus,
}
