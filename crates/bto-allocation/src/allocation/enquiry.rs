use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::identity::Identity;
use super::validation::ValidationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EnquiryId(pub u64);

impl EnquiryId {
    /// Accepts both the display form (`ENQ-0007`) and a bare number.
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let trimmed = raw.trim();
        let digits = match trimmed.get(..4) {
            Some(prefix) if prefix.eq_ignore_ascii_case("ENQ-") => &trimmed[4..],
            _ => trimmed,
        };
        digits
            .parse::<u64>()
            .map(Self)
            .map_err(|_| ValidationError::UnknownValue {
                field: "enquiry id",
                value: raw.to_string(),
            })
    }
}

impl fmt::Display for EnquiryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ENQ-{:04}", self.0)
    }
}

/// Source of fresh enquiry numbers.
pub trait Sequence {
    fn next_id(&mut self) -> EnquiryId;
}

/// Monotonic counter that resumes after the highest id already on file.
#[derive(Debug, Clone, Default)]
pub struct MonotonicSequence {
    last: u64,
}

impl MonotonicSequence {
    pub fn starting_after<'a>(existing: impl IntoIterator<Item = &'a EnquiryId>) -> Self {
        let last = existing.into_iter().map(|id| id.0).max().unwrap_or(0);
        Self { last }
    }
}

impl Sequence for MonotonicSequence {
    fn next_id(&mut self) -> EnquiryId {
        self.last += 1;
        EnquiryId(self.last)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnquiryReply {
    pub text: String,
    pub replied_by: Identity,
    pub replied_on: NaiveDate,
}

/// Free-text question; `project` need not name an existing project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Enquiry {
    pub id: EnquiryId,
    pub author: Identity,
    pub project: String,
    pub text: String,
    pub submitted_on: NaiveDate,
    pub reply: Option<EnquiryReply>,
}

impl Enquiry {
    pub fn is_replied(&self) -> bool {
        self.reply.is_some()
    }

    pub fn is_about(&self, project: &str) -> bool {
        self.project.trim().eq_ignore_ascii_case(project.trim())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_resumes_after_highest_loaded_id() {
        let loaded = [EnquiryId(3), EnquiryId(11), EnquiryId(7)];
        let mut sequence = MonotonicSequence::starting_after(loaded.iter());
        assert_eq!(sequence.next_id(), EnquiryId(12));
        assert_eq!(sequence.next_id(), EnquiryId(13));
    }

    #[test]
    fn ids_parse_from_display_form_or_bare_number() {
        assert_eq!(EnquiryId::parse("ENQ-0007"), Ok(EnquiryId(7)));
        assert_eq!(EnquiryId::parse(" enq-12 "), Ok(EnquiryId(12)));
        assert_eq!(EnquiryId::parse("42"), Ok(EnquiryId(42)));
        assert!(EnquiryId::parse("ENQ-").is_err());
        assert_eq!(EnquiryId(7).to_string(), "ENQ-0007");
    }

    #[test]
    fn empty_sequence_starts_at_one() {
        let mut sequence = MonotonicSequence::default();
        assert_eq!(sequence.next_id(), EnquiryId(1));
    }
}
