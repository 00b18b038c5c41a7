use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::application::ApplicationStatus;
use super::inventory::FlatType;
use super::project::ProjectName;
use super::validation::ValidationError;

/// NRIC-shaped user identity: `S`/`T`, seven digits, and a trailing uppercase letter.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Identity(String);

impl Identity {
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let candidate = raw.trim().to_ascii_uppercase();
        let bytes = candidate.as_bytes();

        let well_formed = bytes.len() == 9
            && matches!(bytes[0], b'S' | b'T')
            && bytes[1..8].iter().all(u8::is_ascii_digit)
            && bytes[8].is_ascii_uppercase();

        if well_formed {
            Ok(Self(candidate))
        } else {
            Err(ValidationError::MalformedIdentity(raw.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Identity {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Identity> for String {
    fn from(value: Identity) -> Self {
        value.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Applicant,
    Officer,
    Manager,
}

impl Role {
    /// Rank used when the same identity appears in several source lists.
    pub const fn precedence(self) -> u8 {
        match self {
            Self::Applicant => 0,
            Self::Officer => 1,
            Self::Manager => 2,
        }
    }

    /// Applicants and officers both carry applicant state; managers never apply.
    pub const fn can_hold_applications(self) -> bool {
        !matches!(self, Self::Manager)
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Applicant => "applicant",
            Self::Officer => "officer",
            Self::Manager => "manager",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaritalStatus {
    Single,
    Married,
}

impl MaritalStatus {
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "single" => Ok(Self::Single),
            "married" => Ok(Self::Married),
            _ => Err(ValidationError::UnknownValue {
                field: "marital_status",
                value: raw.to_string(),
            }),
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Single => "Single",
            Self::Married => "Married",
        }
    }
}

/// Cached mirror of a user's most relevant application.
///
/// Never authoritative: synchronization rewrites it from the application records.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ApplicantState {
    pub project: Option<ProjectName>,
    pub status: Option<ApplicationStatus>,
    pub booked_flat_type: Option<FlatType>,
    pub submitted_on: Option<NaiveDate>,
}

impl ApplicantState {
    pub fn is_empty(&self) -> bool {
        self.project.is_none() && self.status.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub identity: Identity,
    pub name: String,
    pub age: u8,
    pub marital_status: MaritalStatus,
    credential: String,
    role: Role,
    applicant_state: Option<ApplicantState>,
}

impl User {
    pub fn new(
        identity: Identity,
        name: impl Into<String>,
        age: u8,
        marital_status: MaritalStatus,
        credential: impl Into<String>,
        role: Role,
    ) -> Self {
        Self {
            identity,
            name: name.into(),
            age,
            marital_status,
            credential: credential.into(),
            role,
            applicant_state: role.can_hold_applications().then(ApplicantState::default),
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn is_manager(&self) -> bool {
        self.role == Role::Manager
    }

    pub fn is_officer(&self) -> bool {
        self.role == Role::Officer
    }

    pub fn credential(&self) -> &str {
        &self.credential
    }

    pub fn credential_matches(&self, candidate: &str) -> bool {
        self.credential == candidate
    }

    /// `None` for managers.
    pub fn applicant_state(&self) -> Option<&ApplicantState> {
        self.applicant_state.as_ref()
    }

    /// Replaces the cached summary, returning whether anything changed.
    pub(crate) fn replace_applicant_state(&mut self, next: ApplicantState) -> bool {
        match self.applicant_state.as_mut() {
            Some(current) if *current != next => {
                *current = next;
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_accepts_nric_shape_and_normalizes_case() {
        let identity = Identity::parse(" s1234567a ").expect("valid identity");
        assert_eq!(identity.as_str(), "S1234567A");
        assert!(Identity::parse("T7654321Z").is_ok());
    }

    #[test]
    fn identity_rejects_malformed_values() {
        for raw in ["", "X1234567A", "S123456A", "S12345678", "S1234567", "S12a4567B"] {
            assert!(
                matches!(
                    Identity::parse(raw),
                    Err(ValidationError::MalformedIdentity(_))
                ),
                "{raw} should be rejected"
            );
        }
    }

    #[test]
    fn managers_carry_no_applicant_state() {
        let manager = User::new(
            Identity::parse("S0000001M").unwrap(),
            "Michael",
            40,
            MaritalStatus::Married,
            "password",
            Role::Manager,
        );
        assert!(manager.applicant_state().is_none());

        let officer = User::new(
            Identity::parse("T0000002O").unwrap(),
            "Olivia",
            29,
            MaritalStatus::Single,
            "password",
            Role::Officer,
        );
        assert_eq!(officer.applicant_state(), Some(&ApplicantState::default()));
    }

    #[test]
    fn role_precedence_prefers_manager_then_officer() {
        assert!(Role::Manager.precedence() > Role::Officer.precedence());
        assert!(Role::Officer.precedence() > Role::Applicant.precedence());
    }
}
