use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::identity::Identity;
use super::project::{Project, ProjectName};
use super::validation::ValidationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RegistrationStatus {
    Pending,
    Approved,
    Rejected,
}

impl RegistrationStatus {
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "PENDING" => Ok(Self::Pending),
            "APPROVED" => Ok(Self::Approved),
            "REJECTED" => Ok(Self::Rejected),
            _ => Err(ValidationError::UnknownValue {
                field: "registration status",
                value: raw.to_string(),
            }),
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Approved => "APPROVED",
            Self::Rejected => "REJECTED",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistrationError {
    #[error("registration is already {}", .0.label())]
    AlreadyDecided(RegistrationStatus),
    #[error("project {0} has no officer slots left")]
    NoSlotsRemaining(ProjectName),
}

/// An officer's request to handle a project, keyed by `(officer, project)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OfficerRegistration {
    pub officer: Identity,
    pub project: ProjectName,
    pub registered_on: NaiveDate,
    status: RegistrationStatus,
}

impl OfficerRegistration {
    pub fn new(officer: Identity, project: ProjectName, registered_on: NaiveDate) -> Self {
        Self::restore(officer, project, registered_on, RegistrationStatus::Pending)
    }

    pub fn restore(
        officer: Identity,
        project: ProjectName,
        registered_on: NaiveDate,
        status: RegistrationStatus,
    ) -> Self {
        Self {
            officer,
            project,
            registered_on,
            status,
        }
    }

    /// Record standing in for a roster entry that had no matching approval on file.
    pub fn synthesized(officer: Identity, project: &Project) -> Self {
        Self::restore(
            officer,
            project.name.clone(),
            project.window.open(),
            RegistrationStatus::Approved,
        )
    }

    pub fn key(&self) -> (Identity, ProjectName) {
        (self.officer.clone(), self.project.clone())
    }

    pub fn status(&self) -> RegistrationStatus {
        self.status
    }

    pub fn is_approved(&self) -> bool {
        self.status == RegistrationStatus::Approved
    }

    pub fn is_pending(&self) -> bool {
        self.status == RegistrationStatus::Pending
    }

    /// Admits the officer to `project` and approves, or changes neither.
    pub fn approve(&mut self, project: &mut Project) -> Result<(), RegistrationError> {
        self.ensure_pending()?;
        if !project.admit_officer(&self.officer) {
            return Err(RegistrationError::NoSlotsRemaining(project.name.clone()));
        }
        self.move_to(RegistrationStatus::Approved);
        Ok(())
    }

    pub fn reject(&mut self) -> Result<(), RegistrationError> {
        self.ensure_pending()?;
        self.move_to(RegistrationStatus::Rejected);
        Ok(())
    }

    /// Used by synchronization when the roster already lists the officer.
    pub(crate) fn force_approved(&mut self) -> bool {
        if self.is_approved() {
            return false;
        }
        self.move_to(RegistrationStatus::Approved);
        true
    }

    fn ensure_pending(&self) -> Result<(), RegistrationError> {
        if self.status != RegistrationStatus::Pending {
            return Err(RegistrationError::AlreadyDecided(self.status));
        }
        Ok(())
    }

    fn move_to(&mut self, next: RegistrationStatus) {
        debug!(
            officer = %self.officer,
            project = %self.project,
            from = self.status.label(),
            to = next.label(),
            "registration transition"
        );
        self.status = next;
    }
}
