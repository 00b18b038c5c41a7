use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::identity::Identity;
use super::inventory::{FlatInventory, FlatType};
use super::project::ProjectName;
use super::validation::ValidationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApplicationStatus {
    Pending,
    Successful,
    Unsuccessful,
    Booked,
    PendingWithdrawal,
    Withdrawn,
}

impl ApplicationStatus {
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        match raw.trim().to_ascii_uppercase().replace([' ', '-'], "_").as_str() {
            "PENDING" => Ok(Self::Pending),
            "SUCCESSFUL" => Ok(Self::Successful),
            "UNSUCCESSFUL" => Ok(Self::Unsuccessful),
            "BOOKED" => Ok(Self::Booked),
            "PENDING_WITHDRAWAL" => Ok(Self::PendingWithdrawal),
            "WITHDRAWN" => Ok(Self::Withdrawn),
            _ => Err(ValidationError::UnknownValue {
                field: "application status",
                value: raw.to_string(),
            }),
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Successful => "SUCCESSFUL",
            Self::Unsuccessful => "UNSUCCESSFUL",
            Self::Booked => "BOOKED",
            Self::PendingWithdrawal => "PENDING_WITHDRAWAL",
            Self::Withdrawn => "WITHDRAWN",
        }
    }

    /// Relevance rank used when summarising a user's applications.
    pub const fn priority(self) -> u8 {
        match self {
            Self::Booked => 5,
            Self::Successful => 4,
            Self::PendingWithdrawal => 3,
            Self::Pending => 2,
            Self::Withdrawn => 1,
            Self::Unsuccessful => 0,
        }
    }

    /// UNSUCCESSFUL and WITHDRAWN end the applicant's claim on a project.
    pub const fn is_closed(self) -> bool {
        matches!(self, Self::Unsuccessful | Self::Withdrawn)
    }

    /// Statuses that block the applicant from starting another application.
    pub const fn is_active(self) -> bool {
        !self.is_closed()
    }

    /// Awaiting a decision or a booking; BOOKED counts as settled.
    pub const fn is_in_progress(self) -> bool {
        matches!(
            self,
            Self::Pending | Self::Successful | Self::PendingWithdrawal
        )
    }

    pub const fn can_request_withdrawal(self) -> bool {
        matches!(self, Self::Pending | Self::Successful | Self::Booked)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("cannot {action} an application that is {}", .from.label())]
    InvalidTransition {
        from: ApplicationStatus,
        action: &'static str,
    },
    #[error("application has no requested flat type")]
    MissingFlatType,
    #[error("no {0} units remain")]
    NoUnitsAvailable(FlatType),
    #[error("withdrawal is pending but the prior status was not recorded")]
    MissingPriorStatus,
}

/// What a manager's withdrawal approval did to the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WithdrawalOutcome {
    pub prior: ApplicationStatus,
    pub resulting: ApplicationStatus,
}

impl WithdrawalOutcome {
    /// Whether the applicant had a booked unit that must return to inventory.
    pub fn releases_unit(&self) -> bool {
        self.prior == ApplicationStatus::Booked
    }
}

/// One applicant's claim on one project, keyed by the `(applicant, project)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Application {
    pub applicant: Identity,
    pub project: ProjectName,
    pub flat_type: Option<FlatType>,
    pub submitted_on: NaiveDate,
    status: ApplicationStatus,
    prior_status: Option<ApplicationStatus>,
}

impl Application {
    pub fn new(
        applicant: Identity,
        project: ProjectName,
        flat_type: FlatType,
        submitted_on: NaiveDate,
    ) -> Self {
        Self {
            applicant,
            project,
            flat_type: Some(flat_type),
            submitted_on,
            status: ApplicationStatus::Pending,
            prior_status: None,
        }
    }

    /// Rebuilds a stored record. A memo is kept only while a withdrawal is pending.
    pub fn restore(
        applicant: Identity,
        project: ProjectName,
        flat_type: Option<FlatType>,
        submitted_on: NaiveDate,
        status: ApplicationStatus,
        prior_status: Option<ApplicationStatus>,
    ) -> Result<Self, ValidationError> {
        let prior_status = match status {
            ApplicationStatus::PendingWithdrawal => match prior_status {
                Some(prior) if prior.can_request_withdrawal() => Some(prior),
                _ => return Err(ValidationError::MissingPriorStatus),
            },
            _ => None,
        };

        Ok(Self {
            applicant,
            project,
            flat_type,
            submitted_on,
            status,
            prior_status,
        })
    }

    pub fn key(&self) -> (Identity, ProjectName) {
        (self.applicant.clone(), self.project.clone())
    }

    pub fn status(&self) -> ApplicationStatus {
        self.status
    }

    pub fn prior_status(&self) -> Option<ApplicationStatus> {
        self.prior_status
    }

    /// A booked unit stays taken until a withdrawal of the booking is approved.
    pub fn holds_unit(&self) -> bool {
        match self.status {
            ApplicationStatus::Booked => true,
            ApplicationStatus::PendingWithdrawal => {
                self.prior_status == Some(ApplicationStatus::Booked)
            }
            _ => false,
        }
    }

    pub fn approve(&mut self) -> Result<(), TransitionError> {
        self.decide(ApplicationStatus::Successful, "approve")
    }

    pub fn reject(&mut self) -> Result<(), TransitionError> {
        self.decide(ApplicationStatus::Unsuccessful, "reject")
    }

    fn decide(
        &mut self,
        next: ApplicationStatus,
        action: &'static str,
    ) -> Result<(), TransitionError> {
        if self.status != ApplicationStatus::Pending {
            return Err(TransitionError::InvalidTransition {
                from: self.status,
                action,
            });
        }
        self.move_to(next);
        Ok(())
    }

    /// Flips SUCCESSFUL to BOOKED while taking one unit from `inventory`.
    ///
    /// Either both the unit and the status change, or neither does.
    pub fn book(&mut self, inventory: &mut FlatInventory) -> Result<(), TransitionError> {
        if self.status != ApplicationStatus::Successful {
            return Err(TransitionError::InvalidTransition {
                from: self.status,
                action: "book",
            });
        }
        let flat_type = self.flat_type.ok_or(TransitionError::MissingFlatType)?;
        if !inventory.decrement() {
            return Err(TransitionError::NoUnitsAvailable(flat_type));
        }
        self.move_to(ApplicationStatus::Booked);
        Ok(())
    }

    pub fn request_withdrawal(&mut self) -> Result<(), TransitionError> {
        if !self.status.can_request_withdrawal() {
            return Err(TransitionError::InvalidTransition {
                from: self.status,
                action: "withdraw",
            });
        }
        self.prior_status = Some(self.status);
        self.move_to(ApplicationStatus::PendingWithdrawal);
        Ok(())
    }

    pub fn approve_withdrawal(&mut self) -> Result<WithdrawalOutcome, TransitionError> {
        let prior = self.pending_prior("approve the withdrawal of")?;
        let resulting = match prior {
            ApplicationStatus::Pending => ApplicationStatus::Withdrawn,
            _ => ApplicationStatus::Unsuccessful,
        };
        self.prior_status = None;
        self.move_to(resulting);
        Ok(WithdrawalOutcome { prior, resulting })
    }

    pub fn reject_withdrawal(&mut self) -> Result<ApplicationStatus, TransitionError> {
        let prior = self.pending_prior("reject the withdrawal of")?;
        self.prior_status = None;
        self.move_to(prior);
        Ok(prior)
    }

    fn pending_prior(&self, action: &'static str) -> Result<ApplicationStatus, TransitionError> {
        if self.status != ApplicationStatus::PendingWithdrawal {
            return Err(TransitionError::InvalidTransition {
                from: self.status,
                action,
            });
        }
        self.prior_status.ok_or(TransitionError::MissingPriorStatus)
    }

    fn move_to(&mut self, next: ApplicationStatus) {
        debug!(
            applicant = %self.applicant,
            project = %self.project,
            from = self.status.label(),
            to = next.label(),
            "application transition"
        );
        self.status = next;
    }
}
