use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::application::{ApplicationStatus, TransitionError};
use super::enquiry::EnquiryId;
use super::identity::{Identity, Role};
use super::inventory::FlatType;
use super::project::ProjectName;
use super::registration::RegistrationError;
use super::validation::ValidationError;

/// What happens to dependent records when a manager deletes a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeletionPolicy {
    /// Refuse while applications, registrations, or enquiries reference the project.
    #[default]
    Block,
    /// Remove the project together with everything that references it.
    Cascade,
}

impl FromStr for DeletionPolicy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "block" | "reject" => Ok(Self::Block),
            "cascade" | "purge" => Ok(Self::Cascade),
            other => Err(format!("unknown deletion policy '{other}'")),
        }
    }
}

/// Whether officers may hold an applicant-role application while handling a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OfficerApplicationPolicy {
    /// An officer handling any unexpired project may not apply anywhere.
    #[default]
    Exclusive,
    /// An officer may apply to projects they neither handle nor registered for.
    Concurrent,
}

impl FromStr for OfficerApplicationPolicy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "exclusive" | "single" => Ok(Self::Exclusive),
            "concurrent" | "allow" => Ok(Self::Concurrent),
            other => Err(format!("unknown officer application policy '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DeskPolicy {
    pub deletion: DeletionPolicy,
    pub officer_applications: OfficerApplicationPolicy,
}

/// A legal-looking request refused by the allocation rules.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Denial {
    #[error("unknown user {0}")]
    UnknownUser(Identity),
    #[error("invalid identity or password")]
    InvalidCredentials,
    #[error("a {} cannot {action}", .role.label())]
    RoleNotPermitted { role: Role, action: &'static str },
    #[error("project {0} does not exist")]
    UnknownProject(String),
    #[error("project {0} already exists")]
    DuplicateProject(ProjectName),
    #[error("project {0} is not visible to you")]
    ProjectNotVisible(ProjectName),
    #[error("project {0} is not open for applications today")]
    ProjectClosed(ProjectName),
    #[error("project {0} has already closed")]
    ProjectExpired(ProjectName),
    #[error("project {project} does not offer {flat_type} flats")]
    FlatTypeNotOffered {
        project: ProjectName,
        flat_type: FlatType,
    },
    #[error("you are not eligible for a {0} flat")]
    NotEligible(FlatType),
    #[error("you already have an application for {project} ({})", .status.label())]
    ActiveApplication {
        project: ProjectName,
        status: ApplicationStatus,
    },
    #[error("an application for {0} is already on file")]
    DuplicateApplication(ProjectName),
    #[error("no application by {applicant} for {project}")]
    ApplicationNotFound {
        applicant: Identity,
        project: ProjectName,
    },
    #[error("officers cannot apply for {0}, which they registered to handle")]
    RegisteredForProject(ProjectName),
    #[error("officers handling {0} cannot apply for other projects")]
    HandlingOtherProject(ProjectName),
    #[error("{applicant} already booked a flat in {project}")]
    AlreadyBooked {
        applicant: Identity,
        project: ProjectName,
    },
    #[error("officers cannot process their own application")]
    OwnApplication,
    #[error("you do not handle project {0}")]
    NotHandlingOfficer(ProjectName),
    #[error("you do not manage project {0}")]
    NotProjectManager(ProjectName),
    #[error("no {0} units remain")]
    NoUnitsAvailable(FlatType),
    #[error(transparent)]
    Transition(#[from] TransitionError),
    #[error("a registration for {0} is already on file")]
    DuplicateRegistration(ProjectName),
    #[error("no registration by {officer} for {project}")]
    RegistrationNotFound {
        officer: Identity,
        project: ProjectName,
    },
    #[error("officers with an application in progress for {0} cannot register")]
    ApplicationInProgress(ProjectName),
    #[error("officers cannot handle {0}, which they applied for")]
    AppliedAsApplicant(ProjectName),
    #[error("application period overlaps {0}")]
    WindowOverlap(ProjectName),
    #[error("project {0} has no officer slots left")]
    NoOfficerSlots(ProjectName),
    #[error(transparent)]
    Registration(#[from] RegistrationError),
    #[error("you already manage {0} during an overlapping period")]
    ManagerWindowConflict(ProjectName),
    #[error("officer capacity {requested} is below the {approved} approved officers")]
    SlotsBelowApproved { requested: u8, approved: usize },
    #[error("{flat_type} total {requested} is below the {booked} booked units")]
    UnitsBelowBooked {
        flat_type: FlatType,
        requested: u32,
        booked: u32,
    },
    #[error("project {project} is still referenced by {applications} applications, {registrations} registrations and {enquiries} enquiries")]
    ProjectReferenced {
        project: ProjectName,
        applications: usize,
        registrations: usize,
        enquiries: usize,
    },
    #[error("enquiry {0} does not exist")]
    EnquiryNotFound(EnquiryId),
    #[error("enquiry {0} belongs to someone else")]
    NotEnquiryAuthor(EnquiryId),
    #[error("enquiry {0} has already been answered")]
    EnquiryAnswered(EnquiryId),
    #[error("enquiry number {0} is already on file")]
    EnquiryIdTaken(EnquiryId),
    #[error("enquiry text must not be empty")]
    EmptyEnquiry,
    #[error(transparent)]
    Invalid(#[from] ValidationError),
}
