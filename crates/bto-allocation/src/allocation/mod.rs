pub mod application;
pub mod dataset;
pub mod desk;
pub mod eligibility;
pub mod enquiry;
pub mod identity;
pub mod inventory;
pub mod policy;
pub mod project;
pub mod registration;
pub mod sync;
pub mod validation;

pub use application::{Application, ApplicationStatus, TransitionError, WithdrawalOutcome};
pub use dataset::{Dataset, RecordKey};
pub use desk::{
    AllocationDesk, BookingFilter, BookingReceipt, BookingReportEntry, Decision, DeletionOutcome,
    DeskError, FlatDraft, FlatView, ProjectDraft, ProjectFilter, ProjectUpdate, ProjectView,
};
pub use enquiry::{Enquiry, EnquiryId, EnquiryReply, MonotonicSequence, Sequence};
pub use identity::{ApplicantState, Identity, MaritalStatus, Role, User};
pub use inventory::{FlatInventory, FlatType};
pub use policy::{DeletionPolicy, Denial, DeskPolicy, OfficerApplicationPolicy};
pub use project::{ApplicationWindow, Project, ProjectName, MAX_OFFICER_SLOTS};
pub use registration::{OfficerRegistration, RegistrationError, RegistrationStatus};
pub use sync::{synchronize, ConsistencyWarning, SyncReport};
pub use validation::ValidationError;

#[cfg(test)]
mod tests;
