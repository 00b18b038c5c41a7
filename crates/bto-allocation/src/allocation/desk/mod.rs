//! Controller boundary for the allocation engine.
//!
//! [`AllocationDesk`] owns the in-memory [`Dataset`], runs the cross-entity policy
//! checks that single state machines cannot see, invokes the transitions, and writes
//! every touched collection back through the [`AllocationStore`].

mod applications;
mod catalogue;
mod enquiries;
mod registrations;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use super::dataset::Dataset;
use super::enquiry::{MonotonicSequence, Sequence};
use super::identity::{Identity, Role, User};
use super::policy::{Denial, DeskPolicy};
use super::project::{Project, ProjectName};
use super::sync::{self, SyncReport};
use crate::storage::{AllocationStore, StoreError};

pub use applications::{BookingFilter, BookingReceipt, BookingReportEntry};
pub use catalogue::{
    DeletionOutcome, FlatDraft, FlatView, ProjectDraft, ProjectFilter, ProjectUpdate,
    ProjectView,
};

/// Manager or officer verdict on a pending request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Approve,
    Reject,
}

#[derive(Debug, thiserror::Error)]
pub enum DeskError {
    #[error(transparent)]
    Denied(#[from] Denial),
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub struct AllocationDesk<S> {
    store: Arc<S>,
    data: Dataset,
    policy: DeskPolicy,
    sequence: Box<dyn Sequence + Send>,
}

impl<S> AllocationDesk<S>
where
    S: AllocationStore + 'static,
{
    /// Loads every collection, synchronizes, and persists any repairs.
    ///
    /// Only failing to read users or projects is fatal; the other collections fall back
    /// to empty so a damaged file cannot block startup.
    pub fn open(store: Arc<S>, policy: DeskPolicy) -> Result<(Self, SyncReport), DeskError> {
        let users = store.load_users()?;
        let projects = store.load_projects()?;
        let applications = recoverable("applications", store.load_applications());
        let registrations = recoverable("registrations", store.load_registrations());
        let enquiries = recoverable("enquiries", store.load_enquiries());

        let data = Dataset::from_records(users, projects, applications, registrations, enquiries);
        let sequence = MonotonicSequence::starting_after(data.enquiries.keys());

        let mut desk = Self {
            store,
            data,
            policy,
            sequence: Box::new(sequence),
        };
        let report = desk.synchronize()?;
        Ok((desk, report))
    }

    /// Replaces the enquiry number source; a number already on file is refused at submission.
    pub fn with_sequence(mut self, sequence: impl Sequence + Send + 'static) -> Self {
        self.sequence = Box::new(sequence);
        self
    }

    pub fn policy(&self) -> DeskPolicy {
        self.policy
    }

    pub fn dataset(&self) -> &Dataset {
        &self.data
    }

    /// Runs the reconciliation pass and writes back the collections it repaired.
    pub fn synchronize(&mut self) -> Result<SyncReport, DeskError> {
        let report = sync::synchronize(&mut self.data);
        if report.registrations_dirty() {
            self.persist_registrations()?;
        }
        if report.projects_dirty() {
            self.persist_projects()?;
        }
        Ok(report)
    }

    /// Synchronizes, then compares the credential.
    pub fn login(&mut self, identity: &str, credential: &str) -> Result<User, DeskError> {
        let identity = Identity::parse(identity).map_err(|_| Denial::InvalidCredentials)?;
        self.synchronize()?;

        match self.data.user(&identity) {
            Some(user) if user.credential_matches(credential) => {
                info!(identity = %identity, role = user.role().label(), "login succeeded");
                Ok(user.clone())
            }
            _ => {
                warn!(identity = %identity, "login rejected");
                Err(Denial::InvalidCredentials.into())
            }
        }
    }

    fn user(&self, identity: &Identity) -> Result<&User, Denial> {
        self.data
            .user(identity)
            .ok_or_else(|| Denial::UnknownUser(identity.clone()))
    }

    fn user_with_role(
        &self,
        identity: &Identity,
        role: Role,
        action: &'static str,
    ) -> Result<&User, Denial> {
        let user = self.user(identity)?;
        if user.role() != role {
            return Err(Denial::RoleNotPermitted {
                role: user.role(),
                action,
            });
        }
        Ok(user)
    }

    fn project(&self, name: &ProjectName) -> Result<&Project, Denial> {
        self.data
            .project(name)
            .ok_or_else(|| Denial::UnknownProject(name.to_string()))
    }

    /// The caller must be a manager and own the project.
    fn managed_project(
        &self,
        manager: &Identity,
        name: &ProjectName,
        action: &'static str,
    ) -> Result<&Project, Denial> {
        self.user_with_role(manager, Role::Manager, action)?;
        let project = self.project(name)?;
        if &project.manager != manager {
            return Err(Denial::NotProjectManager(project.name.clone()));
        }
        Ok(project)
    }

    fn refresh_summaries(&mut self) {
        let mut scratch = SyncReport::default();
        sync::refresh_applicant_summaries(&mut self.data, &mut scratch);
    }

    fn persist_projects(&self) -> Result<(), StoreError> {
        self.store.save_projects(&self.data.project_list())
    }

    fn persist_applications(&self) -> Result<(), StoreError> {
        self.store.save_applications(&self.data.application_list())
    }

    fn persist_registrations(&self) -> Result<(), StoreError> {
        self.store
            .save_registrations(&self.data.registration_list())
    }

    fn persist_enquiries(&self) -> Result<(), StoreError> {
        self.store.save_enquiries(&self.data.enquiry_list())
    }
}

fn recoverable<T>(dataset: &'static str, loaded: Result<Vec<T>, StoreError>) -> Vec<T> {
    loaded.unwrap_or_else(|err| {
        error!(dataset, error = %err, "failed to load dataset; continuing with none");
        Vec::new()
    })
}
