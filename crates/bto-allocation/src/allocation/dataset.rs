use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use tracing::{info, warn};

use super::application::Application;
use super::enquiry::{Enquiry, EnquiryId};
use super::identity::{Identity, User};
use super::inventory::FlatType;
use super::project::{Project, ProjectName};
use super::registration::{OfficerRegistration, RegistrationStatus};

/// Composite key shared by applications and officer registrations.
pub type RecordKey = (Identity, ProjectName);

/// Process-local snapshot of every collection the desk works on.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    pub users: BTreeMap<Identity, User>,
    pub projects: BTreeMap<ProjectName, Project>,
    pub applications: BTreeMap<RecordKey, Application>,
    pub registrations: BTreeMap<RecordKey, OfficerRegistration>,
    pub enquiries: BTreeMap<EnquiryId, Enquiry>,
}

impl Dataset {
    /// Indexes loaded records, resolving duplicate keys instead of failing.
    pub fn from_records(
        users: Vec<User>,
        projects: Vec<Project>,
        applications: Vec<Application>,
        registrations: Vec<OfficerRegistration>,
        enquiries: Vec<Enquiry>,
    ) -> Self {
        let mut dataset = Self::default();

        for user in users {
            dataset.insert_user(user);
        }

        for project in projects {
            match dataset.projects.entry(project.name.clone()) {
                Entry::Vacant(slot) => {
                    slot.insert(project);
                }
                Entry::Occupied(existing) => {
                    warn!(project = %existing.key(), "duplicate project name; keeping first record");
                }
            }
        }

        for application in applications {
            match dataset.applications.entry(application.key()) {
                Entry::Vacant(slot) => {
                    slot.insert(application);
                }
                Entry::Occupied(mut existing) => {
                    let current = existing.get();
                    let newer_wins = (application.status().priority(), application.submitted_on)
                        > (current.status().priority(), current.submitted_on);
                    warn!(
                        applicant = %application.applicant,
                        project = %application.project,
                        "duplicate application for the same pair; keeping the most relevant"
                    );
                    if newer_wins {
                        existing.insert(application);
                    }
                }
            }
        }

        for registration in registrations {
            match dataset.registrations.entry(registration.key()) {
                Entry::Vacant(slot) => {
                    slot.insert(registration);
                }
                Entry::Occupied(mut existing) => {
                    warn!(
                        officer = %registration.officer,
                        project = %registration.project,
                        "duplicate officer registration; keeping the most decisive"
                    );
                    if registration_rank(registration.status())
                        > registration_rank(existing.get().status())
                    {
                        existing.insert(registration);
                    }
                }
            }
        }

        for enquiry in enquiries {
            match dataset.enquiries.entry(enquiry.id) {
                Entry::Vacant(slot) => {
                    slot.insert(enquiry);
                }
                Entry::Occupied(existing) => {
                    warn!(enquiry = %existing.key(), "duplicate enquiry id; keeping first record");
                }
            }
        }

        info!(
            users = dataset.users.len(),
            projects = dataset.projects.len(),
            applications = dataset.applications.len(),
            registrations = dataset.registrations.len(),
            enquiries = dataset.enquiries.len(),
            "dataset indexed"
        );

        dataset
    }

    /// One role per identity: Manager beats Officer beats Applicant.
    fn insert_user(&mut self, user: User) {
        match self.users.entry(user.identity.clone()) {
            Entry::Vacant(slot) => {
                slot.insert(user);
            }
            Entry::Occupied(mut existing) => {
                let kept = existing.get().role();
                let incoming = user.role();
                if incoming.precedence() > kept.precedence() {
                    info!(
                        identity = %user.identity,
                        from = kept.label(),
                        to = incoming.label(),
                        "identity listed under several roles; promoting"
                    );
                    existing.insert(user);
                } else {
                    info!(
                        identity = %user.identity,
                        kept = kept.label(),
                        ignored = incoming.label(),
                        "identity listed under several roles; keeping higher role"
                    );
                }
            }
        }
    }

    pub fn user(&self, identity: &Identity) -> Option<&User> {
        self.users.get(identity)
    }

    pub fn project(&self, name: &ProjectName) -> Option<&Project> {
        self.projects.get(name)
    }

    /// Looks a project up by free text, ignoring case.
    pub fn project_named(&self, raw: &str) -> Option<&Project> {
        ProjectName::new(raw)
            .ok()
            .and_then(|name| self.projects.get(&name))
    }

    pub fn application(&self, applicant: &Identity, project: &ProjectName) -> Option<&Application> {
        self.applications
            .get(&(applicant.clone(), project.clone()))
    }

    pub fn applications_of<'a>(
        &'a self,
        applicant: &'a Identity,
    ) -> impl Iterator<Item = &'a Application> + 'a {
        self.applications
            .values()
            .filter(move |application| &application.applicant == applicant)
    }

    pub fn applications_for<'a>(
        &'a self,
        project: &'a ProjectName,
    ) -> impl Iterator<Item = &'a Application> + 'a {
        self.applications
            .values()
            .filter(move |application| &application.project == project)
    }

    /// The applicant's application that still blocks new ones, if any.
    pub fn active_application<'a>(&'a self, applicant: &'a Identity) -> Option<&'a Application> {
        self.applications_of(applicant)
            .find(|application| application.status().is_active())
    }

    pub fn registration(
        &self,
        officer: &Identity,
        project: &ProjectName,
    ) -> Option<&OfficerRegistration> {
        self.registrations
            .get(&(officer.clone(), project.clone()))
    }

    pub fn registrations_of<'a>(
        &'a self,
        officer: &'a Identity,
    ) -> impl Iterator<Item = &'a OfficerRegistration> + 'a {
        self.registrations
            .values()
            .filter(move |registration| &registration.officer == officer)
    }

    pub fn is_approved_officer(&self, officer: &Identity, project: &ProjectName) -> bool {
        self.registration(officer, project)
            .map(OfficerRegistration::is_approved)
            .unwrap_or(false)
    }

    pub fn booked_count(&self, project: &ProjectName, flat_type: FlatType) -> u32 {
        let count = self
            .applications_for(project)
            .filter(|application| {
                application.holds_unit() && application.flat_type == Some(flat_type)
            })
            .count();
        u32::try_from(count).unwrap_or(u32::MAX)
    }

    pub fn user_list(&self) -> Vec<User> {
        self.users.values().cloned().collect()
    }

    pub fn project_list(&self) -> Vec<Project> {
        self.projects.values().cloned().collect()
    }

    pub fn application_list(&self) -> Vec<Application> {
        self.applications.values().cloned().collect()
    }

    pub fn registration_list(&self) -> Vec<OfficerRegistration> {
        self.registrations.values().cloned().collect()
    }

    pub fn enquiry_list(&self) -> Vec<Enquiry> {
        self.enquiries.values().cloned().collect()
    }
}

fn registration_rank(status: RegistrationStatus) -> u8 {
    match status {
        RegistrationStatus::Approved => 2,
        RegistrationStatus::Pending => 1,
        RegistrationStatus::Rejected => 0,
    }
}
