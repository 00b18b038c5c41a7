use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::{AllocationDesk, Decision, DeskError};
use crate::allocation::application::{Application, ApplicationStatus, TransitionError};
use crate::allocation::eligibility;
use crate::allocation::identity::{Identity, MaritalStatus, Role};
use crate::allocation::inventory::FlatType;
use crate::allocation::policy::{Denial, OfficerApplicationPolicy};
use crate::allocation::project::ProjectName;
use crate::storage::AllocationStore;

/// Confirmation handed to the applicant once an officer books their flat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BookingReceipt {
    pub applicant: Identity,
    pub name: String,
    pub age: u8,
    pub marital_status: MaritalStatus,
    pub project: ProjectName,
    pub neighborhood: String,
    pub flat_type: FlatType,
    pub price: u64,
    pub officer: Identity,
    pub booked_on: NaiveDate,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct BookingFilter {
    pub marital_status: Option<MaritalStatus>,
    pub flat_type: Option<FlatType>,
    pub project: Option<ProjectName>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BookingReportEntry {
    pub applicant: Identity,
    pub name: String,
    pub age: u8,
    pub marital_status: MaritalStatus,
    pub project: ProjectName,
    pub flat_type: FlatType,
}

impl<S> AllocationDesk<S>
where
    S: AllocationStore + 'static,
{
    pub fn apply(
        &mut self,
        applicant: &Identity,
        project: &ProjectName,
        flat_type: FlatType,
        today: NaiveDate,
    ) -> Result<Application, DeskError> {
        self.check_apply(applicant, project, flat_type, today)?;

        let application = Application::new(applicant.clone(), project.clone(), flat_type, today);
        self.data
            .applications
            .insert(application.key(), application.clone());
        self.persist_applications()?;
        self.refresh_summaries();

        info!(
            applicant = %applicant,
            project = %project,
            flat_type = %flat_type,
            "application submitted"
        );
        Ok(application)
    }

    fn check_apply(
        &self,
        applicant: &Identity,
        name: &ProjectName,
        flat_type: FlatType,
        today: NaiveDate,
    ) -> Result<(), Denial> {
        let user = self.user(applicant)?;
        if !user.role().can_hold_applications() {
            return Err(Denial::RoleNotPermitted {
                role: user.role(),
                action: "apply for a flat",
            });
        }

        let project = self.project(name)?;
        if !eligibility::is_visible(user, project, &self.data) {
            return Err(Denial::ProjectNotVisible(project.name.clone()));
        }
        if !project.window.is_open_on(today) {
            return Err(Denial::ProjectClosed(project.name.clone()));
        }
        if !project.offers(flat_type) {
            return Err(Denial::FlatTypeNotOffered {
                project: project.name.clone(),
                flat_type,
            });
        }
        if !eligibility::can_apply(user, flat_type) {
            return Err(Denial::NotEligible(flat_type));
        }
        if self.data.application(applicant, &project.name).is_some() {
            return Err(Denial::DuplicateApplication(project.name.clone()));
        }
        if let Some(active) = self.data.active_application(applicant) {
            return Err(Denial::ActiveApplication {
                project: active.project.clone(),
                status: active.status(),
            });
        }

        if user.role() == Role::Officer {
            let registered = self
                .data
                .registration(applicant, &project.name)
                .map(|registration| registration.is_pending() || registration.is_approved())
                .unwrap_or(false);
            if registered {
                return Err(Denial::RegisteredForProject(project.name.clone()));
            }

            if self.policy.officer_applications == OfficerApplicationPolicy::Exclusive {
                if let Some(handled) = self.handled_project(applicant, today) {
                    return Err(Denial::HandlingOtherProject(handled));
                }
            }
        }

        Ok(())
    }

    /// First project the officer is approved for whose window has not yet closed.
    pub(super) fn handled_project(&self, officer: &Identity, today: NaiveDate) -> Option<ProjectName> {
        self.data
            .registrations_of(officer)
            .filter(|registration| registration.is_approved())
            .filter_map(|registration| self.data.project(&registration.project))
            .find(|project| !project.window.is_expired_on(today))
            .map(|project| project.name.clone())
    }

    pub fn request_withdrawal(
        &mut self,
        applicant: &Identity,
        project: &ProjectName,
    ) -> Result<Application, DeskError> {
        self.user(applicant)?;
        let application = self
            .data
            .applications
            .get_mut(&(applicant.clone(), project.clone()))
            .ok_or_else(|| Denial::ApplicationNotFound {
                applicant: applicant.clone(),
                project: project.clone(),
            })?;
        application.request_withdrawal().map_err(Denial::from)?;
        let updated = application.clone();

        self.persist_applications()?;
        self.refresh_summaries();
        info!(applicant = %applicant, project = %project, "withdrawal requested");
        Ok(updated)
    }

    /// Moves a PENDING application to SUCCESSFUL or UNSUCCESSFUL.
    ///
    /// Approval is refused while the requested flat type has no units left.
    pub fn decide_application(
        &mut self,
        manager: &Identity,
        applicant: &Identity,
        project: &ProjectName,
        decision: Decision,
    ) -> Result<Application, DeskError> {
        let owned = self.managed_project(manager, project, "decide applications")?;
        let key = (applicant.clone(), owned.name.clone());
        let current = self
            .data
            .applications
            .get(&key)
            .ok_or_else(|| Denial::ApplicationNotFound {
                applicant: applicant.clone(),
                project: project.clone(),
            })?;

        if decision == Decision::Approve && current.status() == ApplicationStatus::Pending {
            let flat_type = current
                .flat_type
                .ok_or(Denial::Transition(TransitionError::MissingFlatType))?;
            let has_units = owned
                .inventory(flat_type)
                .map(|inventory| inventory.has_available())
                .unwrap_or(false);
            if !has_units {
                return Err(Denial::NoUnitsAvailable(flat_type).into());
            }
        }

        let Some(application) = self.data.applications.get_mut(&key) else {
            return Err(Denial::ApplicationNotFound {
                applicant: applicant.clone(),
                project: project.clone(),
            }
            .into());
        };
        let transition = match decision {
            Decision::Approve => application.approve(),
            Decision::Reject => application.reject(),
        };
        transition.map_err(Denial::from)?;
        let updated = application.clone();

        self.persist_applications()?;
        self.refresh_summaries();
        info!(
            manager = %manager,
            applicant = %applicant,
            project = %project,
            status = updated.status().label(),
            "application decided"
        );
        Ok(updated)
    }

    /// Resolves a pending withdrawal; approving one that was BOOKED returns the unit.
    pub fn decide_withdrawal(
        &mut self,
        manager: &Identity,
        applicant: &Identity,
        project: &ProjectName,
        decision: Decision,
    ) -> Result<Application, DeskError> {
        let name = self
            .managed_project(manager, project, "decide withdrawals")?
            .name
            .clone();
        let application = self
            .data
            .applications
            .get_mut(&(applicant.clone(), name.clone()))
            .ok_or_else(|| Denial::ApplicationNotFound {
                applicant: applicant.clone(),
                project: project.clone(),
            })?;

        let mut released = None;
        match decision {
            Decision::Approve => {
                let outcome = application.approve_withdrawal().map_err(Denial::from)?;
                if outcome.releases_unit() {
                    released = application.flat_type;
                }
            }
            Decision::Reject => {
                application.reject_withdrawal().map_err(Denial::from)?;
            }
        }
        let updated = application.clone();

        if let Some(flat_type) = released {
            let restored = self
                .data
                .projects
                .get_mut(&name)
                .and_then(|project| project.inventory_mut(flat_type))
                .map(|inventory| inventory.increment())
                .unwrap_or(false);
            if !restored {
                warn!(
                    project = %name,
                    flat_type = %flat_type,
                    "withdrawn booking could not be returned to inventory"
                );
            }
            self.persist_projects()?;
        }

        self.persist_applications()?;
        self.refresh_summaries();
        info!(
            manager = %manager,
            applicant = %applicant,
            project = %name,
            status = updated.status().label(),
            "withdrawal decided"
        );
        Ok(updated)
    }

    /// Books the applicant's SUCCESSFUL application on behalf of a handling officer.
    pub fn book(
        &mut self,
        officer: &Identity,
        applicant: &Identity,
        project: &ProjectName,
        today: NaiveDate,
    ) -> Result<BookingReceipt, DeskError> {
        self.user_with_role(officer, Role::Officer, "book flats")?;
        if officer == applicant {
            return Err(Denial::OwnApplication.into());
        }

        let name = self.project(project)?.name.clone();
        if !self.data.is_approved_officer(officer, &name) {
            return Err(Denial::NotHandlingOfficer(name).into());
        }
        self.user(applicant)?;

        if let Some(held) = self
            .data
            .applications_of(applicant)
            .find(|application| application.holds_unit())
        {
            return Err(Denial::AlreadyBooked {
                applicant: applicant.clone(),
                project: held.project.clone(),
            }
            .into());
        }

        let key = (applicant.clone(), name.clone());
        let current = self
            .data
            .applications
            .get(&key)
            .ok_or_else(|| Denial::ApplicationNotFound {
                applicant: applicant.clone(),
                project: name.clone(),
            })?;
        let flat_type = current
            .flat_type
            .ok_or(Denial::Transition(TransitionError::MissingFlatType))?;

        let inventory = self
            .data
            .projects
            .get_mut(&name)
            .and_then(|project| project.inventory_mut(flat_type))
            .ok_or_else(|| Denial::FlatTypeNotOffered {
                project: name.clone(),
                flat_type,
            })?;
        let application = self
            .data
            .applications
            .get_mut(&key)
            .ok_or_else(|| Denial::ApplicationNotFound {
                applicant: applicant.clone(),
                project: name.clone(),
            })?;
        application.book(inventory).map_err(Denial::from)?;

        self.persist_applications()?;
        self.persist_projects()?;
        self.refresh_summaries();

        let receipt = self.receipt(officer, applicant, &name, flat_type, today)?;
        info!(
            officer = %officer,
            applicant = %applicant,
            project = %name,
            flat_type = %flat_type,
            "flat booked"
        );
        Ok(receipt)
    }

    fn receipt(
        &self,
        officer: &Identity,
        applicant: &Identity,
        name: &ProjectName,
        flat_type: FlatType,
        booked_on: NaiveDate,
    ) -> Result<BookingReceipt, Denial> {
        let user = self.user(applicant)?;
        let project = self.project(name)?;
        let price = project
            .inventory(flat_type)
            .map(|inventory| inventory.price)
            .unwrap_or_default();

        Ok(BookingReceipt {
            applicant: user.identity.clone(),
            name: user.name.clone(),
            age: user.age,
            marital_status: user.marital_status,
            project: project.name.clone(),
            neighborhood: project.neighborhood.clone(),
            flat_type,
            price,
            officer: officer.clone(),
            booked_on,
        })
    }

    /// BOOKED applications across the manager's own projects, ordered by project then applicant.
    pub fn booking_report(
        &self,
        manager: &Identity,
        filter: &BookingFilter,
    ) -> Result<Vec<BookingReportEntry>, DeskError> {
        self.user_with_role(manager, Role::Manager, "view the booking report")?;

        let mut entries: Vec<BookingReportEntry> = self
            .data
            .applications
            .values()
            .filter(|application| application.status() == ApplicationStatus::Booked)
            .filter(|application| {
                self.data
                    .project(&application.project)
                    .map(|project| &project.manager == manager)
                    .unwrap_or(false)
            })
            .filter(|application| {
                filter
                    .project
                    .as_ref()
                    .map_or(true, |project| &application.project == project)
            })
            .filter_map(|application| {
                let flat_type = application.flat_type?;
                let user = self.data.user(&application.applicant)?;
                Some(BookingReportEntry {
                    applicant: user.identity.clone(),
                    name: user.name.clone(),
                    age: user.age,
                    marital_status: user.marital_status,
                    project: application.project.clone(),
                    flat_type,
                })
            })
            .filter(|entry| {
                filter
                    .marital_status
                    .map_or(true, |status| entry.marital_status == status)
                    && filter.flat_type.map_or(true, |flat| entry.flat_type == flat)
            })
            .collect();

        entries.sort_by(|a, b| {
            a.project
                .cmp(&b.project)
                .then_with(|| a.applicant.cmp(&b.applicant))
        });
        Ok(entries)
    }
}
