use chrono::NaiveDate;
use tracing::info;

use super::{AllocationDesk, Decision, DeskError};
use crate::allocation::identity::{Identity, Role};
use crate::allocation::policy::Denial;
use crate::allocation::project::ProjectName;
use crate::allocation::registration::OfficerRegistration;
use crate::storage::AllocationStore;

impl<S> AllocationDesk<S>
where
    S: AllocationStore + 'static,
{
    /// Files a PENDING request for the officer to handle `project`.
    pub fn register(
        &mut self,
        officer: &Identity,
        project: &ProjectName,
        today: NaiveDate,
    ) -> Result<OfficerRegistration, DeskError> {
        let name = self.check_register(officer, project, today)?;

        let registration = OfficerRegistration::new(officer.clone(), name.clone(), today);
        self.data
            .registrations
            .insert(registration.key(), registration.clone());
        self.persist_registrations()?;

        info!(officer = %officer, project = %name, "officer registration filed");
        Ok(registration)
    }

    fn check_register(
        &self,
        officer: &Identity,
        name: &ProjectName,
        today: NaiveDate,
    ) -> Result<ProjectName, Denial> {
        self.user_with_role(officer, Role::Officer, "register to handle projects")?;
        let target = self.project(name)?;

        if target.window.is_expired_on(today) {
            return Err(Denial::ProjectExpired(target.name.clone()));
        }
        if self.data.registration(officer, &target.name).is_some() {
            return Err(Denial::DuplicateRegistration(target.name.clone()));
        }
        if self.data.application(officer, &target.name).is_some() {
            return Err(Denial::AppliedAsApplicant(target.name.clone()));
        }
        if let Some(application) = self
            .data
            .applications_of(officer)
            .find(|application| application.status().is_in_progress())
        {
            return Err(Denial::ApplicationInProgress(application.project.clone()));
        }

        let clash = self
            .data
            .registrations_of(officer)
            .filter_map(|registration| {
                let other = self.data.project(&registration.project)?;
                let handling = registration.is_approved() && !other.window.is_expired_on(today);
                (handling || registration.is_pending()).then_some(other)
            })
            .find(|other| other.window.overlaps(&target.window));
        if let Some(other) = clash {
            return Err(Denial::WindowOverlap(other.name.clone()));
        }

        if !target.has_capacity() {
            return Err(Denial::NoOfficerSlots(target.name.clone()));
        }

        Ok(target.name.clone())
    }

    /// Approval admits the officer to the roster in the same step; rejection leaves it alone.
    pub fn decide_registration(
        &mut self,
        manager: &Identity,
        officer: &Identity,
        project: &ProjectName,
        decision: Decision,
    ) -> Result<OfficerRegistration, DeskError> {
        let name = self
            .managed_project(manager, project, "decide officer registrations")?
            .name
            .clone();

        let registration = self
            .data
            .registrations
            .get_mut(&(officer.clone(), name.clone()))
            .ok_or_else(|| Denial::RegistrationNotFound {
                officer: officer.clone(),
                project: name.clone(),
            })?;

        match decision {
            Decision::Approve => {
                let Some(target) = self.data.projects.get_mut(&name) else {
                    return Err(Denial::UnknownProject(name.to_string()).into());
                };
                registration.approve(target).map_err(Denial::from)?;
            }
            Decision::Reject => registration.reject().map_err(Denial::from)?,
        }
        let updated = registration.clone();

        self.persist_registrations()?;
        if decision == Decision::Approve {
            self.persist_projects()?;
        }

        info!(
            manager = %manager,
            officer = %officer,
            project = %name,
            status = updated.status().label(),
            "officer registration decided"
        );
        Ok(updated)
    }
}
