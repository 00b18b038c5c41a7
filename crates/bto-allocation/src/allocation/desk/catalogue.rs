use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{AllocationDesk, DeskError};
use crate::allocation::eligibility;
use crate::allocation::identity::{Identity, Role, User};
use crate::allocation::inventory::{FlatInventory, FlatType};
use crate::allocation::policy::{DeletionPolicy, Denial};
use crate::allocation::project::{ApplicationWindow, Project, ProjectName};
use crate::allocation::validation::ValidationError;
use crate::storage::AllocationStore;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlatView {
    pub flat_type: FlatType,
    pub total_units: u32,
    pub available_units: u32,
    pub price: u64,
}

/// A project as one particular user is allowed to see it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectView {
    pub name: ProjectName,
    pub neighborhood: String,
    pub window: ApplicationWindow,
    pub manager: Identity,
    pub officer_slots: u8,
    pub officers: Vec<Identity>,
    pub visible: bool,
    pub flats: Vec<FlatView>,
    pub eligible_flat_types: Vec<FlatType>,
}

impl ProjectView {
    fn of(project: &Project, viewer: &User) -> Self {
        Self {
            name: project.name.clone(),
            neighborhood: project.neighborhood.clone(),
            window: project.window,
            manager: project.manager.clone(),
            officer_slots: project.officer_slots(),
            officers: project.officers().to_vec(),
            visible: project.visible,
            flats: project
                .flats
                .iter()
                .map(|(flat_type, inventory)| FlatView {
                    flat_type: *flat_type,
                    total_units: inventory.total_units(),
                    available_units: inventory.available_units(),
                    price: inventory.price,
                })
                .collect(),
            eligible_flat_types: eligibility::eligible_flat_types(viewer, project),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ProjectFilter {
    pub neighborhood: Option<String>,
    pub flat_type: Option<FlatType>,
    pub open_on: Option<NaiveDate>,
    /// Managers only: keep the projects they own.
    pub managed_only: bool,
}

impl ProjectFilter {
    fn matches(&self, project: &Project, viewer: &User) -> bool {
        let neighborhood = self.neighborhood.as_deref().map_or(true, |wanted| {
            project.neighborhood.trim().eq_ignore_ascii_case(wanted.trim())
        });
        let flat_type = self
            .flat_type
            .map_or(true, |flat_type| project.offers(flat_type));
        let open = self
            .open_on
            .map_or(true, |as_of| project.window.is_open_on(as_of));
        let owned = !self.managed_only || project.manager == viewer.identity;

        neighborhood && flat_type && open && owned
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FlatDraft {
    pub flat_type: FlatType,
    pub units: u32,
    pub price: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProjectDraft {
    pub name: String,
    pub neighborhood: String,
    pub flats: Vec<FlatDraft>,
    pub open: NaiveDate,
    pub close: NaiveDate,
    pub officer_slots: u8,
    #[serde(default)]
    pub visible: bool,
}

/// Partial edit; absent fields keep their current value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ProjectUpdate {
    pub neighborhood: Option<String>,
    pub open: Option<NaiveDate>,
    pub close: Option<NaiveDate>,
    pub officer_slots: Option<u8>,
    pub units: BTreeMap<FlatType, u32>,
    pub prices: BTreeMap<FlatType, u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeletionOutcome {
    pub project: ProjectName,
    pub applications_removed: usize,
    pub registrations_removed: usize,
    pub enquiries_removed: usize,
}

impl<S> AllocationDesk<S>
where
    S: AllocationStore + 'static,
{
    /// Projects the viewer may see, ordered by name ignoring case.
    pub fn projects_for(
        &self,
        viewer: &Identity,
        filter: &ProjectFilter,
    ) -> Result<Vec<ProjectView>, DeskError> {
        let user = self.user(viewer)?;
        if filter.managed_only && user.role() != Role::Manager {
            return Err(Denial::RoleNotPermitted {
                role: user.role(),
                action: "list managed projects",
            }
            .into());
        }

        Ok(self
            .data
            .projects
            .values()
            .filter(|project| eligibility::is_visible(user, project, &self.data))
            .filter(|project| filter.matches(project, user))
            .map(|project| ProjectView::of(project, user))
            .collect())
    }

    pub fn create_project(
        &mut self,
        manager: &Identity,
        draft: ProjectDraft,
    ) -> Result<Project, DeskError> {
        self.user_with_role(manager, Role::Manager, "create projects")?;

        let name = ProjectName::new(&draft.name).map_err(Denial::from)?;
        if self.data.project(&name).is_some() {
            return Err(Denial::DuplicateProject(name).into());
        }
        let window = ApplicationWindow::new(draft.open, draft.close).map_err(Denial::from)?;
        self.check_manager_window(manager, &name, &window)?;

        let mut flats = BTreeMap::new();
        for flat in draft.flats {
            let inventory = FlatInventory::new(flat.units, flat.price);
            if flats.insert(flat.flat_type, inventory).is_some() {
                return Err(Denial::from(ValidationError::DuplicateFlatType(flat.flat_type)).into());
            }
        }
        let mut project = Project::new(
            name.clone(),
            draft.neighborhood.trim(),
            flats,
            window,
            manager.clone(),
            draft.officer_slots,
        )
        .map_err(Denial::from)?;
        project.visible = draft.visible;

        self.data.projects.insert(name.clone(), project.clone());
        self.persist_projects()?;
        info!(manager = %manager, project = %name, "project created");
        Ok(project)
    }

    /// A manager may not own two projects whose windows overlap.
    fn check_manager_window(
        &self,
        manager: &Identity,
        name: &ProjectName,
        window: &ApplicationWindow,
    ) -> Result<(), Denial> {
        let conflict = self.data.projects.values().find(|other| {
            &other.manager == manager && &other.name != name && other.window.overlaps(window)
        });
        match conflict {
            Some(other) => Err(Denial::ManagerWindowConflict(other.name.clone())),
            None => Ok(()),
        }
    }

    /// Applies every field of `update` or none of them.
    pub fn update_project(
        &mut self,
        manager: &Identity,
        name: &ProjectName,
        update: ProjectUpdate,
    ) -> Result<Project, DeskError> {
        let mut next = self.managed_project(manager, name, "edit projects")?.clone();

        if let Some(neighborhood) = update.neighborhood {
            next.neighborhood = neighborhood.trim().to_string();
        }

        if update.open.is_some() || update.close.is_some() {
            let window = ApplicationWindow::new(
                update.open.unwrap_or(next.window.open()),
                update.close.unwrap_or(next.window.close()),
            )
            .map_err(Denial::from)?;
            self.check_manager_window(manager, &next.name, &window)?;
            next.window = window;
        }

        if let Some(slots) = update.officer_slots {
            let approved = next.officers().len();
            if usize::from(slots) < approved {
                return Err(Denial::SlotsBelowApproved {
                    requested: slots,
                    approved,
                }
                .into());
            }
            next.set_officer_slots(slots).map_err(Denial::from)?;
        }

        for (flat_type, total) in update.units {
            let project_name = next.name.clone();
            let inventory = next
                .inventory_mut(flat_type)
                .ok_or(Denial::FlatTypeNotOffered {
                    project: project_name,
                    flat_type,
                })?;
            inventory
                .resize(total)
                .map_err(|booked| Denial::UnitsBelowBooked {
                    flat_type,
                    requested: total,
                    booked,
                })?;
        }

        for (flat_type, price) in update.prices {
            let project_name = next.name.clone();
            let inventory = next
                .inventory_mut(flat_type)
                .ok_or(Denial::FlatTypeNotOffered {
                    project: project_name,
                    flat_type,
                })?;
            inventory.price = price;
        }

        self.data.projects.insert(next.name.clone(), next.clone());
        self.persist_projects()?;
        info!(manager = %manager, project = %next.name, "project updated");
        Ok(next)
    }

    pub fn set_visibility(
        &mut self,
        manager: &Identity,
        name: &ProjectName,
        visible: bool,
    ) -> Result<Project, DeskError> {
        let key = self
            .managed_project(manager, name, "change project visibility")?
            .name
            .clone();
        let Some(project) = self.data.projects.get_mut(&key) else {
            return Err(Denial::UnknownProject(key.to_string()).into());
        };
        project.visible = visible;
        let updated = project.clone();

        self.persist_projects()?;
        info!(manager = %manager, project = %key, visible, "project visibility changed");
        Ok(updated)
    }

    /// Removes a project according to the configured [`DeletionPolicy`].
    pub fn delete_project(
        &mut self,
        manager: &Identity,
        name: &ProjectName,
    ) -> Result<DeletionOutcome, DeskError> {
        let key = self
            .managed_project(manager, name, "delete projects")?
            .name
            .clone();

        let applications = self.data.applications_for(&key).count();
        let registrations = self
            .data
            .registrations
            .values()
            .filter(|registration| registration.project == key)
            .count();
        let enquiries = self
            .data
            .enquiries
            .values()
            .filter(|enquiry| enquiry.is_about(key.as_str()))
            .count();

        if self.policy.deletion == DeletionPolicy::Block
            && applications + registrations + enquiries > 0
        {
            return Err(Denial::ProjectReferenced {
                project: key,
                applications,
                registrations,
                enquiries,
            }
            .into());
        }

        self.data.projects.remove(&key);
        self.data
            .applications
            .retain(|(_, project), _| project != &key);
        self.data
            .registrations
            .retain(|(_, project), _| project != &key);
        self.data
            .enquiries
            .retain(|_, enquiry| !enquiry.is_about(key.as_str()));

        self.persist_projects()?;
        if applications > 0 {
            self.persist_applications()?;
            self.refresh_summaries();
        }
        if registrations > 0 {
            self.persist_registrations()?;
        }
        if enquiries > 0 {
            self.persist_enquiries()?;
        }

        info!(
            manager = %manager,
            project = %key,
            applications,
            registrations,
            enquiries,
            "project deleted"
        );
        Ok(DeletionOutcome {
            project: key,
            applications_removed: applications,
            registrations_removed: registrations,
            enquiries_removed: enquiries,
        })
    }
}
