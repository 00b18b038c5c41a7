//! Reconciliation pass run after every load and before every login.
//!
//! The pass repairs three kinds of derived state: the applicant summaries cached on
//! users, the available-unit counters, and APPROVED registrations implied by project
//! rosters. Everything else it finds is reported as a [`ConsistencyWarning`] and left
//! untouched. Running it twice in a row changes nothing the second time.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use tracing::{info, warn};

use super::application::ApplicationStatus;
use super::dataset::Dataset;
use super::identity::{ApplicantState, Identity, Role};
use super::inventory::FlatType;
use super::project::ProjectName;
use super::registration::OfficerRegistration;

/// Drift found by synchronization that it does not repair on its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConsistencyWarning {
    BookingForUnknownProject {
        applicant: Identity,
        project: ProjectName,
    },
    BookingWithoutOfferedFlatType {
        applicant: Identity,
        project: ProjectName,
        flat_type: Option<FlatType>,
    },
    Overbooked {
        project: ProjectName,
        flat_type: FlatType,
        booked: u32,
        total: u32,
    },
    RosterEntryNotOfficer {
        identity: Identity,
        project: ProjectName,
    },
    RosterOverCapacity {
        project: ProjectName,
        officers: usize,
        slots: u8,
    },
    RegistrationForUnknownProject {
        officer: Identity,
        project: ProjectName,
    },
    OfficerMissingFromRoster {
        officer: Identity,
        project: ProjectName,
    },
}

impl fmt::Display for ConsistencyWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BookingForUnknownProject { applicant, project } => {
                write!(f, "{applicant} holds a booking for unknown project {project}")
            }
            Self::BookingWithoutOfferedFlatType {
                applicant,
                project,
                flat_type,
            } => match flat_type {
                Some(flat_type) => write!(
                    f,
                    "{applicant} booked a {flat_type} flat that {project} does not offer"
                ),
                None => write!(f, "{applicant} booked {project} without a flat type"),
            },
            Self::Overbooked {
                project,
                flat_type,
                booked,
                total,
            } => write!(
                f,
                "{project} has {booked} {flat_type} bookings against {total} units"
            ),
            Self::RosterEntryNotOfficer { identity, project } => {
                write!(f, "{project} lists {identity} as officer but they are not one")
            }
            Self::RosterOverCapacity {
                project,
                officers,
                slots,
            } => write!(f, "{project} lists {officers} officers for {slots} slots"),
            Self::RegistrationForUnknownProject { officer, project } => {
                write!(f, "{officer} is approved for unknown project {project}")
            }
            Self::OfficerMissingFromRoster { officer, project } => {
                write!(f, "{officer} is approved for {project} but missing from its roster")
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub summaries_updated: usize,
    pub inventory_adjusted: usize,
    pub registrations_repaired: usize,
    pub warnings: Vec<ConsistencyWarning>,
}

impl SyncReport {
    pub fn projects_dirty(&self) -> bool {
        self.inventory_adjusted > 0
    }

    pub fn registrations_dirty(&self) -> bool {
        self.registrations_repaired > 0
    }

    /// No repairs were needed and no drift was found.
    pub fn is_clean(&self) -> bool {
        self.summaries_updated == 0
            && self.inventory_adjusted == 0
            && self.registrations_repaired == 0
            && self.warnings.is_empty()
    }

    fn warn(&mut self, warning: ConsistencyWarning) {
        warn!(%warning, "consistency drift");
        self.warnings.push(warning);
    }
}

pub fn synchronize(dataset: &mut Dataset) -> SyncReport {
    let mut report = SyncReport::default();

    refresh_applicant_summaries(dataset, &mut report);
    reconcile_inventory(dataset, &mut report);
    repair_roster_registrations(dataset, &mut report);
    audit_approved_registrations(dataset, &mut report);

    info!(
        summaries_updated = report.summaries_updated,
        inventory_adjusted = report.inventory_adjusted,
        registrations_repaired = report.registrations_repaired,
        warnings = report.warnings.len(),
        "synchronization complete"
    );

    report
}

pub(crate) fn refresh_applicant_summaries(dataset: &mut Dataset, report: &mut SyncReport) {
    let applications = &dataset.applications;

    for user in dataset.users.values_mut() {
        if user.applicant_state().is_none() {
            continue;
        }

        let most_relevant = applications
            .values()
            .filter(|application| application.applicant == user.identity)
            .max_by_key(|application| (application.status().priority(), application.submitted_on));

        let summary = match most_relevant {
            Some(application) => ApplicantState {
                project: Some(application.project.clone()),
                status: Some(application.status()),
                booked_flat_type: match application.status() {
                    ApplicationStatus::Booked => application.flat_type,
                    _ => None,
                },
                submitted_on: Some(application.submitted_on),
            },
            None => ApplicantState::default(),
        };

        if user.replace_applicant_state(summary) {
            report.summaries_updated += 1;
        }
    }
}

fn reconcile_inventory(dataset: &mut Dataset, report: &mut SyncReport) {
    let mut booked: BTreeMap<(ProjectName, FlatType), u32> = BTreeMap::new();

    for application in dataset.applications.values() {
        if !application.holds_unit() {
            continue;
        }

        let Some(project) = dataset.projects.get(&application.project) else {
            report.warn(ConsistencyWarning::BookingForUnknownProject {
                applicant: application.applicant.clone(),
                project: application.project.clone(),
            });
            continue;
        };

        match application.flat_type {
            Some(flat_type) if project.offers(flat_type) => {
                *booked
                    .entry((project.name.clone(), flat_type))
                    .or_default() += 1;
            }
            flat_type => report.warn(ConsistencyWarning::BookingWithoutOfferedFlatType {
                applicant: application.applicant.clone(),
                project: application.project.clone(),
                flat_type,
            }),
        }
    }

    for project in dataset.projects.values_mut() {
        for (flat_type, inventory) in project.flats.iter_mut() {
            let count = booked
                .get(&(project.name.clone(), *flat_type))
                .copied()
                .unwrap_or(0);
            let total = inventory.total_units();

            if count > total {
                report.warn(ConsistencyWarning::Overbooked {
                    project: project.name.clone(),
                    flat_type: *flat_type,
                    booked: count,
                    total,
                });
            }

            let before = inventory.available_units();
            if inventory.reconcile(total, count) {
                info!(
                    project = %project.name,
                    flat_type = %flat_type,
                    before,
                    after = inventory.available_units(),
                    "available units reconciled"
                );
                report.inventory_adjusted += 1;
            }
        }
    }
}

fn repair_roster_registrations(dataset: &mut Dataset, report: &mut SyncReport) {
    for project in dataset.projects.values() {
        for identity in project.officers() {
            let is_officer = dataset
                .users
                .get(identity)
                .map(|user| user.role() == Role::Officer)
                .unwrap_or(false);
            if !is_officer {
                report.warn(ConsistencyWarning::RosterEntryNotOfficer {
                    identity: identity.clone(),
                    project: project.name.clone(),
                });
                continue;
            }

            let key = (identity.clone(), project.name.clone());
            match dataset.registrations.get_mut(&key) {
                Some(existing) => {
                    if existing.force_approved() {
                        info!(
                            officer = %identity,
                            project = %project.name,
                            "roster lists officer; registration upgraded to approved"
                        );
                        report.registrations_repaired += 1;
                    }
                }
                None => {
                    info!(
                        officer = %identity,
                        project = %project.name,
                        "roster lists officer without a registration; synthesizing approval"
                    );
                    dataset
                        .registrations
                        .insert(key, OfficerRegistration::synthesized(identity.clone(), project));
                    report.registrations_repaired += 1;
                }
            }
        }
    }
}

fn audit_approved_registrations(dataset: &Dataset, report: &mut SyncReport) {
    for project in dataset.projects.values() {
        if project.officers().len() > usize::from(project.officer_slots()) {
            report.warn(ConsistencyWarning::RosterOverCapacity {
                project: project.name.clone(),
                officers: project.officers().len(),
                slots: project.officer_slots(),
            });
        }
    }

    for registration in dataset.registrations.values() {
        if !registration.is_approved() {
            continue;
        }

        match dataset.projects.get(&registration.project) {
            None => report.warn(ConsistencyWarning::RegistrationForUnknownProject {
                officer: registration.officer.clone(),
                project: registration.project.clone(),
            }),
            Some(project) if !project.has_officer(&registration.officer) => {
                report.warn(ConsistencyWarning::OfficerMissingFromRoster {
                    officer: registration.officer.clone(),
                    project: registration.project.clone(),
                })
            }
            Some(_) => {}
        }
    }
}
