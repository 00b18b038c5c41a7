use std::collections::BTreeMap;

use super::common::*;
use crate::allocation::application::ApplicationStatus;
use crate::allocation::desk::{FlatDraft, ProjectDraft, ProjectFilter, ProjectUpdate};
use crate::allocation::enquiry::{Enquiry, EnquiryId};
use crate::allocation::inventory::FlatType;
use crate::allocation::policy::{DeletionPolicy, Denial, DeskPolicy};
use crate::allocation::registration::RegistrationStatus;
use crate::allocation::validation::ValidationError;
use crate::storage::AllocationStore;

fn draft(name: &str, open: (u32, u32), close: (u32, u32)) -> ProjectDraft {
    ProjectDraft {
        name: name.to_string(),
        neighborhood: " Tampines ".to_string(),
        flats: vec![
            FlatDraft {
                flat_type: FlatType::TwoRoom,
                units: 5,
                price: 180_000,
            },
            FlatDraft {
                flat_type: FlatType::ThreeRoom,
                units: 8,
                price: 290_000,
            },
        ],
        open: day(2025, open.0, open.1),
        close: day(2025, close.0, close.1),
        officer_slots: 4,
        visible: false,
    }
}

fn names(views: &[crate::allocation::desk::ProjectView]) -> Vec<String> {
    views.iter().map(|view| view.name.to_string()).collect()
}

#[test]
fn listing_applies_visibility_then_filters() {
    let mut projects = projects();
    projects[1].visible = false;
    let (desk, _) = Fixture {
        projects,
        ..Fixture::default()
    }
    .open();

    let everything = ProjectFilter::default();
    let seen = desk.projects_for(&id(JOHN), &everything).unwrap();
    assert_eq!(names(&seen), vec![ACACIA]);
    assert_eq!(seen[0].eligible_flat_types, vec![FlatType::TwoRoom]);
    assert_eq!(seen[0].flats.len(), 2);

    let all = desk.projects_for(&id(MICHAEL), &everything).unwrap();
    assert_eq!(names(&all), vec![ACACIA, BIRCH]);
    assert!(all[1].eligible_flat_types.is_empty());

    let open_in_april = ProjectFilter {
        open_on: Some(day(2025, 4, 10)),
        ..ProjectFilter::default()
    };
    assert_eq!(
        names(&desk.projects_for(&id(MICHAEL), &open_in_april).unwrap()),
        vec![BIRCH]
    );

    let two_room_in_yishun = ProjectFilter {
        neighborhood: Some("yishun".to_string()),
        flat_type: Some(FlatType::TwoRoom),
        ..ProjectFilter::default()
    };
    assert_eq!(
        names(&desk.projects_for(&id(JESSICA), &two_room_in_yishun).unwrap()),
        vec![ACACIA]
    );

    let elsewhere = ProjectFilter {
        neighborhood: Some("Tampines".to_string()),
        ..ProjectFilter::default()
    };
    assert!(desk.projects_for(&id(JESSICA), &elsewhere).unwrap().is_empty());
}

#[test]
fn managed_only_is_for_managers() {
    let desk = desk();
    let mine = ProjectFilter {
        managed_only: true,
        ..ProjectFilter::default()
    };

    assert_eq!(
        names(&desk.projects_for(&id(JESSICA), &mine).unwrap()),
        vec![BIRCH]
    );
    match denial(desk.projects_for(&id(DANIEL), &mine)) {
        Denial::RoleNotPermitted { .. } => {}
        other => panic!("expected role denial, got {other:?}"),
    }
}

#[test]
fn create_project_persists_a_hidden_project() {
    let (mut desk, store) = Fixture::default().open();

    let created = desk
        .create_project(&id(MICHAEL), draft("Cedar Heights", (5, 1), (5, 31)))
        .unwrap();

    assert_eq!(created.neighborhood, "Tampines");
    assert!(!created.visible);
    assert!(created.officers().is_empty());
    assert_eq!(
        created.inventory(FlatType::ThreeRoom).unwrap().available_units(),
        8
    );
    let stored = store.load_projects().unwrap();
    assert_eq!(stored.len(), 3);
    assert!(stored.iter().any(|project| project.name == name("Cedar Heights")));

    let john_sees = desk.projects_for(&id(JOHN), &ProjectFilter::default()).unwrap();
    assert!(!names(&john_sees).contains(&"Cedar Heights".to_string()));
}

#[test]
fn create_project_rejects_conflicts_and_bad_input() {
    let mut desk = desk();

    match denial(desk.create_project(&id(MICHAEL), draft("acacia breeze", (6, 1), (6, 30)))) {
        Denial::DuplicateProject(existing) => assert_eq!(existing, name(ACACIA)),
        other => panic!("expected duplicate, got {other:?}"),
    }
    assert_eq!(
        denial(desk.create_project(&id(MICHAEL), draft("Cedar Heights", (3, 1), (4, 10)))),
        Denial::ManagerWindowConflict(name(ACACIA))
    );
    desk.create_project(&id(JESSICA), draft("Cedar Heights", (3, 1), (3, 10)))
        .expect("another manager's window does not matter");

    match denial(desk.create_project(&id(MICHAEL), draft("Dahlia", (7, 31), (7, 1)))) {
        Denial::Invalid(ValidationError::InvertedWindow { .. }) => {}
        other => panic!("expected inverted window, got {other:?}"),
    }
    let mut crowded = draft("Dahlia", (7, 1), (7, 31));
    crowded.officer_slots = 11;
    match denial(desk.create_project(&id(MICHAEL), crowded)) {
        Denial::Invalid(ValidationError::OfficerCapacity { .. }) => {}
        other => panic!("expected capacity error, got {other:?}"),
    }
    match denial(desk.create_project(&id(DANIEL), draft("Dahlia", (7, 1), (7, 31)))) {
        Denial::RoleNotPermitted { .. } => {}
        other => panic!("expected role denial, got {other:?}"),
    }
}

#[test]
fn create_project_refuses_a_flat_type_listed_twice() {
    let mut desk = desk();
    let mut doubled = draft("Dahlia", (7, 1), (7, 31));
    doubled.flats.push(FlatDraft {
        flat_type: FlatType::TwoRoom,
        units: 1,
        price: 1,
    });

    assert_eq!(
        denial(desk.create_project(&id(MICHAEL), doubled)),
        Denial::Invalid(ValidationError::DuplicateFlatType(FlatType::TwoRoom))
    );
    assert!(desk.dataset().project(&name("Dahlia")).is_none());
}

#[test]
fn update_project_edits_inventory_around_bookings() {
    let (mut desk, store) = Fixture {
        applications: vec![
            application(JOHN, ACACIA, FlatType::TwoRoom, ApplicationStatus::Booked),
            application(SARAH, ACACIA, FlatType::TwoRoom, ApplicationStatus::Booked),
        ],
        ..Fixture::default()
    }
    .open();

    let updated = desk
        .update_project(
            &id(MICHAEL),
            &name(ACACIA),
            ProjectUpdate {
                close: Some(day(2025, 3, 31)),
                units: BTreeMap::from([(FlatType::TwoRoom, 4)]),
                prices: BTreeMap::from([(FlatType::ThreeRoom, 350_000)]),
                ..ProjectUpdate::default()
            },
        )
        .unwrap();

    assert_eq!(updated.window.close(), day(2025, 3, 31));
    let two_room = updated.inventory(FlatType::TwoRoom).unwrap();
    assert_eq!((two_room.total_units(), two_room.available_units()), (4, 2));
    assert_eq!(updated.inventory(FlatType::ThreeRoom).unwrap().price, 350_000);
    assert_eq!(store.load_projects().unwrap()[0], updated);
}

#[test]
fn rejected_updates_change_nothing() {
    let mut projects = projects();
    projects[0] = projects[0].clone().with_roster(vec![id(DANIEL), id(EMILY)]);
    let (mut desk, _) = Fixture {
        projects,
        applications: vec![
            application(JOHN, ACACIA, FlatType::TwoRoom, ApplicationStatus::Booked),
            application(SARAH, ACACIA, FlatType::TwoRoom, ApplicationStatus::Booked),
        ],
        ..Fixture::default()
    }
    .open();
    let before = desk.dataset().project(&name(ACACIA)).unwrap().clone();

    assert_eq!(
        denial(desk.update_project(
            &id(MICHAEL),
            &name(ACACIA),
            ProjectUpdate {
                neighborhood: Some("Tampines".to_string()),
                units: BTreeMap::from([(FlatType::TwoRoom, 1)]),
                ..ProjectUpdate::default()
            },
        )),
        Denial::UnitsBelowBooked {
            flat_type: FlatType::TwoRoom,
            requested: 1,
            booked: 2,
        }
    );
    assert_eq!(
        denial(desk.update_project(
            &id(MICHAEL),
            &name(ACACIA),
            ProjectUpdate {
                officer_slots: Some(1),
                ..ProjectUpdate::default()
            },
        )),
        Denial::SlotsBelowApproved {
            requested: 1,
            approved: 2,
        }
    );
    assert_eq!(
        denial(desk.update_project(
            &id(JESSICA),
            &name(BIRCH),
            ProjectUpdate {
                prices: BTreeMap::from([(FlatType::TwoRoom, 1)]),
                ..ProjectUpdate::default()
            },
        )),
        Denial::FlatTypeNotOffered {
            project: name(BIRCH),
            flat_type: FlatType::TwoRoom,
        }
    );
    assert_eq!(desk.dataset().project(&name(ACACIA)).unwrap(), &before);
}

#[test]
fn window_edits_respect_the_managers_other_projects() {
    let mut projects = projects();
    projects.push(project(
        "Cedar Heights",
        MICHAEL,
        (day(2025, 5, 1), day(2025, 5, 31)),
        &[(FlatType::ThreeRoom, 2)],
        1,
    ));
    let (mut desk, _) = Fixture {
        projects,
        ..Fixture::default()
    }
    .open();

    assert_eq!(
        denial(desk.update_project(
            &id(MICHAEL),
            &name(ACACIA),
            ProjectUpdate {
                close: Some(day(2025, 5, 2)),
                ..ProjectUpdate::default()
            },
        )),
        Denial::ManagerWindowConflict(name("Cedar Heights"))
    );
    desk.update_project(
        &id(MICHAEL),
        &name(ACACIA),
        ProjectUpdate {
            close: Some(day(2025, 4, 30)),
            ..ProjectUpdate::default()
        },
    )
    .expect("its own window is not a conflict");
}

#[test]
fn visibility_toggle_is_owner_only_and_persisted() {
    let (mut desk, store) = Fixture::default().open();

    assert_eq!(
        denial(desk.set_visibility(&id(JESSICA), &name(ACACIA), false)),
        Denial::NotProjectManager(name(ACACIA))
    );

    let hidden = desk.set_visibility(&id(MICHAEL), &name(ACACIA), false).unwrap();
    assert!(!hidden.visible);
    assert!(!store.load_projects().unwrap()[0].visible);
    assert_eq!(
        names(&desk.projects_for(&id(JOHN), &ProjectFilter::default()).unwrap()),
        vec![BIRCH]
    );
}

fn referenced_acacia() -> Fixture {
    Fixture {
        applications: vec![application(
            JOHN,
            ACACIA,
            FlatType::TwoRoom,
            ApplicationStatus::Booked,
        )],
        registrations: vec![registration(EMILY, ACACIA, RegistrationStatus::Pending)],
        enquiries: vec![Enquiry {
            id: EnquiryId(1),
            author: id(SARAH),
            project: "acacia breeze".to_string(),
            text: "Pets allowed?".to_string(),
            submitted_on: day(2025, 2, 20),
            reply: None,
        }],
        ..Fixture::default()
    }
}

#[test]
fn blocking_policy_keeps_referenced_projects() {
    let (mut desk, store) = referenced_acacia().open();

    assert_eq!(
        denial(desk.delete_project(&id(MICHAEL), &name(ACACIA))),
        Denial::ProjectReferenced {
            project: name(ACACIA),
            applications: 1,
            registrations: 1,
            enquiries: 1,
        }
    );
    assert!(desk.dataset().project(&name(ACACIA)).is_some());
    assert_eq!(store.load_applications().unwrap().len(), 1);

    let removed = desk.delete_project(&id(JESSICA), &name(BIRCH)).unwrap();
    assert_eq!(removed.applications_removed, 0);
    assert_eq!(store.load_projects().unwrap().len(), 1);
}

#[test]
fn cascading_policy_removes_every_reference() {
    let (mut desk, store) = Fixture {
        policy: DeskPolicy {
            deletion: DeletionPolicy::Cascade,
            ..DeskPolicy::default()
        },
        ..referenced_acacia()
    }
    .open();

    let outcome = desk.delete_project(&id(MICHAEL), &name(ACACIA)).unwrap();

    assert_eq!(outcome.project, name(ACACIA));
    assert_eq!(
        (
            outcome.applications_removed,
            outcome.registrations_removed,
            outcome.enquiries_removed
        ),
        (1, 1, 1)
    );
    assert!(store.load_applications().unwrap().is_empty());
    assert!(store.load_registrations().unwrap().is_empty());
    assert!(store.load_enquiries().unwrap().is_empty());
    assert_eq!(names_of(&store.load_projects().unwrap()), vec![BIRCH]);

    let john = desk.dataset().user(&id(JOHN)).unwrap();
    assert!(john.applicant_state().map_or(true, |state| state.is_empty()));
}

fn names_of(projects: &[crate::allocation::project::Project]) -> Vec<String> {
    projects.iter().map(|project| project.name.to_string()).collect()
}
