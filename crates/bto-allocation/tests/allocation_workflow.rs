use std::collections::BTreeMap;
use std::sync::Arc;

use bto_allocation::allocation::{
    AllocationDesk, ApplicationStatus, ApplicationWindow, BookingFilter, Decision, DeskError,
    DeskPolicy, Denial, FlatInventory, FlatType, Identity, MaritalStatus, Project, ProjectFilter,
    ProjectName, Role, User,
};
use bto_allocation::storage::{AllocationStore, MemoryStore};
use chrono::NaiveDate;

const APPLICANT: &str = "T7654321B";
const OFFICER: &str = "T2109876H";
const MANAGER: &str = "T8765432F";

fn day(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
}

fn id(raw: &str) -> Identity {
    Identity::parse(raw).expect("valid identity")
}

fn skyline() -> ProjectName {
    ProjectName::new("Skyline Terraces").expect("valid project name")
}

fn seeded_store() -> Arc<MemoryStore> {
    let users = vec![
        User::new(id(APPLICANT), "Sarah", 40, MaritalStatus::Married, "secret", Role::Applicant),
        User::new(id(OFFICER), "Daniel", 36, MaritalStatus::Single, "secret", Role::Officer),
        User::new(id(MANAGER), "Michael", 36, MaritalStatus::Single, "secret", Role::Manager),
    ];
    let flats = BTreeMap::from([
        (FlatType::TwoRoom, FlatInventory::new(1, 200_000)),
        (FlatType::ThreeRoom, FlatInventory::new(1, 310_000)),
    ]);
    let mut project = Project::new(
        skyline(),
        "Punggol",
        flats,
        ApplicationWindow::new(day(2025, 5, 1), day(2025, 5, 31)).expect("valid window"),
        id(MANAGER),
        2,
    )
    .expect("valid project")
    .with_roster(vec![id(OFFICER)]);
    project.visible = true;

    Arc::new(MemoryStore::from_records(
        users,
        vec![project],
        Vec::new(),
        Vec::new(),
        Vec::new(),
    ))
}

#[test]
fn application_moves_from_submission_to_booking_and_back() {
    let store = seeded_store();
    let (mut desk, report) =
        AllocationDesk::open(store.clone(), DeskPolicy::default()).expect("desk opens");
    assert_eq!(report.registrations_repaired, 1, "roster implies an approval");

    let applicant = desk.login(APPLICANT, "secret").expect("applicant logs in");
    assert_eq!(applicant.role(), Role::Applicant);

    let listed = desk
        .projects_for(&id(APPLICANT), &ProjectFilter::default())
        .expect("listing works");
    assert_eq!(listed[0].eligible_flat_types, vec![FlatType::TwoRoom, FlatType::ThreeRoom]);

    desk.apply(&id(APPLICANT), &skyline(), FlatType::ThreeRoom, day(2025, 5, 3))
        .expect("application accepted");
    desk.decide_application(&id(MANAGER), &id(APPLICANT), &skyline(), Decision::Approve)
        .expect("manager approves");

    let receipt = desk
        .book(&id(OFFICER), &id(APPLICANT), &skyline(), day(2025, 5, 10))
        .expect("officer books");
    assert_eq!(receipt.price, 310_000);
    assert_eq!(receipt.neighborhood, "Punggol");
    assert_eq!(receipt.officer, id(OFFICER));

    let summary = desk
        .dataset()
        .user(&id(APPLICANT))
        .and_then(User::applicant_state)
        .cloned()
        .expect("applicants carry a summary");
    assert_eq!(summary.status, Some(ApplicationStatus::Booked));
    assert_eq!(summary.booked_flat_type, Some(FlatType::ThreeRoom));

    let report = desk
        .booking_report(&id(MANAGER), &BookingFilter::default())
        .expect("report builds");
    assert_eq!(report.len(), 1);
    assert_eq!(report[0].flat_type, FlatType::ThreeRoom);

    desk.request_withdrawal(&id(APPLICANT), &skyline())
        .expect("withdrawal requested");
    let withdrawn = desk
        .decide_withdrawal(&id(MANAGER), &id(APPLICANT), &skyline(), Decision::Approve)
        .expect("withdrawal approved");
    assert_eq!(withdrawn.status(), ApplicationStatus::Unsuccessful);

    let stored = store.load_projects().expect("projects stored");
    let three_room = stored[0].inventory(FlatType::ThreeRoom).expect("offered");
    assert_eq!(three_room.available_units(), 1);
    assert!(desk.synchronize().expect("sync runs").warnings.is_empty());
}

#[test]
fn wrong_credentials_are_refused() {
    let (mut desk, _) =
        AllocationDesk::open(seeded_store(), DeskPolicy::default()).expect("desk opens");

    for (identity, credential) in [(APPLICANT, "wrong"), ("S0000000Z", "secret"), ("nonsense", "secret")] {
        match desk.login(identity, credential) {
            Err(DeskError::Denied(Denial::InvalidCredentials)) => {}
            other => panic!("expected invalid credentials, got {other:?}"),
        }
    }
}
