use std::collections::BTreeMap;
use std::fmt::Debug;
use std::sync::Arc;

use chrono::NaiveDate;

use crate::allocation::application::{Application, ApplicationStatus};
use crate::allocation::desk::{AllocationDesk, DeskError};
use crate::allocation::enquiry::Enquiry;
use crate::allocation::identity::{Identity, MaritalStatus, Role, User};
use crate::allocation::inventory::{FlatInventory, FlatType};
use crate::allocation::policy::{Denial, DeskPolicy};
use crate::allocation::project::{ApplicationWindow, Project, ProjectName};
use crate::allocation::registration::{OfficerRegistration, RegistrationStatus};
use crate::storage::{AllocationStore, MemoryStore, StoreError};

pub(super) const JOHN: &str = "S1234567A";
pub(super) const SARAH: &str = "T7654321B";
pub(super) const YOUNG: &str = "S1111111D";
pub(super) const DANIEL: &str = "T2109876H";
pub(super) const EMILY: &str = "S6543210I";
pub(super) const MICHAEL: &str = "T8765432F";
pub(super) const JESSICA: &str = "S5678901G";

pub(super) const ACACIA: &str = "Acacia Breeze";
pub(super) const BIRCH: &str = "Birch Grove";

pub(super) fn day(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
}

pub(super) fn id(raw: &str) -> Identity {
    Identity::parse(raw).expect("valid identity")
}

pub(super) fn name(raw: &str) -> ProjectName {
    ProjectName::new(raw).expect("valid project name")
}

pub(super) fn user(identity: &str, age: u8, marital_status: MaritalStatus, role: Role) -> User {
    User::new(id(identity), identity, age, marital_status, "password", role)
}

pub(super) fn users() -> Vec<User> {
    vec![
        user(JOHN, 35, MaritalStatus::Single, Role::Applicant),
        user(SARAH, 40, MaritalStatus::Married, Role::Applicant),
        user(YOUNG, 30, MaritalStatus::Single, Role::Applicant),
        user(DANIEL, 36, MaritalStatus::Single, Role::Officer),
        user(EMILY, 28, MaritalStatus::Married, Role::Officer),
        user(MICHAEL, 36, MaritalStatus::Single, Role::Manager),
        user(JESSICA, 26, MaritalStatus::Married, Role::Manager),
    ]
}

pub(super) fn project(
    raw_name: &str,
    manager: &str,
    window: (NaiveDate, NaiveDate),
    flats: &[(FlatType, u32)],
    slots: u8,
) -> Project {
    let inventory: BTreeMap<FlatType, FlatInventory> = flats
        .iter()
        .map(|(flat_type, units)| (*flat_type, FlatInventory::new(*units, 100_000)))
        .collect();
    let mut project = Project::new(
        name(raw_name),
        "Yishun",
        inventory,
        ApplicationWindow::new(window.0, window.1).expect("valid window"),
        id(manager),
        slots,
    )
    .expect("valid project");
    project.visible = true;
    project
}

/// Acacia: both flat types, open Feb 15 to Mar 20, Michael, 3 slots.
/// Birch: 3-Room only, open Apr 1 to Apr 30, Jessica, 2 slots.
pub(super) fn projects() -> Vec<Project> {
    vec![
        project(
            ACACIA,
            MICHAEL,
            (day(2025, 2, 15), day(2025, 3, 20)),
            &[(FlatType::TwoRoom, 2), (FlatType::ThreeRoom, 3)],
            3,
        ),
        project(
            BIRCH,
            JESSICA,
            (day(2025, 4, 1), day(2025, 4, 30)),
            &[(FlatType::ThreeRoom, 4)],
            2,
        ),
    ]
}

pub(super) fn application(
    applicant: &str,
    project: &str,
    flat_type: FlatType,
    status: ApplicationStatus,
) -> Application {
    let prior = (status == ApplicationStatus::PendingWithdrawal).then_some(ApplicationStatus::Pending);
    Application::restore(
        id(applicant),
        name(project),
        Some(flat_type),
        day(2025, 2, 20),
        status,
        prior,
    )
    .expect("valid application")
}

pub(super) fn registration(officer: &str, project: &str, status: RegistrationStatus) -> OfficerRegistration {
    OfficerRegistration::restore(id(officer), name(project), day(2025, 2, 1), status)
}

pub(super) struct Fixture {
    pub(super) users: Vec<User>,
    pub(super) projects: Vec<Project>,
    pub(super) applications: Vec<Application>,
    pub(super) registrations: Vec<OfficerRegistration>,
    pub(super) enquiries: Vec<Enquiry>,
    pub(super) policy: DeskPolicy,
}

impl Default for Fixture {
    fn default() -> Self {
        Self {
            users: users(),
            projects: projects(),
            applications: Vec::new(),
            registrations: Vec::new(),
            enquiries: Vec::new(),
            policy: DeskPolicy::default(),
        }
    }
}

impl Fixture {
    pub(super) fn open(self) -> (AllocationDesk<MemoryStore>, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::from_records(
            self.users,
            self.projects,
            self.applications,
            self.registrations,
            self.enquiries,
        ));
        let (desk, _) =
            AllocationDesk::open(store.clone(), self.policy).expect("desk opens over memory store");
        (desk, store)
    }
}

pub(super) fn desk() -> AllocationDesk<MemoryStore> {
    Fixture::default().open().0
}

/// Unwraps the denial carried by a refused desk operation.
pub(super) fn denial<T: Debug>(result: Result<T, DeskError>) -> Denial {
    match result {
        Err(DeskError::Denied(denial)) => denial,
        other => panic!("expected a denial, got {other:?}"),
    }
}

/// Memory store whose non-critical collections cannot be read.
#[derive(Default)]
pub(super) struct DamagedStore {
    pub(super) inner: MemoryStore,
}

impl AllocationStore for DamagedStore {
    fn load_users(&self) -> Result<Vec<User>, StoreError> {
        self.inner.load_users()
    }

    fn load_projects(&self) -> Result<Vec<Project>, StoreError> {
        self.inner.load_projects()
    }

    fn load_applications(&self) -> Result<Vec<Application>, StoreError> {
        Err(StoreError::Unavailable("applications unreadable".to_string()))
    }

    fn load_registrations(&self) -> Result<Vec<OfficerRegistration>, StoreError> {
        Err(StoreError::Unavailable("registrations unreadable".to_string()))
    }

    fn load_enquiries(&self) -> Result<Vec<Enquiry>, StoreError> {
        Err(StoreError::Unavailable("enquiries unreadable".to_string()))
    }

    fn save_users(&self, users: &[User]) -> Result<(), StoreError> {
        self.inner.save_users(users)
    }

    fn save_projects(&self, projects: &[Project]) -> Result<(), StoreError> {
        self.inner.save_projects(projects)
    }

    fn save_applications(&self, applications: &[Application]) -> Result<(), StoreError> {
        self.inner.save_applications(applications)
    }

    fn save_registrations(&self, registrations: &[OfficerRegistration]) -> Result<(), StoreError> {
        self.inner.save_registrations(registrations)
    }

    fn save_enquiries(&self, enquiries: &[Enquiry]) -> Result<(), StoreError> {
        self.inner.save_enquiries(enquiries)
    }
}
