use std::sync::{Mutex, MutexGuard};

use super::{AllocationStore, StoreError};
use crate::allocation::application::Application;
use crate::allocation::enquiry::Enquiry;
use crate::allocation::identity::User;
use crate::allocation::project::Project;
use crate::allocation::registration::OfficerRegistration;

#[derive(Debug, Default)]
struct Collections {
    users: Vec<User>,
    projects: Vec<Project>,
    applications: Vec<Application>,
    registrations: Vec<OfficerRegistration>,
    enquiries: Vec<Enquiry>,
}

/// In-process store holding each collection as the last saved snapshot.
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: Mutex<Collections>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records(
        users: Vec<User>,
        projects: Vec<Project>,
        applications: Vec<Application>,
        registrations: Vec<OfficerRegistration>,
        enquiries: Vec<Enquiry>,
    ) -> Self {
        Self {
            collections: Mutex::new(Collections {
                users,
                projects,
                applications,
                registrations,
                enquiries,
            }),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Collections>, StoreError> {
        self.collections
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".to_string()))
    }
}

impl AllocationStore for MemoryStore {
    fn load_users(&self) -> Result<Vec<User>, StoreError> {
        Ok(self.lock()?.users.clone())
    }

    fn load_projects(&self) -> Result<Vec<Project>, StoreError> {
        Ok(self.lock()?.projects.clone())
    }

    fn load_applications(&self) -> Result<Vec<Application>, StoreError> {
        Ok(self.lock()?.applications.clone())
    }

    fn load_registrations(&self) -> Result<Vec<OfficerRegistration>, StoreError> {
        Ok(self.lock()?.registrations.clone())
    }

    fn load_enquiries(&self) -> Result<Vec<Enquiry>, StoreError> {
        Ok(self.lock()?.enquiries.clone())
    }

    fn save_users(&self, users: &[User]) -> Result<(), StoreError> {
        self.lock()?.users = users.to_vec();
        Ok(())
    }

    fn save_projects(&self, projects: &[Project]) -> Result<(), StoreError> {
        self.lock()?.projects = projects.to_vec();
        Ok(())
    }

    fn save_applications(&self, applications: &[Application]) -> Result<(), StoreError> {
        self.lock()?.applications = applications.to_vec();
        Ok(())
    }

    fn save_registrations(&self, registrations: &[OfficerRegistration]) -> Result<(), StoreError> {
        self.lock()?.registrations = registrations.to_vec();
        Ok(())
    }

    fn save_enquiries(&self, enquiries: &[Enquiry]) -> Result<(), StoreError> {
        self.lock()?.enquiries = enquiries.to_vec();
        Ok(())
    }
}
