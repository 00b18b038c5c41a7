//! Persistence collaborators for the allocation desk.
//!
//! Every save is a whole-collection overwrite. Loads validate record by record and
//! skip what they cannot use, so only an unreadable source surfaces as a
//! [`StoreError`].

mod csv_store;
mod memory;
pub mod rows;

use std::path::PathBuf;

use crate::allocation::application::Application;
use crate::allocation::enquiry::Enquiry;
use crate::allocation::identity::User;
use crate::allocation::project::Project;
use crate::allocation::registration::OfficerRegistration;

pub use csv_store::CsvStore;
pub use memory::MemoryStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("failed to access {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid {dataset} data: {source}")]
    Csv {
        dataset: &'static str,
        #[source]
        source: csv::Error,
    },
    #[error("required dataset {} is missing", .0.display())]
    MissingDataset(PathBuf),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

pub trait AllocationStore: Send + Sync {
    fn load_users(&self) -> Result<Vec<User>, StoreError>;
    fn load_projects(&self) -> Result<Vec<Project>, StoreError>;
    fn load_applications(&self) -> Result<Vec<Application>, StoreError>;
    fn load_registrations(&self) -> Result<Vec<OfficerRegistration>, StoreError>;
    fn load_enquiries(&self) -> Result<Vec<Enquiry>, StoreError>;

    fn save_users(&self, users: &[User]) -> Result<(), StoreError>;
    fn save_projects(&self, projects: &[Project]) -> Result<(), StoreError>;
    fn save_applications(&self, applications: &[Application]) -> Result<(), StoreError>;
    fn save_registrations(&self, registrations: &[OfficerRegistration]) -> Result<(), StoreError>;
    fn save_enquiries(&self, enquiries: &[Enquiry]) -> Result<(), StoreError>;
}
