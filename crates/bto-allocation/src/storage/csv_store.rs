use std::fs::{self, File};
use std::io::{BufReader, BufWriter, ErrorKind};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::rows;
use super::{AllocationStore, StoreError};
use crate::allocation::application::Application;
use crate::allocation::enquiry::Enquiry;
use crate::allocation::identity::{Role, User};
use crate::allocation::project::Project;
use crate::allocation::registration::OfficerRegistration;

const APPLICANTS: &str = "applicants.csv";
const OFFICERS: &str = "officers.csv";
const MANAGERS: &str = "managers.csv";
const PROJECTS: &str = "projects.csv";
const FLAT_TYPES: &str = "flat_types.csv";
const APPLICATIONS: &str = "applications.csv";
const REGISTRATIONS: &str = "registrations.csv";
const ENQUIRIES: &str = "enquiries.csv";

/// One CSV file per collection inside a data directory.
///
/// User and project files must exist; the others read as empty when absent.
#[derive(Debug, Clone)]
pub struct CsvStore {
    data_dir: PathBuf,
}

impl CsvStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    fn path(&self, file: &str) -> PathBuf {
        self.data_dir.join(file)
    }

    fn open_required(&self, file: &str) -> Result<BufReader<File>, StoreError> {
        let path = self.path(file);
        match File::open(&path) {
            Ok(handle) => Ok(BufReader::new(handle)),
            Err(err) if err.kind() == ErrorKind::NotFound => Err(StoreError::MissingDataset(path)),
            Err(source) => Err(StoreError::Io { path, source }),
        }
    }

    fn open_optional(&self, file: &str) -> Result<Option<BufReader<File>>, StoreError> {
        match self.open_required(file) {
            Ok(reader) => Ok(Some(reader)),
            Err(StoreError::MissingDataset(path)) => {
                debug!(path = %path.display(), "optional dataset absent; treating as empty");
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    fn create(&self, file: &str) -> Result<BufWriter<File>, StoreError> {
        fs::create_dir_all(&self.data_dir).map_err(|source| StoreError::Io {
            path: self.data_dir.clone(),
            source,
        })?;
        let path = self.path(file);
        let handle = File::create(&path).map_err(|source| StoreError::Io {
            path: path.clone(),
            source,
        })?;
        debug!(path = %path.display(), "rewriting dataset");
        Ok(BufWriter::new(handle))
    }
}

impl AllocationStore for CsvStore {
    fn load_users(&self) -> Result<Vec<User>, StoreError> {
        let mut users = Vec::new();
        for (file, role) in [
            (APPLICANTS, Role::Applicant),
            (OFFICERS, Role::Officer),
            (MANAGERS, Role::Manager),
        ] {
            users.extend(rows::read_users(self.open_required(file)?, role)?);
        }
        Ok(users)
    }

    fn load_projects(&self) -> Result<Vec<Project>, StoreError> {
        let flats = rows::read_flat_types(self.open_required(FLAT_TYPES)?)?;
        rows::read_projects(self.open_required(PROJECTS)?, &flats)
    }

    fn load_applications(&self) -> Result<Vec<Application>, StoreError> {
        match self.open_optional(APPLICATIONS)? {
            Some(reader) => rows::read_applications(reader),
            None => Ok(Vec::new()),
        }
    }

    fn load_registrations(&self) -> Result<Vec<OfficerRegistration>, StoreError> {
        match self.open_optional(REGISTRATIONS)? {
            Some(reader) => rows::read_registrations(reader),
            None => Ok(Vec::new()),
        }
    }

    fn load_enquiries(&self) -> Result<Vec<Enquiry>, StoreError> {
        match self.open_optional(ENQUIRIES)? {
            Some(reader) => rows::read_enquiries(reader),
            None => Ok(Vec::new()),
        }
    }

    fn save_users(&self, users: &[User]) -> Result<(), StoreError> {
        for (file, role) in [
            (APPLICANTS, Role::Applicant),
            (OFFICERS, Role::Officer),
            (MANAGERS, Role::Manager),
        ] {
            let subset: Vec<User> = users
                .iter()
                .filter(|user| user.role() == role)
                .cloned()
                .collect();
            rows::write_users(self.create(file)?, &subset)?;
        }
        info!(users = users.len(), "users saved");
        Ok(())
    }

    fn save_projects(&self, projects: &[Project]) -> Result<(), StoreError> {
        rows::write_projects(self.create(PROJECTS)?, projects)?;
        rows::write_flat_types(self.create(FLAT_TYPES)?, projects)?;
        info!(projects = projects.len(), "projects saved");
        Ok(())
    }

    fn save_applications(&self, applications: &[Application]) -> Result<(), StoreError> {
        rows::write_applications(self.create(APPLICATIONS)?, applications)?;
        info!(applications = applications.len(), "applications saved");
        Ok(())
    }

    fn save_registrations(&self, registrations: &[OfficerRegistration]) -> Result<(), StoreError> {
        rows::write_registrations(self.create(REGISTRATIONS)?, registrations)?;
        info!(registrations = registrations.len(), "registrations saved");
        Ok(())
    }

    fn save_enquiries(&self, enquiries: &[Enquiry]) -> Result<(), StoreError> {
        rows::write_enquiries(self.create(ENQUIRIES)?, enquiries)?;
        info!(enquiries = enquiries.len(), "enquiries saved");
        Ok(())
    }
}
