//! CSV layouts for every collection and their conversion to domain records.
//!
//! Readers take any [`Read`] and writers any [`Write`], so the same code serves the
//! data directory and in-memory buffers. A row that fails validation is logged and
//! skipped; only an I/O failure aborts a read.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::io::{Read, Write};

use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::{info, warn};

use super::StoreError;
use crate::allocation::application::{Application, ApplicationStatus};
use crate::allocation::enquiry::{Enquiry, EnquiryId, EnquiryReply};
use crate::allocation::identity::{Identity, MaritalStatus, Role, User};
use crate::allocation::inventory::{FlatInventory, FlatType};
use crate::allocation::project::{validate_slots, ApplicationWindow, Project, ProjectName};
use crate::allocation::registration::{OfficerRegistration, RegistrationStatus};
use crate::allocation::validation::ValidationError;

const DATE_FORMAT: &str = "%Y-%m-%d";
const ROSTER_SEPARATOR: &str = ";";

/// Per-project inventory read from `flat_types.csv`, joined onto projects afterwards.
pub type FlatTable = BTreeMap<ProjectName, BTreeMap<FlatType, FlatInventory>>;

#[derive(Debug, Serialize, Deserialize)]
struct UserRow {
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "NRIC")]
    nric: String,
    #[serde(rename = "Age")]
    age: String,
    #[serde(rename = "Marital Status")]
    marital_status: String,
    #[serde(rename = "Password")]
    password: String,
}

impl UserRow {
    fn into_user(self, role: Role) -> Result<User, ValidationError> {
        let identity = Identity::parse(&self.nric)?;
        let name = required("name", &self.name)?;
        let age = parse_integer("age", &self.age)?;
        if age < 0 {
            return Err(ValidationError::NegativeCount {
                field: "age",
                value: age,
            });
        }
        let age = u8::try_from(age).map_err(|_| ValidationError::UnknownValue {
            field: "age",
            value: self.age.clone(),
        })?;
        let marital_status = MaritalStatus::parse(&self.marital_status)?;
        let password = required("password", &self.password)?;

        Ok(User::new(identity, name, age, marital_status, password, role))
    }

    fn from_user(user: &User) -> Self {
        Self {
            name: user.name.clone(),
            nric: user.identity.to_string(),
            age: user.age.to_string(),
            marital_status: user.marital_status.label().to_string(),
            password: user.credential().to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ProjectRow {
    #[serde(rename = "Project Name")]
    name: String,
    #[serde(rename = "Neighborhood")]
    neighborhood: String,
    #[serde(rename = "Opening Date")]
    opening_date: String,
    #[serde(rename = "Closing Date")]
    closing_date: String,
    #[serde(rename = "Manager")]
    manager: String,
    #[serde(rename = "Officer Slot")]
    officer_slots: String,
    #[serde(rename = "Officers", default, deserialize_with = "empty_string_as_none")]
    officers: Option<String>,
    #[serde(rename = "Visible", default, deserialize_with = "empty_string_as_none")]
    visible: Option<String>,
}

impl ProjectRow {
    fn into_project(self, flats: &FlatTable) -> Result<Project, ValidationError> {
        let name = ProjectName::new(&self.name)?;
        let neighborhood = required("neighborhood", &self.neighborhood)?;
        let window = ApplicationWindow::new(
            parse_date("opening date", &self.opening_date)?,
            parse_date("closing date", &self.closing_date)?,
        )?;
        let manager = Identity::parse(&self.manager)?;
        let slots = validate_slots(parse_integer("officer slots", &self.officer_slots)?)?;
        let inventory = flats.get(&name).cloned().unwrap_or_default();
        let roster = parse_roster(&name, self.officers.as_deref());
        let visible = parse_flag(&name, self.visible.as_deref());

        let mut project =
            Project::new(name, neighborhood, inventory, window, manager, slots)?.with_roster(roster);
        project.visible = visible;
        Ok(project)
    }

    fn from_project(project: &Project) -> Self {
        let officers: Vec<&str> = project.officers().iter().map(Identity::as_str).collect();
        Self {
            name: project.name.to_string(),
            neighborhood: project.neighborhood.clone(),
            opening_date: project.window.open().format(DATE_FORMAT).to_string(),
            closing_date: project.window.close().format(DATE_FORMAT).to_string(),
            manager: project.manager.to_string(),
            officer_slots: project.officer_slots().to_string(),
            officers: (!officers.is_empty()).then(|| officers.join(ROSTER_SEPARATOR)),
            visible: Some(project.visible.to_string()),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct FlatRow {
    #[serde(rename = "Project Name")]
    project: String,
    #[serde(rename = "Flat Type")]
    flat_type: String,
    #[serde(rename = "Total Units")]
    total_units: String,
    #[serde(
        rename = "Available Units",
        default,
        deserialize_with = "empty_string_as_none"
    )]
    available_units: Option<String>,
    #[serde(rename = "Price")]
    price: String,
}

impl FlatRow {
    fn into_entry(self) -> Result<(ProjectName, FlatType, FlatInventory), ValidationError> {
        let project = ProjectName::new(&self.project)?;
        let flat_type = FlatType::parse(&self.flat_type)?;
        let total = parse_integer("total units", &self.total_units)?;
        let available = match self.available_units.as_deref() {
            Some(raw) => parse_integer("available units", raw)?,
            None => total,
        };
        let price = parse_integer("price", &self.price)?;

        Ok((project, flat_type, FlatInventory::restore(total, available, price)))
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ApplicationRow {
    #[serde(rename = "NRIC")]
    applicant: String,
    #[serde(rename = "Project Name")]
    project: String,
    #[serde(rename = "Flat Type", default, deserialize_with = "empty_string_as_none")]
    flat_type: Option<String>,
    #[serde(rename = "Status")]
    status: String,
    #[serde(
        rename = "Prior Status",
        default,
        deserialize_with = "empty_string_as_none"
    )]
    prior_status: Option<String>,
    #[serde(rename = "Submitted On")]
    submitted_on: String,
}

impl ApplicationRow {
    fn into_application(self) -> Result<Application, ValidationError> {
        let flat_type = self.flat_type.as_deref().map(FlatType::parse).transpose()?;
        let prior_status = self
            .prior_status
            .as_deref()
            .map(ApplicationStatus::parse)
            .transpose()?;

        Application::restore(
            Identity::parse(&self.applicant)?,
            ProjectName::new(&self.project)?,
            flat_type,
            parse_date("submitted on", &self.submitted_on)?,
            ApplicationStatus::parse(&self.status)?,
            prior_status,
        )
    }

    fn from_application(application: &Application) -> Self {
        Self {
            applicant: application.applicant.to_string(),
            project: application.project.to_string(),
            flat_type: application.flat_type.map(|flat_type| flat_type.label().to_string()),
            status: application.status().label().to_string(),
            prior_status: application
                .prior_status()
                .map(|status| status.label().to_string()),
            submitted_on: application.submitted_on.format(DATE_FORMAT).to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct RegistrationRow {
    #[serde(rename = "NRIC")]
    officer: String,
    #[serde(rename = "Project Name")]
    project: String,
    #[serde(rename = "Status")]
    status: String,
    #[serde(rename = "Registered On")]
    registered_on: String,
}

impl RegistrationRow {
    fn into_registration(self) -> Result<OfficerRegistration, ValidationError> {
        Ok(OfficerRegistration::restore(
            Identity::parse(&self.officer)?,
            ProjectName::new(&self.project)?,
            parse_date("registered on", &self.registered_on)?,
            RegistrationStatus::parse(&self.status)?,
        ))
    }

    fn from_registration(registration: &OfficerRegistration) -> Self {
        Self {
            officer: registration.officer.to_string(),
            project: registration.project.to_string(),
            status: registration.status().label().to_string(),
            registered_on: registration.registered_on.format(DATE_FORMAT).to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct EnquiryRow {
    #[serde(rename = "Enquiry ID")]
    id: String,
    #[serde(rename = "NRIC")]
    author: String,
    #[serde(rename = "Project Name")]
    project: String,
    #[serde(rename = "Text")]
    text: String,
    #[serde(rename = "Submitted On")]
    submitted_on: String,
    #[serde(rename = "Reply", default, deserialize_with = "empty_string_as_none")]
    reply: Option<String>,
    #[serde(rename = "Replied By", default, deserialize_with = "empty_string_as_none")]
    replied_by: Option<String>,
    #[serde(rename = "Replied On", default, deserialize_with = "empty_string_as_none")]
    replied_on: Option<String>,
}

impl EnquiryRow {
    fn into_enquiry(self) -> Result<Enquiry, ValidationError> {
        let reply = match self.reply {
            Some(text) => Some(EnquiryReply {
                text,
                replied_by: Identity::parse(
                    self.replied_by
                        .as_deref()
                        .ok_or(ValidationError::MissingField("replied by"))?,
                )?,
                replied_on: parse_date(
                    "replied on",
                    self.replied_on
                        .as_deref()
                        .ok_or(ValidationError::MissingField("replied on"))?,
                )?,
            }),
            None => None,
        };

        Ok(Enquiry {
            id: EnquiryId::parse(&self.id)?,
            author: Identity::parse(&self.author)?,
            project: self.project,
            text: required("text", &self.text)?,
            submitted_on: parse_date("submitted on", &self.submitted_on)?,
            reply,
        })
    }

    fn from_enquiry(enquiry: &Enquiry) -> Self {
        let reply = enquiry.reply.as_ref();
        Self {
            id: enquiry.id.to_string(),
            author: enquiry.author.to_string(),
            project: enquiry.project.clone(),
            text: enquiry.text.clone(),
            submitted_on: enquiry.submitted_on.format(DATE_FORMAT).to_string(),
            reply: reply.map(|reply| reply.text.clone()),
            replied_by: reply.map(|reply| reply.replied_by.to_string()),
            replied_on: reply.map(|reply| reply.replied_on.format(DATE_FORMAT).to_string()),
        }
    }
}

pub fn read_users<R: Read>(reader: R, role: Role) -> Result<Vec<User>, StoreError> {
    let dataset = match role {
        Role::Applicant => "applicants",
        Role::Officer => "officers",
        Role::Manager => "managers",
    };
    read_rows(dataset, reader, |row: UserRow| row.into_user(role))
}

pub fn read_flat_types<R: Read>(reader: R) -> Result<FlatTable, StoreError> {
    let mut table = FlatTable::new();
    for (project, flat_type, inventory) in read_rows("flat_types", reader, FlatRow::into_entry)? {
        match table.entry(project.clone()).or_default().entry(flat_type) {
            Entry::Vacant(slot) => {
                slot.insert(inventory);
            }
            Entry::Occupied(_) => {
                warn!(project = %project, flat_type = %flat_type, "duplicate flat type row; keeping first");
            }
        }
    }
    Ok(table)
}

pub fn read_projects<R: Read>(reader: R, flats: &FlatTable) -> Result<Vec<Project>, StoreError> {
    read_rows("projects", reader, |row: ProjectRow| row.into_project(flats))
}

pub fn read_applications<R: Read>(reader: R) -> Result<Vec<Application>, StoreError> {
    read_rows("applications", reader, ApplicationRow::into_application)
}

pub fn read_registrations<R: Read>(reader: R) -> Result<Vec<OfficerRegistration>, StoreError> {
    read_rows("registrations", reader, RegistrationRow::into_registration)
}

pub fn read_enquiries<R: Read>(reader: R) -> Result<Vec<Enquiry>, StoreError> {
    read_rows("enquiries", reader, EnquiryRow::into_enquiry)
}

pub fn write_users<W: Write>(writer: W, users: &[User]) -> Result<(), StoreError> {
    write_rows("users", writer, users.iter().map(UserRow::from_user))
}

pub fn write_projects<W: Write>(writer: W, projects: &[Project]) -> Result<(), StoreError> {
    write_rows("projects", writer, projects.iter().map(ProjectRow::from_project))
}

pub fn write_flat_types<W: Write>(writer: W, projects: &[Project]) -> Result<(), StoreError> {
    let rows = projects.iter().flat_map(|project| {
        project.flats.iter().map(|(flat_type, inventory)| FlatRow {
            project: project.name.to_string(),
            flat_type: flat_type.label().to_string(),
            total_units: inventory.total_units().to_string(),
            available_units: Some(inventory.available_units().to_string()),
            price: inventory.price.to_string(),
        })
    });
    write_rows("flat_types", writer, rows)
}

pub fn write_applications<W: Write>(
    writer: W,
    applications: &[Application],
) -> Result<(), StoreError> {
    write_rows(
        "applications",
        writer,
        applications.iter().map(ApplicationRow::from_application),
    )
}

pub fn write_registrations<W: Write>(
    writer: W,
    registrations: &[OfficerRegistration],
) -> Result<(), StoreError> {
    write_rows(
        "registrations",
        writer,
        registrations.iter().map(RegistrationRow::from_registration),
    )
}

pub fn write_enquiries<W: Write>(writer: W, enquiries: &[Enquiry]) -> Result<(), StoreError> {
    write_rows("enquiries", writer, enquiries.iter().map(EnquiryRow::from_enquiry))
}

fn read_rows<R, Row, T>(
    dataset: &'static str,
    reader: R,
    mut convert: impl FnMut(Row) -> Result<T, ValidationError>,
) -> Result<Vec<T>, StoreError>
where
    R: Read,
    Row: DeserializeOwned,
{
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let mut records = Vec::new();
    let mut skipped = 0usize;

    for (index, row) in csv_reader.deserialize::<Row>().enumerate() {
        // Header occupies line 1.
        let line = index + 2;
        let row = match row {
            Ok(row) => row,
            Err(source) if source.is_io_error() => {
                return Err(StoreError::Csv { dataset, source });
            }
            Err(err) => {
                warn!(dataset, line, error = %err, "skipping unreadable row");
                skipped += 1;
                continue;
            }
        };

        match convert(row) {
            Ok(record) => records.push(record),
            Err(err) => {
                warn!(dataset, line, error = %err, "skipping invalid row");
                skipped += 1;
            }
        }
    }

    info!(dataset, loaded = records.len(), skipped, "dataset read");
    Ok(records)
}

fn write_rows<W, Row>(
    dataset: &'static str,
    writer: W,
    rows: impl IntoIterator<Item = Row>,
) -> Result<(), StoreError>
where
    W: Write,
    Row: Serialize,
{
    let mut csv_writer = csv::Writer::from_writer(writer);
    for row in rows {
        csv_writer
            .serialize(row)
            .map_err(|source| StoreError::Csv { dataset, source })?;
    }
    csv_writer.flush().map_err(|err| StoreError::Csv {
        dataset,
        source: err.into(),
    })
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt.filter(|value| !value.trim().is_empty()))
}

fn required(field: &'static str, value: &str) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::MissingField(field));
    }
    Ok(trimmed.to_string())
}

fn parse_integer(field: &'static str, value: &str) -> Result<i64, ValidationError> {
    let trimmed = required(field, value)?;
    trimmed
        .parse::<i64>()
        .map_err(|_| ValidationError::UnknownValue {
            field,
            value: trimmed,
        })
}

fn parse_date(field: &'static str, value: &str) -> Result<NaiveDate, ValidationError> {
    let trimmed = required(field, value)?;
    NaiveDate::parse_from_str(&trimmed, DATE_FORMAT).map_err(|_| ValidationError::UnknownValue {
        field,
        value: trimmed,
    })
}

fn parse_roster(project: &ProjectName, raw: Option<&str>) -> Vec<Identity> {
    raw.unwrap_or_default()
        .split(ROSTER_SEPARATOR)
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .filter_map(|entry| match Identity::parse(entry) {
            Ok(identity) => Some(identity),
            Err(err) => {
                warn!(project = %project, error = %err, "dropping malformed roster entry");
                None
            }
        })
        .collect()
}

/// Missing or malformed flags read as hidden.
fn parse_flag(project: &ProjectName, raw: Option<&str>) -> bool {
    match raw.map(|value| value.trim().to_ascii_lowercase()).as_deref() {
        Some("true" | "yes" | "1") => true,
        Some("false" | "no" | "0") | None => false,
        Some(other) => {
            warn!(project = %project, value = other, "unrecognised visibility flag; hiding project");
            false
        }
    }
}
