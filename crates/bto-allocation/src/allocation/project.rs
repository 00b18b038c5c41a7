use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::identity::Identity;
use super::inventory::{FlatInventory, FlatType};
use super::validation::ValidationError;

pub const MAX_OFFICER_SLOTS: u8 = 10;

/// Project name; equality, ordering, and hashing ignore ASCII case.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProjectName(String);

impl ProjectName {
    pub fn new(raw: &str) -> Result<Self, ValidationError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::MissingField("project name"));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn folded(&self) -> impl Iterator<Item = u8> + '_ {
        self.0.bytes().map(|b| b.to_ascii_lowercase())
    }
}

impl PartialEq for ProjectName {
    fn eq(&self, other: &Self) -> bool {
        self.0.eq_ignore_ascii_case(&other.0)
    }
}

impl Eq for ProjectName {}

impl PartialOrd for ProjectName {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ProjectName {
    fn cmp(&self, other: &Self) -> Ordering {
        self.folded().cmp(other.folded())
    }
}

impl Hash for ProjectName {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for byte in self.folded() {
            state.write_u8(byte);
        }
    }
}

impl TryFrom<String> for ProjectName {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(&value)
    }
}

impl From<ProjectName> for String {
    fn from(value: ProjectName) -> Self {
        value.0
    }
}

impl fmt::Display for ProjectName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Inclusive application period; dates carry no time component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ApplicationWindow {
    open: NaiveDate,
    close: NaiveDate,
}

impl ApplicationWindow {
    pub fn new(open: NaiveDate, close: NaiveDate) -> Result<Self, ValidationError> {
        if close < open {
            return Err(ValidationError::InvertedWindow { open, close });
        }
        Ok(Self { open, close })
    }

    pub fn open(&self) -> NaiveDate {
        self.open
    }

    pub fn close(&self) -> NaiveDate {
        self.close
    }

    /// True when `as_of` falls on or between the opening and closing days.
    pub fn is_open_on(&self, as_of: NaiveDate) -> bool {
        self.open <= as_of && as_of <= self.close
    }

    /// True once the closing day has fully passed.
    pub fn is_expired_on(&self, as_of: NaiveDate) -> bool {
        as_of > self.close
    }

    pub fn overlaps(&self, other: &Self) -> bool {
        !(self.open > other.close || self.close < other.open)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Project {
    pub name: ProjectName,
    pub neighborhood: String,
    pub flats: BTreeMap<FlatType, FlatInventory>,
    pub window: ApplicationWindow,
    pub manager: Identity,
    officer_slots: u8,
    officers: Vec<Identity>,
    pub visible: bool,
}

impl Project {
    pub fn new(
        name: ProjectName,
        neighborhood: impl Into<String>,
        flats: BTreeMap<FlatType, FlatInventory>,
        window: ApplicationWindow,
        manager: Identity,
        officer_slots: u8,
    ) -> Result<Self, ValidationError> {
        if flats.is_empty() {
            return Err(ValidationError::NoFlatTypes);
        }
        validate_slots(i64::from(officer_slots))?;

        Ok(Self {
            name,
            neighborhood: neighborhood.into(),
            flats,
            window,
            manager,
            officer_slots,
            officers: Vec::new(),
            visible: false,
        })
    }

    /// Attaches a stored roster without capacity enforcement; synchronization reports overflow.
    pub fn with_roster(mut self, officers: Vec<Identity>) -> Self {
        let mut roster: Vec<Identity> = Vec::with_capacity(officers.len());
        for officer in officers {
            if !roster.contains(&officer) {
                roster.push(officer);
            }
        }
        self.officers = roster;
        self
    }

    pub fn officer_slots(&self) -> u8 {
        self.officer_slots
    }

    pub fn officers(&self) -> &[Identity] {
        &self.officers
    }

    pub fn has_officer(&self, officer: &Identity) -> bool {
        self.officers.contains(officer)
    }

    pub fn remaining_slots(&self) -> usize {
        usize::from(self.officer_slots).saturating_sub(self.officers.len())
    }

    pub fn has_capacity(&self) -> bool {
        self.remaining_slots() > 0
    }

    pub fn offers(&self, flat_type: FlatType) -> bool {
        self.flats.contains_key(&flat_type)
    }

    pub fn inventory(&self, flat_type: FlatType) -> Option<&FlatInventory> {
        self.flats.get(&flat_type)
    }

    pub fn inventory_mut(&mut self, flat_type: FlatType) -> Option<&mut FlatInventory> {
        self.flats.get_mut(&flat_type)
    }

    /// Appends an officer if a slot is free; `false` leaves the roster untouched.
    pub(crate) fn admit_officer(&mut self, officer: &Identity) -> bool {
        if self.has_officer(officer) {
            return true;
        }
        if !self.has_capacity() {
            return false;
        }
        self.officers.push(officer.clone());
        true
    }

    pub(crate) fn set_officer_slots(&mut self, slots: u8) -> Result<(), ValidationError> {
        validate_slots(i64::from(slots))?;
        self.officer_slots = slots;
        Ok(())
    }
}

pub(crate) fn validate_slots(slots: i64) -> Result<u8, ValidationError> {
    match u8::try_from(slots) {
        Ok(value) if (1..=MAX_OFFICER_SLOTS).contains(&value) => Ok(value),
        _ => Err(ValidationError::OfficerCapacity {
            max: MAX_OFFICER_SLOTS,
            found: slots,
        }),
    }
}
