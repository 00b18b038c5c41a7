//! Pure eligibility and visibility rules.
//!
//! Nothing here mutates or fails: each rule answers yes or no from the inputs alone.
//! Temporal gating (is the window open?) lives on [`ApplicationWindow`] and is kept
//! separate from visibility.
//!
//! [`ApplicationWindow`]: super::project::ApplicationWindow

use super::dataset::Dataset;
use super::identity::{MaritalStatus, User};
use super::inventory::FlatType;
use super::project::Project;

pub const SINGLE_MIN_AGE: u8 = 35;
pub const MARRIED_MIN_AGE: u8 = 21;

/// Age and marital status rule, independent of who is asking.
pub fn can_apply_for(age: u8, marital_status: MaritalStatus, flat_type: FlatType) -> bool {
    match marital_status {
        MaritalStatus::Single => flat_type == FlatType::smallest() && age >= SINGLE_MIN_AGE,
        MaritalStatus::Married => age >= MARRIED_MIN_AGE,
    }
}

pub fn can_apply(user: &User, flat_type: FlatType) -> bool {
    !user.is_manager() && can_apply_for(user.age, user.marital_status, flat_type)
}

/// Offered flat types the user qualifies for, smallest first.
pub fn eligible_flat_types(user: &User, project: &Project) -> Vec<FlatType> {
    project
        .flats
        .keys()
        .copied()
        .filter(|flat_type| can_apply(user, *flat_type))
        .collect()
}

pub fn is_visible(user: &User, project: &Project, dataset: &Dataset) -> bool {
    if user.is_manager() || project.visible {
        return true;
    }

    let holds_live_application = dataset
        .application(&user.identity, &project.name)
        .map(|application| application.status().is_active())
        .unwrap_or(false);

    holds_live_application || dataset.is_approved_officer(&user.identity, &project.name)
}
