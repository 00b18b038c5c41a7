use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use super::validation::ValidationError;

/// Dwelling categories offered by a project, ordered smallest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlatType {
    TwoRoom,
    ThreeRoom,
}

impl FlatType {
    pub const fn ordered() -> [Self; 2] {
        [Self::TwoRoom, Self::ThreeRoom]
    }

    pub const fn smallest() -> Self {
        Self::TwoRoom
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::TwoRoom => "2-Room",
            Self::ThreeRoom => "3-Room",
        }
    }

    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let compact: String = raw
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '-' && *c != '_')
            .collect::<String>()
            .to_ascii_lowercase();

        match compact.as_str() {
            "2room" | "tworoom" => Ok(Self::TwoRoom),
            "3room" | "threeroom" => Ok(Self::ThreeRoom),
            _ => Err(ValidationError::UnknownValue {
                field: "flat_type",
                value: raw.to_string(),
            }),
        }
    }
}

impl fmt::Display for FlatType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Unit counters and price for one flat type of one project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FlatInventory {
    total_units: u32,
    available_units: u32,
    pub price: u64,
}

impl FlatInventory {
    pub fn new(total_units: u32, price: u64) -> Self {
        Self {
            total_units,
            available_units: total_units,
            price,
        }
    }

    /// Rebuilds an entry from stored counters, clamping `available` into `[0, total]`.
    pub fn restore(total_units: i64, available_units: i64, price: i64) -> Self {
        let total = clamp_count("total_units", total_units);
        let mut available = clamp_count("available_units", available_units);
        if available > total {
            warn!(
                total,
                available, "available units exceed total; clamping to total"
            );
            available = total;
        }

        Self {
            total_units: total,
            available_units: available,
            price: u64::try_from(price).unwrap_or_else(|_| {
                warn!(price, "negative price clamped to zero");
                0
            }),
        }
    }

    pub fn total_units(&self) -> u32 {
        self.total_units
    }

    pub fn available_units(&self) -> u32 {
        self.available_units
    }

    pub fn booked_units(&self) -> u32 {
        self.total_units - self.available_units
    }

    pub fn has_available(&self) -> bool {
        self.available_units > 0
    }

    /// Consumes one unit; `false` and no change when none are left.
    pub fn decrement(&mut self) -> bool {
        if self.available_units == 0 {
            return false;
        }
        self.available_units -= 1;
        true
    }

    /// Releases one unit; `false` and no change when already full.
    pub fn increment(&mut self) -> bool {
        if self.available_units == self.total_units {
            return false;
        }
        self.available_units += 1;
        true
    }

    /// Re-derives availability from the booked count, returning whether it changed.
    pub fn reconcile(&mut self, total_units: u32, booked: u32) -> bool {
        let available = if booked > total_units {
            error!(
                total_units,
                booked, "booked applications exceed total units; forcing availability to zero"
            );
            0
        } else {
            total_units - booked
        };

        let changed = self.total_units != total_units || self.available_units != available;
        self.total_units = total_units;
        self.available_units = available;
        changed
    }

    /// Changes the unit total while keeping the booked count, if the new total covers it.
    pub(crate) fn resize(&mut self, total_units: u32) -> Result<(), u32> {
        let booked = self.booked_units();
        if total_units < booked {
            return Err(booked);
        }
        self.total_units = total_units;
        self.available_units = total_units - booked;
        Ok(())
    }
}

fn clamp_count(field: &'static str, value: i64) -> u32 {
    if value < 0 {
        warn!(field, value, "negative unit count clamped to zero");
        return 0;
    }
    u32::try_from(value).unwrap_or_else(|_| {
        warn!(field, value, "unit count too large; clamped");
        u32::MAX
    })
}
