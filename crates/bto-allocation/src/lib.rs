//! Allocation consistency engine for build-to-order housing projects.
//!
//! The [`allocation`] module holds the state machines, eligibility rules, inventory
//! ledger, and the synchronization pass. [`storage`] provides the persistence
//! collaborators, while [`config`], [`telemetry`], and [`error`] carry the ambient
//! service plumbing shared by the CLI and HTTP front ends.

pub mod allocation;
pub mod config;
pub mod error;
pub mod storage;
pub mod telemetry;
