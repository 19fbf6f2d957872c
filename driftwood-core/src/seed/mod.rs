//! Environment-aware seed versioning.
//!
//! Seed files live in `seeds/<environment>/<version>_<name>.{up,down}.sql`.
//! Applied versions are recorded per environment in `seed_migrations`.

pub mod catalog;
pub mod orchestrator;
pub mod tracker;

pub use catalog::{SeedCatalog, SeedFileReference, list_environments};
pub use orchestrator::{
    ApplyReport, ManualReport, SeedOrchestrator, SeedPhase, SeedStatus, compute_pending,
};
pub use tracker::{SEED_TABLE, SeedRecord, SeedTracker};
