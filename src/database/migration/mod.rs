//! Migration discovery and execution
//!
//! - `source`: where scripts come from (a directory or compiled-in files)
//! - `discover`: filename contract, ordering and duplicate detection
//! - `runner`: transactional application under a deadline

mod discover;
mod runner;
mod source;

pub use discover::{discover, MigrationScript};
pub use runner::{MigrationReport, MigrationRunner, DEFAULT_MIGRATION_TIMEOUT};
pub use source::{DirSource, MigrationSource, SourceEntry, StaticSource};
