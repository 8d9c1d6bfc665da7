//! Database module
//!
//! This module provides all database functionality for sqlinit, organized into:
//!
//! - **core**: SQLite connections, location validation, infrastructure schema
//! - **migration**: script sources, discovery and the migration runner
//! - **lifecycle**: the public open/create/delete/status operations
//!
//! # Architecture
//!
//! ```text
//! database/
//! ├── core/            # Foundation
//! │   ├── location     # memory vs. persistent, path validation, FileSystem
//! │   ├── connection   # DatabaseConn wrapper and ConnectionProfile
//! │   └── schema       # schema_migrations + config tables
//! │
//! ├── migration/       # User schema changes
//! │   ├── source       # DirSource, StaticSource
//! │   ├── discover     # YYYYMMDDHHMMSS_comment.sql parsing and ordering
//! │   └── runner       # transactional application under a deadline
//! │
//! └── lifecycle        # open / create / delete / status
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use sqlinit::database::{create, open, DirSource};
//! use sqlinit::Options;
//!
//! let options = Options::new("/var/lib/myapp/app.db")
//!     .with_migrations(DirSource::new("migrations"))
//!     .with_app_version("1.0.0");
//!
//! create(&options)?;
//! let db = open(&options)?;
//! println!("schema version {:?}", db.schema_version()?);
//! ```

pub mod core;
pub mod lifecycle;
pub mod migration;

// Core types
pub use core::{
    AppliedMigration, Bootstrap, ConnectionProfile, DatabaseConn, FileSystem, Location,
    MemoryFileSystem, OsFileSystem, Pragma, SchemaDefinitions, SchemaManager,
};

// Migration types
pub use migration::{
    discover, DirSource, MigrationReport, MigrationRunner, MigrationScript, MigrationSource,
    StaticSource, DEFAULT_MIGRATION_TIMEOUT,
};

// Lifecycle operations
pub use lifecycle::{create, delete, open, status, Database, LifecycleManager, MigrationStatus};
