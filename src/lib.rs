#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

//! sqlinit - SQLite database lifecycle management
//!
//! sqlinit makes the choice between a throwaway in-memory database and a
//! durable file explicit, and keeps file databases up to date with a
//! directory of timestamped SQL migration scripts. It can be used as both a
//! library and a command-line tool.
//!
//! # Feature Flags
//!
//! | Feature | Description | Key Dependencies |
//! |---------|-------------|------------------|
//! | *(none)* | Lifecycle, migrations, configuration loading | `rusqlite`, `config` |
//! | `display` | Table formatting with `tabled` | `tabled` |
//! | `cli` | `sqlinit` binary | All above + `clap`, `tracing-subscriber` |
//!
//! ```toml
//! # Library only
//! sqlinit = { version = "0.10", default-features = false }
//!
//! # Library with table output
//! sqlinit = { version = "0.10", default-features = false, features = ["display"] }
//! ```
//!
//! # Architecture
//!
//! - **[`database`]**: all database functionality
//!   - `core`: location validation, connection tuning, infrastructure schema
//!   - `migration`: script sources, discovery, the migration runner
//!   - `lifecycle`: open, create, delete and status
//! - **[`options`]**: the record every lifecycle operation consumes
//! - **[`config`]**: file and environment configuration for the CLI
//! - **[`output`]**: table and JSON rendering
//!
//! # Migration scripts
//!
//! Scripts are named `YYYYMMDDHHMMSS_comment.sql`. The timestamp is the
//! script's id and filename order is application order. Each script runs in
//! its own transaction together with its `schema_migrations` row and the
//! `schema.version` update, so a failing script leaves no trace. Scripts are
//! never applied twice: the filename is recorded and checked on every run.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use sqlinit::{Options, StaticSource};
//!
//! static MIGRATIONS: StaticSource = StaticSource::new(&[(
//!     "20260101000001_create_users.sql",
//!     include_str!("../migrations/20260101000001_create_users.sql"),
//! )]);
//!
//! // Tests: private in-memory database, fully migrated
//! let db = sqlinit::open(&Options::memory().with_migrations(MIGRATIONS))?;
//!
//! // Production: create once, then open
//! let options = Options::new("/var/lib/myapp/app.db")
//!     .with_migrations(MIGRATIONS)
//!     .with_production_signal(std::env::var("ENV").ok());
//! sqlinit::create(&options)?;
//! let db = sqlinit::open(&options)?;
//! ```

pub mod config;
pub mod database;
pub mod error;
pub mod options;
pub mod output;

/// Package version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use config::SqlinitConfig;
pub use error::{Error, Result, ValidationError};
pub use options::Options;
pub use output::OutputFormat;

pub use database::{
    create, delete, open, status, AppliedMigration, ConnectionProfile, Database, DirSource,
    LifecycleManager, MigrationReport, MigrationSource, MigrationStatus, StaticSource,
};
