//! Core database infrastructure
//!
//! This module provides the foundational components every lifecycle
//! operation builds on:
//! - `Location`: memory/persistent classification and path validation
//! - `DatabaseConn`: single SQLite connection tuned by a `ConnectionProfile`
//! - `SchemaManager`: infrastructure tables and metadata

mod connection;
mod location;
mod schema;

pub use connection::{sqlite_uri, ConnectionProfile, DatabaseConn, DsnBuilder, OpenMode, Pragma};
pub use location::{
    is_memory, validate_persistent_path, FileSystem, Location, MemoryFileSystem, OsFileSystem,
    DATABASE_EXTENSION, MEMORY_LOCATION, MEMORY_URI_PREFIX, SIDECAR_SUFFIXES,
};
pub use schema::{
    AppliedMigration, Bootstrap, SchemaDefinitions, SchemaManager, INIT_COMMENT,
    INIT_MIGRATION_ID, INIT_SCRIPT_PATH, KEY_APP_VERSION, KEY_DB_CREATED_AT, KEY_SCHEMA_VERSION,
};
