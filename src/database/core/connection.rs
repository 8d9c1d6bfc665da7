//! Database connection management
//!
//! This module provides the single-connection wrapper used by every lifecycle
//! operation, together with the tuning strategy ([`ConnectionProfile`]) that
//! decides which pragmas a connection gets and how its connection string is
//! built.

use rusqlite::{Connection, OpenFlags};
use tracing::debug;

use crate::database::core::location::{Location, MEMORY_LOCATION, MEMORY_URI_PREFIX};
use crate::error::{Error, Result};

/// A single SQLite tuning parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pragma {
    pub name: String,
    pub value: String,
}

impl Pragma {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    fn statement(&self) -> String {
        format!("PRAGMA {} = {}", self.name, self.value)
    }
}

/// Builds a connection string from a location and the pragmas that will be
/// applied to it.
pub type DsnBuilder = fn(&Location, &[Pragma]) -> String;

/// Tuning strategy for connections, selected once and reused for every open.
///
/// `memory` pragmas favour speed for throwaway databases; `persistent`
/// pragmas favour durability. Pragmas are applied as statements right after
/// the connection is established.
#[derive(Debug, Clone)]
pub struct ConnectionProfile {
    pub name: &'static str,
    pub memory: Vec<Pragma>,
    pub persistent: Vec<Pragma>,
    pub build_dsn: DsnBuilder,
}

impl Default for ConnectionProfile {
    fn default() -> Self {
        Self::standard()
    }
}

impl ConnectionProfile {
    /// Full pragma set: WAL for files, exclusive memory journal for memory.
    pub fn standard() -> Self {
        Self {
            name: "standard",
            memory: vec![
                Pragma::new("foreign_keys", "ON"),
                Pragma::new("busy_timeout", "5000"),
                Pragma::new("journal_mode", "MEMORY"),
                Pragma::new("synchronous", "OFF"),
                Pragma::new("temp_store", "MEMORY"),
                Pragma::new("locking_mode", "EXCLUSIVE"),
            ],
            persistent: vec![
                Pragma::new("foreign_keys", "ON"),
                Pragma::new("busy_timeout", "5000"),
                Pragma::new("journal_mode", "WAL"),
                Pragma::new("synchronous", "NORMAL"),
                Pragma::new("temp_store", "FILE"),
                Pragma::new("locking_mode", "NORMAL"),
            ],
            build_dsn: sqlite_uri,
        }
    }

    /// Reduced pragma set that leaves temp storage and locking at driver defaults.
    pub fn compat() -> Self {
        Self {
            name: "compat",
            memory: vec![
                Pragma::new("foreign_keys", "1"),
                Pragma::new("busy_timeout", "5000"),
                Pragma::new("journal_mode", "MEMORY"),
                Pragma::new("synchronous", "OFF"),
            ],
            persistent: vec![
                Pragma::new("foreign_keys", "1"),
                Pragma::new("busy_timeout", "5000"),
                Pragma::new("journal_mode", "WAL"),
                Pragma::new("synchronous", "NORMAL"),
            ],
            build_dsn: sqlite_uri,
        }
    }

    /// Pragmas for the given location.
    pub fn pragmas_for(&self, location: &Location) -> &[Pragma] {
        match location {
            Location::Memory(_) => &self.memory,
            Location::Persistent(_) => &self.persistent,
        }
    }

    pub fn dsn(&self, location: &Location) -> String {
        (self.build_dsn)(location, self.pragmas_for(location))
    }
}

/// Build a SQLite URI filename: `file::memory:` or `file:<path>`.
///
/// A memory location given as a `file::memory:` URI is passed through
/// unchanged so its query parameters (`cache=shared`) take effect.
///
/// Characters with meaning inside a URI are percent-encoded. Pragmas are not
/// encoded into the URI; SQLite has no URI parameter for them.
pub fn sqlite_uri(location: &Location, _pragmas: &[Pragma]) -> String {
    match location {
        Location::Memory(raw) if raw.starts_with(MEMORY_URI_PREFIX) => raw.clone(),
        Location::Memory(_) => MEMORY_URI_PREFIX.to_string(),
        Location::Persistent(path) => {
            let raw = path.to_string_lossy();
            let mut uri = String::with_capacity(raw.len() + 5);
            uri.push_str("file:");
            for c in raw.chars() {
                match c {
                    '%' => uri.push_str("%25"),
                    '?' => uri.push_str("%3f"),
                    '#' => uri.push_str("%23"),
                    c => uri.push(c),
                }
            }
            uri
        }
    }
}

/// How a persistent file may be opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// File must already exist
    Existing,
    /// File is created when missing
    Create,
}

/// Core database connection wrapper
///
/// `DatabaseConn` owns exactly one SQLite connection, opened through a
/// [`ConnectionProfile`]. There is no pooling: SQLite serializes writers and
/// every lifecycle operation is a single sequential unit of work.
pub struct DatabaseConn {
    pub conn: Connection,
    location: Location,
}

impl DatabaseConn {
    /// Open a connection to `location` and apply the profile's pragmas.
    pub fn open(location: &Location, profile: &ConnectionProfile, mode: OpenMode) -> Result<Self> {
        let dsn = profile.dsn(location);
        debug!(dsn = %dsn, profile = profile.name, "opening database");

        let mut flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_URI
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        if location.is_memory() || mode == OpenMode::Create {
            flags |= OpenFlags::SQLITE_OPEN_CREATE;
        }

        let conn = Connection::open_with_flags(&dsn, flags)
            .map_err(|e| Error::database(format!("open {}", location), e))?;

        let db = DatabaseConn {
            conn,
            location: location.clone(),
        };
        db.configure(profile.pragmas_for(location))?;
        Ok(db)
    }

    /// Create an in-memory database with the standard profile
    pub fn open_in_memory() -> Result<Self> {
        Self::open(
            &Location::Memory(MEMORY_LOCATION.to_string()),
            &ConnectionProfile::standard(),
            OpenMode::Create,
        )
    }

    pub fn location(&self) -> &Location {
        &self.location
    }

    /// Apply tuning pragmas
    ///
    /// Some pragmas (`journal_mode`, `locking_mode`) report their new value as
    /// a row, so every statement is stepped to completion and its rows ignored.
    fn configure(&self, pragmas: &[Pragma]) -> Result<()> {
        for pragma in pragmas {
            let sql = pragma.statement();
            debug!(pragma = %sql, "applying pragma");
            let mut stmt = self
                .conn
                .prepare(&sql)
                .map_err(|e| Error::database(format!("prepare {}", sql), e))?;
            let mut rows = stmt
                .query([])
                .map_err(|e| Error::database(format!("apply {}", sql), e))?;
            while rows
                .next()
                .map_err(|e| Error::database(format!("apply {}", sql), e))?
                .is_some()
            {}
        }
        Ok(())
    }

    /// Verify the connection is usable
    pub fn ping(&self) -> Result<()> {
        self.conn
            .query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
            .map_err(|e| Error::database("ping", e))?;
        Ok(())
    }

    /// Check if a table exists in the database
    pub fn table_exists(&self, table_name: &str) -> Result<bool> {
        let count: i64 = self
            .conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
                [table_name],
                |row| row.get(0),
            )
            .map_err(|e| Error::database("check table existence", e))?;
        Ok(count > 0)
    }

    /// Close the connection, surfacing any error from SQLite.
    pub fn close(self) -> Result<()> {
        self.conn
            .close()
            .map_err(|(_, e)| Error::database(format!("close {}", self.location), e))
    }
}
