//! Infrastructure schema management
//!
//! The package owns two tables in every database it manages:
//!
//! - `schema_migrations`: one row per applied script, keyed by migration id,
//!   with the script filename as a unique durable identity
//! - `config`: key/value metadata seeded with `schema.version`, `app.version`
//!   and `db.created_at`
//!
//! The infrastructure script is recorded as migration id 0 with path
//! [`INIT_SCRIPT_PATH`].

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;

use crate::error::{Error, Result};

/// Migration id reserved for the infrastructure script
pub const INIT_MIGRATION_ID: i64 = 0;

/// Durable path recorded for the infrastructure script
pub const INIT_SCRIPT_PATH: &str = "schema.sql";

/// Comment recorded for the infrastructure script
pub const INIT_COMMENT: &str = "init";

/// Well-known config keys
pub const KEY_SCHEMA_VERSION: &str = "schema.version";
pub const KEY_APP_VERSION: &str = "app.version";
pub const KEY_DB_CREATED_AT: &str = "db.created_at";

/// Schema definitions for the infrastructure tables
pub struct SchemaDefinitions;

impl SchemaDefinitions {
    /// Tracking table for applied migrations
    pub const MIGRATIONS_TABLE: &'static str = r#"
        CREATE TABLE schema_migrations (
            id INTEGER PRIMARY KEY,
            comment TEXT NOT NULL,
            path TEXT NOT NULL UNIQUE,
            applied_at INTEGER NOT NULL,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );
    "#;

    /// Key/value metadata table
    pub const CONFIG_TABLE: &'static str = r#"
        CREATE TABLE config (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            created_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now')),
            updated_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        );
    "#;

    /// Seed rows for every well-known config key
    pub const CONFIG_SEED: &'static str = r#"
        INSERT INTO config (key, value) VALUES
            ('schema.version', '0'),
            ('app.version', ''),
            ('db.created_at', '');
    "#;

    /// The complete infrastructure script, executed as one batch.
    pub fn init_script() -> String {
        [Self::MIGRATIONS_TABLE, Self::CONFIG_TABLE, Self::CONFIG_SEED].concat()
    }
}

/// A migration that has been applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppliedMigration {
    pub id: i64,
    pub comment: String,
    pub path: String,
    pub applied_at: DateTime<Utc>,
}

/// Caller-supplied metadata written once at initialization time.
#[derive(Debug, Clone, Default)]
pub struct Bootstrap {
    pub app_version: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

/// Returns true if the error is SQLite reporting a missing table.
///
/// SQLite has no dedicated error code for this; a prepare against an absent
/// table fails with `SQLITE_ERROR` and a `no such table` message.
pub fn is_no_such_table(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(_, Some(msg)) => msg.contains("no such table"),
        rusqlite::Error::SqlInputError { msg, .. } => msg.contains("no such table"),
        _ => false,
    }
}

/// Schema manager for the infrastructure tables
///
/// Works on a plain [`Connection`] so the same calls can run inside a
/// transaction (which derefs to `Connection`).
pub struct SchemaManager<'a> {
    conn: &'a Connection,
}

impl<'a> SchemaManager<'a> {
    /// Create a new schema manager for the given connection
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Read the current schema version.
    ///
    /// Returns `Ok(None)` when the `config` table does not exist (the database
    /// was never initialized). A present table with a missing row is an
    /// inconsistency and surfaces as an error.
    pub fn schema_version(&self) -> Result<Option<i64>> {
        let value = match self.get_meta(KEY_SCHEMA_VERSION) {
            Ok(Some(v)) => v,
            Ok(None) => {
                return Err(Error::InconsistentState(format!(
                    "config table has no {} row",
                    KEY_SCHEMA_VERSION
                )))
            }
            Err(Error::Database { source, .. }) if is_no_such_table(&source) => return Ok(None),
            Err(e) => return Err(e),
        };

        value.parse::<i64>().map(Some).map_err(|e| {
            Error::InconsistentState(format!(
                "invalid {} {:?}: {}",
                KEY_SCHEMA_VERSION, value, e
            ))
        })
    }

    /// Whether the infrastructure tables are present
    pub fn is_initialized(&self) -> Result<bool> {
        Ok(self.schema_version()?.is_some())
    }

    /// Create the infrastructure tables, seed config rows, write bootstrap
    /// metadata, and record the init as migration id 0.
    ///
    /// Does not open a transaction; callers run this inside one.
    pub fn initialize(&self, bootstrap: &Bootstrap) -> Result<()> {
        self.conn
            .execute_batch(&SchemaDefinitions::init_script())
            .map_err(|e| Error::Execution {
                path: INIT_SCRIPT_PATH.to_string(),
                source: e,
            })?;

        let now = bootstrap.created_at.unwrap_or_else(Utc::now);
        let ts = now.timestamp();

        self.conn
            .execute(
                "INSERT INTO schema_migrations (id, comment, path, applied_at, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?4, ?4)",
                params![INIT_MIGRATION_ID, INIT_COMMENT, INIT_SCRIPT_PATH, ts],
            )
            .map_err(|e| Error::database("record init", e))?;

        self.update_meta(KEY_DB_CREATED_AT, &ts.to_string(), ts)?;
        if let Some(version) = bootstrap.app_version.as_deref() {
            self.update_meta(KEY_APP_VERSION, version, ts)?;
        }

        Ok(())
    }

    /// Record a successfully executed user script and advance
    /// `schema.version` to its id.
    pub fn record_migration(&self, id: i64, comment: &str, path: &str, ts: i64) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO schema_migrations (id, comment, path, applied_at, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?4, ?4)",
                params![id, comment, path, ts],
            )
            .map_err(|e| Error::database(format!("record {}", path), e))?;

        self.update_meta(KEY_SCHEMA_VERSION, &id.to_string(), ts)
    }

    /// Update a seeded config row, requiring exactly one row to change.
    fn update_meta(&self, key: &str, value: &str, ts: i64) -> Result<()> {
        let rows = self
            .conn
            .execute(
                "UPDATE config SET value = ?1, updated_at = ?2 WHERE key = ?3",
                params![value, ts, key],
            )
            .map_err(|e| Error::database(format!("update {}", key), e))?;
        if rows != 1 {
            return Err(Error::InconsistentState(format!(
                "{} update affected {} rows, expected 1",
                key, rows
            )));
        }
        Ok(())
    }

    /// Get a metadata value
    pub fn get_meta(&self, key: &str) -> Result<Option<String>> {
        self.conn
            .query_row("SELECT value FROM config WHERE key = ?1", [key], |row| {
                row.get(0)
            })
            .optional()
            .map_err(|e| Error::database(format!("fetch {}", key), e))
    }

    /// All applied migrations ordered by path; empty when uninitialized.
    pub fn applied_migrations(&self) -> Result<Vec<AppliedMigration>> {
        let mut stmt = match self
            .conn
            .prepare("SELECT id, comment, path, applied_at FROM schema_migrations ORDER BY path")
        {
            Ok(stmt) => stmt,
            Err(e) if is_no_such_table(&e) => return Ok(Vec::new()),
            Err(e) => return Err(Error::database("fetch applied migrations", e)),
        };

        let rows = stmt
            .query_map([], |row| {
                let applied_at: i64 = row.get(3)?;
                Ok(AppliedMigration {
                    id: row.get(0)?,
                    comment: row.get(1)?,
                    path: row.get(2)?,
                    applied_at: DateTime::from_timestamp(applied_at, 0).unwrap_or_default(),
                })
            })
            .map_err(|e| Error::database("fetch applied migrations", e))?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| Error::database("read applied migration row", e))
    }
}
