//! Error types for sqlinit
//!
//! Every public operation returns [`Result`]. Variants carry the path, script
//! name, or phase that failed so callers can act on the error without
//! re-deriving context.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// A persistent database path that fails one of the shape rules.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{}: persistent database path must be absolute", .0.display())]
    NotAbsolute(PathBuf),

    #[error("{}: expected .db extension", .0.display())]
    BadExtension(PathBuf),

    #[error("{}: path is a directory", .0.display())]
    IsDirectory(PathBuf),

    #[error("{}: parent directory does not exist", .0.display())]
    ParentMissing(PathBuf),
}

impl ValidationError {
    /// The path that failed validation.
    pub fn path(&self) -> &PathBuf {
        match self {
            Self::NotAbsolute(p)
            | Self::BadExtension(p)
            | Self::IsDirectory(p)
            | Self::ParentMissing(p) => p,
        }
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("{}: file already exists", .0.display())]
    AlreadyExists(PathBuf),

    #[error("{}: database file not found (use create to make a new database)", .0.display())]
    NotFound(PathBuf),

    #[error("duplicate migration id {id}: {first:?} and {second:?}")]
    DuplicateScriptId {
        id: i64,
        first: String,
        second: String,
    },

    #[error("migration {path:?} uses reserved id 0")]
    ReservedScriptId { path: String },

    #[error("apply {path}: {source}")]
    Execution {
        path: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("inconsistent database state: {0}")]
    InconsistentState(String),

    #[error("schema version mismatch: required {required}, found {}", display_found(.found))]
    VersionMismatch { required: i64, found: Option<i64> },

    #[error("migration timed out after {limit:?}")]
    Timeout { limit: Duration },

    /// SQLite's busy timeout ran out while another connection held the lock.
    #[error("{context}: database is locked by another connection: {source}")]
    BusyTimeout {
        context: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("in-memory database not allowed in production ({env_var}=production)")]
    MemoryInProduction { env_var: String },

    #[error("{operation} requires a persistent path, not an in-memory database")]
    MemoryNotSupported { operation: &'static str },

    #[error("{context}: {source}")]
    Database {
        context: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;

fn is_busy(err: &rusqlite::Error) -> bool {
    matches!(
        err.sqlite_error_code(),
        Some(rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked)
    )
}

fn display_found(found: &Option<i64>) -> String {
    match found {
        Some(v) => v.to_string(),
        None => "uninitialized database".to_string(),
    }
}

impl Error {
    /// Wrap a driver error with the operation that produced it.
    pub(crate) fn database(context: impl Into<String>, source: rusqlite::Error) -> Self {
        Error::Database {
            context: context.into(),
            source,
        }
    }

    /// True for both the migration deadline and an exhausted busy timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout { .. } | Error::BusyTimeout { .. })
    }

    /// Reclassify a driver error caused by lock contention.
    pub(crate) fn into_busy_timeout(self) -> Self {
        match self {
            Error::Execution { path, source } if is_busy(&source) => Error::BusyTimeout {
                context: format!("apply {}", path),
                source,
            },
            Error::Database { context, source } if is_busy(&source) => {
                Error::BusyTimeout { context, source }
            }
            other => other,
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_already_exists_message() {
        let err = Error::AlreadyExists(PathBuf::from("/tmp/x/app.db"));
        assert_eq!(err.to_string(), "/tmp/x/app.db: file already exists");
    }

    #[test]
    fn test_validation_is_transparent() {
        let err: Error = ValidationError::BadExtension(PathBuf::from("/tmp/app.sqlite")).into();
        assert_eq!(err.to_string(), "/tmp/app.sqlite: expected .db extension");
        match err {
            Error::Validation(v) => assert_eq!(v.path(), &PathBuf::from("/tmp/app.sqlite")),
            other => panic!("unexpected error: {other}"),
        }
    }

    fn busy_error() -> rusqlite::Error {
        rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_BUSY),
            Some("database is locked".to_string()),
        )
    }

    #[test]
    fn test_busy_reclassified() {
        let err = Error::database("begin migration", busy_error()).into_busy_timeout();
        assert!(err.is_timeout());
        assert!(matches!(err, Error::BusyTimeout { ref context, .. } if context == "begin migration"));

        let err = Error::Execution {
            path: "20260101000001_a.sql".to_string(),
            source: busy_error(),
        }
        .into_busy_timeout();
        assert!(matches!(err, Error::BusyTimeout { .. }));

        let err = Error::database("query", rusqlite::Error::QueryReturnedNoRows).into_busy_timeout();
        assert!(matches!(err, Error::Database { .. }));
        assert!(!err.is_timeout());

        assert!(Error::Timeout {
            limit: Duration::from_secs(1)
        }
        .is_timeout());
    }

    #[test]
    fn test_version_mismatch_message() {
        let err = Error::VersionMismatch {
            required: 20260101000002,
            found: Some(20260101000001),
        };
        assert_eq!(
            err.to_string(),
            "schema version mismatch: required 20260101000002, found 20260101000001"
        );

        let err = Error::VersionMismatch {
            required: 1,
            found: None,
        };
        assert!(err.to_string().ends_with("found uninitialized database"));
    }
}
