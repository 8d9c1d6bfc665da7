//! Database lifecycle: open, create, delete and status
//!
//! [`LifecycleManager`] is the public surface of the crate. It classifies the
//! location, validates persistent paths through its [`FileSystem`], opens one
//! tuned connection and hands it to the [`MigrationRunner`].
//!
//! The free functions [`open`], [`create`], [`delete`] and [`status`] use the
//! real filesystem.
//!
//! Path checks and the open/create that follows are not atomic. Two processes
//! racing on the same path can both pass the existence check; SQLite's own
//! locking is the only protection after that.

use std::collections::HashSet;

use rusqlite::Connection;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::database::core::{
    validate_persistent_path, AppliedMigration, Bootstrap, DatabaseConn, FileSystem, Location,
    OpenMode, OsFileSystem, SchemaManager,
};
use crate::database::migration::{discover, MigrationReport, MigrationRunner, MigrationSource};
use crate::error::{Error, Result};
use crate::options::Options;

/// Read-only snapshot of a database's migration state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MigrationStatus {
    pub is_initialized: bool,
    pub schema_version: i64,
    /// Applied records ordered by path, including the init record
    pub applied: Vec<AppliedMigration>,
    /// Source scripts with no applied record, ordered by path
    pub pending: Vec<String>,
}

/// An open database.
///
/// Owns the single connection created by [`open`]. Dropping the handle closes
/// the connection; [`Database::close`] does the same but reports errors.
pub struct Database {
    db: DatabaseConn,
    report: Option<MigrationReport>,
}

impl Database {
    pub fn connection(&self) -> &Connection {
        &self.db.conn
    }

    pub fn location(&self) -> &Location {
        self.db.location()
    }

    /// Outcome of the migration run performed while opening, if one ran.
    pub fn migration_report(&self) -> Option<&MigrationReport> {
        self.report.as_ref()
    }

    /// Current `schema.version`; `None` when uninitialized.
    pub fn schema_version(&self) -> Result<Option<i64>> {
        SchemaManager::new(&self.db.conn).schema_version()
    }

    pub fn applied_migrations(&self) -> Result<Vec<AppliedMigration>> {
        SchemaManager::new(&self.db.conn).applied_migrations()
    }

    /// Snapshot the migration state against `source` without modifying
    /// anything.
    pub fn status(&self, source: Option<&dyn MigrationSource>) -> Result<MigrationStatus> {
        let schema = SchemaManager::new(&self.db.conn);
        let version = schema.schema_version()?;
        let applied = schema.applied_migrations()?;

        let pending = match source {
            Some(source) => {
                let applied_paths: HashSet<&str> =
                    applied.iter().map(|m| m.path.as_str()).collect();
                discover(source)?
                    .into_iter()
                    .filter(|s| !applied_paths.contains(s.path.as_str()))
                    .map(|s| s.path)
                    .collect()
            }
            None => Vec::new(),
        };

        Ok(MigrationStatus {
            is_initialized: version.is_some(),
            schema_version: version.unwrap_or_default(),
            applied,
            pending,
        })
    }

    pub fn close(self) -> Result<()> {
        self.db.close()
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("location", self.db.location())
            .field("report", &self.report)
            .finish()
    }
}

/// Lifecycle operations over a [`FileSystem`].
#[derive(Debug, Clone, Default)]
pub struct LifecycleManager<F: FileSystem = OsFileSystem> {
    fs: F,
}

impl LifecycleManager<OsFileSystem> {
    pub fn new() -> Self {
        Self { fs: OsFileSystem }
    }
}

impl<F: FileSystem> LifecycleManager<F> {
    pub fn with_filesystem(fs: F) -> Self {
        Self { fs }
    }

    /// Open a database and bring it up to date.
    ///
    /// Memory targets are created fresh. Persistent targets must already
    /// exist; use [`LifecycleManager::create`] for new files.
    pub fn open(&self, options: &Options) -> Result<Database> {
        let location = Location::parse(&options.location);
        match &location {
            Location::Memory(_) => {
                if options.is_production() && !options.allow_memory_in_production {
                    return Err(Error::MemoryInProduction {
                        env_var: options.production_env_var.clone(),
                    });
                }
                info!("DB mode: in-memory");
            }
            Location::Persistent(path) => {
                self.require_existing(path)?;
                info!(path = %path.display(), "DB mode: persistent");
            }
        }
        self.open_and_migrate(&location, options, OpenMode::Existing)
    }

    /// Create a new persistent database file and apply all migrations.
    ///
    /// If migration fails the partially migrated file is left in place.
    pub fn create(&self, options: &Options) -> Result<()> {
        let location = Location::parse(&options.location);
        let path = match &location {
            Location::Memory(_) => return Err(Error::MemoryNotSupported { operation: "create" }),
            Location::Persistent(path) => path,
        };

        validate_persistent_path(&self.fs, path)?;
        if self.fs.exists(path) {
            return Err(Error::AlreadyExists(path.clone()));
        }

        info!(path = %path.display(), "creating database");
        self.open_and_migrate(&location, options, OpenMode::Create)?
            .close()
    }

    /// Remove a persistent database and its sidecar files.
    ///
    /// Absent files are not an error. Every file is attempted even after a
    /// failure; the first failure is returned.
    pub fn delete(&self, location: &str) -> Result<()> {
        let location = Location::parse(location);
        let path = match &location {
            Location::Memory(_) => return Err(Error::MemoryNotSupported { operation: "delete" }),
            Location::Persistent(path) => path,
        };

        validate_persistent_path(&self.fs, path)?;
        if !self.fs.exists(path) {
            debug!(path = %path.display(), "nothing to delete");
            return Ok(());
        }

        info!(path = %path.display(), "deleting database");
        let mut first_err: Option<Error> = None;
        for file in location.files() {
            if !self.fs.exists(&file) {
                continue;
            }
            let result = if self.fs.is_file(&file) {
                self.fs.remove_file(&file).map_err(|e| Error::io(&file, e))
            } else {
                Err(Error::io(
                    &file,
                    std::io::Error::new(std::io::ErrorKind::InvalidInput, "not a regular file"),
                ))
            };

            if let Err(e) = result {
                match first_err {
                    None => first_err = Some(e),
                    Some(_) => warn!(error = %e, "failed to remove database file"),
                }
            }
        }

        if let Some(e) = first_err {
            return Err(e);
        }

        if self.fs.exists(path) {
            return Err(Error::io(
                path,
                std::io::Error::other("still exists after delete"),
            ));
        }
        Ok(())
    }

    /// Inspect a persistent database without migrating it.
    ///
    /// A missing file reports an uninitialized status rather than an error.
    pub fn status(&self, options: &Options) -> Result<MigrationStatus> {
        let location = Location::parse(&options.location);
        let path = match &location {
            Location::Memory(_) => return Err(Error::MemoryNotSupported { operation: "status" }),
            Location::Persistent(path) => path,
        };

        validate_persistent_path(&self.fs, path)?;
        if !self.fs.exists(path) {
            return Ok(MigrationStatus::default());
        }

        let db = DatabaseConn::open(&location, &options.profile, OpenMode::Existing)?;
        let db = Database { db, report: None };
        let status = db.status(options.migration_source())?;
        db.close()?;
        Ok(status)
    }

    fn require_existing(&self, path: &std::path::Path) -> Result<()> {
        validate_persistent_path(&self.fs, path)?;
        if !self.fs.exists(path) {
            return Err(Error::NotFound(path.to_path_buf()));
        }
        Ok(())
    }

    fn open_and_migrate(
        &self,
        location: &Location,
        options: &Options,
        mode: OpenMode,
    ) -> Result<Database> {
        let db = DatabaseConn::open(location, &options.profile, mode)
            .map_err(Error::into_busy_timeout)?;
        db.ping()?;

        let report = if options.skip_migrations {
            None
        } else {
            let report = MigrationRunner::new(&db.conn)
                .with_source(options.migration_source())
                .with_bootstrap(Bootstrap {
                    app_version: options.app_version.clone(),
                    created_at: None,
                })
                .with_timeout(options.migration_timeout)
                .run()?;
            info!(schema_version = report.schema_version, "database ready");
            Some(report)
        };

        let db = Database { db, report };
        if let Some(required) = options.required_schema_version {
            let found = db.schema_version()?;
            if found != Some(required) {
                return Err(Error::VersionMismatch { required, found });
            }
        }
        Ok(db)
    }
}

/// Open a database on the real filesystem. See [`LifecycleManager::open`].
pub fn open(options: &Options) -> Result<Database> {
    LifecycleManager::new().open(options)
}

/// Create a database on the real filesystem. See [`LifecycleManager::create`].
pub fn create(options: &Options) -> Result<()> {
    LifecycleManager::new().create(options)
}

/// Delete a database from the real filesystem. See [`LifecycleManager::delete`].
pub fn delete(location: &str) -> Result<()> {
    LifecycleManager::new().delete(location)
}

/// Inspect a database on the real filesystem. See [`LifecycleManager::status`].
pub fn status(options: &Options) -> Result<MigrationStatus> {
    LifecycleManager::new().status(options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::core::{ConnectionProfile, MemoryFileSystem};
    use crate::database::migration::{DirSource, StaticSource};
    use crate::error::ValidationError;
    use std::path::{Path, PathBuf};
    use std::time::Duration;

    static TWO_SCRIPTS: StaticSource = StaticSource::new(&[
        (
            "20260101000001_create_users.sql",
            "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT NOT NULL);",
        ),
        (
            "20260101000002_create_posts.sql",
            "CREATE TABLE posts (id INTEGER PRIMARY KEY, user_id INTEGER REFERENCES users(id));",
        ),
    ]);

    fn valid_dir() -> DirSource {
        DirSource::new(concat!(env!("CARGO_MANIFEST_DIR"), "/testdata/valid"))
    }

    fn db_path(dir: &tempfile::TempDir) -> String {
        dir.path().join("app.db").to_string_lossy().into_owned()
    }

    fn tracking_rows(db: &Database) -> i64 {
        db.connection()
            .query_row("SELECT COUNT(*) FROM schema_migrations", [], |row| row.get(0))
            .unwrap()
    }

    #[test]
    fn test_memory_without_migrations() {
        let db = open(&Options::memory()).unwrap();

        let version: String = db
            .connection()
            .query_row(
                "SELECT value FROM config WHERE key = 'schema.version'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(version, "0");
        assert_eq!(tracking_rows(&db), 1);

        let comment: String = db
            .connection()
            .query_row("SELECT comment FROM schema_migrations", [], |row| row.get(0))
            .unwrap();
        assert_eq!(comment, "init");
        assert!(db.migration_report().unwrap().initialized);
    }

    #[test]
    fn test_memory_with_migrations() {
        let db = open(&Options::memory().with_migrations(TWO_SCRIPTS)).unwrap();

        assert_eq!(tracking_rows(&db), 3);
        assert_eq!(db.schema_version().unwrap(), Some(20260101000002));
        db.connection()
            .execute("INSERT INTO users (name) VALUES ('alice')", [])
            .unwrap();
        let count: i64 = db
            .connection()
            .query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_memory_databases_are_isolated() {
        let a = open(&Options::memory().with_migrations(TWO_SCRIPTS)).unwrap();
        let b = open(&Options::memory()).unwrap();

        assert!(a.db.table_exists("users").unwrap());
        assert!(!b.db.table_exists("users").unwrap());
    }

    #[test]
    fn test_memory_rejected_in_production() {
        let opts = Options::memory().with_production_signal(Some("Production".to_string()));
        match open(&opts) {
            Err(Error::MemoryInProduction { env_var }) => assert_eq!(env_var, "ENV"),
            other => panic!("expected production rejection, got {other:?}"),
        }

        let opts = Options::memory()
            .with_production_env_var("APP_ENV")
            .with_production_signal(Some("PRODUCTION".to_string()));
        let err = open(&opts).unwrap_err();
        assert!(err.to_string().contains("APP_ENV=production"));

        let opts = opts.with_allow_memory_in_production(true);
        assert!(open(&opts).is_ok());

        let opts = Options::memory().with_production_signal(Some("staging".to_string()));
        assert!(open(&opts).is_ok());
    }

    #[test]
    fn test_skip_migrations() {
        let db = open(&Options::memory().with_skip_migrations(true)).unwrap();
        assert_eq!(db.schema_version().unwrap(), None);
        assert!(db.migration_report().is_none());
    }

    #[test]
    fn test_required_version() {
        let opts = Options::memory()
            .with_migrations(TWO_SCRIPTS)
            .with_required_schema_version(20260101000002);
        assert!(open(&opts).is_ok());

        let opts = Options::memory()
            .with_migrations(TWO_SCRIPTS)
            .with_required_schema_version(20260101000003);
        match open(&opts) {
            Err(Error::VersionMismatch { required, found }) => {
                assert_eq!(required, 20260101000003);
                assert_eq!(found, Some(20260101000002));
            }
            other => panic!("expected version mismatch, got {other:?}"),
        }

        let opts = Options::memory()
            .with_skip_migrations(true)
            .with_required_schema_version(1);
        assert!(matches!(
            open(&opts),
            Err(Error::VersionMismatch { found: None, .. })
        ));
    }

    #[test]
    fn test_migration_timeout() {
        let opts = Options::memory()
            .with_migrations(TWO_SCRIPTS)
            .with_migration_timeout(Duration::ZERO);
        assert!(matches!(open(&opts), Err(Error::Timeout { .. })));
    }

    #[test]
    fn test_open_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = db_path(&dir);
        match open(&Options::new(&path)) {
            Err(Error::NotFound(p)) => assert_eq!(p, PathBuf::from(&path)),
            other => panic!("expected not found, got {other:?}"),
        }
        assert!(!Path::new(&path).exists());
    }

    #[test]
    fn test_open_invalid_paths() {
        assert!(matches!(
            open(&Options::new("relative/path/test.db")),
            Err(Error::Validation(ValidationError::NotAbsolute(_)))
        ));

        let dir = tempfile::tempdir().unwrap();
        let no_ext = dir.path().join("app").to_string_lossy().into_owned();
        assert!(matches!(
            open(&Options::new(no_ext)),
            Err(Error::Validation(ValidationError::BadExtension(_)))
        ));
    }

    #[test]
    fn test_create_open_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = db_path(&dir);
        let opts = Options::new(&path)
            .with_migrations(valid_dir())
            .with_app_version("1.2.3");

        create(&opts).unwrap();
        assert!(Path::new(&path).is_file());

        let db = open(&opts).unwrap();
        assert_eq!(tracking_rows(&db), 3);
        let report = db.migration_report().unwrap();
        assert!(!report.initialized);
        assert!(report.applied.is_empty());
        let app_version: String = db
            .connection()
            .query_row(
                "SELECT value FROM config WHERE key = 'app.version'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(app_version, "1.2.3");
        db.close().unwrap();

        // idempotent
        let db = open(&opts).unwrap();
        assert_eq!(tracking_rows(&db), 3);
        assert_eq!(db.schema_version().unwrap(), Some(20260101000002));
    }

    #[test]
    fn test_create_twice() {
        let dir = tempfile::tempdir().unwrap();
        let opts = Options::new(db_path(&dir));

        create(&opts).unwrap();
        let err = create(&opts).unwrap_err();
        assert!(matches!(err, Error::AlreadyExists(_)));
        assert!(err.to_string().ends_with("file already exists"));
    }

    #[test]
    fn test_create_rejects_memory() {
        assert!(matches!(
            create(&Options::memory()),
            Err(Error::MemoryNotSupported { operation: "create" })
        ));
    }

    #[test]
    fn test_create_with_duplicate_ids() {
        let dir = tempfile::tempdir().unwrap();
        let opts = Options::new(db_path(&dir)).with_migrations(DirSource::new(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/testdata/invalid"
        )));

        assert!(matches!(
            create(&opts),
            Err(Error::DuplicateScriptId { .. })
        ));

        let db = open(&opts.clone().with_skip_migrations(true)).unwrap();
        assert!(!db.db.table_exists("users").unwrap());
        assert!(!db.db.table_exists("widgets").unwrap());
    }

    #[test]
    fn test_delete() {
        let dir = tempfile::tempdir().unwrap();
        let path = db_path(&dir);

        // absent file
        delete(&path).unwrap();

        create(&Options::new(&path)).unwrap();
        // sidecars left behind by a crashed writer
        std::fs::write(format!("{path}-wal"), b"").unwrap();
        std::fs::write(format!("{path}-shm"), b"").unwrap();

        delete(&path).unwrap();
        assert!(!Path::new(&path).exists());
        assert!(!Path::new(&format!("{path}-wal")).exists());
        assert!(!Path::new(&format!("{path}-shm")).exists());
    }

    #[test]
    fn test_delete_rejects_memory() {
        assert!(matches!(
            delete(":memory:"),
            Err(Error::MemoryNotSupported { operation: "delete" })
        ));
        assert!(matches!(
            delete("file::memory:?cache=shared"),
            Err(Error::MemoryNotSupported { .. })
        ));
    }

    #[test]
    fn test_delete_best_effort() {
        let fs = MemoryFileSystem::new()
            .with_dir("/data")
            .with_file("/data/app.db")
            .with_file("/data/app.db-shm")
            .with_file("/data/app.db-wal")
            .with_failing_remove("/data/app.db-shm");
        let manager = LifecycleManager::with_filesystem(fs);

        match manager.delete("/data/app.db") {
            Err(Error::Io { path, .. }) => assert_eq!(path, PathBuf::from("/data/app.db-shm")),
            other => panic!("expected io error, got {other:?}"),
        }
        // the failure did not stop the remaining removals
        assert!(!manager.fs.exists(Path::new("/data/app.db")));
        assert!(!manager.fs.exists(Path::new("/data/app.db-wal")));
        assert!(manager.fs.exists(Path::new("/data/app.db-shm")));
    }

    #[test]
    fn test_delete_sidecar_directory() {
        let fs = MemoryFileSystem::new()
            .with_dir("/data")
            .with_dir("/data/app.db-wal")
            .with_file("/data/app.db");
        let manager = LifecycleManager::with_filesystem(fs);

        match manager.delete("/data/app.db") {
            Err(Error::Io { path, source }) => {
                assert_eq!(path, PathBuf::from("/data/app.db-wal"));
                assert!(source.to_string().contains("not a regular file"));
            }
            other => panic!("expected io error, got {other:?}"),
        }
        assert!(!manager.fs.exists(Path::new("/data/app.db")));
    }

    #[test]
    fn test_delete_validates_with_fake() {
        let manager = LifecycleManager::with_filesystem(MemoryFileSystem::new().with_dir("/data"));
        assert!(manager.delete("/data/absent.db").is_ok());
        assert!(matches!(
            manager.delete("/missing/app.db"),
            Err(Error::Validation(ValidationError::ParentMissing(_)))
        ));
    }

    #[test]
    fn test_status_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let status = status(&Options::new(db_path(&dir))).unwrap();
        assert!(!status.is_initialized);
        assert_eq!(status, MigrationStatus::default());
    }

    #[test]
    fn test_status_rejects_memory() {
        assert!(matches!(
            status(&Options::memory()),
            Err(Error::MemoryNotSupported { operation: "status" })
        ));
    }

    #[test]
    fn test_status_pending() {
        static FIRST: StaticSource = StaticSource::new(&[(
            "20260101000001_create_users.sql",
            "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT NOT NULL);",
        )]);

        let dir = tempfile::tempdir().unwrap();
        let path = db_path(&dir);
        create(&Options::new(&path).with_migrations(FIRST)).unwrap();

        let status = status(&Options::new(&path).with_migrations(TWO_SCRIPTS)).unwrap();
        assert!(status.is_initialized);
        assert_eq!(status.schema_version, 20260101000001);
        let applied: Vec<_> = status.applied.iter().map(|m| m.path.as_str()).collect();
        assert_eq!(
            applied,
            vec!["20260101000001_create_users.sql", "schema.sql"]
        );
        assert_eq!(status.pending, vec!["20260101000002_create_posts.sql"]);

        // status never migrates
        let again = super::status(&Options::new(&path).with_migrations(TWO_SCRIPTS)).unwrap();
        assert_eq!(again.pending.len(), 1);
    }

    #[test]
    fn test_status_ignores_required_version() {
        let dir = tempfile::tempdir().unwrap();
        let path = db_path(&dir);
        create(&Options::new(&path)).unwrap();

        let opts = Options::new(&path).with_required_schema_version(99);
        let status = status(&opts).unwrap();
        assert_eq!(status.schema_version, 0);
    }

    #[test]
    fn test_failed_migration_keeps_version() {
        static BROKEN: StaticSource = StaticSource::new(&[
            (
                "20260101000001_create_users.sql",
                "CREATE TABLE users (id INTEGER PRIMARY KEY);",
            ),
            ("20260101000002_broken.sql", "CREATE TABLE oops (;"),
        ]);

        let dir = tempfile::tempdir().unwrap();
        let path = db_path(&dir);
        let err = create(&Options::new(&path).with_migrations(BROKEN)).unwrap_err();
        assert!(err.to_string().contains("20260101000002_broken.sql"));

        let status = status(&Options::new(&path).with_migrations(BROKEN)).unwrap();
        assert_eq!(status.schema_version, 20260101000001);
        assert_eq!(status.pending, vec!["20260101000002_broken.sql"]);
    }

    #[test]
    fn test_trailing_separator_rejected_everywhere() {
        let dir = tempfile::tempdir().unwrap();
        let path = format!("{}/", db_path(&dir));

        let bad_extension =
            |err: Error| matches!(err, Error::Validation(ValidationError::BadExtension(_)));

        assert!(bad_extension(create(&Options::new(&path)).unwrap_err()));
        assert!(bad_extension(create(&Options::new(&path)).unwrap_err()));
        assert!(bad_extension(open(&Options::new(&path)).unwrap_err()));
        assert!(bad_extension(status(&Options::new(&path)).unwrap_err()));
        assert!(bad_extension(delete(&path).unwrap_err()));

        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_shared_memory_uri_reaches_sqlite() {
        let uri = "file::memory:?cache=shared";
        let first = open(&Options::new(uri).with_migrations(TWO_SCRIPTS)).unwrap();
        assert_eq!(first.location().to_string(), uri);

        let second = open(&Options::new(uri).with_skip_migrations(true)).unwrap();
        assert_eq!(second.schema_version().unwrap(), Some(20260101000002));
        assert!(second.db.table_exists("users").unwrap());

        second.close().unwrap();
        first.close().unwrap();
    }

    #[test]
    fn test_locked_database_reports_busy_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let path = db_path(&dir);
        create(&Options::new(&path)).unwrap();

        let blocker = Connection::open(&path).unwrap();
        blocker.execute_batch("BEGIN IMMEDIATE;").unwrap();

        let mut profile = ConnectionProfile::standard();
        for pragma in profile.persistent.iter_mut() {
            if pragma.name == "busy_timeout" {
                pragma.value = "100".to_string();
            }
        }
        let opts = Options::new(&path)
            .with_migrations(TWO_SCRIPTS)
            .with_profile(profile);

        let err = open(&opts).unwrap_err();
        assert!(err.is_timeout(), "unexpected error: {err}");
        assert!(matches!(err, Error::BusyTimeout { .. }));

        drop(blocker);
        let status = status(&Options::new(&path).with_migrations(TWO_SCRIPTS)).unwrap();
        assert_eq!(status.schema_version, 0);
        assert_eq!(status.pending.len(), 2);
    }
}
