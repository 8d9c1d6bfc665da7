//! Migration runner
//!
//! One invocation walks a fixed sequence:
//!
//! 1. read `schema.version`; a missing `config` table means first run
//! 2. if uninitialized, apply the infrastructure script and bootstrap
//!    metadata in one transaction, recorded as migration id 0
//! 3. discover user scripts (skipped when no source is configured)
//! 4. apply each script whose path is not yet recorded, each in its own
//!    transaction together with its tracking row and version update
//!
//! The first failure aborts the run. The failing script's transaction is
//! rolled back, so the database stays at the last committed script and a
//! later run resumes from there. The whole run shares one deadline; when it
//! passes, SQLite is interrupted mid-statement and the run fails with
//! [`Error::Timeout`].

use std::collections::HashSet;
use std::time::{Duration, Instant};

use chrono::Utc;
use rusqlite::{Connection, ErrorCode};
use tracing::{debug, info};

use crate::database::core::{Bootstrap, SchemaManager};
use crate::database::migration::discover::{discover, MigrationScript};
use crate::database::migration::source::MigrationSource;
use crate::error::{Error, Result};

/// Default bound on a whole migration run
pub const DEFAULT_MIGRATION_TIMEOUT: Duration = Duration::from_secs(90);

/// Number of SQLite VM instructions between deadline checks
const PROGRESS_INTERVAL: i32 = 1000;

/// Outcome of a successful run.
#[derive(Debug, Clone, PartialEq, Eq, Default, serde::Serialize)]
pub struct MigrationReport {
    /// The infrastructure script ran during this invocation
    pub initialized: bool,
    /// Paths applied during this invocation, in order
    pub applied: Vec<String>,
    /// `schema.version` after the run
    pub schema_version: i64,
}

#[derive(Debug, Clone, Copy)]
struct Deadline {
    limit: Duration,
    at: Option<Instant>,
}

impl Deadline {
    fn start(limit: Duration) -> Self {
        Self {
            limit,
            at: Instant::now().checked_add(limit),
        }
    }

    fn expired(&self) -> bool {
        self.at.is_some_and(|at| Instant::now() >= at)
    }

    fn check(&self) -> Result<()> {
        if self.expired() {
            return Err(Error::Timeout { limit: self.limit });
        }
        Ok(())
    }
}

fn is_interrupted(err: &Error) -> bool {
    match err {
        Error::Execution { source, .. } | Error::Database { source, .. } => {
            source.sqlite_error_code() == Some(ErrorCode::OperationInterrupted)
        }
        _ => false,
    }
}

/// Applies the infrastructure schema and pending user scripts to one
/// connection.
pub struct MigrationRunner<'a> {
    conn: &'a Connection,
    source: Option<&'a dyn MigrationSource>,
    bootstrap: Bootstrap,
    timeout: Duration,
}

impl<'a> MigrationRunner<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self {
            conn,
            source: None,
            bootstrap: Bootstrap::default(),
            timeout: DEFAULT_MIGRATION_TIMEOUT,
        }
    }

    pub fn with_source(mut self, source: Option<&'a dyn MigrationSource>) -> Self {
        self.source = source;
        self
    }

    pub fn with_bootstrap(mut self, bootstrap: Bootstrap) -> Self {
        self.bootstrap = bootstrap;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Bring the database up to date.
    pub fn run(&self) -> Result<MigrationReport> {
        debug!("starting migration");
        let deadline = Deadline::start(self.timeout);

        if let Some(at) = deadline.at {
            self.conn
                .progress_handler(PROGRESS_INTERVAL, Some(move || Instant::now() >= at));
        }
        let result = self.run_steps(&deadline);
        self.conn.progress_handler(0, None::<fn() -> bool>);

        result.map_err(|e| {
            if is_interrupted(&e) {
                Error::Timeout {
                    limit: deadline.limit,
                }
            } else {
                e.into_busy_timeout()
            }
        })
    }

    fn run_steps(&self, deadline: &Deadline) -> Result<MigrationReport> {
        deadline.check()?;
        let mut report = MigrationReport::default();

        let schema = SchemaManager::new(self.conn);
        let mut version = match schema.schema_version()? {
            Some(v) => v,
            None => {
                debug!("initializing schema");
                self.apply_init()?;
                report.initialized = true;
                schema.schema_version()?.ok_or_else(|| {
                    Error::InconsistentState("schema.version missing after init".to_string())
                })?
            }
        };

        let Some(source) = self.source else {
            report.schema_version = version;
            return Ok(report);
        };

        let scripts = discover(source)?;
        if scripts.is_empty() {
            debug!("no user migrations to apply");
            report.schema_version = version;
            return Ok(report);
        }

        let applied: HashSet<String> = schema
            .applied_migrations()?
            .into_iter()
            .map(|m| m.path)
            .collect();

        let ts = Utc::now().timestamp();
        for script in scripts.iter().filter(|s| !applied.contains(&s.path)) {
            deadline.check()?;
            debug!(path = %script.path, "applying migration");
            self.apply_script(source, script, ts)?;
            version = script.id;
            report.applied.push(script.path.clone());
        }

        if !report.applied.is_empty() {
            info!(
                "applied {} migration(s), schema version now {}",
                report.applied.len(),
                version
            );
        }
        report.schema_version = version;
        Ok(report)
    }

    fn apply_init(&self) -> Result<()> {
        let tx = self
            .conn
            .unchecked_transaction()
            .map_err(|e| Error::database("begin init transaction", e))?;

        SchemaManager::new(&tx).initialize(&self.bootstrap)?;

        tx.commit()
            .map_err(|e| Error::database("commit init transaction", e))
    }

    /// Execute one script and its bookkeeping atomically. Dropping the
    /// transaction on any error rolls everything back.
    fn apply_script(
        &self,
        source: &dyn MigrationSource,
        script: &MigrationScript,
        ts: i64,
    ) -> Result<()> {
        let sql = source.read(&script.path)?;

        let tx = self
            .conn
            .unchecked_transaction()
            .map_err(|e| Error::database(format!("begin {}", script.path), e))?;

        tx.execute_batch(&sql).map_err(|e| Error::Execution {
            path: script.path.clone(),
            source: e,
        })?;

        SchemaManager::new(&tx).record_migration(script.id, &script.comment, &script.path, ts)?;

        tx.commit()
            .map_err(|e| Error::database(format!("commit {}", script.path), e))
    }
}
