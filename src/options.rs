//! Lifecycle options
//!
//! [`Options`] is the single record every lifecycle operation consumes. It is
//! plain data: nothing here reads the process environment. Callers that want
//! the production check supply the environment value themselves through
//! [`Options::with_production_signal`].

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::database::core::ConnectionProfile;
use crate::database::migration::{MigrationSource, DEFAULT_MIGRATION_TIMEOUT};

/// Default name of the environment variable carrying the production signal
pub const DEFAULT_PRODUCTION_ENV_VAR: &str = "ENV";

/// Value of the production signal that marks a live deployment
/// (compared case-insensitively)
pub const PRODUCTION: &str = "production";

#[derive(Clone)]
pub struct Options {
    /// `:memory:` (or a `file::memory:` URI), or an absolute `.db` path
    pub location: String,
    /// User migration scripts; `None` means infrastructure tables only
    pub migrations: Option<Arc<dyn MigrationSource>>,
    /// Open without running the migration runner
    pub skip_migrations: bool,
    /// Exact schema version required after migration
    pub required_schema_version: Option<i64>,
    /// Name of the variable the production signal was read from, used in
    /// error messages
    pub production_env_var: String,
    /// Value of the production variable as seen by the caller
    pub production_signal: Option<String>,
    pub allow_memory_in_production: bool,
    /// Deadline for a whole migration run
    pub migration_timeout: Duration,
    /// Written to `app.version` once, at initialization
    pub app_version: Option<String>,
    pub profile: ConnectionProfile,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            location: String::new(),
            migrations: None,
            skip_migrations: false,
            required_schema_version: None,
            production_env_var: DEFAULT_PRODUCTION_ENV_VAR.to_string(),
            production_signal: None,
            allow_memory_in_production: false,
            migration_timeout: DEFAULT_MIGRATION_TIMEOUT,
            app_version: None,
            profile: ConnectionProfile::standard(),
        }
    }
}

impl fmt::Debug for Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Options")
            .field("location", &self.location)
            .field("migrations", &self.migrations)
            .field("skip_migrations", &self.skip_migrations)
            .field("required_schema_version", &self.required_schema_version)
            .field("production_env_var", &self.production_env_var)
            .field("production_signal", &self.production_signal)
            .field(
                "allow_memory_in_production",
                &self.allow_memory_in_production,
            )
            .field("migration_timeout", &self.migration_timeout)
            .field("app_version", &self.app_version)
            .field("profile", &self.profile.name)
            .finish()
    }
}

impl Options {
    pub fn new(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            ..Default::default()
        }
    }

    /// Options for a private in-memory database
    pub fn memory() -> Self {
        Self::new(crate::database::core::MEMORY_LOCATION)
    }

    pub fn with_migrations(mut self, source: impl MigrationSource + 'static) -> Self {
        self.migrations = Some(Arc::new(source));
        self
    }

    pub fn with_migration_source(mut self, source: Option<Arc<dyn MigrationSource>>) -> Self {
        self.migrations = source;
        self
    }

    pub fn with_skip_migrations(mut self, skip: bool) -> Self {
        self.skip_migrations = skip;
        self
    }

    pub fn with_required_schema_version(mut self, version: i64) -> Self {
        self.required_schema_version = Some(version);
        self
    }

    pub fn with_production_env_var(mut self, name: impl Into<String>) -> Self {
        self.production_env_var = name.into();
        self
    }

    pub fn with_production_signal(mut self, value: Option<String>) -> Self {
        self.production_signal = value;
        self
    }

    pub fn with_allow_memory_in_production(mut self, allow: bool) -> Self {
        self.allow_memory_in_production = allow;
        self
    }

    pub fn with_migration_timeout(mut self, timeout: Duration) -> Self {
        self.migration_timeout = timeout;
        self
    }

    pub fn with_app_version(mut self, version: impl Into<String>) -> Self {
        self.app_version = Some(version.into());
        self
    }

    pub fn with_profile(mut self, profile: ConnectionProfile) -> Self {
        self.profile = profile;
        self
    }

    /// Whether the supplied production signal marks a live deployment.
    pub fn is_production(&self) -> bool {
        self.production_signal
            .as_deref()
            .is_some_and(|v| v.eq_ignore_ascii_case(PRODUCTION))
    }

    /// The source as a borrowed trait object, for the runner.
    pub fn migration_source(&self) -> Option<&dyn MigrationSource> {
        self.migrations.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::migration::StaticSource;

    #[test]
    fn test_defaults() {
        let opts = Options::new("/data/app.db");
        assert_eq!(opts.location, "/data/app.db");
        assert_eq!(opts.production_env_var, "ENV");
        assert_eq!(opts.migration_timeout, Duration::from_secs(90));
        assert_eq!(opts.profile.name, "standard");
        assert!(opts.migrations.is_none());
        assert!(opts.required_schema_version.is_none());
        assert!(!opts.is_production());
    }

    #[test]
    fn test_production_signal() {
        for value in ["production", "PRODUCTION", "Production"] {
            let opts = Options::memory().with_production_signal(Some(value.to_string()));
            assert!(opts.is_production(), "{value} should count as production");
        }
        for value in ["prod", "staging", ""] {
            let opts = Options::memory().with_production_signal(Some(value.to_string()));
            assert!(!opts.is_production(), "{value} should not count as production");
        }
    }

    #[test]
    fn test_builders() {
        static SOURCE: StaticSource = StaticSource::new(&[]);
        let opts = Options::memory()
            .with_migrations(SOURCE)
            .with_skip_migrations(true)
            .with_required_schema_version(7)
            .with_app_version("1.0.0")
            .with_profile(ConnectionProfile::compat());

        assert!(opts.migration_source().is_some());
        assert!(opts.skip_migrations);
        assert_eq!(opts.required_schema_version, Some(7));
        assert_eq!(opts.app_version.as_deref(), Some("1.0.0"));
        assert_eq!(opts.profile.name, "compat");
        assert!(format!("{opts:?}").contains("compat"));
    }
}
