use config::Config;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use crate::database::migration::DirSource;
use crate::error::{Error, Result};
use crate::options::{Options, DEFAULT_PRODUCTION_ENV_VAR};

/// Settings for the `sqlinit` tool, read from a TOML file and `SQLINIT_*`
/// environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlinitConfig {
    /// Default database location when a command does not name one
    pub database: Option<String>,

    /// Directory holding `YYYYMMDDHHMMSS_comment.sql` scripts
    pub migrations_dir: Option<String>,

    /// Environment variable carrying the production signal (default: ENV)
    pub production_env_var: String,

    pub allow_memory_in_production: bool,

    /// Deadline for a migration run in seconds (default: 90)
    pub migration_timeout_secs: u64,

    /// Written to the database once, when it is initialized
    pub app_version: Option<String>,

    pub required_schema_version: Option<i64>,
}

const DEFAULT_MIGRATION_TIMEOUT_SECS: u64 = 90;

const EMPTY_CONFIG: &str = r#"### sqlinit configuration file

### default database location (absolute path ending in .db, or :memory:)
# database = "/var/lib/myapp/app.db"

### directory containing YYYYMMDDHHMMSS_comment.sql migration scripts
# migrations_dir = "/usr/share/myapp/migrations"

### environment variable checked for "production"
# production_env_var = "ENV"
# allow_memory_in_production = false

### migration deadline (in seconds)
# migration_timeout_secs = 90

### written to the config table when a database is initialized
# app_version = "1.0.0"

### fail to open unless schema.version matches exactly
# required_schema_version = 20260101000002
"#;

impl Default for SqlinitConfig {
    fn default() -> Self {
        Self {
            database: None,
            migrations_dir: None,
            production_env_var: DEFAULT_PRODUCTION_ENV_VAR.to_string(),
            allow_memory_in_production: false,
            migration_timeout_secs: DEFAULT_MIGRATION_TIMEOUT_SECS,
            app_version: None,
            required_schema_version: None,
        }
    }
}

impl SqlinitConfig {
    /// Load the configuration, writing a commented template when the file
    /// does not exist yet.
    pub fn new(path: &Option<String>) -> Result<SqlinitConfig> {
        let mut builder = Config::builder();

        // By default use $HOME/.sqlinit/sqlinit.toml as the configuration file path
        let p = match path {
            Some(p) => p.clone(),
            None => {
                let dir = Self::config_dir()?;
                std::fs::create_dir_all(dir.as_str())
                    .map_err(|e| Error::Config(format!("Unable to create {}: {}", dir, e)))?;
                format!("{}/sqlinit.toml", dir)
            }
        };

        if Path::new(p.as_str()).exists() {
            builder = builder.add_source(config::File::with_name(p.as_str()));
        } else {
            std::fs::write(p.as_str(), EMPTY_CONFIG)
                .map_err(|e| Error::Config(format!("Unable to create config file {}: {}", p, e)))?;
        }

        // E.g., `SQLINIT_DATABASE=/data/app.db sqlinit status` would set the database
        builder = builder.add_source(config::Environment::with_prefix("SQLINIT"));

        let settings = builder
            .build()
            .map_err(|e| Error::Config(format!("Failed to build configuration: {}", e)))?;

        let config = settings
            .try_deserialize::<HashMap<String, String>>()
            .map_err(|e| Error::Config(format!("Failed to deserialize configuration: {}", e)))?;

        Self::from_map(&config)
    }

    fn from_map(config: &HashMap<String, String>) -> Result<SqlinitConfig> {
        let non_empty = |key: &str| config.get(key).filter(|v| !v.is_empty()).cloned();

        let allow_memory_in_production = match config.get("allow_memory_in_production") {
            Some(v) => v.parse::<bool>().map_err(|_| {
                Error::Config(format!("allow_memory_in_production: invalid boolean {:?}", v))
            })?,
            None => false,
        };

        // 0 falls back to the default
        let migration_timeout_secs = match config.get("migration_timeout_secs") {
            Some(v) => match v.parse::<u64>() {
                Ok(0) => DEFAULT_MIGRATION_TIMEOUT_SECS,
                Ok(secs) => secs,
                Err(_) => {
                    return Err(Error::Config(format!(
                        "migration_timeout_secs: invalid number {:?}",
                        v
                    )))
                }
            },
            None => DEFAULT_MIGRATION_TIMEOUT_SECS,
        };

        let required_schema_version = match non_empty("required_schema_version") {
            Some(v) => Some(v.parse::<i64>().map_err(|_| {
                Error::Config(format!("required_schema_version: invalid number {:?}", v))
            })?),
            None => None,
        };

        Ok(SqlinitConfig {
            database: non_empty("database"),
            migrations_dir: non_empty("migrations_dir"),
            production_env_var: non_empty("production_env_var")
                .unwrap_or_else(|| DEFAULT_PRODUCTION_ENV_VAR.to_string()),
            allow_memory_in_production,
            migration_timeout_secs,
            app_version: non_empty("app_version"),
            required_schema_version,
        })
    }

    pub fn migration_timeout(&self) -> Duration {
        Duration::from_secs(self.migration_timeout_secs)
    }

    /// Build lifecycle options.
    ///
    /// `production_signal` is the current value of the variable named by
    /// `production_env_var`, looked up by the caller.
    pub fn to_options(&self, production_signal: Option<String>) -> Options {
        let mut options = Options::new(self.database.clone().unwrap_or_default())
            .with_production_env_var(self.production_env_var.as_str())
            .with_production_signal(production_signal)
            .with_allow_memory_in_production(self.allow_memory_in_production)
            .with_migration_timeout(self.migration_timeout());

        if let Some(dir) = &self.migrations_dir {
            options = options.with_migrations(DirSource::new(dir));
        }
        if let Some(version) = &self.app_version {
            options = options.with_app_version(version.as_str());
        }
        if let Some(version) = self.required_schema_version {
            options = options.with_required_schema_version(version);
        }
        options
    }

    /// Display configuration summary
    pub fn summary(&self) -> String {
        let or_unset = |v: &Option<String>| v.clone().unwrap_or_else(|| "(not set)".to_string());
        let lines = [
            format!("Config File:          {}", Self::config_file_path()),
            format!("Database:             {}", or_unset(&self.database)),
            format!("Migrations Dir:       {}", or_unset(&self.migrations_dir)),
            format!("Production Env Var:   {}", self.production_env_var),
            format!(
                "Memory In Production: {}",
                if self.allow_memory_in_production {
                    "allowed"
                } else {
                    "rejected"
                }
            ),
            format!("Migration Timeout:    {} seconds", self.migration_timeout_secs),
            format!("App Version:          {}", or_unset(&self.app_version)),
            format!(
                "Required Version:     {}",
                self.required_schema_version
                    .map(|v| v.to_string())
                    .unwrap_or_else(|| "(not set)".to_string())
            ),
        ];
        lines.join("\n")
    }

    /// Get the default config file path
    pub fn config_file_path() -> String {
        let home_dir = dirs::home_dir()
            .map(|h| h.to_string_lossy().to_string())
            .unwrap_or_else(|| "~".to_string());
        format!("{}/.sqlinit/sqlinit.toml", home_dir)
    }

    fn config_dir() -> Result<String> {
        let home_dir = dirs::home_dir()
            .ok_or_else(|| Error::Config("Could not find home directory".to_string()))?;
        let home_dir = home_dir.to_str().ok_or_else(|| {
            Error::Config("Could not convert home directory path to string".to_string())
        })?;
        Ok(format!("{}/.sqlinit", home_dir))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults_from_empty_map() {
        let config = SqlinitConfig::from_map(&HashMap::new()).unwrap();
        assert_eq!(config, SqlinitConfig::default());
        assert_eq!(config.migration_timeout(), Duration::from_secs(90));
    }

    #[test]
    fn test_parse_values() {
        let config = SqlinitConfig::from_map(&map(&[
            ("database", "/data/app.db"),
            ("migrations_dir", "/srv/migrations"),
            ("production_env_var", "APP_ENV"),
            ("allow_memory_in_production", "true"),
            ("migration_timeout_secs", "5"),
            ("app_version", "2.0.0"),
            ("required_schema_version", "20260101000002"),
        ]))
        .unwrap();

        assert_eq!(config.database.as_deref(), Some("/data/app.db"));
        assert_eq!(config.migrations_dir.as_deref(), Some("/srv/migrations"));
        assert_eq!(config.production_env_var, "APP_ENV");
        assert!(config.allow_memory_in_production);
        assert_eq!(config.migration_timeout(), Duration::from_secs(5));
        assert_eq!(config.required_schema_version, Some(20260101000002));
    }

    #[test]
    fn test_zero_timeout_uses_default() {
        let config = SqlinitConfig::from_map(&map(&[("migration_timeout_secs", "0")])).unwrap();
        assert_eq!(config.migration_timeout_secs, 90);
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            SqlinitConfig::from_map(&map(&[("allow_memory_in_production", "maybe")])),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            SqlinitConfig::from_map(&map(&[("migration_timeout_secs", "-1")])),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            SqlinitConfig::from_map(&map(&[("required_schema_version", "latest")])),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_to_options() {
        let config = SqlinitConfig {
            database: Some(":memory:".to_string()),
            migrations_dir: Some("/srv/migrations".to_string()),
            app_version: Some("1.0.0".to_string()),
            required_schema_version: Some(3),
            ..Default::default()
        };

        let options = config.to_options(Some("production".to_string()));
        assert_eq!(options.location, ":memory:");
        assert!(options.migrations.is_some());
        assert_eq!(options.app_version.as_deref(), Some("1.0.0"));
        assert_eq!(options.required_schema_version, Some(3));
        assert_eq!(options.production_env_var, "ENV");
        assert!(options.is_production());
        assert!(!options.allow_memory_in_production);
    }

    #[test]
    fn test_new_writes_template() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sqlinit.toml");
        let path_str = Some(path.to_string_lossy().into_owned());

        let config = SqlinitConfig::new(&path_str).unwrap();
        assert!(path.exists());
        assert_eq!(config.migration_timeout_secs, 90);

        std::fs::write(
            &path,
            "database = \"/data/app.db\"\nmigration_timeout_secs = 10\n",
        )
        .unwrap();
        let config = SqlinitConfig::new(&path_str).unwrap();
        assert_eq!(config.database.as_deref(), Some("/data/app.db"));
        assert_eq!(config.migration_timeout_secs, 10);
        assert!(config.summary().contains("/data/app.db"));
    }
}
