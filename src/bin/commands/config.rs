use anyhow::Result;
use clap::Args;
use serde::Serialize;
use sqlinit::{OutputFormat, SqlinitConfig};

/// Arguments for the Config command
#[derive(Args)]
pub struct ConfigArgs {}

#[derive(Debug, Serialize)]
struct ConfigInfo<'a> {
    config_file: String,
    database: &'a Option<String>,
    migrations_dir: &'a Option<String>,
    production_env_var: &'a str,
    allow_memory_in_production: bool,
    migration_timeout_secs: u64,
    app_version: &'a Option<String>,
    required_schema_version: Option<i64>,
    version: &'static str,
}

pub fn run(config: &SqlinitConfig, _args: ConfigArgs, output_format: OutputFormat) -> Result<()> {
    if output_format.is_json() {
        let info = ConfigInfo {
            config_file: SqlinitConfig::config_file_path(),
            database: &config.database,
            migrations_dir: &config.migrations_dir,
            production_env_var: &config.production_env_var,
            allow_memory_in_production: config.allow_memory_in_production,
            migration_timeout_secs: config.migration_timeout_secs,
            app_version: &config.app_version,
            required_schema_version: config.required_schema_version,
            version: sqlinit::VERSION,
        };
        println!("{}", output_format.to_json(&info));
    } else {
        println!("{}", config.summary());
        println!("Version:              {}", sqlinit::VERSION);
    }
    Ok(())
}
