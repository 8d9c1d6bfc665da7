use anyhow::Result;
use clap::Args;
use sqlinit::output::format_report;
use sqlinit::{OutputFormat, Options};
use std::path::PathBuf;
use std::time::Duration;

/// Arguments for the Migrate command
#[derive(Args)]
pub struct MigrateArgs {
    /// Existing database file, or :memory: to check that migrations apply cleanly
    #[clap(value_name = "LOCATION")]
    pub location: Option<String>,

    /// Directory containing migration scripts
    #[clap(short, long)]
    pub migrations: Option<PathBuf>,

    /// Fail unless the schema version matches exactly after migrating
    #[clap(long, value_name = "VERSION")]
    pub require_version: Option<i64>,

    /// Migration deadline in seconds
    #[clap(long, value_name = "SECS")]
    pub timeout: Option<u64>,
}

pub fn run(base: &Options, args: MigrateArgs, output_format: OutputFormat) -> Result<()> {
    let MigrateArgs {
        location,
        migrations,
        require_version,
        timeout,
    } = args;

    let mut options = super::resolve_options(base, location, migrations)?;
    if let Some(version) = require_version {
        options = options.with_required_schema_version(version);
    }
    if let Some(secs) = timeout {
        options = options.with_migration_timeout(Duration::from_secs(secs));
    }

    let db = sqlinit::open(&options)?;
    if let Some(report) = db.migration_report() {
        println!("{}", format_report(report, output_format));
    }
    db.close()?;
    Ok(())
}
