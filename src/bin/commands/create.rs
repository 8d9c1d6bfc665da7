use anyhow::Result;
use clap::Args;
use serde_json::json;
use sqlinit::{OutputFormat, Options};
use std::path::PathBuf;

/// Arguments for the Create command
#[derive(Args)]
pub struct CreateArgs {
    /// Absolute path of the new database file (must end in .db)
    #[clap(value_name = "PATH")]
    pub path: Option<String>,

    /// Directory containing migration scripts
    #[clap(short, long)]
    pub migrations: Option<PathBuf>,

    /// Application version recorded in the new database
    #[clap(long)]
    pub app_version: Option<String>,
}

pub fn run(base: &Options, args: CreateArgs, output_format: OutputFormat) -> Result<()> {
    let CreateArgs {
        path,
        migrations,
        app_version,
    } = args;

    let mut options = super::resolve_options(base, path, migrations)?;
    if let Some(version) = app_version {
        options = options.with_app_version(version);
    }

    sqlinit::create(&options)?;

    if output_format.is_json() {
        println!(
            "{}",
            output_format.to_json(&json!({"created": options.location}))
        );
    } else {
        println!("created {}", options.location);
    }
    Ok(())
}
