use anyhow::Result;
use clap::Args;
use sqlinit::output::format_status;
use sqlinit::{OutputFormat, Options};
use std::path::PathBuf;

/// Arguments for the Status command
#[derive(Args)]
pub struct StatusArgs {
    /// Database file to inspect
    #[clap(value_name = "PATH")]
    pub path: Option<String>,

    /// Directory containing migration scripts, used to list pending ones
    #[clap(short, long)]
    pub migrations: Option<PathBuf>,
}

pub fn run(base: &Options, args: StatusArgs, output_format: OutputFormat) -> Result<()> {
    let StatusArgs { path, migrations } = args;

    let options = super::resolve_options(base, path, migrations)?;
    let status = sqlinit::status(&options)?;
    println!("{}", format_status(&status, output_format));
    Ok(())
}
