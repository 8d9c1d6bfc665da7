use anyhow::Result;
use clap::Args;
use serde_json::json;
use sqlinit::{OutputFormat, Options};

/// Arguments for the Delete command
#[derive(Args)]
pub struct DeleteArgs {
    /// Database file to delete
    #[clap(value_name = "PATH")]
    pub path: Option<String>,

    /// Skip confirmation prompt
    #[clap(long, short = 'y')]
    pub yes: bool,
}

pub fn run(base: &Options, args: DeleteArgs, output_format: OutputFormat) -> Result<()> {
    let DeleteArgs { path, yes } = args;
    let options = super::resolve_options(base, path, None)?;

    // Confirmation prompt
    if !yes && !output_format.is_json() {
        eprintln!(
            "This will delete {} and its -wal/-shm files",
            options.location
        );
        eprint!("Are you sure? [y/N] ");

        let mut input = String::new();
        if std::io::stdin().read_line(&mut input).is_err() {
            eprintln!("Aborted.");
            return Ok(());
        }
        let input = input.trim().to_lowercase();
        if input != "y" && input != "yes" {
            eprintln!("Aborted.");
            return Ok(());
        }
    }

    sqlinit::delete(&options.location)?;

    if output_format.is_json() {
        println!(
            "{}",
            output_format.to_json(&json!({"deleted": options.location}))
        );
    } else {
        println!("deleted {}", options.location);
    }
    Ok(())
}
