#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

use clap::{Parser, Subcommand};
use sqlinit::*;
use tracing::Level;

mod commands;

use commands::config::ConfigArgs;
use commands::create::CreateArgs;
use commands::delete::DeleteArgs;
use commands::migrate::MigrateArgs;
use commands::status::StatusArgs;

#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
#[clap(propagate_version = true)]
struct Cli {
    /// configuration file path, by default $HOME/.sqlinit/sqlinit.toml is used
    #[clap(short, long)]
    config: Option<String>,

    /// Print debug information
    #[clap(long)]
    debug: bool,

    /// Output format: table (default), markdown, json, json-pretty
    #[clap(short, long, global = true, default_value = "table")]
    format: OutputFormat,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new database file and apply all migrations
    Create(CreateArgs),

    /// Open a database and apply pending migrations
    Migrate(MigrateArgs),

    /// Show applied and pending migrations without changing anything
    Status(StatusArgs),

    /// Delete a database file and its -wal/-shm sidecars
    Delete(DeleteArgs),

    /// Print the resolved configuration
    Config(ConfigArgs),
}

fn main() {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    if cli.debug {
        tracing_subscriber::fmt()
            // filter spans/events with level DEBUG or higher.
            .with_max_level(Level::DEBUG)
            .with_writer(std::io::stderr)
            .init();
    }

    let config = match SqlinitConfig::new(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("ERROR: {}", e);
            std::process::exit(1);
        }
    };

    // the library never reads the environment; hand it the production signal
    let production_signal = std::env::var(&config.production_env_var).ok();
    let options = config.to_options(production_signal);
    let output_format = cli.format;

    let result = match cli.command {
        Commands::Create(args) => commands::create::run(&options, args, output_format),
        Commands::Migrate(args) => commands::migrate::run(&options, args, output_format),
        Commands::Status(args) => commands::status::run(&options, args, output_format),
        Commands::Delete(args) => commands::delete::run(&options, args, output_format),
        Commands::Config(args) => commands::config::run(&config, args, output_format),
    };

    if let Err(e) = result {
        eprintln!("ERROR: {:#}", e);
        std::process::exit(1);
    }
}
