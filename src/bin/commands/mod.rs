pub mod config;
pub mod create;
pub mod delete;
pub mod migrate;
pub mod status;

use anyhow::{anyhow, Result};
use sqlinit::{DirSource, Options};
use std::path::PathBuf;

/// Apply command-line overrides on top of the configured options.
///
/// A location given on the command line wins over `database` from the
/// config file; one of them must be present.
pub(crate) fn resolve_options(
    base: &Options,
    location: Option<String>,
    migrations: Option<PathBuf>,
) -> Result<Options> {
    let mut options = base.clone();
    if let Some(location) = location {
        options.location = location;
    }
    if options.location.is_empty() {
        return Err(anyhow!(
            "no database given; pass a location or set `database` in the config file"
        ));
    }
    if let Some(dir) = migrations {
        options = options.with_migrations(DirSource::new(dir));
    }
    Ok(options)
}
