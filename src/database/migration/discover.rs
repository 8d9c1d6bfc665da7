//! Migration script discovery
//!
//! Scripts are named `YYYYMMDDHHMMSS_comment.sql`. The 14-digit prefix is the
//! script's id; the filename is its durable identity. Scripts are returned in
//! byte-wise filename order, which is also chronological order because every
//! id has the same width. There is no other sequencing mechanism.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::database::core::INIT_MIGRATION_ID;
use crate::database::migration::source::MigrationSource;
use crate::error::{Error, Result};

#[allow(clippy::expect_used)]
static MIGRATION_FILE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([0-9]{14})_(.+)\.sql$").expect("migration filename pattern is valid")
});

/// A discovered migration script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationScript {
    pub id: i64,
    pub comment: String,
    pub path: String,
}

impl MigrationScript {
    /// Parse a filename; `None` if it does not follow the naming contract.
    pub fn parse(name: &str) -> Option<Self> {
        let caps = MIGRATION_FILE.captures(name)?;
        // 14 ASCII digits always fit in an i64
        let id = caps[1].parse::<i64>().ok()?;
        Some(Self {
            id,
            comment: caps[2].to_string(),
            path: name.to_string(),
        })
    }
}

/// List the migration scripts in `source`, sorted by filename.
///
/// Subdirectories and non-matching files are skipped. A repeated id or a
/// script using the reserved id 0 aborts discovery entirely.
pub fn discover(source: &dyn MigrationSource) -> Result<Vec<MigrationScript>> {
    let mut entries = source.entries()?;
    entries.sort_by(|a, b| a.name.cmp(&b.name));

    let mut scripts = Vec::new();
    let mut seen: HashMap<i64, String> = HashMap::new();

    for entry in entries {
        if entry.is_dir {
            continue;
        }

        let Some(script) = MigrationScript::parse(&entry.name) else {
            debug!(name = %entry.name, "skipping non-migration file");
            continue;
        };

        if script.id == INIT_MIGRATION_ID {
            return Err(Error::ReservedScriptId { path: script.path });
        }

        if let Some(first) = seen.get(&script.id) {
            return Err(Error::DuplicateScriptId {
                id: script.id,
                first: first.clone(),
                second: script.path,
            });
        }
        seen.insert(script.id, script.path.clone());
        scripts.push(script);
    }

    scripts.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(scripts)
}
