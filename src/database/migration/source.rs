//! Migration script sources
//!
//! A [`MigrationSource`] is a read-only collection of files. Only the root
//! level is consulted; subdirectories are reported so discovery can skip them.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// One entry in the root of a migration source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceEntry {
    pub name: String,
    pub is_dir: bool,
}

/// Read-only collection of migration scripts.
pub trait MigrationSource: fmt::Debug + Send + Sync {
    /// Entries in the root of the collection, in any order.
    fn entries(&self) -> Result<Vec<SourceEntry>>;

    /// Full text of the root-level file `name`.
    fn read(&self, name: &str) -> Result<String>;
}

/// Migration scripts stored in a directory on disk.
#[derive(Debug, Clone)]
pub struct DirSource {
    root: PathBuf,
}

impl DirSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl MigrationSource for DirSource {
    fn entries(&self) -> Result<Vec<SourceEntry>> {
        let dir = std::fs::read_dir(&self.root).map_err(|e| Error::io(&self.root, e))?;

        let mut entries = Vec::new();
        for entry in dir {
            let entry = entry.map_err(|e| Error::io(&self.root, e))?;
            let file_type = entry.file_type().map_err(|e| Error::io(entry.path(), e))?;
            // non-UTF-8 names can never match the migration filename pattern
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            entries.push(SourceEntry {
                name,
                is_dir: file_type.is_dir(),
            });
        }
        Ok(entries)
    }

    fn read(&self, name: &str) -> Result<String> {
        let path = self.root.join(name);
        std::fs::read_to_string(&path).map_err(|e| Error::io(path, e))
    }
}

/// Migration scripts compiled into the binary.
///
/// ```rust,ignore
/// static MIGRATIONS: StaticSource = StaticSource::new(&[
///     (
///         "20260101000001_create_users.sql",
///         include_str!("../migrations/20260101000001_create_users.sql"),
///     ),
/// ]);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct StaticSource {
    files: &'static [(&'static str, &'static str)],
}

impl StaticSource {
    pub const fn new(files: &'static [(&'static str, &'static str)]) -> Self {
        Self { files }
    }
}

impl MigrationSource for StaticSource {
    fn entries(&self) -> Result<Vec<SourceEntry>> {
        Ok(self
            .files
            .iter()
            .map(|(name, _)| SourceEntry {
                name: name.to_string(),
                is_dir: false,
            })
            .collect())
    }

    fn read(&self, name: &str) -> Result<String> {
        self.files
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, sql)| sql.to_string())
            .ok_or_else(|| {
                Error::io(
                    name,
                    std::io::Error::new(std::io::ErrorKind::NotFound, "not in embedded migrations"),
                )
            })
    }
}
