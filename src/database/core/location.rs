//! Database location classification and path validation
//!
//! A location string is either an in-memory sentinel (`:memory:` or any
//! `file::memory:` URI) or a persistent file path. Persistent paths are only
//! accepted when they are absolute, end in `.db`, are not a directory, and
//! live in an existing parent directory.
//!
//! Filesystem checks go through the [`FileSystem`] trait so tests can swap in
//! a fake. The checks are not atomic with the open/create that follows.

use std::collections::BTreeSet;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::ValidationError;

/// In-memory sentinel accepted by SQLite.
pub const MEMORY_LOCATION: &str = ":memory:";

/// URI prefix for in-memory databases.
pub const MEMORY_URI_PREFIX: &str = "file::memory:";

/// Required extension for persistent database files.
pub const DATABASE_EXTENSION: &str = "db";

/// Sidecar suffixes created next to a persistent database in WAL mode.
pub const SIDECAR_SUFFIXES: &[&str] = &["-shm", "-wal"];

/// Where a database lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    /// Transient database held entirely in memory; keeps the caller's
    /// sentinel or URI so parameters such as `cache=shared` reach SQLite
    Memory(String),
    /// File-backed database at the given path (not yet validated)
    Persistent(PathBuf),
}

impl Location {
    /// Classify a location string.
    pub fn parse(location: &str) -> Self {
        if is_memory(location) {
            Location::Memory(location.to_string())
        } else {
            Location::Persistent(PathBuf::from(location))
        }
    }

    pub fn is_memory(&self) -> bool {
        matches!(self, Location::Memory(_))
    }

    /// The file path for persistent locations.
    pub fn path(&self) -> Option<&Path> {
        match self {
            Location::Memory(_) => None,
            Location::Persistent(p) => Some(p.as_path()),
        }
    }

    /// Primary file followed by its sidecar files.
    pub fn files(&self) -> Vec<PathBuf> {
        match self {
            Location::Memory(_) => Vec::new(),
            Location::Persistent(p) => {
                let mut files = vec![p.clone()];
                for suffix in SIDECAR_SUFFIXES {
                    let mut name = p.clone().into_os_string();
                    name.push(suffix);
                    files.push(PathBuf::from(name));
                }
                files
            }
        }
    }
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Location::Memory(uri) => write!(f, "{}", uri),
            Location::Persistent(p) => write!(f, "{}", p.display()),
        }
    }
}

/// Check whether a location string denotes an in-memory database.
pub fn is_memory(location: &str) -> bool {
    location == MEMORY_LOCATION || location.starts_with(MEMORY_URI_PREFIX)
}

/// Minimal filesystem capability used by validation and delete.
pub trait FileSystem {
    /// Path exists as a regular file or directory.
    fn exists(&self, path: &Path) -> bool;

    fn is_dir(&self, path: &Path) -> bool;

    fn is_file(&self, path: &Path) -> bool;

    fn remove_file(&self, path: &Path) -> io::Result<()>;
}

/// [`FileSystem`] backed by the real operating system.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsFileSystem;

impl FileSystem for OsFileSystem {
    fn exists(&self, path: &Path) -> bool {
        std::fs::metadata(path)
            .map(|m| m.is_file() || m.is_dir())
            .unwrap_or(false)
    }

    fn is_dir(&self, path: &Path) -> bool {
        std::fs::metadata(path)
            .map(|m| m.is_dir())
            .unwrap_or(false)
    }

    fn is_file(&self, path: &Path) -> bool {
        std::fs::metadata(path)
            .map(|m| m.is_file())
            .unwrap_or(false)
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        std::fs::remove_file(path)
    }
}

/// In-memory [`FileSystem`] for tests and dry runs.
///
/// Paths listed in `failing` refuse removal with a permission error.
#[derive(Debug, Default)]
pub struct MemoryFileSystem {
    files: Mutex<BTreeSet<PathBuf>>,
    dirs: BTreeSet<PathBuf>,
    failing: BTreeSet<PathBuf>,
}

impl MemoryFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.dirs.insert(path.into());
        self
    }

    pub fn with_file(self, path: impl Into<PathBuf>) -> Self {
        if let Ok(mut files) = self.files.lock() {
            files.insert(path.into());
        }
        self
    }

    pub fn with_failing_remove(mut self, path: impl Into<PathBuf>) -> Self {
        self.failing.insert(path.into());
        self
    }
}

impl FileSystem for MemoryFileSystem {
    fn exists(&self, path: &Path) -> bool {
        self.is_file(path) || self.is_dir(path)
    }

    fn is_dir(&self, path: &Path) -> bool {
        self.dirs.contains(path)
    }

    fn is_file(&self, path: &Path) -> bool {
        self.files
            .lock()
            .map(|files| files.contains(path))
            .unwrap_or(false)
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        if self.failing.contains(path) {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "permission denied",
            ));
        }
        let mut files = self
            .files
            .lock()
            .map_err(|_| io::Error::other("filesystem lock poisoned"))?;
        if files.remove(path) {
            Ok(())
        } else {
            Err(io::Error::new(io::ErrorKind::NotFound, "no such file"))
        }
    }
}

/// Validate a persistent database path against the current filesystem state.
pub fn validate_persistent_path(fs: &dyn FileSystem, path: &Path) -> Result<(), ValidationError> {
    if !path.is_absolute() {
        return Err(ValidationError::NotAbsolute(path.to_path_buf()));
    }
    // checked on the raw string: `Path::extension` ignores a trailing
    // separator and rejects a bare `.db` file name
    let suffix = format!(".{}", DATABASE_EXTENSION);
    if !path.as_os_str().to_string_lossy().ends_with(&suffix) {
        return Err(ValidationError::BadExtension(path.to_path_buf()));
    }
    if fs.is_dir(path) {
        return Err(ValidationError::IsDirectory(path.to_path_buf()));
    }
    match path.parent() {
        Some(dir) if fs.is_dir(dir) => Ok(()),
        _ => Err(ValidationError::ParentMissing(path.to_path_buf())),
    }
}
