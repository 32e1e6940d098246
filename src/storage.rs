//! On-disk layout for tsk
//!
//! # Directory Structure
//!
//! ```text
//! <project>/
//!   .tsk.toml                       # Optional configuration
//!   .tasks/                         # Tasks root
//!     .lock                         # Held while allocating new cases
//!     <date>__<seq>__<slug>/        # One case directory
//!       task.toml                   # Required: metadata
//!       task.log                    # Required: append-only history
//!       summary.md                  # Optional: free-form text
//!       .lock                       # Held while mutating this case
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Name of the tasks root inside a project
pub const TASKS_DIR: &str = ".tasks";

/// Metadata file name
pub const METADATA_FILE: &str = "task.toml";

/// History log file name
pub const HISTORY_FILE: &str = "task.log";

/// Optional summary file name
pub const SUMMARY_FILE: &str = "summary.md";

/// Project configuration file name
pub const CONFIG_FILE: &str = ".tsk.toml";

/// Prefix of the staging directories used while creating a case
pub const STAGING_PREFIX: &str = ".staging-";

/// Paths of one project and its tasks root
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Layout {
    project_root: PathBuf,
}

impl Layout {
    pub fn new(project_root: impl Into<PathBuf>) -> Self {
        Self {
            project_root: project_root.into(),
        }
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    /// Path to `.tasks/`
    pub fn tasks_dir(&self) -> PathBuf {
        self.project_root.join(TASKS_DIR)
    }

    pub fn case_dir(&self, id: &str) -> PathBuf {
        self.tasks_dir().join(id)
    }

    pub fn is_initialized(&self) -> bool {
        self.tasks_dir().is_dir()
    }

    /// Create `.tasks/` if missing. Returns true if it was created.
    pub fn init(&self) -> Result<bool> {
        if self.is_initialized() {
            return Ok(false);
        }
        let dir = self.tasks_dir();
        if dir.exists() {
            return Err(Error::InvalidArgument(format!(
                "{} exists but is not a directory",
                dir.display()
            )));
        }
        fs::create_dir_all(&dir)?;
        Ok(true)
    }

    /// The tasks root, or `TasksRootNotFound` if the project has none.
    pub fn require_tasks_dir(&self) -> Result<PathBuf> {
        if self.is_initialized() {
            Ok(self.tasks_dir())
        } else {
            Err(Error::TasksRootNotFound(self.project_root.clone()))
        }
    }
}

/// Path helpers for a single case directory
pub fn metadata_path(case_dir: &Path) -> PathBuf {
    case_dir.join(METADATA_FILE)
}

pub fn history_path(case_dir: &Path) -> PathBuf {
    case_dir.join(HISTORY_FILE)
}

pub fn summary_path(case_dir: &Path) -> PathBuf {
    case_dir.join(SUMMARY_FILE)
}

/// An immediate subdirectory of the tasks root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaseDirEntry {
    /// Directory name for display; lossy if the name is not UTF-8
    pub name: String,
    /// The real path, valid even when `name` is lossy
    pub path: PathBuf,
}

/// Non-hidden subdirectories of `dir`, sorted by name.
///
/// Only failing to open `dir` itself is an error. Entries that cannot be
/// read are skipped.
pub fn list_case_dirs(dir: &Path) -> Result<Vec<CaseDirEntry>> {
    let mut found = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                tracing::debug!(dir = %dir.display(), error = %err, "skipping unreadable entry");
                continue;
            }
        };
        let is_dir = match entry.file_type() {
            Ok(file_type) => file_type.is_dir(),
            Err(err) => {
                tracing::debug!(path = %entry.path().display(), error = %err, "skipping entry");
                continue;
            }
        };
        let name = entry.file_name().to_string_lossy().into_owned();
        if !is_dir || name.starts_with('.') {
            continue;
        }
        found.push(CaseDirEntry {
            name,
            path: entry.path(),
        });
    }
    found.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(found)
}

/// Names of the case directories under `dir`, sorted.
pub fn list_case_dir_names(dir: &Path) -> Result<Vec<String>> {
    Ok(list_case_dirs(dir)?
        .into_iter()
        .map(|entry| entry.name)
        .collect())
}
