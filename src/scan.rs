//! Read-only enumeration of case directories and projects.
//!
//! Nothing in this module writes to disk. A broken case shows up as an
//! `Invalid` entry; it never stops the scan of its siblings.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::case::{self, Case, ValidationState, Warning};
use crate::case_id::CaseId;
use crate::error::{Error, Result};
use crate::metadata::Status;
use crate::storage::{self, CaseDirEntry, TASKS_DIR};

/// Scan a tasks root. Results are ordered by case identifier, with
/// unparseable directory names last (by name).
///
/// Valid cases sharing a date and sequence number each carry a
/// `DuplicateSequence` warning.
pub fn scan(tasks_root: &Path) -> Result<Vec<ValidationState>> {
    let entries = storage::list_case_dirs(tasks_root)?;
    tracing::debug!(root = %tasks_root.display(), count = entries.len(), "scanning cases");

    let mut states: Vec<ValidationState> = entries
        .iter()
        .map(|entry| case::load(&entry.path))
        .collect();
    states.sort_by_cached_key(|state| {
        let candidate = state.candidate().to_string();
        let id = CaseId::parse(&candidate).ok();
        (id.is_none(), id, candidate)
    });
    flag_duplicate_sequences(&mut states);
    Ok(states)
}

fn flag_duplicate_sequences(states: &mut [ValidationState]) {
    let mut by_slot: HashMap<(NaiveDate, u32), Vec<String>> = HashMap::new();
    for case in states.iter().filter_map(ValidationState::as_valid) {
        by_slot
            .entry((case.id.date(), case.id.seq()))
            .or_default()
            .push(case.id.to_string());
    }

    for state in states.iter_mut() {
        let ValidationState::Valid(case) = state else {
            continue;
        };
        let Some(ids) = by_slot.get(&(case.id.date(), case.id.seq())) else {
            continue;
        };
        if ids.len() < 2 {
            continue;
        }
        let others: Vec<String> = ids
            .iter()
            .filter(|id| id.as_str() != case.id.as_str())
            .cloned()
            .collect();
        case.warnings.push(Warning::DuplicateSequence {
            seq: case.id.seq(),
            others,
        });
    }
}

/// A directory holding a `.tasks/` root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Project {
    pub root: PathBuf,
    pub tasks_dir: PathBuf,
    /// Depth below the discovery root (0 = the root itself)
    pub depth: usize,
}

/// Find projects under `root`, descending at most `level` directories.
///
/// `.tasks` itself is never descended into and does not count as a level.
/// Unreadable directories are skipped.
pub fn discover_projects(root: &Path, level: usize) -> Vec<Project> {
    let mut projects = Vec::new();
    walk(root, 0, level, &mut projects);
    projects.sort_by(|a, b| a.root.cmp(&b.root));
    projects
}

fn walk(dir: &Path, depth: usize, level: usize, out: &mut Vec<Project>) {
    let tasks_dir = dir.join(TASKS_DIR);
    if tasks_dir.is_dir() {
        out.push(Project {
            root: dir.to_path_buf(),
            tasks_dir,
            depth,
        });
    }
    if depth >= level {
        return;
    }

    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) => {
            tracing::debug!(dir = %dir.display(), error = %err, "skipping unreadable directory");
            return;
        }
    };
    for entry in entries.flatten() {
        let is_dir = entry.file_type().map(|ft| ft.is_dir()).unwrap_or(false);
        if !is_dir || entry.file_name() == TASKS_DIR {
            continue;
        }
        walk(&entry.path(), depth + 1, level, out);
    }
}

/// Listing order for valid cases.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    /// By identifier (date, then sequence)
    #[default]
    Id,
    /// Actionable first, then stalest first, then identifier
    Priority,
}

impl std::str::FromStr for SortOrder {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "id" => Ok(SortOrder::Id),
            "priority" => Ok(SortOrder::Priority),
            _ => Err(Error::InvalidArgument(format!(
                "invalid sort '{s}': must be id or priority"
            ))),
        }
    }
}

pub fn sort_cases(cases: &mut [Case], order: SortOrder) {
    match order {
        SortOrder::Id => cases.sort_by(|a, b| a.id.cmp(&b.id)),
        SortOrder::Priority => cases.sort_by(|a, b| {
            a.status()
                .rank()
                .cmp(&b.status().rank())
                .then_with(|| a.metadata.last_touch.cmp(&b.metadata.last_touch))
                .then_with(|| a.id.cmp(&b.id))
        }),
    }
}

/// Which valid cases a listing shows.
#[derive(Debug, Clone, Default)]
pub struct CaseFilter {
    /// Only these statuses (empty = any)
    pub statuses: HashSet<Status>,
    /// Show done/dropped cases when no explicit status is requested
    pub include_terminal: bool,
    /// Case-insensitive substring of title or id
    pub text: Option<String>,
}

impl CaseFilter {
    pub fn matches(&self, case: &Case) -> bool {
        let status = case.status();
        if !self.statuses.is_empty() {
            if !self.statuses.contains(&status) {
                return false;
            }
        } else if status.is_terminal() && !self.include_terminal {
            return false;
        }

        match self.text.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            Some(text) => {
                let needle = text.to_lowercase();
                case.title().to_lowercase().contains(&needle) || case.id.as_str().contains(&needle)
            }
            None => true,
        }
    }

    /// Apply the filter to scan results, keeping valid cases only.
    pub fn apply(&self, states: &[ValidationState]) -> Vec<Case> {
        states
            .iter()
            .filter_map(ValidationState::as_valid)
            .filter(|case| self.matches(case))
            .cloned()
            .collect()
    }
}

/// Resolve a user query to one case directory.
///
/// Tries an exact directory name, then a unique prefix, then a unique
/// substring. Invalid cases can be resolved too, so they can be reported.
pub fn resolve(tasks_root: &Path, query: &str) -> Result<PathBuf> {
    let query = query.trim();
    if query.is_empty() {
        return Err(Error::InvalidArgument("case query cannot be empty".to_string()));
    }

    let entries = storage::list_case_dirs(tasks_root)?;
    if let Some(exact) = entries.iter().find(|entry| entry.name == query) {
        return Ok(exact.path.clone());
    }

    let needle = query.to_lowercase();
    let prefixed: Vec<&CaseDirEntry> = entries
        .iter()
        .filter(|entry| entry.name.starts_with(&needle))
        .collect();
    let candidates = if prefixed.is_empty() {
        entries
            .iter()
            .filter(|entry| entry.name.contains(&needle))
            .collect::<Vec<_>>()
    } else {
        prefixed
    };

    match candidates.as_slice() {
        [] => Err(Error::CaseNotFound(query.to_string())),
        [single] => Ok(single.path.clone()),
        many => Err(Error::AmbiguousCase {
            query: query.to_string(),
            matches: many.iter().map(|entry| entry.name.clone()).collect(),
        }),
    }
}
