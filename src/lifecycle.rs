//! Mutating operations on case directories.
//!
//! Every mutation re-reads the case from disk under its advisory lock,
//! validates it, replaces `task.toml` atomically and only then appends one
//! line to `task.log`. A crash between the two writes leaves the log one
//! entry behind the metadata, which validation reports as a warning.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::case::{self, Case, Defect, ValidationState};
use crate::case_id;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::history::{self, HistoryEntry, TAG_CREATED, TAG_NOTE, TAG_STATUS, TAG_TOUCH};
use crate::lock::{self, FileLock};
use crate::metadata::{self, CaseMetadata, Status, FORMAT_VERSION};
use crate::scan;
use crate::storage::{self, Layout, STAGING_PREFIX};

/// Parameters for creating a case.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewCase {
    pub title: String,
    pub next_action: Option<String>,
    pub summary: Option<String>,
    pub links: Vec<String>,
}

/// Parameters for `touch`.
#[derive(Debug, Clone, Default)]
pub struct TouchRequest {
    /// Replacement next action
    pub next_action: Option<String>,
    /// Free-form comment for the history entry
    pub message: Option<String>,
}

/// Parameters for a status change.
#[derive(Debug, Clone)]
pub struct TransitionRequest {
    pub status: Status,
    pub next_action: Option<String>,
    pub message: Option<String>,
}

impl TransitionRequest {
    pub fn to(status: Status) -> Self {
        Self {
            status,
            next_action: None,
            message: None,
        }
    }
}

/// Entry point for all reads and writes against one project's tasks root.
#[derive(Debug, Clone)]
pub struct CaseStore {
    layout: Layout,
    config: Config,
    today: Option<NaiveDate>,
}

impl CaseStore {
    pub fn new(layout: Layout, config: Config) -> Self {
        Self {
            layout,
            config,
            today: None,
        }
    }

    /// Open the project at `project_root`, reading its `.tsk.toml`.
    pub fn open(project_root: impl Into<PathBuf>) -> Self {
        let layout = Layout::new(project_root);
        let config = Config::load_from_root(layout.project_root());
        Self::new(layout, config)
    }

    /// Pin the current date.
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn today(&self) -> NaiveDate {
        self.today.unwrap_or_else(|| Local::now().date_naive())
    }

    pub fn scan(&self) -> Result<Vec<ValidationState>> {
        scan::scan(&self.layout.require_tasks_dir()?)
    }

    /// Resolve a query (id, id prefix or slug fragment) to a case directory.
    pub fn resolve(&self, query: &str) -> Result<PathBuf> {
        scan::resolve(&self.layout.require_tasks_dir()?, query)
    }

    /// Load a case by query, valid or not.
    pub fn load(&self, query: &str) -> Result<ValidationState> {
        Ok(case::load(&self.resolve(query)?))
    }

    /// Create a new case.
    ///
    /// The case is assembled in a hidden staging directory and renamed into
    /// place while the tasks-root lock is held, so a visible case directory
    /// is always complete.
    pub fn create(&self, request: NewCase) -> Result<Case> {
        let tasks_dir = self.layout.require_tasks_dir()?;

        let title = request.title.trim().to_string();
        if title.is_empty() {
            return Err(Error::InvalidTitle(request.title));
        }
        let next_action = clean_text(request.next_action);
        if next_action.is_none() {
            return Err(Error::MissingNextAction {
                status: Status::Open,
            });
        }
        let links: Vec<String> = request
            .links
            .iter()
            .map(|link| link.trim())
            .filter(|link| !link.is_empty())
            .map(str::to_string)
            .collect();

        let _lock = FileLock::acquire_dir(&tasks_dir, self.config.lock.timeout_ms)?;

        let today = self.today();
        let siblings = storage::list_case_dir_names(&tasks_dir)?;
        let id = case_id::allocate(
            today,
            siblings.iter().map(String::as_str),
            &title,
            self.config.cases.seq_width,
            self.config.cases.slug_max_len,
        )?;

        let metadata = CaseMetadata {
            id: id.to_string(),
            title: title.clone(),
            status: Status::Open,
            created: today,
            last_touch: today,
            next_action,
            links,
            format_version: FORMAT_VERSION,
        };
        ensure_consistent(&metadata)?;

        let target = self.layout.case_dir(id.as_str());
        if target.exists() {
            return Err(Error::OperationFailed(format!(
                "{} already exists",
                target.display()
            )));
        }

        // Removed on drop unless the rename below moves it away first.
        let staging = tempfile::Builder::new()
            .prefix(STAGING_PREFIX)
            .tempdir_in(&tasks_dir)?;

        lock::write_atomic_str(
            storage::metadata_path(staging.path()),
            &metadata::encode(&metadata)?,
        )?;
        let entry = HistoryEntry::new(today, TAG_CREATED, &title);
        lock::write_atomic_str(
            storage::history_path(staging.path()),
            &history::append("", &entry),
        )?;
        if let Some(summary) = request.summary.as_deref().filter(|s| !s.trim().is_empty()) {
            lock::write_atomic_str(storage::summary_path(staging.path()), summary)?;
        }

        let case = publish(staging, &target)?;
        tracing::info!(id = %id, "created case");
        Ok(case)
    }

    /// Record activity on a case, optionally replacing its next action.
    pub fn touch(&self, case_dir: &Path, request: TouchRequest) -> Result<Case> {
        self.mutate(case_dir, |current, date| {
            let mut metadata = current.metadata.clone();
            let mut parts = Vec::new();

            if let Some(raw) = request.next_action {
                if current.status().is_terminal() {
                    return Err(Error::InvalidArgument(format!(
                        "cannot set a next action on {} case {}",
                        current.status(),
                        current.id
                    )));
                }
                let next = clean_text(Some(raw)).ok_or(Error::MissingNextAction {
                    status: current.status(),
                })?;
                parts.push(format!("next: {next}"));
                metadata.next_action = Some(next);
            }
            if let Some(message) = clean_text(request.message) {
                parts.insert(0, message);
            }

            let comment = if parts.is_empty() {
                "touched".to_string()
            } else {
                parts.join("; ")
            };
            Ok((metadata, HistoryEntry::new(date, TAG_TOUCH, comment)))
        })
    }

    /// Move a case to another status.
    pub fn transition(&self, case_dir: &Path, request: TransitionRequest) -> Result<Case> {
        self.mutate(case_dir, |current, date| {
            let from = current.status();
            let to = request.status;
            case::check_transition(current.id.as_str(), from, to)?;

            let mut metadata = current.metadata.clone();
            metadata.status = to;
            if let Some(next) = clean_text(request.next_action) {
                if to.is_terminal() {
                    return Err(Error::InvalidArgument(format!(
                        "cannot set a next action when moving to {to}"
                    )));
                }
                metadata.next_action = Some(next);
            }

            let comment = match clean_text(request.message) {
                Some(message) => format!("{from} -> {to}: {message}"),
                None => format!("{from} -> {to}"),
            };
            Ok((metadata, HistoryEntry::new(date, TAG_STATUS, comment)))
        })
    }

    /// Append a free-form note. Allowed on terminal cases.
    pub fn note(&self, case_dir: &Path, text: &str) -> Result<Case> {
        let text = clean_text(Some(text.to_string()))
            .ok_or_else(|| Error::InvalidArgument("note text cannot be empty".to_string()))?;
        self.mutate(case_dir, |current, date| {
            Ok((
                current.metadata.clone(),
                HistoryEntry::new(date, TAG_NOTE, &text),
            ))
        })
    }

    /// Shared shape of every in-place mutation.
    ///
    /// `apply` gets the freshly loaded case and the date to record, and
    /// returns the new metadata plus the history entry to append.
    fn mutate<F>(&self, case_dir: &Path, apply: F) -> Result<Case>
    where
        F: FnOnce(&Case, NaiveDate) -> Result<(CaseMetadata, HistoryEntry)>,
    {
        let _lock = FileLock::acquire_dir(case_dir, self.config.lock.timeout_ms)?;
        let current = case::load(case_dir).into_case()?;

        let date = self.today().max(current.metadata.last_touch);
        let (mut metadata, entry) = apply(&current, date)?;
        metadata.last_touch = date;
        ensure_consistent(&metadata)?;

        let history_path = storage::history_path(case_dir);
        let existing_log = fs::read_to_string(&history_path)?;

        lock::write_atomic_str(
            storage::metadata_path(case_dir),
            &metadata::encode(&metadata)?,
        )?;
        lock::append(
            &history_path,
            history::append_suffix(&existing_log, &entry).as_bytes(),
        )?;

        tracing::info!(id = %current.id, tag = %entry.tag, "updated case");
        case::load(case_dir).into_case()
    }
}

/// Rename a staged case into place and check it there.
///
/// `staging` is removed on drop if the rename fails. A renamed case that
/// does not load as valid is deleted again.
fn publish(staging: tempfile::TempDir, target: &Path) -> Result<Case> {
    fs::rename(staging.path(), target)?;
    drop(staging);

    match case::load(target) {
        ValidationState::Valid(case) => Ok(case),
        ValidationState::Invalid(invalid) => {
            tracing::warn!(dir = %target.display(), "created case failed validation, removing");
            lock::remove_dir_quietly(target);
            Err(Error::InvalidCase {
                id: invalid.candidate,
                defects: invalid.defects,
            })
        }
    }
}

/// Reject metadata that would fail validation once written.
fn ensure_consistent(metadata: &CaseMetadata) -> Result<()> {
    let defects = case::check_invariants(metadata);
    if defects.is_empty() {
        return Ok(());
    }
    if let Some(Defect::MissingNextAction { status }) = defects
        .iter()
        .find(|defect| matches!(defect, Defect::MissingNextAction { .. }))
    {
        return Err(Error::MissingNextAction { status: *status });
    }
    Err(Error::InvalidCase {
        id: metadata.id.clone(),
        defects,
    })
}

fn clean_text(value: Option<String>) -> Option<String> {
    value
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
}
