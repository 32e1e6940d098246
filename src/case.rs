//! Case entity and validator.
//!
//! A case directory is read into either a valid [`Case`] or an
//! [`InvalidCase`] carrying every defect found. Loading never fails as a
//! whole: a broken case is a value, not an error.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use chrono::NaiveDate;
use serde::Serialize;

use crate::case_id::CaseId;
use crate::error::{Error, Result};
use crate::history::{self, HistoryEntry, TAG_STATUS};
use crate::lock;
use crate::metadata::{self, CaseMetadata, DecodeError, Status};
use crate::storage::{HISTORY_FILE, METADATA_FILE, SUMMARY_FILE};

/// A structural or semantic problem that makes a case invalid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Defect {
    MalformedIdentifier { name: String, reason: String },
    MissingRequiredFile { name: String },
    NotAFile { name: String },
    Unreadable { name: String, message: String },
    Decode { error: DecodeError },
    MalformedLogLine { line_number: usize, raw: String },
    EmptyHistory,
    IdentityMismatch { directory: String, embedded: String },
    MissingNextAction { status: Status },
    TouchBeforeCreated { created: NaiveDate, last_touch: NaiveDate },
    LinkOutsideProject { link: String },
    LinkMissing { link: String },
}

impl fmt::Display for Defect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Defect::MalformedIdentifier { name, reason } => {
                write!(f, "malformed directory name '{name}': {reason}")
            }
            Defect::MissingRequiredFile { name } => write!(f, "missing required file {name}"),
            Defect::NotAFile { name } => write!(f, "{name} is not a regular file"),
            Defect::Unreadable { name, message } => write!(f, "cannot read {name}: {message}"),
            Defect::Decode { error } => write!(f, "{METADATA_FILE}: {error}"),
            Defect::MalformedLogLine { line_number, raw } => write!(
                f,
                "{HISTORY_FILE} line {line_number} must match 'YYYY-MM-DD: [type] comment': {raw:?}"
            ),
            Defect::EmptyHistory => write!(f, "{HISTORY_FILE} has no entries"),
            Defect::IdentityMismatch {
                directory,
                embedded,
            } => write!(
                f,
                "id '{embedded}' does not match directory name '{directory}'"
            ),
            Defect::MissingNextAction { status } => {
                write!(f, "next_action is required while status is {status}")
            }
            Defect::TouchBeforeCreated {
                created,
                last_touch,
            } => write!(f, "last_touch {last_touch} is before created {created}"),
            Defect::LinkOutsideProject { link } => {
                write!(f, "file link points outside the project: {link}")
            }
            Defect::LinkMissing { link } => write!(f, "linked file does not exist: {link}"),
        }
    }
}

/// A soft inconsistency that does not invalidate the case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Warning {
    /// The history does not reflect the latest metadata write.
    LogLag { lag: LogLag },
    /// A temporary file left behind by an interrupted write.
    StaleTempFile { name: String },
    /// Other cases created the same day use the same sequence number.
    DuplicateSequence { seq: u32, others: Vec<String> },
}

/// How the log trails the metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum LogLag {
    /// The history ends before `last_touch`.
    Date {
        last_entry: NaiveDate,
        last_touch: NaiveDate,
    },
    /// The last logged transition ends in a different status.
    Status { logged: Status, status: Status },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::LogLag {
                lag:
                    LogLag::Date {
                        last_entry,
                        last_touch,
                    },
            } => write!(
                f,
                "history ends {last_entry} but last_touch is {last_touch} (log lags metadata)"
            ),
            Warning::LogLag {
                lag: LogLag::Status { logged, status },
            } => write!(
                f,
                "history last records status {logged} but metadata says {status} (log lags metadata)"
            ),
            Warning::StaleTempFile { name } => write!(f, "stale temporary file {name}"),
            Warning::DuplicateSequence { seq, others } => {
                write!(f, "sequence {seq} is also used by {}", others.join(", "))
            }
        }
    }
}

/// A fully valid case, read fresh from disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Case {
    pub id: CaseId,
    pub dir: PathBuf,
    pub metadata: CaseMetadata,
    pub history: Vec<HistoryEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<Warning>,
}

impl Case {
    pub fn status(&self) -> Status {
        self.metadata.status
    }

    pub fn title(&self) -> &str {
        &self.metadata.title
    }
}

/// A case directory that failed validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InvalidCase {
    /// Directory name, i.e. the identifier the case would have.
    pub candidate: String,
    pub dir: PathBuf,
    pub defects: Vec<Defect>,
}

/// Outcome of reading one case directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ValidationState {
    Valid(Case),
    Invalid(InvalidCase),
}

impl ValidationState {
    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationState::Valid(_))
    }

    /// Directory name of the case, valid or not.
    pub fn candidate(&self) -> &str {
        match self {
            ValidationState::Valid(case) => case.id.as_str(),
            ValidationState::Invalid(invalid) => &invalid.candidate,
        }
    }

    pub fn dir(&self) -> &Path {
        match self {
            ValidationState::Valid(case) => &case.dir,
            ValidationState::Invalid(invalid) => &invalid.dir,
        }
    }

    pub fn as_valid(&self) -> Option<&Case> {
        match self {
            ValidationState::Valid(case) => Some(case),
            ValidationState::Invalid(_) => None,
        }
    }

    /// The valid case, or `InvalidCase` carrying its defects.
    pub fn into_case(self) -> Result<Case> {
        match self {
            ValidationState::Valid(case) => Ok(case),
            ValidationState::Invalid(invalid) => Err(Error::InvalidCase {
                id: invalid.candidate,
                defects: invalid.defects,
            }),
        }
    }
}

/// Read and validate one case directory.
pub fn load(dir: &Path) -> ValidationState {
    let name = dir
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut defects = Vec::new();

    let id = match CaseId::parse(&name) {
        Ok(id) => Some(id),
        Err(Error::MalformedIdentifier { name, reason }) => {
            defects.push(Defect::MalformedIdentifier { name, reason });
            None
        }
        Err(other) => {
            defects.push(Defect::MalformedIdentifier {
                name: name.clone(),
                reason: other.to_string(),
            });
            None
        }
    };

    let metadata_raw = read_required(dir, METADATA_FILE, &mut defects);
    let history_raw = read_required(dir, HISTORY_FILE, &mut defects);

    let metadata = metadata_raw.and_then(|raw| match metadata::decode(&raw) {
        Ok(metadata) => Some(metadata),
        Err(error) => {
            defects.push(Defect::Decode { error });
            None
        }
    });

    let history = history_raw.and_then(|raw| match history::parse(&raw) {
        Ok(entries) => {
            if entries.is_empty() {
                defects.push(Defect::EmptyHistory);
            }
            Some(entries)
        }
        Err(err) => {
            defects.extend(err.lines.into_iter().map(|line| Defect::MalformedLogLine {
                line_number: line.line_number,
                raw: line.raw,
            }));
            None
        }
    });

    let summary = read_optional(dir, SUMMARY_FILE, &mut defects);

    if let Some(metadata) = &metadata {
        if metadata.id != name {
            defects.push(Defect::IdentityMismatch {
                directory: name.clone(),
                embedded: metadata.id.clone(),
            });
        }
        defects.extend(check_invariants(metadata));
    }

    match (id, metadata, history) {
        (Some(id), Some(metadata), Some(history)) if defects.is_empty() => {
            let warnings = collect_warnings(dir, &metadata, &history);
            ValidationState::Valid(Case {
                id,
                dir: dir.to_path_buf(),
                metadata,
                history,
                summary,
                warnings,
            })
        }
        _ => ValidationState::Invalid(InvalidCase {
            candidate: name,
            dir: dir.to_path_buf(),
            defects,
        }),
    }
}

/// Cross-field rules on decoded metadata.
pub fn check_invariants(metadata: &CaseMetadata) -> Vec<Defect> {
    let mut defects = Vec::new();
    if !metadata.status.is_terminal() && metadata.next_action_text().is_none() {
        defects.push(Defect::MissingNextAction {
            status: metadata.status,
        });
    }
    if metadata.created > metadata.last_touch {
        defects.push(Defect::TouchBeforeCreated {
            created: metadata.created,
            last_touch: metadata.last_touch,
        });
    }
    defects
}

/// Whether `from -> to` is a permitted status change.
///
/// Non-terminal states may move anywhere else; terminal states may only be
/// reclassified as the other terminal state. Staying put is never a
/// transition.
pub fn check_transition(id: &str, from: Status, to: Status) -> Result<()> {
    let reason = if from == to {
        Some(format!("case is already {to}"))
    } else if from.is_terminal() && !to.is_terminal() {
        Some("terminal cases cannot be reopened".to_string())
    } else {
        None
    };

    match reason {
        Some(reason) => Err(Error::InvalidTransition {
            id: id.to_string(),
            from,
            to,
            reason,
        }),
        None => Ok(()),
    }
}

/// Check file links against the project tree.
///
/// Links written as `file:<path>` or as a bare relative path are resolved
/// from `project_root`; URLs and other `kind:` links are skipped.
pub fn check_links(case: &Case, project_root: &Path) -> Vec<Defect> {
    let mut defects = Vec::new();
    for link in &case.metadata.links {
        let Some(target) = file_link_target(link) else {
            continue;
        };
        let path = Path::new(target);
        if escapes_root(path) {
            defects.push(Defect::LinkOutsideProject { link: link.clone() });
        } else if !project_root.join(path).exists() {
            defects.push(Defect::LinkMissing { link: link.clone() });
        }
    }
    defects
}

fn file_link_target(link: &str) -> Option<&str> {
    let link = link.trim();
    if link.is_empty() {
        return None;
    }
    if let Some(rest) = link.strip_prefix("file:") {
        return Some(rest.trim());
    }
    if link.contains("://") {
        return None;
    }
    // `note: ...`, `url: ...` and similar tagged links are not paths.
    if let Some((kind, _)) = link.split_once(':') {
        if !kind.is_empty() && kind.bytes().all(|b| b.is_ascii_alphabetic()) {
            return None;
        }
    }
    Some(link)
}

fn escapes_root(path: &Path) -> bool {
    let mut depth: usize = 0;
    for component in path.components() {
        match component {
            Component::Normal(_) => depth += 1,
            Component::CurDir => {}
            Component::ParentDir => {
                if depth == 0 {
                    return true;
                }
                depth -= 1;
            }
            Component::RootDir | Component::Prefix(_) => return true,
        }
    }
    false
}

fn collect_warnings(dir: &Path, metadata: &CaseMetadata, history: &[HistoryEntry]) -> Vec<Warning> {
    let mut warnings = Vec::new();

    if let Some(last) = history.last() {
        if last.date < metadata.last_touch {
            warnings.push(Warning::LogLag {
                lag: LogLag::Date {
                    last_entry: last.date,
                    last_touch: metadata.last_touch,
                },
            });
        }
    }
    if let Some(logged) = logged_status(history) {
        if logged != metadata.status {
            warnings.push(Warning::LogLag {
                lag: LogLag::Status {
                    logged,
                    status: metadata.status,
                },
            });
        }
    }

    match fs::read_dir(dir) {
        Ok(entries) => {
            let mut stale: Vec<String> = entries
                .filter_map(|entry| entry.ok())
                .map(|entry| entry.file_name().to_string_lossy().into_owned())
                .filter(|name| lock::is_temp_file_name(name))
                .collect();
            stale.sort();
            warnings.extend(stale.into_iter().map(|name| Warning::StaleTempFile { name }));
        }
        Err(err) => {
            tracing::debug!(dir = %dir.display(), error = %err, "cannot list case directory");
        }
    }

    warnings
}

/// Status the history ends in: the target of the last `[status]` entry,
/// or `open` when there is none. `None` if that entry cannot be read.
fn logged_status(history: &[HistoryEntry]) -> Option<Status> {
    match history.iter().rev().find(|entry| entry.tag == TAG_STATUS) {
        Some(entry) => {
            let (_, target) = entry.comment.split_once(" -> ")?;
            let target = target.split(':').next().unwrap_or(target);
            target.parse().ok()
        }
        None => Some(Status::Open),
    }
}

fn read_required(dir: &Path, name: &str, defects: &mut Vec<Defect>) -> Option<String> {
    let path = dir.join(name);
    match fs::metadata(&path) {
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            defects.push(Defect::MissingRequiredFile {
                name: name.to_string(),
            });
            None
        }
        Err(err) => {
            defects.push(Defect::Unreadable {
                name: name.to_string(),
                message: err.to_string(),
            });
            None
        }
        Ok(meta) if !meta.is_file() => {
            defects.push(Defect::NotAFile {
                name: name.to_string(),
            });
            None
        }
        Ok(_) => read_text(&path, name, defects),
    }
}

fn read_optional(dir: &Path, name: &str, defects: &mut Vec<Defect>) -> Option<String> {
    let path = dir.join(name);
    match fs::metadata(&path) {
        Err(err) if err.kind() == io::ErrorKind::NotFound => None,
        Err(err) => {
            defects.push(Defect::Unreadable {
                name: name.to_string(),
                message: err.to_string(),
            });
            None
        }
        Ok(meta) if !meta.is_file() => {
            defects.push(Defect::NotAFile {
                name: name.to_string(),
            });
            None
        }
        Ok(_) => read_text(&path, name, defects),
    }
}

fn read_text(path: &Path, name: &str, defects: &mut Vec<Defect>) -> Option<String> {
    match fs::read_to_string(path) {
        Ok(text) => Some(text),
        Err(err) => {
            defects.push(Defect::Unreadable {
                name: name.to_string(),
                message: err.to_string(),
            });
            None
        }
    }
}
