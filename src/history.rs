//! Append-only case history (`task.log`).
//!
//! Each line is `YYYY-MM-DD: [tag] comment`. Existing bytes are never
//! rewritten: `append` only ever produces a suffix of its input.

use std::fmt;

use chrono::NaiveDate;
use serde::Serialize;
use thiserror::Error;

use crate::case_id::{parse_date, DATE_FORMAT};

pub const TAG_CREATED: &str = "created";
pub const TAG_TOUCH: &str = "touch";
pub const TAG_STATUS: &str = "status";
pub const TAG_NOTE: &str = "note";

/// One immutable history record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryEntry {
    pub date: NaiveDate,
    pub tag: String,
    pub comment: String,
}

impl HistoryEntry {
    /// Build an entry, folding the comment onto a single line.
    pub fn new(date: NaiveDate, tag: impl Into<String>, comment: impl AsRef<str>) -> Self {
        let comment = comment
            .as_ref()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ");
        Self {
            date,
            tag: tag.into(),
            comment,
        }
    }

    /// Render without trailing newline.
    pub fn render(&self) -> String {
        if self.comment.is_empty() {
            format!("{}: [{}]", self.date.format(DATE_FORMAT), self.tag)
        } else {
            format!(
                "{}: [{}] {}",
                self.date.format(DATE_FORMAT),
                self.tag,
                self.comment
            )
        }
    }
}

impl fmt::Display for HistoryEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

/// A single line that does not match the log grammar.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("line {line_number}: malformed history line {raw:?}")]
pub struct MalformedLogLine {
    pub line_number: usize,
    pub raw: String,
}

/// Every malformed line of a log, in file order.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("{} malformed history line(s)", .lines.len())]
pub struct LogParseError {
    pub lines: Vec<MalformedLogLine>,
}

/// Parse a full log. Blank lines are skipped; all bad lines are reported.
pub fn parse(raw: &str) -> Result<Vec<HistoryEntry>, LogParseError> {
    let mut entries = Vec::new();
    let mut malformed = Vec::new();

    for (idx, line) in raw.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match parse_line(line) {
            Some(entry) => entries.push(entry),
            None => malformed.push(MalformedLogLine {
                line_number: idx + 1,
                raw: line.to_string(),
            }),
        }
    }

    if malformed.is_empty() {
        Ok(entries)
    } else {
        Err(LogParseError { lines: malformed })
    }
}

/// Parse one line; `None` if it does not match the grammar.
pub fn parse_line(line: &str) -> Option<HistoryEntry> {
    let line = line.trim_end_matches('\r');
    let (date_part, rest) = line.split_once(": ")?;
    let date = parse_date(date_part)?;

    let rest = rest.trim_start().strip_prefix('[')?;
    let (tag, comment) = rest.split_once(']')?;
    if !is_valid_tag(tag) {
        return None;
    }

    let comment = if comment.is_empty() {
        ""
    } else {
        // Tag and comment are separated by whitespace.
        if !comment.starts_with(char::is_whitespace) {
            return None;
        }
        comment.trim()
    };

    Some(HistoryEntry {
        date,
        tag: tag.to_string(),
        comment: comment.to_string(),
    })
}

/// Return `existing` extended by one entry.
///
/// If the existing text lacks a final newline (a torn previous append), a
/// newline is added first so the new entry starts on its own line; the
/// preceding bytes are left untouched either way.
pub fn append(existing: &str, entry: &HistoryEntry) -> String {
    let mut out = String::with_capacity(existing.len() + 64);
    out.push_str(existing);
    out.push_str(&append_suffix(existing, entry));
    out
}

/// The bytes `append` adds after `existing`.
pub fn append_suffix(existing: &str, entry: &HistoryEntry) -> String {
    let mut suffix = String::new();
    if !existing.is_empty() && !existing.ends_with('\n') {
        suffix.push('\n');
    }
    suffix.push_str(&entry.render());
    suffix.push('\n');
    suffix
}

pub fn is_valid_tag(tag: &str) -> bool {
    !tag.is_empty()
        && tag
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_')
}
