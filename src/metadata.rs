//! Case metadata (`task.toml`) and its codec.
//!
//! This is the only place that knows the on-disk metadata syntax and the
//! supported format version. Decoding is strict: missing keys, unknown keys,
//! wrongly typed values and foreign versions are all reported.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use toml::Value;

use crate::case_id::{parse_date, DATE_FORMAT};
use crate::error::Error;

/// The only metadata format version this engine reads and writes.
pub const FORMAT_VERSION: i64 = 2;

/// Supported format versions, reported back on mismatch.
pub const SUPPORTED_VERSIONS: &[i64] = &[FORMAT_VERSION];

const KNOWN_FIELDS: &[&str] = &[
    "id",
    "title",
    "status",
    "created",
    "last_touch",
    "next_action",
    "links",
    "format_version",
];

/// Lifecycle status of a case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Open,
    InProgress,
    Blocked,
    Done,
    Dropped,
}

impl Status {
    pub const ALL: [Status; 5] = [
        Status::Open,
        Status::InProgress,
        Status::Blocked,
        Status::Done,
        Status::Dropped,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Status::Open => "open",
            Status::InProgress => "in_progress",
            Status::Blocked => "blocked",
            Status::Done => "done",
            Status::Dropped => "dropped",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Status::Done | Status::Dropped)
    }

    /// Listing priority: what can be acted on now comes first.
    pub fn rank(self) -> usize {
        match self {
            Status::InProgress => 0,
            Status::Open => 1,
            Status::Blocked => 2,
            Status::Done => 3,
            Status::Dropped => 4,
        }
    }

    fn allowed_list() -> String {
        Status::ALL
            .iter()
            .map(|s| s.as_str())
            .collect::<Vec<_>>()
            .join("|")
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        Status::ALL
            .into_iter()
            .find(|status| status.as_str() == normalized)
            .ok_or_else(|| {
                Error::InvalidArgument(format!(
                    "unknown status '{}' (expected {})",
                    s,
                    Status::allowed_list()
                ))
            })
    }
}

/// Decoded contents of `task.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CaseMetadata {
    pub id: String,
    pub title: String,
    pub status: Status,
    pub created: NaiveDate,
    pub last_touch: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_action: Option<String>,
    pub links: Vec<String>,
    pub format_version: i64,
}

impl CaseMetadata {
    /// Next action with surrounding whitespace removed, if non-blank.
    pub fn next_action_text(&self) -> Option<&str> {
        self.next_action
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }
}

/// Metadata decoding failures.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DecodeError {
    #[error("invalid TOML: {message}")]
    Syntax { message: String },

    #[error("missing field '{field}'")]
    MissingField { field: String },

    #[error("unknown field '{field}'")]
    UnknownField { field: String },

    #[error("field '{field}': expected {expected}, found {actual}")]
    TypeMismatch {
        field: String,
        expected: String,
        actual: String,
    },

    #[error("field '{field}' must not be empty")]
    EmptyField { field: String },

    #[error("unknown status '{value}' (expected {allowed})")]
    UnknownStatus { value: String, allowed: String },

    #[error("unsupported format_version {found} (supported: {supported:?})")]
    UnsupportedVersion { found: i64, supported: Vec<i64> },
}

/// On-disk field order; `decode(encode(m)) == m` relies on this mirroring
/// what `decode` reads.
#[derive(Serialize)]
struct MetadataDocument<'a> {
    id: &'a str,
    title: &'a str,
    status: Status,
    created: String,
    last_touch: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    next_action: Option<&'a str>,
    links: &'a [String],
    format_version: i64,
}

/// Serialize metadata to its canonical TOML form.
pub fn encode(metadata: &CaseMetadata) -> crate::error::Result<String> {
    let doc = MetadataDocument {
        id: &metadata.id,
        title: &metadata.title,
        status: metadata.status,
        created: metadata.created.format(DATE_FORMAT).to_string(),
        last_touch: metadata.last_touch.format(DATE_FORMAT).to_string(),
        next_action: metadata.next_action.as_deref(),
        links: &metadata.links,
        format_version: metadata.format_version,
    };
    Ok(toml::to_string(&doc)?)
}

/// Parse and validate `task.toml` contents.
pub fn decode(raw: &str) -> Result<CaseMetadata, DecodeError> {
    let table: toml::Table = toml::from_str(raw).map_err(|err| DecodeError::Syntax {
        message: err.message().to_string(),
    })?;

    // Version first: a foreign version may legitimately have other fields.
    let format_version = match table.get("format_version") {
        None => {
            return Err(DecodeError::MissingField {
                field: "format_version".to_string(),
            })
        }
        Some(Value::Integer(found)) => *found,
        Some(other) => return Err(mismatch("format_version", "integer", other)),
    };
    if !SUPPORTED_VERSIONS.contains(&format_version) {
        return Err(DecodeError::UnsupportedVersion {
            found: format_version,
            supported: SUPPORTED_VERSIONS.to_vec(),
        });
    }

    if let Some(unknown) = table.keys().find(|key| !KNOWN_FIELDS.contains(&key.as_str())) {
        return Err(DecodeError::UnknownField {
            field: unknown.clone(),
        });
    }

    let id = required_string(&table, "id")?;
    let title = required_string(&table, "title")?;
    if title.trim().is_empty() {
        return Err(DecodeError::EmptyField {
            field: "title".to_string(),
        });
    }

    let status_raw = required_string(&table, "status")?;
    let status = Status::ALL
        .into_iter()
        .find(|status| status.as_str() == status_raw)
        .ok_or_else(|| DecodeError::UnknownStatus {
            value: status_raw.clone(),
            allowed: Status::allowed_list(),
        })?;

    let created = required_date(&table, "created")?;
    let last_touch = required_date(&table, "last_touch")?;

    let next_action = match table.get("next_action") {
        None => None,
        Some(Value::String(value)) => Some(value.clone()),
        Some(other) => return Err(mismatch("next_action", "string", other)),
    };

    let links = match table.get("links") {
        None => Vec::new(),
        Some(Value::Array(items)) => items
            .iter()
            .enumerate()
            .map(|(idx, item)| match item {
                Value::String(link) => Ok(link.clone()),
                other => Err(mismatch(&format!("links[{idx}]"), "string", other)),
            })
            .collect::<Result<Vec<_>, _>>()?,
        Some(other) => return Err(mismatch("links", "array of strings", other)),
    };

    Ok(CaseMetadata {
        id,
        title,
        status,
        created,
        last_touch,
        next_action,
        links,
        format_version,
    })
}

fn required<'a>(table: &'a toml::Table, field: &str) -> Result<&'a Value, DecodeError> {
    table.get(field).ok_or_else(|| DecodeError::MissingField {
        field: field.to_string(),
    })
}

fn required_string(table: &toml::Table, field: &str) -> Result<String, DecodeError> {
    match required(table, field)? {
        Value::String(value) => Ok(value.clone()),
        other => Err(mismatch(field, "string", other)),
    }
}

fn required_date(table: &toml::Table, field: &str) -> Result<NaiveDate, DecodeError> {
    let value = required(table, field)?;
    let date = match value {
        Value::String(text) => parse_date(text),
        Value::Datetime(datetime) if datetime.time.is_none() && datetime.offset.is_none() => {
            datetime.date.and_then(|date| {
                NaiveDate::from_ymd_opt(date.year.into(), date.month.into(), date.day.into())
            })
        }
        _ => None,
    };
    date.ok_or_else(|| mismatch(field, "date (YYYY-MM-DD)", value))
}

fn mismatch(field: &str, expected: &str, actual: &Value) -> DecodeError {
    let actual = match actual {
        Value::String(text) => format!("string {text:?}"),
        other => other.type_str().to_string(),
    };
    DecodeError::TypeMismatch {
        field: field.to_string(),
        expected: expected.to_string(),
        actual,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> CaseMetadata {
        CaseMetadata {
            id: "2025-12-25__000__fix_login_bug".to_string(),
            title: "Fix \"Login\" Bug!!".to_string(),
            status: Status::InProgress,
            created: NaiveDate::from_ymd_opt(2025, 12, 25).unwrap(),
            last_touch: NaiveDate::from_ymd_opt(2025, 12, 27).unwrap(),
            next_action: Some("write tests".to_string()),
            links: vec!["https://example.com/issue/1".to_string(), "src/login.rs".to_string()],
            format_version: FORMAT_VERSION,
        }
    }

    #[test]
    fn encode_decode_round_trip() {
        let mut without_next = sample();
        without_next.status = Status::Done;
        without_next.next_action = None;
        without_next.links.clear();

        for metadata in [sample(), without_next] {
            let encoded = encode(&metadata).unwrap();
            assert_eq!(decode(&encoded).unwrap(), metadata);
        }
    }

    #[test]
    fn encode_uses_canonical_field_order() {
        let encoded = encode(&sample()).unwrap();
        let keys: Vec<&str> = encoded
            .lines()
            .filter_map(|line| line.split_once(" = ").map(|(key, _)| key))
            .collect();
        assert_eq!(
            keys,
            vec![
                "id",
                "title",
                "status",
                "created",
                "last_touch",
                "next_action",
                "links",
                "format_version"
            ]
        );
        assert!(encoded.contains("status = \"in_progress\""));
        assert!(encoded.contains("created = \"2025-12-25\""));
    }

    #[test]
    fn decode_reports_missing_field() {
        let raw = r#"
id = "2025-12-25__000__x"
status = "open"
created = "2025-12-25"
last_touch = "2025-12-25"
format_version = 2
"#;
        assert_eq!(
            decode(raw).unwrap_err(),
            DecodeError::MissingField {
                field: "title".to_string()
            }
        );
    }

    #[test]
    fn decode_reports_type_mismatch() {
        let raw = r#"
id = "2025-12-25__000__x"
title = "x"
status = "open"
created = "yesterday"
last_touch = "2025-12-25"
format_version = 2
"#;
        match decode(raw).unwrap_err() {
            DecodeError::TypeMismatch {
                field,
                expected,
                actual,
            } => {
                assert_eq!(field, "created");
                assert!(expected.contains("date"));
                assert!(actual.contains("yesterday"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn decode_accepts_native_toml_dates() {
        let raw = r#"
id = "2025-12-25__000__x"
title = "x"
status = "open"
created = 2025-12-25
last_touch = 2025-12-26
next_action = "go"
format_version = 2
"#;
        let metadata = decode(raw).unwrap();
        assert_eq!(metadata.created, NaiveDate::from_ymd_opt(2025, 12, 25).unwrap());
        assert!(metadata.links.is_empty());
    }

    #[test]
    fn decode_rejects_unsupported_version() {
        let raw = r#"
id = "2025-12-25__000__x"
title = "x"
status = "open"
created = "2025-12-25"
last_touch = "2025-12-25"
format_version = 1
"#;
        assert_eq!(
            decode(raw).unwrap_err(),
            DecodeError::UnsupportedVersion {
                found: 1,
                supported: vec![2]
            }
        );
    }

    #[test]
    fn decode_rejects_unknown_status_and_fields() {
        let base = r#"
id = "2025-12-25__000__x"
title = "x"
created = "2025-12-25"
last_touch = "2025-12-25"
format_version = 2
"#;
        let bad_status = format!("{base}status = \"active\"\n");
        assert!(matches!(
            decode(&bad_status).unwrap_err(),
            DecodeError::UnknownStatus { .. }
        ));

        let extra = format!("{base}status = \"open\"\npriority = \"P1\"\n");
        assert_eq!(
            decode(&extra).unwrap_err(),
            DecodeError::UnknownField {
                field: "priority".to_string()
            }
        );
    }

    #[test]
    fn decode_reports_syntax_errors() {
        assert!(matches!(
            decode("id = ").unwrap_err(),
            DecodeError::Syntax { .. }
        ));
    }

    #[test]
    fn status_parsing_is_forgiving_for_cli_input() {
        assert_eq!("In-Progress".parse::<Status>().unwrap(), Status::InProgress);
        assert_eq!("done".parse::<Status>().unwrap(), Status::Done);
        assert!("paused".parse::<Status>().is_err());
        assert!(Status::Dropped.is_terminal());
        assert!(!Status::Blocked.is_terminal());
    }
}
