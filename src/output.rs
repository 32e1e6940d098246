//! Shared output formatting for tsk CLI commands.

use serde::Serialize;

use crate::error::{Error, JsonError, Result};

pub const SCHEMA_VERSION: &str = "tsk.v1";

#[derive(Debug, Clone, Copy)]
pub struct OutputOptions {
    pub json: bool,
    pub quiet: bool,
}

#[derive(Debug, Clone)]
pub struct HumanOutput {
    header: String,
    summary: Vec<(String, String)>,
    details: Vec<String>,
    warnings: Vec<String>,
    next_steps: Vec<String>,
}

impl HumanOutput {
    pub fn new(header: impl Into<String>) -> Self {
        Self {
            header: header.into(),
            summary: Vec::new(),
            details: Vec::new(),
            warnings: Vec::new(),
            next_steps: Vec::new(),
        }
    }

    pub fn push_summary(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.summary.push((key.into(), value.into()));
    }

    pub fn push_detail(&mut self, value: impl Into<String>) {
        self.details.push(value.into());
    }

    pub fn push_warning(&mut self, value: impl Into<String>) {
        self.warnings.push(value.into());
    }

    pub fn push_next_step(&mut self, value: impl Into<String>) {
        self.next_steps.push(value.into());
    }
}

#[derive(Serialize)]
struct SuccessEnvelope<'a, T: Serialize> {
    schema_version: &'static str,
    command: &'a str,
    status: &'static str,
    data: &'a T,
    #[serde(skip_serializing_if = "is_empty")]
    warnings: &'a [String],
    #[serde(skip_serializing_if = "is_empty")]
    next_steps: &'a [String],
}

fn is_empty(items: &&[String]) -> bool {
    items.is_empty()
}

#[derive(Serialize)]
struct ErrorEnvelope<'a> {
    schema_version: &'static str,
    command: &'a str,
    status: &'static str,
    error: JsonError,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    next_steps: Vec<String>,
}

/// The JSON success envelope around `data`. Warnings and next steps are
/// taken from `human` so both renderings agree.
pub fn success_json<T: Serialize>(
    command: &str,
    data: &T,
    human: Option<&HumanOutput>,
) -> Result<String> {
    let payload = SuccessEnvelope {
        schema_version: SCHEMA_VERSION,
        command,
        status: "success",
        data,
        warnings: human.map(|h| h.warnings.as_slice()).unwrap_or_default(),
        next_steps: human.map(|h| h.next_steps.as_slice()).unwrap_or_default(),
    };
    Ok(serde_json::to_string_pretty(&payload)?)
}

/// The JSON error envelope for `err`.
pub fn error_json(command: &str, err: &Error) -> Result<String> {
    let payload = ErrorEnvelope {
        schema_version: SCHEMA_VERSION,
        command,
        status: "error",
        error: JsonError::from(err),
        next_steps: error_next_steps(err),
    };
    Ok(serde_json::to_string_pretty(&payload)?)
}

/// Human rendering of `err`: the message, one line per defect or
/// candidate, and a hint when there is one.
pub fn error_human(err: &Error) -> String {
    let mut lines = vec![format!("error: {err}")];
    match err {
        Error::InvalidCase { defects, .. } => {
            lines.extend(defects.iter().map(|defect| format!("  - {defect}")));
        }
        Error::AmbiguousCase { matches, .. } => {
            lines.extend(matches.iter().map(|candidate| format!("  - {candidate}")));
        }
        _ => {}
    }
    if let Some(hint) = error_next_steps(err).into_iter().next() {
        lines.push(format!("hint: {hint}"));
    }
    lines.join("\n")
}

pub fn emit_success<T: Serialize>(
    options: OutputOptions,
    command: &str,
    data: &T,
    human: Option<&HumanOutput>,
) -> Result<()> {
    if options.json {
        println!("{}", success_json(command, data, human)?);
    } else if !options.quiet {
        if let Some(human) = human {
            println!("{}", format_human(human));
        }
    }
    Ok(())
}

pub fn emit_error(command: &str, err: &Error, json: bool) -> Result<()> {
    if json {
        println!("{}", error_json(command, err)?);
    } else {
        eprintln!("{}", error_human(err));
    }
    Ok(())
}

pub fn format_human(output: &HumanOutput) -> String {
    let mut lines = Vec::new();
    lines.push(output.header.clone());

    push_summary(&mut lines, &output.summary);
    push_section(&mut lines, "Details", &output.details);
    push_section(&mut lines, "Warnings", &output.warnings);
    push_section(&mut lines, "Next steps", &output.next_steps);

    lines.join("\n")
}

/// First positional argument, used to label error envelopes when clap
/// has not parsed anything yet.
pub fn infer_command_name_from_args() -> String {
    command_name_from(std::env::args().skip(1))
}

fn command_name_from(mut args: impl Iterator<Item = String>) -> String {
    while let Some(arg) = args.next() {
        // Global options that take a value.
        if arg == "--root" {
            args.next();
            continue;
        }
        if arg.starts_with('-') {
            continue;
        }
        return arg;
    }
    "tsk".to_string()
}

pub fn error_next_steps(err: &Error) -> Vec<String> {
    match err {
        Error::TasksRootNotFound(_) => vec!["tsk init".to_string()],
        Error::InvalidConfig(_) => vec!["fix .tsk.toml then retry".to_string()],
        Error::CaseNotFound(_) => vec!["tsk list --all".to_string()],
        Error::AmbiguousCase { .. } => vec!["use the full case id".to_string()],
        Error::MissingNextAction { .. } => vec!["pass --next \"...\"".to_string()],
        Error::InvalidCase { id, .. } => vec![
            format!("fix {id} by hand, then run tsk validate"),
        ],
        Error::ValidationFailed { .. } => vec!["tsk validate --json".to_string()],
        Error::InvalidTransition { id, .. } => vec![format!("tsk show {id}")],
        Error::LockFailed(_) => vec!["retry once the other tsk process finishes".to_string()],
        _ => Vec::new(),
    }
}

fn push_summary(lines: &mut Vec<String>, summary: &[(String, String)]) {
    if summary.is_empty() {
        return;
    }

    lines.push(String::new());
    lines.push("Summary:".to_string());
    for (key, value) in summary {
        if value.is_empty() {
            lines.push(format!("- {key}"));
        } else {
            lines.push(format!("- {key}: {value}"));
        }
    }
}

fn push_section(lines: &mut Vec<String>, title: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }

    lines.push(String::new());
    lines.push(format!("{title}:"));
    for item in items {
        lines.push(format!("- {item}"));
    }
}
