//! Read-only multi-case commands: list and validate.
//!
//! Both work on one project or, with `--level`, on every project found
//! below the root.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::Serialize;

use crate::case::{self, ValidationState};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::lifecycle::CaseStore;
use crate::metadata::Status;
use crate::output::{emit_success, HumanOutput, OutputOptions};
use crate::scan::{self, CaseFilter, Project, SortOrder};

/// Projects to report on. Level 0 means the root itself must be a project.
fn projects(root: &Path, level: Option<usize>) -> Result<Vec<Project>> {
    let level = level.unwrap_or_else(|| Config::load_from_root(root).scan.level);
    let found = scan::discover_projects(root, level);
    tracing::debug!(root = %root.display(), depth = level, found = found.len(), "discovered projects");
    if found.is_empty() {
        return Err(Error::TasksRootNotFound(root.to_path_buf()));
    }
    Ok(found)
}

fn project_label(root: &Path, project: &Project) -> String {
    match project.root.strip_prefix(root) {
        Ok(rel) if rel.as_os_str().is_empty() => ".".to_string(),
        Ok(rel) => rel.display().to_string(),
        Err(_) => project.root.display().to_string(),
    }
}

pub struct ListOptions {
    pub root: PathBuf,
    pub statuses: Vec<Status>,
    pub all: bool,
    pub grep: Option<String>,
    pub level: Option<usize>,
    pub sort: SortOrder,
    pub verbose: bool,
    pub output: OutputOptions,
}

#[derive(Serialize)]
struct ListReport {
    projects: Vec<ProjectListing>,
}

#[derive(Serialize)]
struct ProjectListing {
    root: PathBuf,
    cases: Vec<CaseRow>,
    invalid: usize,
}

#[derive(Serialize)]
struct CaseRow {
    id: String,
    title: String,
    status: Status,
    last_touch: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    next_action: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    warnings: Vec<String>,
}

pub fn run_list(options: ListOptions) -> Result<()> {
    let filter = CaseFilter {
        statuses: options.statuses.iter().copied().collect::<HashSet<_>>(),
        include_terminal: options.all,
        text: options.grep,
    };
    let found = projects(&options.root, options.level)?;
    let multi = found.len() > 1;

    let mut human = HumanOutput::new("tsk list");
    let mut listings = Vec::with_capacity(found.len());
    let mut shown = 0usize;

    for project in &found {
        let states = CaseStore::open(&project.root).scan()?;
        let invalid = states.iter().filter(|state| !state.is_valid()).count();
        let mut cases = filter.apply(&states);
        scan::sort_cases(&mut cases, options.sort);
        shown += cases.len();

        let label = project_label(&options.root, project);
        if multi && !cases.is_empty() {
            human.push_detail(format!("{label}:"));
        }
        for case in &cases {
            let next = case
                .metadata
                .next_action_text()
                .filter(|_| !case.status().is_terminal())
                .map(|next| format!(" -> {next}"))
                .unwrap_or_default();
            let mut line = format!("{} [{}] {}{}", case.id, case.status(), case.title(), next);
            if options.verbose {
                line.push_str(&format!(" (touched {})", case.metadata.last_touch));
            }
            human.push_detail(line);
            for warning in &case.warnings {
                human.push_warning(format!("{}: {warning}", case.id));
            }
        }
        if invalid > 0 {
            human.push_warning(format!("{label}: {invalid} invalid case(s) not listed"));
            human.push_next_step("tsk validate");
        }

        listings.push(ProjectListing {
            root: project.root.clone(),
            cases: cases
                .iter()
                .map(|case| CaseRow {
                    id: case.id.to_string(),
                    title: case.title().to_string(),
                    status: case.status(),
                    last_touch: case.metadata.last_touch,
                    next_action: case.metadata.next_action.clone(),
                    warnings: case.warnings.iter().map(ToString::to_string).collect(),
                })
                .collect(),
            invalid,
        });
    }

    human.push_summary("cases", shown.to_string());
    if multi {
        human.push_summary("projects", found.len().to_string());
    }

    emit_success(
        options.output,
        "list",
        &ListReport { projects: listings },
        Some(&human),
    )
}

pub struct ValidateOptions {
    pub root: PathBuf,
    pub level: Option<usize>,
    pub check_links: bool,
    pub verbose: bool,
    pub output: OutputOptions,
}

#[derive(Serialize)]
struct ValidateReport {
    ok: bool,
    checked: usize,
    invalid: usize,
    projects: Vec<ProjectValidation>,
}

#[derive(Serialize)]
struct ProjectValidation {
    root: PathBuf,
    cases: Vec<CaseReport>,
}

#[derive(Serialize)]
struct CaseReport {
    id: String,
    dir: PathBuf,
    valid: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    defects: Vec<case::Defect>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    warnings: Vec<case::Warning>,
}

/// Validate every case. Fails with `ValidationFailed` after reporting if
/// any case has defects.
pub fn run_validate(options: ValidateOptions) -> Result<()> {
    let found = projects(&options.root, options.level)?;
    let mut human = HumanOutput::new("tsk validate");
    let mut reports = Vec::with_capacity(found.len());
    let (mut checked, mut invalid) = (0usize, 0usize);

    for project in &found {
        let label = project_label(&options.root, project);
        let states = CaseStore::open(&project.root).scan()?;
        let mut cases = Vec::with_capacity(states.len());

        for state in states {
            checked += 1;
            let report = match state {
                ValidationState::Valid(valid) => {
                    let defects = if options.check_links {
                        case::check_links(&valid, &project.root)
                    } else {
                        Vec::new()
                    };
                    CaseReport {
                        id: valid.id.to_string(),
                        valid: defects.is_empty(),
                        dir: valid.dir,
                        defects,
                        warnings: valid.warnings,
                    }
                }
                ValidationState::Invalid(broken) => CaseReport {
                    id: broken.candidate,
                    dir: broken.dir,
                    valid: false,
                    defects: broken.defects,
                    warnings: Vec::new(),
                },
            };

            if report.valid {
                if options.verbose {
                    human.push_detail(format!("{label}/{}: ok", report.id));
                }
            } else {
                invalid += 1;
                for defect in &report.defects {
                    human.push_detail(format!("{label}/{}: {defect}", report.id));
                }
            }
            for warning in &report.warnings {
                human.push_warning(format!("{label}/{}: {warning}", report.id));
            }
            cases.push(report);
        }

        reports.push(ProjectValidation {
            root: project.root.clone(),
            cases,
        });
    }

    human.push_summary("checked", checked.to_string());
    human.push_summary("invalid", invalid.to_string());
    if invalid > 0 {
        human.push_next_step("fix the reported files by hand, then re-run tsk validate");
    }

    let report = ValidateReport {
        ok: invalid == 0,
        checked,
        invalid,
        projects: reports,
    };
    emit_success(options.output, "validate", &report, Some(&human))?;

    if invalid > 0 {
        return Err(Error::ValidationFailed { invalid });
    }
    Ok(())
}
