//! Single-case commands: new, show, touch, note, status/done/drop.

use std::path::PathBuf;

use crate::case::{Case, ValidationState};
use crate::error::Result;
use crate::lifecycle::{CaseStore, NewCase, TouchRequest, TransitionRequest};
use crate::metadata::Status;
use crate::output::{emit_success, HumanOutput, OutputOptions};

pub struct NewOptions {
    pub root: PathBuf,
    pub title: String,
    pub next_action: Option<String>,
    pub summary: Option<String>,
    pub links: Vec<String>,
    pub output: OutputOptions,
}

pub fn run_new(options: NewOptions) -> Result<()> {
    let store = CaseStore::open(options.root);
    let case = store.create(NewCase {
        title: options.title,
        next_action: options.next_action,
        summary: options.summary,
        links: options.links,
    })?;

    let mut human = HumanOutput::new(format!("tsk new: created {}", case.id));
    push_case_summary(&mut human, &case);
    human.push_next_step(format!("tsk status {} in_progress", case.id));

    emit_success(options.output, "new", &case, Some(&human))
}

pub fn run_show(root: PathBuf, query: String, output: OutputOptions) -> Result<()> {
    let store = CaseStore::open(root);
    let state = store.load(&query)?;

    let human = match &state {
        ValidationState::Valid(case) => {
            let mut human = HumanOutput::new(format!("{}: {}", case.id, case.title()));
            push_case_summary(&mut human, case);
            for link in &case.metadata.links {
                human.push_summary("link", link.clone());
            }
            for entry in &case.history {
                human.push_detail(entry.render());
            }
            if let Some(summary) = case.summary.as_deref() {
                for line in summary.lines().filter(|line| !line.trim().is_empty()) {
                    human.push_detail(format!("summary: {line}"));
                }
            }
            human
        }
        ValidationState::Invalid(invalid) => {
            let mut human = HumanOutput::new(format!("{}: INVALID", invalid.candidate));
            human.push_summary("dir", invalid.dir.display().to_string());
            for defect in &invalid.defects {
                human.push_detail(defect.to_string());
            }
            human.push_next_step("fix the files by hand, then run tsk validate");
            human
        }
    };

    emit_success(output, "show", &state, Some(&human))
}

pub struct TouchOptions {
    pub root: PathBuf,
    pub case: String,
    pub next_action: Option<String>,
    pub message: Option<String>,
    pub output: OutputOptions,
}

pub fn run_touch(options: TouchOptions) -> Result<()> {
    let store = CaseStore::open(options.root);
    let dir = store.resolve(&options.case)?;
    let case = store.touch(
        &dir,
        TouchRequest {
            next_action: options.next_action,
            message: options.message,
        },
    )?;

    let mut human = HumanOutput::new(format!("tsk touch: {}", case.id));
    push_case_summary(&mut human, &case);
    emit_success(options.output, "touch", &case, Some(&human))
}

pub fn run_note(root: PathBuf, query: String, text: String, output: OutputOptions) -> Result<()> {
    let store = CaseStore::open(root);
    let dir = store.resolve(&query)?;
    let case = store.note(&dir, &text)?;

    let mut human = HumanOutput::new(format!("tsk note: {}", case.id));
    if let Some(entry) = case.history.last() {
        human.push_detail(entry.render());
    }
    emit_success(output, "note", &case, Some(&human))
}

pub struct StatusOptions {
    pub root: PathBuf,
    pub case: String,
    pub status: Status,
    pub next_action: Option<String>,
    pub message: Option<String>,
    pub command: &'static str,
    pub output: OutputOptions,
}

pub fn run_status(options: StatusOptions) -> Result<()> {
    let store = CaseStore::open(options.root);
    let dir = store.resolve(&options.case)?;
    let case = store.transition(
        &dir,
        TransitionRequest {
            status: options.status,
            next_action: options.next_action,
            message: options.message,
        },
    )?;

    let mut human = HumanOutput::new(format!("tsk {}: {}", options.command, case.id));
    push_case_summary(&mut human, &case);
    if let Some(entry) = case.history.last() {
        human.push_detail(entry.render());
    }
    emit_success(options.output, options.command, &case, Some(&human))
}

fn push_case_summary(human: &mut HumanOutput, case: &Case) {
    human.push_summary("title", case.title());
    human.push_summary("status", case.status().as_str());
    human.push_summary("created", case.metadata.created.to_string());
    human.push_summary("last touch", case.metadata.last_touch.to_string());
    if let Some(next) = case.metadata.next_action_text() {
        human.push_summary("next", next);
    }
    for warning in &case.warnings {
        human.push_warning(warning.to_string());
    }
}
