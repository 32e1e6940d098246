mod support;

use std::fs;

use chrono::NaiveDate;
use tsk::case::{Defect, LogLag, ValidationState, Warning};
use tsk::config::Config;
use tsk::error::Error;
use tsk::lifecycle::{CaseStore, NewCase, TouchRequest, TransitionRequest};
use tsk::metadata::{DecodeError, Status};
use tsk::storage::Layout;

use support::{metadata, TestProject};

const ID: &str = "2025-12-25__000__fix_login_bug";

fn christmas() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 12, 25).expect("date")
}

fn store(project: &TestProject, today: NaiveDate) -> CaseStore {
    CaseStore::new(Layout::new(project.path()), Config::default()).with_today(today)
}

fn fix_login_bug() -> NewCase {
    NewCase {
        title: "Fix Login Bug!!".to_string(),
        next_action: Some("reproduce locally".to_string()),
        ..NewCase::default()
    }
}

#[test]
fn create_then_touch_scenario() {
    let project = TestProject::init();
    let created = store(&project, christmas())
        .create(fix_login_bug())
        .expect("create");

    assert_eq!(created.id.as_str(), ID);
    assert_eq!(created.status(), Status::Open);
    assert_eq!(created.history.len(), 1);

    let later = NaiveDate::from_ymd_opt(2026, 1, 2).expect("date");
    let touched = store(&project, later)
        .touch(
            &created.dir,
            TouchRequest {
                next_action: Some("write tests".to_string()),
                message: None,
            },
        )
        .expect("touch");

    assert_eq!(touched.metadata.last_touch, later);
    assert_eq!(touched.metadata.title, "Fix Login Bug!!");
    assert_eq!(touched.metadata.created, christmas());
    assert_eq!(touched.metadata.id, ID);
    assert_eq!(project.read_log(ID).lines().count(), 2);
    assert!(project
        .read_log(ID)
        .ends_with("2026-01-02: [touch] next: write tests\n"));
}

#[test]
fn scan_keeps_going_past_a_broken_case() {
    let project = TestProject::init();
    project.write_case(
        ID,
        &metadata(ID, "open", Some("x")),
        Some("2025-12-25: [created] x\n"),
    );
    let broken = "2025-12-25__001__no_log";
    project.write_case(broken, &metadata(broken, "open", Some("x")), None);

    let states = store(&project, christmas()).scan().expect("scan");
    assert_eq!(states.len(), 2);
    assert!(states[0].is_valid());
    match &states[1] {
        ValidationState::Invalid(invalid) => {
            assert_eq!(invalid.candidate, broken);
            assert_eq!(
                invalid.defects,
                vec![Defect::MissingRequiredFile {
                    name: "task.log".to_string()
                }]
            );
        }
        other => panic!("expected invalid case, got {other:?}"),
    }
}

#[test]
fn version_one_is_rejected_not_migrated() {
    let project = TestProject::init();
    let raw = metadata(ID, "open", Some("x")).replace("format_version = 2", "format_version = 1");
    project.write_case(ID, &raw, Some("2025-12-25: [created] x\n"));

    let store = store(&project, christmas());
    let state = store.load(ID).expect("load");
    match state {
        ValidationState::Invalid(invalid) => assert_eq!(
            invalid.defects,
            vec![Defect::Decode {
                error: DecodeError::UnsupportedVersion {
                    found: 1,
                    supported: vec![2],
                }
            }]
        ),
        other => panic!("expected invalid case, got {other:?}"),
    }

    let dir = project.case_dir(ID);
    let err = store
        .transition(&dir, TransitionRequest::to(Status::Done))
        .expect_err("invalid case must not transition");
    assert!(matches!(err, Error::InvalidCase { .. }));
    assert_eq!(project.read_metadata(ID), raw);
}

#[test]
fn identity_mismatch_is_fatal_even_when_otherwise_well_formed() {
    let project = TestProject::init();
    let other = "2025-12-25__000__something_else";
    project.write_case(
        ID,
        &metadata(other, "open", Some("x")),
        Some("2025-12-25: [created] x\n"),
    );

    let states = store(&project, christmas()).scan().expect("scan");
    match &states[0] {
        ValidationState::Invalid(invalid) => assert!(invalid.defects.contains(
            &Defect::IdentityMismatch {
                directory: ID.to_string(),
                embedded: other.to_string(),
            }
        )),
        other => panic!("expected invalid case, got {other:?}"),
    }
}

#[test]
fn log_lag_is_a_warning_not_corruption() {
    let project = TestProject::init();
    let raw = metadata(ID, "open", Some("x"))
        .replace("last_touch = \"2025-12-25\"", "last_touch = \"2025-12-26\"");
    project.write_case(ID, &raw, Some("2025-12-25: [created] x\n"));

    let store = store(&project, christmas());
    let case = store.load(ID).expect("load").into_case().expect("valid");
    assert_eq!(case.warnings.len(), 1);

    // The next mutation catches the log up.
    let noted = store.note(&case.dir, "caught up").expect("note");
    assert!(noted.warnings.is_empty());
    assert_eq!(noted.history.last().map(|e| e.date), NaiveDate::from_ymd_opt(2025, 12, 26));
}

#[test]
fn seq_width_comes_from_config() {
    let project = TestProject::init();
    project.write_file(".tsk.toml", "[cases]\nseq_width = 5\n");

    let case = CaseStore::open(project.path())
        .with_today(christmas())
        .create(fix_login_bug())
        .expect("create");
    assert_eq!(case.id.as_str(), "2025-12-25__00000__fix_login_bug");
}

#[test]
fn concurrent_creates_get_distinct_ids() {
    let project = TestProject::init();
    let root = project.path().to_path_buf();

    let handles: Vec<_> = (0..6)
        .map(|_| {
            let root = root.clone();
            std::thread::spawn(move || {
                CaseStore::new(Layout::new(root), Config::default())
                    .with_today(christmas())
                    .create(fix_login_bug())
                    .expect("create")
                    .id
                    .to_string()
            })
        })
        .collect();

    let mut ids: Vec<String> = handles
        .into_iter()
        .map(|h| h.join().expect("thread"))
        .collect();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 6);

    let entries = fs::read_dir(project.tasks_dir())
        .expect("read tasks dir")
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().starts_with(".staging-"))
        .count();
    assert_eq!(entries, 0);
}

#[test]
fn lost_status_append_is_reported_as_log_lag() {
    let project = TestProject::init();
    let store = store(&project, christmas());
    let created = store.create(fix_login_bug()).expect("create");
    let log_before = project.read_log(ID);

    store
        .transition(&created.dir, TransitionRequest::to(Status::Done))
        .expect("transition");
    // Same-day crash between the metadata replace and the log append.
    fs::write(project.case_dir(ID).join("task.log"), &log_before).expect("restore log");

    let case = store.load(ID).expect("load").into_case().expect("still valid");
    assert_eq!(case.status(), Status::Done);
    assert_eq!(case.history.len(), 1);
    assert_eq!(
        case.warnings,
        vec![Warning::LogLag {
            lag: LogLag::Status {
                logged: Status::Open,
                status: Status::Done,
            }
        }]
    );
}
