mod support;

use std::fs;

use predicates::str::contains;
use serde_json::Value;

use support::{metadata, TestProject};

fn new_case(project: &TestProject, title: &str, next: &str) -> String {
    let value = project.json(&["new", title, "--next", next]);
    assert_eq!(value["schema_version"], "tsk.v1");
    assert_eq!(value["command"], "new");
    value["data"]["id"].as_str().expect("case id").to_string()
}

fn listed_ids(value: &Value) -> Vec<String> {
    value["data"]["projects"][0]["cases"]
        .as_array()
        .expect("cases array")
        .iter()
        .map(|case| case["id"].as_str().expect("id").to_string())
        .collect()
}

#[test]
fn init_is_idempotent() {
    let project = TestProject::bare();
    let first = project.json(&["init"]);
    assert_eq!(first["data"]["created"], Value::Bool(true));
    assert_eq!(first["data"]["config"], Value::Bool(true));
    assert!(project.tasks_dir().is_dir());
    let config = fs::read_to_string(project.path().join(".tsk.toml")).expect("config");
    assert!(config.contains("seq_width = 3"));

    let second = project.json(&["init"]);
    assert_eq!(second["data"]["created"], Value::Bool(false));
    assert_eq!(second["data"]["config"], Value::Bool(false));
}

#[test]
fn init_keeps_an_existing_config() {
    let project = TestProject::bare();
    project.write_file(".tsk.toml", "[cases]\nseq_width = 5\n");

    let value = project.json(&["init"]);
    assert_eq!(value["data"]["config"], Value::Bool(false));
    let id = new_case(&project, "Wide", "go");
    assert!(id.contains("__00000__"));
}

#[test]
fn commands_without_tasks_root_are_user_errors() {
    let project = TestProject::bare();
    project
        .cmd()
        .args(["list"])
        .assert()
        .code(2)
        .stderr(contains("No .tasks directory"))
        .stderr(contains("tsk init"));
}

#[test]
fn root_flag_and_env_select_the_project() {
    let project = TestProject::init();
    let elsewhere = tempfile::tempdir().expect("tempdir");

    support::tsk_cmd()
        .current_dir(elsewhere.path())
        .args(["new", "From flag", "--next", "go", "-q", "--root"])
        .arg(project.path())
        .assert()
        .success();
    support::tsk_cmd()
        .current_dir(elsewhere.path())
        .env("TSK_ROOT", project.path())
        .args(["list"])
        .assert()
        .success()
        .stdout(contains("from_flag"));
}

#[test]
fn new_requires_next_action() {
    let project = TestProject::init();
    project
        .cmd()
        .args(["new", "Plan nothing"])
        .assert()
        .code(3)
        .stderr(contains("Next action required"));
    assert_eq!(fs::read_dir(project.tasks_dir()).expect("read").count(), 0);
}

#[test]
fn new_rejects_titles_without_slug_characters() {
    let project = TestProject::init();
    project
        .cmd()
        .args(["new", "!!!", "--next", "x"])
        .assert()
        .code(2)
        .stderr(contains("Invalid title"));
}

#[test]
fn lifecycle_flow() {
    let project = TestProject::init();
    let id = new_case(&project, "Fix Login Bug!!", "reproduce");
    assert!(id.ends_with("__000__fix_login_bug"));

    project
        .cmd()
        .args(["touch", "login", "--next", "write tests", "-m", "found it"])
        .assert()
        .success()
        .stdout(contains("next: write tests"));

    project
        .cmd()
        .args(["status", "login", "in-progress"])
        .assert()
        .success();
    project
        .cmd()
        .args(["note", "login", "pairing with ops"])
        .assert()
        .success();
    project
        .cmd()
        .args(["done", "login", "-m", "shipped"])
        .assert()
        .success();

    let shown = project.json(&["show", &id]);
    assert_eq!(shown["data"]["state"], "valid");
    assert_eq!(shown["data"]["metadata"]["status"], "done");
    let history = shown["data"]["history"].as_array().expect("history");
    let tags: Vec<&str> = history
        .iter()
        .map(|entry| entry["tag"].as_str().expect("tag"))
        .collect();
    assert_eq!(tags, vec!["created", "touch", "status", "note", "status"]);
    assert_eq!(history[4]["comment"], "in_progress -> done: shipped");

    // Repeating a terminal status is rejected and writes nothing.
    let log_before = project.read_log(&id);
    project
        .cmd()
        .args(["done", &id])
        .assert()
        .code(3)
        .stderr(contains("already done"));
    project
        .cmd()
        .args(["status", &id, "open"])
        .assert()
        .code(3)
        .stderr(contains("cannot be reopened"));
    assert_eq!(project.read_log(&id), log_before);

    // Reclassifying between terminal states is allowed.
    project.cmd().args(["drop", &id]).assert().success();
}

#[test]
fn list_hides_terminal_cases_unless_asked() {
    let project = TestProject::init();
    let keep = new_case(&project, "Keep me", "work");
    let finish = new_case(&project, "Finish me", "wrap up");
    project.cmd().args(["done", &finish]).assert().success();

    assert_eq!(listed_ids(&project.json(&["list"])), vec![keep.clone()]);
    assert_eq!(
        listed_ids(&project.json(&["list", "--all"])),
        vec![keep.clone(), finish.clone()]
    );
    assert_eq!(
        listed_ids(&project.json(&["list", "--status", "done"])),
        vec![finish]
    );
    assert_eq!(
        listed_ids(&project.json(&["list", "--grep", "KEEP"])),
        vec![keep]
    );
}

#[test]
fn list_priority_puts_in_progress_first() {
    let project = TestProject::init();
    let first = new_case(&project, "First", "a");
    let second = new_case(&project, "Second", "b");
    project
        .cmd()
        .args(["status", &second, "in_progress"])
        .assert()
        .success();

    assert_eq!(
        listed_ids(&project.json(&["list", "--sort", "priority"])),
        vec![second, first]
    );
}

#[test]
fn ambiguous_and_unknown_queries() {
    let project = TestProject::init();
    new_case(&project, "Fix login", "a");
    new_case(&project, "Fix logout", "b");

    project
        .cmd()
        .args(["show", "fix_log"])
        .assert()
        .code(2)
        .stderr(contains("ambiguous"));
    project
        .cmd()
        .args(["show", "nothing_like_it"])
        .assert()
        .code(2)
        .stderr(contains("Case not found"));
}

#[test]
fn validate_reports_every_broken_case_and_exits_one() {
    let project = TestProject::init();
    let good = new_case(&project, "Healthy", "keep going");
    let no_log = "2025-12-25__007__no_log";
    project.write_case(no_log, &metadata(no_log, "open", Some("x")), None);
    fs::create_dir(project.tasks_dir().join("junk")).expect("mkdir");

    let output = project
        .cmd()
        .args(["validate", "--json"])
        .assert()
        .code(1)
        .get_output()
        .stdout
        .clone();
    let value: Value = serde_json::from_slice(&output).expect("validate json");
    assert_eq!(value["data"]["ok"], Value::Bool(false));
    assert_eq!(value["data"]["checked"], 3);
    assert_eq!(value["data"]["invalid"], 2);

    let cases = value["data"]["projects"][0]["cases"]
        .as_array()
        .expect("cases");
    let by_id = |id: &str| {
        cases
            .iter()
            .find(|case| case["id"] == id)
            .unwrap_or_else(|| panic!("missing {id}"))
            .clone()
    };
    assert_eq!(by_id(good.as_str())["valid"], Value::Bool(true));
    assert_eq!(by_id(no_log)["defects"][0]["kind"], "missing_required_file");
    assert_eq!(by_id("junk")["defects"][0]["kind"], "malformed_identifier");

    project
        .cmd()
        .arg("validate")
        .assert()
        .code(1)
        .stdout(contains("missing required file task.log"));
}

#[test]
fn validate_passes_on_clean_tree_and_checks_links_on_request() {
    let project = TestProject::init();
    project.write_file("src/login.rs", "");
    project
        .cmd()
        .args([
            "new",
            "Linked",
            "--next",
            "x",
            "--link",
            "src/login.rs",
            "--link",
            "docs/missing.md",
        ])
        .assert()
        .success();

    project.cmd().arg("validate").assert().success();
    project
        .cmd()
        .args(["validate", "--check-links"])
        .assert()
        .code(1)
        .stdout(contains("docs/missing.md"));
}

#[test]
fn list_and_validate_descend_with_level() {
    let parent = TestProject::bare();
    let child = parent.path().join("service");
    fs::create_dir_all(child.join(".tasks")).expect("mkdir");

    support::tsk_cmd()
        .current_dir(&child)
        .args(["new", "Nested work", "--next", "x", "-q"])
        .assert()
        .success();

    parent.cmd().arg("list").assert().code(2);

    let value = parent.json(&["list", "--level", "1"]);
    assert_eq!(listed_ids(&value).len(), 1);
    parent
        .cmd()
        .args(["validate", "-L", "1"])
        .assert()
        .success();
}

#[test]
fn mutations_refuse_invalid_cases() {
    let project = TestProject::init();
    let id = "2025-12-25__000__broken";
    let raw = metadata(id, "open", Some("x")).replace("format_version = 2", "format_version = 1");
    project.write_case(id, &raw, Some("2025-12-25: [created] x\n"));

    project
        .cmd()
        .args(["touch", id])
        .assert()
        .code(3)
        .stderr(contains("unsupported format_version 1"));
    assert_eq!(project.read_metadata(id), raw);
}
