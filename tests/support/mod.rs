#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use serde_json::Value;
use tempfile::TempDir;

/// A throwaway project directory with an initialized `.tasks/` root.
pub struct TestProject {
    dir: TempDir,
}

impl TestProject {
    pub fn init() -> Self {
        let project = Self::bare();
        fs::create_dir_all(project.tasks_dir()).expect("create .tasks");
        project
    }

    /// A project directory without `.tasks/`.
    pub fn bare() -> Self {
        Self {
            dir: tempfile::tempdir().expect("failed to create tempdir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn tasks_dir(&self) -> PathBuf {
        self.dir.path().join(".tasks")
    }

    pub fn case_dir(&self, id: &str) -> PathBuf {
        self.tasks_dir().join(id)
    }

    pub fn write_file(&self, rel_path: &str, contents: &str) -> PathBuf {
        let path = self.dir.path().join(rel_path);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent");
        }
        fs::write(&path, contents).expect("write file");
        path
    }

    /// Write a case directory by hand. `log` of `None` leaves `task.log` out.
    pub fn write_case(&self, name: &str, metadata: &str, log: Option<&str>) -> PathBuf {
        let dir = self.case_dir(name);
        fs::create_dir_all(&dir).expect("create case dir");
        fs::write(dir.join("task.toml"), metadata).expect("write task.toml");
        if let Some(log) = log {
            fs::write(dir.join("task.log"), log).expect("write task.log");
        }
        dir
    }

    pub fn read_log(&self, id: &str) -> String {
        fs::read_to_string(self.case_dir(id).join("task.log")).expect("read task.log")
    }

    pub fn read_metadata(&self, id: &str) -> String {
        fs::read_to_string(self.case_dir(id).join("task.toml")).expect("read task.toml")
    }

    pub fn cmd(&self) -> Command {
        let mut cmd = tsk_cmd();
        cmd.current_dir(self.path());
        cmd
    }

    /// Run a command with `--json` and return the parsed envelope.
    pub fn json(&self, args: &[&str]) -> Value {
        let output = self
            .cmd()
            .args(args)
            .arg("--json")
            .assert()
            .success()
            .get_output()
            .stdout
            .clone();
        serde_json::from_slice(&output).expect("json output")
    }
}

/// Canonical metadata text for a hand-written case.
pub fn metadata(id: &str, status: &str, next_action: Option<&str>) -> String {
    let mut out = format!(
        "id = \"{id}\"\ntitle = \"{id}\"\nstatus = \"{status}\"\n\
         created = \"2025-12-25\"\nlast_touch = \"2025-12-25\"\n"
    );
    if let Some(next) = next_action {
        out.push_str(&format!("next_action = \"{next}\"\n"));
    }
    out.push_str("links = []\nformat_version = 2\n");
    out
}

pub fn tsk_cmd() -> Command {
    let mut cmd = Command::cargo_bin("tsk").expect("binary");
    cmd.env_remove("TSK_ROOT").env_remove("RUST_LOG");
    cmd
}
