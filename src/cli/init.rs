//! tsk init command implementation
//!
//! Creates the `.tasks/` directory and a default `.tsk.toml` in a project.

use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::output::{emit_success, HumanOutput, OutputOptions};
use crate::storage::{Layout, CONFIG_FILE};

#[derive(serde::Serialize)]
struct InitReport {
    root: PathBuf,
    tasks_dir: PathBuf,
    created: bool,
    config: bool,
}

pub fn run(root: PathBuf, output: OutputOptions) -> Result<()> {
    let layout = Layout::new(root);
    let created = layout.init()?;
    let created_config = ensure_config(layout.project_root())?;

    let report = InitReport {
        root: layout.project_root().to_path_buf(),
        tasks_dir: layout.tasks_dir(),
        created,
        config: created_config,
    };

    let header = if created || created_config {
        "tsk init: initialized project".to_string()
    } else {
        "tsk init: nothing to do".to_string()
    };

    let mut human = HumanOutput::new(header);
    human.push_summary("root", layout.project_root().display().to_string());
    human.push_summary("tasks", layout.tasks_dir().display().to_string());
    if created_config {
        human.push_detail(format!("wrote default {CONFIG_FILE}"));
    }
    human.push_next_step("tsk new \"<title>\" --next \"<first step>\"");

    emit_success(output, "init", &report, Some(&human))
}

/// Write a default config unless one exists. Returns true if written.
fn ensure_config(project_root: &Path) -> Result<bool> {
    let path = project_root.join(CONFIG_FILE);
    if path.exists() {
        if !path.is_file() {
            return Err(Error::InvalidArgument(format!(
                "{CONFIG_FILE} exists but is not a file: {}",
                path.display()
            )));
        }
        return Ok(false);
    }

    Config::default().save(&path)?;
    tracing::debug!(path = %path.display(), "wrote default config");
    Ok(true)
}
