//! Command-line interface for tsk
//!
//! This module defines the CLI structure using clap derive macros.
//! Command implementations live in the submodules.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::error::Result;
use crate::metadata::Status;
use crate::output::OutputOptions;
use crate::scan::SortOrder;

mod case;
mod init;
mod report;

/// tsk - file-backed task cases
///
/// Keeps each task as a directory under `.tasks/` with TOML metadata, an
/// append-only history log and optional notes.
#[derive(Parser, Debug)]
#[command(name = "tsk")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Project directory holding `.tasks/` (defaults to current directory)
    #[arg(long, global = true, env = "TSK_ROOT")]
    pub root: Option<PathBuf>,

    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the `.tasks/` directory
    Init,

    /// Create a new case
    New {
        /// Case title (also used to derive the slug)
        title: String,

        /// Next action (required: new cases are open)
        #[arg(long = "next")]
        next_action: Option<String>,

        /// Initial contents of summary.md
        #[arg(long)]
        summary: Option<String>,

        /// Related resource (repeatable)
        #[arg(long = "link")]
        links: Vec<String>,
    },

    /// List valid cases
    List {
        /// Only show cases with this status (repeatable)
        #[arg(long = "status", value_parser = parse_status)]
        statuses: Vec<Status>,

        /// Include done and dropped cases
        #[arg(short, long)]
        all: bool,

        /// Case-insensitive text to match in title or id
        #[arg(long)]
        grep: Option<String>,

        /// Also look for projects this many directories below the root
        #[arg(short = 'L', long)]
        level: Option<usize>,

        /// Sort order: id or priority
        #[arg(long, default_value = "id", value_parser = parse_sort)]
        sort: SortOrder,
    },

    /// Show one case in full
    Show {
        /// Case id, id prefix or slug fragment
        case: String,
    },

    /// Record activity on a case
    Touch {
        /// Case id, id prefix or slug fragment
        case: String,

        /// Replace the next action
        #[arg(long = "next")]
        next_action: Option<String>,

        /// Comment for the history entry
        #[arg(short, long)]
        message: Option<String>,
    },

    /// Append a note to the history
    Note {
        /// Case id, id prefix or slug fragment
        case: String,

        /// Note text
        text: String,
    },

    /// Change the status of a case
    Status {
        /// Case id, id prefix or slug fragment
        case: String,

        /// New status: open, in_progress, blocked, done, dropped
        #[arg(value_parser = parse_status)]
        status: Status,

        /// Replace the next action
        #[arg(long = "next")]
        next_action: Option<String>,

        /// Comment for the history entry
        #[arg(short, long)]
        message: Option<String>,
    },

    /// Mark a case done
    Done {
        /// Case id, id prefix or slug fragment
        case: String,

        /// Comment for the history entry
        #[arg(short, long)]
        message: Option<String>,
    },

    /// Mark a case dropped
    Drop {
        /// Case id, id prefix or slug fragment
        case: String,

        /// Comment for the history entry
        #[arg(short, long)]
        message: Option<String>,
    },

    /// Check every case and report defects (no changes are made)
    Validate {
        /// Also look for projects this many directories below the root
        #[arg(short = 'L', long)]
        level: Option<usize>,

        /// Check that file links exist inside the project
        #[arg(long)]
        check_links: bool,
    },
}

fn parse_status(value: &str) -> std::result::Result<Status, String> {
    value.parse().map_err(|err: crate::error::Error| err.to_string())
}

fn parse_sort(value: &str) -> std::result::Result<SortOrder, String> {
    value.parse().map_err(|err: crate::error::Error| err.to_string())
}

impl Cli {
    /// Execute the CLI command
    pub fn run(self) -> Result<()> {
        let root = match self.root {
            Some(path) => path,
            None => std::env::current_dir()?,
        };
        let output = OutputOptions {
            json: self.json,
            quiet: self.quiet,
        };

        match self.command {
            Commands::Init => init::run(root, output),
            Commands::New {
                title,
                next_action,
                summary,
                links,
            } => case::run_new(case::NewOptions {
                root,
                title,
                next_action,
                summary,
                links,
                output,
            }),
            Commands::List {
                statuses,
                all,
                grep,
                level,
                sort,
            } => report::run_list(report::ListOptions {
                root,
                statuses,
                all,
                grep,
                level,
                sort,
                verbose: self.verbose,
                output,
            }),
            Commands::Show { case } => case::run_show(root, case, output),
            Commands::Touch {
                case,
                next_action,
                message,
            } => case::run_touch(case::TouchOptions {
                root,
                case,
                next_action,
                message,
                output,
            }),
            Commands::Note { case, text } => case::run_note(root, case, text, output),
            Commands::Status {
                case,
                status,
                next_action,
                message,
            } => case::run_status(case::StatusOptions {
                root,
                case,
                status,
                next_action,
                message,
                command: "status",
                output,
            }),
            Commands::Done { case, message } => case::run_status(case::StatusOptions {
                root,
                case,
                status: Status::Done,
                next_action: None,
                message,
                command: "done",
                output,
            }),
            Commands::Drop { case, message } => case::run_status(case::StatusOptions {
                root,
                case,
                status: Status::Dropped,
                next_action: None,
                message,
                command: "drop",
                output,
            }),
            Commands::Validate { level, check_links } => {
                report::run_validate(report::ValidateOptions {
                    root,
                    level,
                    check_links,
                    verbose: self.verbose,
                    output,
                })
            }
        }
    }
}
