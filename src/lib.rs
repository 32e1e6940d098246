//! tsk - file-backed task cases
//!
//! This library is the case-file engine behind the tsk CLI. Every task is
//! a directory under a project's `.tasks/` root; the filesystem is the
//! only system of record.
//!
//! # Core Concepts
//!
//! - **Case**: one task directory with `task.toml`, `task.log` and an
//!   optional `summary.md`
//! - **Case id**: `<date>__<seq>__<slug>`, equal to the directory name
//! - **Validation**: every directory reads as `Valid` or `Invalid` with
//!   the full list of defects
//! - **Lifecycle**: create, touch, note and status transitions, each
//!   locked, validated and written atomically
//!
//! # Module Organization
//!
//! - `case_id`: identifier parsing, slugs and sequence allocation
//! - `metadata`: `task.toml` codec and the status enum
//! - `history`: `task.log` parsing and appending
//! - `case`: case loading, validation and lifecycle rules
//! - `scan`: read-only enumeration, project discovery, filters
//! - `lifecycle`: mutating operations (`CaseStore`)
//! - `storage`: on-disk layout
//! - `lock`: advisory locks and atomic writes
//! - `config`: `.tsk.toml` loading
//! - `error`: error types and exit codes
//! - `output`: JSON and human output for the CLI
//! - `cli`: command-line interface using clap

pub mod case;
pub mod case_id;
pub mod cli;
pub mod config;
pub mod error;
pub mod history;
pub mod lifecycle;
pub mod lock;
pub mod metadata;
pub mod output;
pub mod scan;
pub mod storage;

pub use error::{Error, Result};
