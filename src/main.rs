//! tsk - file-backed task cases
//!
//! Each case is a directory under `.tasks/` holding TOML metadata, an
//! append-only history log and optional free-form notes.

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use tsk::cli::Cli;
use tsk::output::{emit_error, infer_command_name_from_args};
use tsk::Error;

fn main() {
    // Tracing is opt-in via RUST_LOG.
    // Keep startup robust in CI/robot envs: ignore invalid/huge filters.
    let filter = std::env::var("RUST_LOG")
        .ok()
        .and_then(|raw| {
            let raw = raw.trim();
            if raw.is_empty() || raw.len() > 4096 {
                return None;
            }
            EnvFilter::try_new(raw).ok()
        })
        .unwrap_or_else(|| EnvFilter::new("off"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let command = infer_command_name_from_args();
    let cli = Cli::parse();
    let json = cli.json;
    if let Err(err) = cli.run() {
        // `validate` has already printed its report on stdout.
        let reported = json && matches!(err, Error::ValidationFailed { .. });
        if !reported {
            let _ = emit_error(&command, &err, json);
        }
        std::process::exit(err.exit_code());
    }
}
