//! CLI command implementations

mod evaluate;
mod train;


use std::path::Path;

use crate::cli::{init_tracing, LogLevel};
use crate::config::{Cli, Command, RunConfig};
use crate::error::Result;

/// Execute a CLI command based on the parsed arguments
pub fn run_command(cli: Cli) -> std::result::Result<(), String> {
    init_tracing(LogLevel::from_flags(cli.quiet, cli.verbose));

    let result = match cli.command {
        Command::Train(args) => train::run_train(&args, cli.config.as_deref()).map(|summary| {
            tracing::info!(
                run_dir = %summary.run_dir.display(),
                loss_log = %summary.loss_log.display(),
                best_epoch = summary.best_epoch,
                exported_epochs = summary.export_len,
                "Training complete"
            );
        }),
        Command::Evaluate(args) => evaluate::run_evaluate(&args, cli.config.as_deref()).map(|_| ()),
    };
    result.map_err(|e| e.to_string())
}

/// Load the run configuration, or the defaults when no file is given.
fn load_config(path: Option<&Path>) -> Result<RunConfig> {
    match path {
        Some(path) => {
            tracing::debug!("Loading config {}", path.display());
            RunConfig::from_yaml_file(path)
        }
        None => Ok(RunConfig::default()),
    }
}
