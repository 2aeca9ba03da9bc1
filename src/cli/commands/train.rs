//! Train command implementation

use std::path::{Path, PathBuf};

use super::load_config;
use crate::config::{apply_train_overrides, TrainArgs, WeightsSource};
use crate::error::{Error, Result};
use crate::train::{
    run_dir_name, run_schedule, CheckpointLayout, EmaEarlyStopping, LossHistory, ReplayBackend,
};

/// What a finished train command produced
#[derive(Debug)]
pub(crate) struct TrainSummary {
    pub run_dir: PathBuf,
    pub loss_log: PathBuf,
    pub best_epoch: usize,
    pub export_len: usize,
}

pub(crate) fn run_train(args: &TrainArgs, config_path: Option<&Path>) -> Result<TrainSummary> {
    let mut config = load_config(config_path)?;
    apply_train_overrides(&mut config, args);
    config.validate()?;

    tracing::info!("Model: {}", args.common.model);
    tracing::info!("Dataset: {}", config.dataset_dir.display());
    tracing::info!("Logs: {}", config.log_dir.display());

    let weights = args.common.model.resolve(&config)?;
    match &weights.path {
        Some(path) => tracing::info!("Loading weights {}", path.display()),
        None => tracing::info!("Starting from random weights"),
    }
    if !weights.exclude.is_empty() {
        tracing::debug!(exclude = ?weights.exclude, "skipping head layers");
    }

    // Resuming from the last checkpoint keeps writing into that run.
    let run_dir = match (&args.common.model, &weights.path) {
        (WeightsSource::Last, Some(path)) => path
            .parent()
            .map(Path::to_path_buf)
            .ok_or_else(|| Error::CheckpointNotFound { dir: config.log_dir.clone() })?,
        _ => {
            let started = chrono::Local::now().naive_local();
            config.log_dir.join(run_dir_name(&config.name, started))
        }
    };
    std::fs::create_dir_all(&run_dir)
        .map_err(|e| Error::io(format!("creating {}", run_dir.display()), e))?;

    let mut backend = ReplayBackend::from_path(&args.metrics)?;
    tracing::debug!("Replaying {} recorded epochs", backend.len());

    let layout = CheckpointLayout::new(&run_dir, &config.name);
    let tag = layout.run_tag();
    let mut controller = EmaEarlyStopping::new(&config.early_stopping, layout);
    let mut history = LossHistory::new();

    let outcome = run_schedule(
        &config.schedule,
        config.learning_rate,
        &mut backend,
        Some(&mut controller),
        &mut history,
    )?;

    let loss_log = history.export(outcome.export_len, &config.loss_log_dir, &tag)?;

    Ok(TrainSummary {
        run_dir,
        loss_log,
        best_epoch: outcome.best_epoch,
        export_len: outcome.export_len,
    })
}
