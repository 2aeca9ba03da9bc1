//! Staged fine-tuning schedule
//!
//! A run trains the network heads first, then ResNet stage 4 and up, then all
//! layers at a tenth of the learning rate. Each stage has a cumulative epoch
//! target. With early stopping enabled, the next stage resumes right after the
//! previous stage's best epoch so the non-improving tail is retrained.

use std::collections::BTreeMap;
use std::fmt;
use std::io::BufRead;
use std::path::Path;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use super::callback::{CallbackAction, CallbackContext, CallbackManager};
use super::callback::{EmaEarlyStopping, LossHistory};
use super::metrics::{EpochLogLine, EpochMetrics};
use crate::error::{Error, Result};

/// Which layers a stage trains
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LayerSelection {
    /// Region proposal network, classifier and mask heads only
    #[serde(rename = "heads")]
    Heads,
    /// ResNet stage 4 and up
    #[serde(rename = "4+")]
    Stage4Up,
    /// Every layer
    #[serde(rename = "all")]
    All,
}

impl fmt::Display for LayerSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LayerSelection::Heads => "heads",
            LayerSelection::Stage4Up => "4+",
            LayerSelection::All => "all",
        })
    }
}

/// One stage of the schedule
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Stage {
    /// Human-readable stage name
    pub name: String,
    /// Layers trained in this stage
    pub layers: LayerSelection,
    /// Cumulative epoch target (exclusive upper bound on the epoch index)
    pub epochs: usize,
    /// Multiplier on the base learning rate
    #[serde(default = "default_lr_scale")]
    pub lr_scale: f64,
}

fn default_lr_scale() -> f64 {
    1.0
}

impl Stage {
    fn new(name: &str, layers: LayerSelection, epochs: usize, lr_scale: f64) -> Self {
        Self { name: name.to_string(), layers, epochs, lr_scale }
    }
}

/// Ordered list of stages
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrainingSchedule {
    stages: Vec<Stage>,
}

impl TrainingSchedule {
    /// Build from explicit stages.
    pub fn new(stages: Vec<Stage>) -> Self {
        Self { stages }
    }

    /// Generous targets meant to be cut short by early stopping.
    pub fn with_early_stopping() -> Self {
        Self::three_stage(1000, 2000, 3000)
    }

    /// Fixed epoch budget for runs without early stopping.
    pub fn fixed_budget() -> Self {
        Self::three_stage(20, 60, 80)
    }

    fn three_stage(heads: usize, stage4: usize, all: usize) -> Self {
        Self::new(vec![
            Stage::new("Training network heads", LayerSelection::Heads, heads, 1.0),
            Stage::new("Fine tune Resnet stage 4 and up", LayerSelection::Stage4Up, stage4, 1.0),
            Stage::new("Fine tune all layers", LayerSelection::All, all, 0.1),
        ])
    }

    /// Stages in order
    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Epoch target of the last stage
    pub fn final_epoch(&self) -> usize {
        self.stages.last().map_or(0, |s| s.epochs)
    }

    /// Reject empty schedules and non-increasing targets.
    pub fn validate(&self) -> Result<()> {
        if self.stages.is_empty() {
            return Err(Error::Config {
                field: "schedule".into(),
                message: "schedule has no stages".into(),
                suggestion: "Add at least one stage with a layer selection and epoch target"
                    .into(),
            });
        }
        for pair in self.stages.windows(2) {
            if pair[1].epochs <= pair[0].epochs {
                return Err(Error::Config {
                    field: "schedule".into(),
                    message: format!(
                        "stage '{}' targets epoch {} which is not after '{}' ({})",
                        pair[1].name, pair[1].epochs, pair[0].name, pair[0].epochs
                    ),
                    suggestion: "Epoch targets are cumulative and must increase".into(),
                });
            }
        }
        if let Some(stage) = self.stages.iter().find(|s| !(s.lr_scale > 0.0)) {
            return Err(Error::Config {
                field: "schedule.lr_scale".into(),
                message: format!("stage '{}' has non-positive lr_scale", stage.name),
                suggestion: "Use 1.0 for the base learning rate or 0.1 for a tenth".into(),
            });
        }
        Ok(())
    }
}

/// Source of per-epoch losses; the actual optimisation lives behind this.
pub trait TrainingBackend {
    /// Train one epoch of `stage` at learning rate `lr`.
    ///
    /// Returns `None` when the backend has nothing more to train, which ends
    /// the current stage early.
    fn run_epoch(&mut self, stage: &Stage, epoch: usize, lr: f64) -> Result<Option<EpochMetrics>>;
}

/// Summary of a completed schedule
#[derive(Clone, Debug, PartialEq)]
pub struct ScheduleOutcome {
    /// Best epoch reported by the controller (0 without one)
    pub best_epoch: usize,
    /// Best smoothed validation loss of the last stage
    pub best_score: Option<f64>,
    /// Last epoch trained
    pub last_epoch: Option<usize>,
    /// Number of stages that ended on a stop signal
    pub early_stops: usize,
    /// Epoch count to export from the loss history
    pub export_len: usize,
    /// Wall-clock training time in seconds
    pub elapsed_secs: f64,
}

/// Run every stage of `schedule`, feeding epochs to the controller and the
/// history.
///
/// Without a bounded-patience controller, stages continue where the previous
/// one stopped and the export covers the final epoch target; with one, stages
/// resume at `best_epoch + 1` and the export covers epochs before the best.
pub fn run_schedule(
    schedule: &TrainingSchedule,
    base_lr: f64,
    backend: &mut dyn TrainingBackend,
    mut controller: Option<&mut EmaEarlyStopping>,
    history: &mut LossHistory,
) -> Result<ScheduleOutcome> {
    let started = Instant::now();
    let rewinds = controller.as_ref().is_some_and(|c| c.patience().is_bounded());
    let mut next_epoch = 0;
    let mut last_epoch = None;
    let mut early_stops = 0;

    for stage in schedule.stages() {
        let lr = base_lr * stage.lr_scale;
        tracing::info!(stage = %stage.name, layers = %stage.layers, lr, "{}", stage.name);

        let mut ctx = CallbackContext {
            epoch: next_epoch,
            max_epochs: stage.epochs,
            stage: stage.name.clone(),
            lr,
            ..Default::default()
        };

        let mut manager = CallbackManager::new();
        if let Some(es) = controller.as_deref_mut() {
            manager.add(es);
        }
        manager.add(&mut *history);

        manager.on_train_begin(&ctx);
        for epoch in next_epoch..stage.epochs {
            let Some(metrics) = backend.run_epoch(stage, epoch, lr)? else {
                tracing::info!(epoch, "backend exhausted, ending stage");
                break;
            };
            ctx.epoch = epoch;
            ctx.metrics = Some(metrics);
            ctx.elapsed_secs = started.elapsed().as_secs_f64();
            last_epoch = Some(epoch);
            next_epoch = epoch + 1;

            if manager.on_epoch_end(&ctx) == CallbackAction::Stop {
                early_stops += 1;
                break;
            }
        }
        ctx.metrics = None;
        manager.on_train_end(&ctx);
        drop(manager);

        if rewinds {
            if let Some(es) = controller.as_deref() {
                next_epoch = es.best_epoch() + 1;
            }
        }
    }

    let (best_epoch, best_score) =
        controller.as_deref().map_or((0, None), |es| (es.best_epoch(), es.best_score()));
    let export_len = if rewinds { best_epoch } else { schedule.final_epoch() };
    let elapsed_secs = started.elapsed().as_secs_f64();
    tracing::info!("Train time: {}", format_duration(elapsed_secs));

    Ok(ScheduleOutcome { best_epoch, best_score, last_epoch, early_stops, export_len, elapsed_secs })
}

/// Render seconds as `Xh Ym Zs`.
pub fn format_duration(secs: f64) -> String {
    let total = secs.round() as u64;
    format!("{}h {}m {}s", total / 3600, (total / 60) % 60, total % 60)
}

/// Backend that replays a recorded epoch stream
///
/// Epochs are looked up by index, so a stage that resumes at an earlier epoch
/// sees the same recorded losses again.
#[derive(Clone, Debug, Default)]
pub struct ReplayBackend {
    epochs: BTreeMap<usize, EpochMetrics>,
}

impl ReplayBackend {
    /// Build from `(epoch, metrics)` pairs; later duplicates win.
    pub fn new(epochs: impl IntoIterator<Item = (usize, EpochMetrics)>) -> Self {
        Self { epochs: epochs.into_iter().collect() }
    }

    /// Parse a JSON-lines epoch stream (one [`EpochLogLine`] per line).
    pub fn from_reader(reader: impl BufRead) -> Result<Self> {
        let mut epochs = BTreeMap::new();
        for (lineno, line) in reader.lines().enumerate() {
            let line = line.map_err(|e| Error::io("reading epoch stream", e))?;
            if line.trim().is_empty() {
                continue;
            }
            let parsed: EpochLogLine = serde_json::from_str(&line).map_err(|e| {
                Error::serialization(format!("epoch stream line {}: {e}", lineno + 1))
            })?;
            epochs.insert(parsed.epoch, parsed.metrics()?);
        }
        Ok(Self { epochs })
    }

    /// Parse a JSON-lines epoch stream from a file.
    pub fn from_path(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)
            .map_err(|e| Error::io(format!("opening {}", path.display()), e))?;
        Self::from_reader(std::io::BufReader::new(file))
    }

    /// Number of recorded epochs
    pub fn len(&self) -> usize {
        self.epochs.len()
    }

    /// Check if the stream is empty
    pub fn is_empty(&self) -> bool {
        self.epochs.is_empty()
    }
}

impl TrainingBackend for ReplayBackend {
    fn run_epoch(&mut self, _stage: &Stage, epoch: usize, _lr: f64) -> Result<Option<EpochMetrics>> {
        Ok(self.epochs.get(&epoch).cloned())
    }
}
