//! Training-side orchestration
//!
//! - Per-epoch loss records for the twelve Mask R-CNN loss series
//! - Callbacks: EMA early stopping and loss history
//! - Checkpoint naming, run discovery, and pruning
//! - The staged fine-tuning schedule and its driver

pub mod callback;
pub mod checkpoint;
mod metrics;
pub mod schedule;

pub use callback::{
    BestEpochState, CallbackAction, CallbackContext, CallbackManager, EmaEarlyStopping,
    LossHistory, LossLog, TrainerCallback,
};
pub use checkpoint::{find_last, latest_run_dir, run_dir_name, CheckpointLayout, CleanupReport};
pub use metrics::{EpochLogLine, EpochMetrics, LossKey};
pub use schedule::{
    format_duration, run_schedule, LayerSelection, ReplayBackend, ScheduleOutcome, Stage,
    TrainingBackend, TrainingSchedule,
};
