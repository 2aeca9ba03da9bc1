//! Core traits and types for the callback system
//!
//! - `CallbackContext` - State passed to callbacks
//! - `CallbackAction` - Actions a callback can request
//! - `TrainerCallback` - The observer trait a training driver invokes

use crate::train::metrics::EpochMetrics;

/// Context passed to callbacks with current training state
#[derive(Clone, Debug, Default)]
pub struct CallbackContext {
    /// Current epoch (0-indexed, absolute across stages)
    pub epoch: usize,
    /// Epoch target of the current stage (exclusive)
    pub max_epochs: usize,
    /// Name of the current schedule stage
    pub stage: String,
    /// Current learning rate
    pub lr: f64,
    /// Losses of the epoch that just finished (set for `on_epoch_end`)
    pub metrics: Option<EpochMetrics>,
    /// Training duration in seconds
    pub elapsed_secs: f64,
}

impl CallbackContext {
    /// Context for the end of `epoch` with its recorded losses.
    pub fn epoch_end(epoch: usize, metrics: EpochMetrics) -> Self {
        Self { epoch, metrics: Some(metrics), ..Default::default() }
    }

    /// Validation loss of the finished epoch, if metrics were attached.
    pub fn val_loss(&self) -> Option<f64> {
        self.metrics.as_ref().map(EpochMetrics::val_loss)
    }
}

/// Action to take after a callback
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CallbackAction {
    /// Continue training normally
    Continue,
    /// Stop training (early stopping)
    Stop,
}

/// Trait for training callbacks
///
/// A training driver calls these hooks in-line at epoch boundaries. All
/// methods have default no-op implementations.
pub trait TrainerCallback {
    /// Called before a training run (or schedule stage) starts
    fn on_train_begin(&mut self, _ctx: &CallbackContext) -> CallbackAction {
        CallbackAction::Continue
    }

    /// Called after a training run (or schedule stage) ends
    fn on_train_end(&mut self, _ctx: &CallbackContext) {}

    /// Called after each epoch
    fn on_epoch_end(&mut self, _ctx: &CallbackContext) -> CallbackAction {
        CallbackAction::Continue
    }

    /// Get callback name for logging
    fn name(&self) -> &'static str {
        "TrainerCallback"
    }
}
