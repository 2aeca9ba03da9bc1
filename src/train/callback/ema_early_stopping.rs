//! Early stopping on an exponentially smoothed validation loss

use super::traits::{CallbackAction, CallbackContext, TrainerCallback};
use crate::config::{EarlyStoppingConfig, Patience};
use crate::train::checkpoint::{CheckpointLayout, CleanupReport};

/// Best-epoch bookkeeping, reset at the start of every training run
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BestEpochState {
    /// Lowest smoothed loss seen since the last reset; `None` before any epoch
    pub best_score: Option<f64>,
    /// Epoch that produced `best_score`
    pub best_epoch: usize,
    /// Consecutive epochs since the last improvement
    pub wait_count: usize,
}

/// Early stopping on the EMA of validation loss, with checkpoint cleanup
///
/// The smoothed trace follows `trace[0] = v[0]` and
/// `trace[n] = (1 - w) * v[n] + w * trace[n - 1]`. An epoch improves only if
/// its smoothed value is strictly below the best so far. Once `patience`
/// epochs in a row fail to improve, training is asked to stop, and when
/// training ends the checkpoints of the epochs after the best one are deleted.
///
/// # Example
///
/// ```rust
/// use filament_train::config::{EarlyStoppingConfig, Patience};
/// use filament_train::train::callback::{CallbackAction, EmaEarlyStopping};
/// use filament_train::train::CheckpointLayout;
///
/// let config = EarlyStoppingConfig { ema_weight: 0.7, patience: Patience::Epochs(2) };
/// let mut es = EmaEarlyStopping::new(&config, CheckpointLayout::new("logs/run", "filament"));
///
/// assert_eq!(es.observe(0, 1.0), CallbackAction::Continue);
/// assert_eq!(es.observe(1, 2.0), CallbackAction::Continue);
/// assert_eq!(es.observe(2, 2.0), CallbackAction::Stop);
/// assert_eq!(es.best_epoch(), 0);
/// ```
#[derive(Clone, Debug)]
pub struct EmaEarlyStopping {
    ema_weight: f64,
    patience: Patience,
    trace: Vec<f64>,
    state: BestEpochState,
    stopped_epoch: Option<usize>,
    checkpoints: CheckpointLayout,
    last_cleanup: Option<CleanupReport>,
}

impl EmaEarlyStopping {
    /// Create a controller pruning checkpoints laid out by `checkpoints`.
    pub fn new(config: &EarlyStoppingConfig, checkpoints: CheckpointLayout) -> Self {
        Self {
            ema_weight: config.ema_weight,
            patience: config.patience,
            trace: Vec::new(),
            state: BestEpochState::default(),
            stopped_epoch: None,
            checkpoints,
            last_cleanup: None,
        }
    }

    /// Reset best-epoch bookkeeping for a new training run.
    ///
    /// The smoothed trace is kept: a later stage continues from it.
    pub fn reset(&mut self) {
        self.state = BestEpochState::default();
        self.stopped_epoch = None;
    }

    /// Feed one epoch's raw validation loss.
    ///
    /// Returns [`CallbackAction::Stop`] on the epoch where the wait count
    /// reaches patience, and on every later call until [`reset`](Self::reset).
    pub fn observe(&mut self, epoch: usize, raw_val_loss: f64) -> CallbackAction {
        if self.stopped_epoch.is_some() {
            return CallbackAction::Stop;
        }

        let smoothed = self.smooth(epoch, raw_val_loss);
        tracing::info!(epoch, ema_val_loss = smoothed, "EMA val_loss: {smoothed}");

        let improved = self.state.best_score.is_none_or(|best| smoothed < best);
        if improved {
            self.state.best_score = Some(smoothed);
            self.state.best_epoch = epoch;
            self.state.wait_count = 0;
            return CallbackAction::Continue;
        }

        self.state.wait_count += 1;
        match self.patience {
            Patience::Epochs(patience) if self.state.wait_count >= patience => {
                tracing::info!(
                    epoch,
                    best_epoch = self.state.best_epoch,
                    "early stopping: no EMA improvement for {patience} epochs"
                );
                self.stopped_epoch = Some(epoch);
                CallbackAction::Stop
            }
            _ => CallbackAction::Continue,
        }
    }

    fn smooth(&mut self, epoch: usize, raw: f64) -> f64 {
        let previous = epoch
            .checked_sub(1)
            .and_then(|p| self.trace.get(p))
            .copied()
            .filter(|v| !v.is_nan());
        let value = match previous {
            Some(prev) => (1.0 - self.ema_weight) * raw + self.ema_weight * prev,
            None => raw,
        };

        // Epochs never observed (a gap in the stream) read as NaN.
        if epoch >= self.trace.len() {
            self.trace.resize(epoch + 1, f64::NAN);
        }
        self.trace[epoch] = value;
        value
    }

    /// Delete the checkpoints of the non-improving tail after the best epoch.
    pub fn cleanup(&mut self) -> CleanupReport {
        let report = match self.patience {
            Patience::Epochs(patience) if patience > 0 => {
                let best = self.state.best_epoch;
                self.checkpoints.prune(best + 1, best + patience)
            }
            _ => CleanupReport::default(),
        };
        self.last_cleanup = Some(report.clone());
        report
    }

    /// Smoothed validation loss per epoch
    pub fn trace(&self) -> &[f64] {
        &self.trace
    }

    /// Epoch with the lowest smoothed loss in the current run
    pub fn best_epoch(&self) -> usize {
        self.state.best_epoch
    }

    /// Lowest smoothed loss in the current run
    pub fn best_score(&self) -> Option<f64> {
        self.state.best_score
    }

    /// Consecutive non-improving epochs
    pub fn wait_count(&self) -> usize {
        self.state.wait_count
    }

    /// Current best-epoch bookkeeping
    pub fn state(&self) -> &BestEpochState {
        &self.state
    }

    /// Epoch on which stopping was signalled in the current run
    pub fn stopped_epoch(&self) -> Option<usize> {
        self.stopped_epoch
    }

    /// Configured patience
    pub fn patience(&self) -> Patience {
        self.patience
    }

    /// Result of the most recent cleanup pass
    pub fn last_cleanup(&self) -> Option<&CleanupReport> {
        self.last_cleanup.as_ref()
    }
}

impl TrainerCallback for EmaEarlyStopping {
    fn on_train_begin(&mut self, _ctx: &CallbackContext) -> CallbackAction {
        self.reset();
        CallbackAction::Continue
    }

    fn on_epoch_end(&mut self, ctx: &CallbackContext) -> CallbackAction {
        match ctx.val_loss() {
            Some(val_loss) => self.observe(ctx.epoch, val_loss),
            None => {
                tracing::warn!(epoch = ctx.epoch, "epoch ended without validation loss");
                CallbackAction::Continue
            }
        }
    }

    fn on_train_end(&mut self, _ctx: &CallbackContext) {
        tracing::info!("Best epoch: {}", self.state.best_epoch + 1);
        if let Some(best) = self.state.best_score {
            tracing::info!("Best EMA val_loss: {best}");
        }
        let report = self.cleanup();
        tracing::debug!(
            removed = report.removed.len(),
            missing = report.missing.len(),
            "checkpoint cleanup finished"
        );
    }

    fn name(&self) -> &'static str {
        "EmaEarlyStopping"
    }
}
