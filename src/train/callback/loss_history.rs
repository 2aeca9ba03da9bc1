//! Per-epoch loss history and its JSON export

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::traits::{CallbackAction, CallbackContext, TrainerCallback};
use crate::error::{Error, Result};
use crate::train::metrics::{EpochMetrics, LossKey};

/// Records all twelve loss series epoch by epoch, independent of any
/// stopping decision.
///
/// Series grow on demand. Recording an epoch twice keeps the last values;
/// epochs skipped over read as `0.0`.
#[derive(Clone, Debug, Default)]
pub struct LossHistory {
    series: [Vec<f64>; 12],
}

impl LossHistory {
    /// Create an empty history
    pub fn new() -> Self {
        Self::default()
    }

    /// Store one epoch's values at position `epoch`.
    pub fn record(&mut self, epoch: usize, metrics: &EpochMetrics) {
        for (key, series) in LossKey::ALL.into_iter().zip(self.series.iter_mut()) {
            if series.len() <= epoch {
                series.resize(epoch + 1, 0.0);
            }
            series[epoch] = metrics.get(key);
        }
    }

    /// Number of epoch slots recorded (highest recorded epoch + 1)
    pub fn len(&self) -> usize {
        self.series[0].len()
    }

    /// Check if nothing was recorded
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// One full series
    pub fn series(&self, key: LossKey) -> &[f64] {
        &self.series[key as usize]
    }

    /// Series truncated (or zero-padded) to exactly `up_to` epochs.
    pub fn to_log(&self, up_to: usize) -> LossLog {
        let take = |key: LossKey| {
            let mut values: Vec<f64> = self.series(key).iter().copied().take(up_to).collect();
            values.resize(up_to, 0.0);
            values
        };
        LossLog {
            train_loss: take(LossKey::TrainLoss),
            rpn_class_loss: take(LossKey::RpnClassLoss),
            rpn_bbox_loss: take(LossKey::RpnBboxLoss),
            mrcnn_class_loss: take(LossKey::MrcnnClassLoss),
            mrcnn_bbox_loss: take(LossKey::MrcnnBboxLoss),
            mrcnn_mask_loss: take(LossKey::MrcnnMaskLoss),
            val_loss: take(LossKey::ValLoss),
            val_rpn_class_loss: take(LossKey::ValRpnClassLoss),
            val_rpn_bbox_loss: take(LossKey::ValRpnBboxLoss),
            val_mrcnn_class_loss: take(LossKey::ValMrcnnClassLoss),
            val_mrcnn_bbox_loss: take(LossKey::ValMrcnnBboxLoss),
            val_mrcnn_mask_loss: take(LossKey::ValMrcnnMaskLoss),
        }
    }

    /// Write epochs `[0, up_to)` to `<dir>/loss_<tag>.json`.
    ///
    /// `dir` must already exist; a missing directory is an IO error.
    pub fn export(&self, up_to: usize, dir: &Path, tag: &str) -> Result<PathBuf> {
        let path = export_path(dir, tag);
        self.to_log(up_to).write(&path)?;
        tracing::info!(path = %path.display(), epochs = up_to, "Saved losses");
        Ok(path)
    }
}

/// Export file for a run tag
pub fn export_path(dir: &Path, tag: &str) -> PathBuf {
    dir.join(format!("loss_{tag}.json"))
}

impl TrainerCallback for LossHistory {
    fn on_epoch_end(&mut self, ctx: &CallbackContext) -> CallbackAction {
        if let Some(metrics) = &ctx.metrics {
            self.record(ctx.epoch, metrics);
        }
        CallbackAction::Continue
    }

    fn name(&self) -> &'static str {
        "LossHistory"
    }
}

/// Exported loss document; field order is the on-disk key order.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LossLog {
    pub train_loss: Vec<f64>,
    pub rpn_class_loss: Vec<f64>,
    pub rpn_bbox_loss: Vec<f64>,
    pub mrcnn_class_loss: Vec<f64>,
    pub mrcnn_bbox_loss: Vec<f64>,
    pub mrcnn_mask_loss: Vec<f64>,
    pub val_loss: Vec<f64>,
    pub val_rpn_class_loss: Vec<f64>,
    pub val_rpn_bbox_loss: Vec<f64>,
    pub val_mrcnn_class_loss: Vec<f64>,
    pub val_mrcnn_bbox_loss: Vec<f64>,
    pub val_mrcnn_mask_loss: Vec<f64>,
}

impl LossLog {
    /// One series by key
    pub fn series(&self, key: LossKey) -> &[f64] {
        match key {
            LossKey::TrainLoss => &self.train_loss,
            LossKey::RpnClassLoss => &self.rpn_class_loss,
            LossKey::RpnBboxLoss => &self.rpn_bbox_loss,
            LossKey::MrcnnClassLoss => &self.mrcnn_class_loss,
            LossKey::MrcnnBboxLoss => &self.mrcnn_bbox_loss,
            LossKey::MrcnnMaskLoss => &self.mrcnn_mask_loss,
            LossKey::ValLoss => &self.val_loss,
            LossKey::ValRpnClassLoss => &self.val_rpn_class_loss,
            LossKey::ValRpnBboxLoss => &self.val_rpn_bbox_loss,
            LossKey::ValMrcnnClassLoss => &self.val_mrcnn_class_loss,
            LossKey::ValMrcnnBboxLoss => &self.val_mrcnn_bbox_loss,
            LossKey::ValMrcnnMaskLoss => &self.val_mrcnn_mask_loss,
        }
    }

    /// Write as compact JSON.
    pub fn write(&self, path: &Path) -> Result<()> {
        let file = File::create(path)
            .map_err(|e| Error::io(format!("creating {}", path.display()), e))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer(&mut writer, self).map_err(Error::serialization)?;
        writer
            .flush()
            .map_err(|e| Error::io(format!("writing {}", path.display()), e))
    }

    /// Read a previously exported document.
    pub fn read(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .map_err(|e| Error::io(format!("opening {}", path.display()), e))?;
        serde_json::from_reader(BufReader::new(file)).map_err(Error::serialization)
    }
}
