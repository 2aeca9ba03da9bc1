//! Per-epoch loss records
//!
//! A Mask R-CNN training objective reports six loss components, each for the
//! training and the validation pass. They are treated as opaque scalars.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// The twelve recorded loss series, in export order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LossKey {
    TrainLoss,
    RpnClassLoss,
    RpnBboxLoss,
    MrcnnClassLoss,
    MrcnnBboxLoss,
    MrcnnMaskLoss,
    ValLoss,
    ValRpnClassLoss,
    ValRpnBboxLoss,
    ValMrcnnClassLoss,
    ValMrcnnBboxLoss,
    ValMrcnnMaskLoss,
}

impl LossKey {
    /// All keys in export order.
    pub const ALL: [LossKey; 12] = [
        LossKey::TrainLoss,
        LossKey::RpnClassLoss,
        LossKey::RpnBboxLoss,
        LossKey::MrcnnClassLoss,
        LossKey::MrcnnBboxLoss,
        LossKey::MrcnnMaskLoss,
        LossKey::ValLoss,
        LossKey::ValRpnClassLoss,
        LossKey::ValRpnBboxLoss,
        LossKey::ValMrcnnClassLoss,
        LossKey::ValMrcnnBboxLoss,
        LossKey::ValMrcnnMaskLoss,
    ];

    /// Key used in the exported loss document.
    pub fn export_name(self) -> &'static str {
        match self {
            LossKey::TrainLoss => "train_loss",
            LossKey::RpnClassLoss => "rpn_class_loss",
            LossKey::RpnBboxLoss => "rpn_bbox_loss",
            LossKey::MrcnnClassLoss => "mrcnn_class_loss",
            LossKey::MrcnnBboxLoss => "mrcnn_bbox_loss",
            LossKey::MrcnnMaskLoss => "mrcnn_mask_loss",
            LossKey::ValLoss => "val_loss",
            LossKey::ValRpnClassLoss => "val_rpn_class_loss",
            LossKey::ValRpnBboxLoss => "val_rpn_bbox_loss",
            LossKey::ValMrcnnClassLoss => "val_mrcnn_class_loss",
            LossKey::ValMrcnnBboxLoss => "val_mrcnn_bbox_loss",
            LossKey::ValMrcnnMaskLoss => "val_mrcnn_mask_loss",
        }
    }

    /// Key as reported in a training framework's epoch logs.
    ///
    /// Identical to [`export_name`](Self::export_name) except that the total
    /// training loss is logged as plain `loss`.
    pub fn log_name(self) -> &'static str {
        match self {
            LossKey::TrainLoss => "loss",
            other => other.export_name(),
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// One completed epoch's loss values (all twelve series).
///
/// Immutable once built; construct with [`EpochMetrics::from_logs`] or
/// [`EpochMetrics::from_values`].
#[derive(Clone, Debug, PartialEq)]
pub struct EpochMetrics {
    values: [f64; 12],
}

impl EpochMetrics {
    /// Build from values ordered as [`LossKey::ALL`].
    pub fn from_values(values: [f64; 12]) -> Self {
        Self { values }
    }

    /// Build from a framework epoch-log mapping keyed by [`LossKey::log_name`].
    ///
    /// Every one of the twelve keys must be present.
    pub fn from_logs(logs: &HashMap<String, f64>) -> Result<Self> {
        let mut values = [0.0; 12];
        for key in LossKey::ALL {
            values[key.index()] = *logs.get(key.log_name()).ok_or_else(|| {
                Error::serialization(format!("epoch log is missing '{}'", key.log_name()))
            })?;
        }
        Ok(Self { values })
    }

    /// Value of one series.
    pub fn get(&self, key: LossKey) -> f64 {
        self.values[key.index()]
    }

    /// Total validation loss, the quantity the early-stopping controller smooths.
    pub fn val_loss(&self) -> f64 {
        self.get(LossKey::ValLoss)
    }

    /// Total training loss.
    pub fn train_loss(&self) -> f64 {
        self.get(LossKey::TrainLoss)
    }
}

/// One line of a recorded epoch stream: the epoch index plus framework logs.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EpochLogLine {
    /// 0-based epoch index
    pub epoch: usize,
    /// Loss values keyed by framework log name
    #[serde(flatten)]
    pub logs: HashMap<String, f64>,
}

impl EpochLogLine {
    /// Convert to a typed metrics record.
    pub fn metrics(&self) -> Result<EpochMetrics> {
        EpochMetrics::from_logs(&self.logs)
    }
}
