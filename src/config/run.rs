//! Run configuration
//!
//! One explicit object carries everything a run needs: where logs and
//! checkpoints live, the early-stopping policy, and the staged schedule. It is
//! handed to the controller, the collector, and the schedule driver at
//! construction.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Error, Result};
use crate::train::schedule::TrainingSchedule;

/// Number of consecutive non-improving epochs tolerated before stopping.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Patience {
    /// Stop once this many epochs in a row fail to improve.
    Epochs(usize),
    /// Never stop early; train every stage to its epoch target.
    Unbounded,
}

impl Patience {
    /// Patience as an epoch count, `None` when unbounded.
    pub fn epochs(self) -> Option<usize> {
        match self {
            Patience::Epochs(n) => Some(n),
            Patience::Unbounded => None,
        }
    }

    /// Whether early stopping can ever fire.
    pub fn is_bounded(self) -> bool {
        matches!(self, Patience::Epochs(_))
    }
}

impl Default for Patience {
    fn default() -> Self {
        Patience::Epochs(10)
    }
}

impl fmt::Display for Patience {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Patience::Epochs(n) => write!(f, "{n}"),
            Patience::Unbounded => f.write_str("unbounded"),
        }
    }
}

impl FromStr for Patience {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("unbounded") || s.eq_ignore_ascii_case("inf") {
            return Ok(Patience::Unbounded);
        }
        s.parse::<usize>()
            .map(Patience::Epochs)
            .map_err(|_| format!("expected an epoch count or 'unbounded', got '{s}'"))
    }
}

impl Serialize for Patience {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Patience::Epochs(n) => serializer.serialize_u64(*n as u64),
            Patience::Unbounded => serializer.serialize_str("unbounded"),
        }
    }
}

impl<'de> Deserialize<'de> for Patience {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum CountOrString {
            Count(usize),
            Str(String),
        }

        match CountOrString::deserialize(deserializer)? {
            CountOrString::Count(n) => Ok(Patience::Epochs(n)),
            CountOrString::Str(s) => s.parse().map_err(serde::de::Error::custom),
        }
    }
}

/// EMA early-stopping parameters
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EarlyStoppingConfig {
    /// Weight of the previous smoothed value; larger lags and smooths more
    pub ema_weight: f64,
    /// Consecutive non-improving epochs tolerated
    pub patience: Patience,
}

impl Default for EarlyStoppingConfig {
    fn default() -> Self {
        Self { ema_weight: 0.7, patience: Patience::default() }
    }
}

/// Everything one fine-tuning run needs.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Experiment name; prefixes run directories and checkpoint files
    pub name: String,
    /// Root of run directories and checkpoints
    pub log_dir: PathBuf,
    /// Directory loss histories are exported into (must exist)
    pub loss_log_dir: PathBuf,
    /// COCO-style dataset root
    pub dataset_dir: PathBuf,
    /// Base learning rate
    pub learning_rate: f64,
    /// Early-stopping policy
    pub early_stopping: EarlyStoppingConfig,
    /// Staged fine-tuning schedule
    pub schedule: TrainingSchedule,
    /// Pretrained COCO weights (`--model CoCo`)
    pub coco_weights: PathBuf,
    /// Pretrained ImageNet backbone weights (`--model ImageNet`)
    pub imagenet_weights: PathBuf,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            name: "filament".to_string(),
            log_dir: PathBuf::from("logs"),
            loss_log_dir: PathBuf::from("loss_log"),
            dataset_dir: PathBuf::from("dataset"),
            learning_rate: 0.001,
            early_stopping: EarlyStoppingConfig::default(),
            schedule: TrainingSchedule::with_early_stopping(),
            coco_weights: PathBuf::from("mask_rcnn_coco.h5"),
            imagenet_weights: PathBuf::from(
                "resnet50_weights_tf_dim_ordering_tf_kernels_notop.h5",
            ),
        }
    }
}

impl RunConfig {
    /// Fixed-budget configuration: no early stopping, 20/60/80 epoch stages.
    pub fn fixed_budget() -> Self {
        Self {
            early_stopping: EarlyStoppingConfig {
                patience: Patience::Unbounded,
                ..EarlyStoppingConfig::default()
            },
            schedule: TrainingSchedule::fixed_budget(),
            ..Self::default()
        }
    }

    /// Load and validate a YAML run configuration.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::io(format!("reading config {}", path.display()), e))?;
        let config: RunConfig = serde_yaml::from_str(&content).map_err(|e| {
            Error::ConfigParse { path: path.to_path_buf(), message: e.to_string() }
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges and the schedule.
    pub fn validate(&self) -> Result<()> {
        let w = self.early_stopping.ema_weight;
        if !(0.0..1.0).contains(&w) {
            return Err(Error::Config {
                field: "early_stopping.ema_weight".into(),
                message: format!("{w} is outside [0, 1)"),
                suggestion: "Use a value like 0.7".into(),
            });
        }
        if self.early_stopping.patience == Patience::Epochs(0) {
            return Err(Error::Config {
                field: "early_stopping.patience".into(),
                message: "patience must be at least 1".into(),
                suggestion: "Use an epoch count like 10, or 'unbounded' to disable stopping"
                    .into(),
            });
        }
        if !(self.learning_rate > 0.0) {
            return Err(Error::Config {
                field: "learning_rate".into(),
                message: format!("{} is not positive", self.learning_rate),
                suggestion: "Use a value like 0.001".into(),
            });
        }
        if self.name.is_empty() {
            return Err(Error::Config {
                field: "name".into(),
                message: "name is empty".into(),
                suggestion: "Use the experiment name, e.g. 'filament'".into(),
            });
        }
        self.schedule.validate()
    }
}
