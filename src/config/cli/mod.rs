//! CLI argument parsing
//!
//! # Usage
//!
//! ```bash
//! filament-train train --metrics run.jsonl --logs ./logs --model CoCo
//! filament-train train --metrics run.jsonl --patience unbounded
//! filament-train evaluate --eval_type segm --detections val.jsonl --year 2016
//! ```

mod core;
mod weights;

pub use self::core::{
    apply_overrides, apply_train_overrides, parse_args, Cli, Command, CommonArgs, EvaluateArgs,
    TrainArgs,
};
pub use weights::{WeightsPlan, WeightsSource, COCO_EXCLUDED_LAYERS};

#[cfg(test)]
mod tests;
