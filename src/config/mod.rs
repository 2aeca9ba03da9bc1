//! Run configuration and command-line parsing

mod cli;
mod run;

pub use cli::{
    apply_overrides, apply_train_overrides, parse_args, Cli, Command, CommonArgs, EvaluateArgs,
    TrainArgs, WeightsPlan, WeightsSource, COCO_EXCLUDED_LAYERS,
};
pub use run::{EarlyStoppingConfig, Patience, RunConfig};
