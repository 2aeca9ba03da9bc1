//! Core CLI types - Cli, Command, and argument structs

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use super::weights::WeightsSource;
use crate::config::{Patience, RunConfig};
use crate::eval::EvalType;

/// filament-train: Mask R-CNN fine-tuning harness
#[derive(Parser, Debug, Clone, PartialEq)]
#[command(name = "filament-train")]
#[command(version)]
#[command(
    about = "EMA early stopping, loss history export, and COCO result formatting for Mask R-CNN runs"
)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// YAML run configuration
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Replay a recorded training run through the staged schedule
    Train(TrainArgs),

    /// Format recorded detections as COCO results
    Evaluate(EvaluateArgs),
}

/// Flags shared by every command
#[derive(Args, Debug, Clone, PartialEq)]
pub struct CommonArgs {
    /// Root directory of the dataset
    #[arg(long, value_name = "DIR")]
    pub dataset: Option<PathBuf>,

    /// Weights to start from: last, ImageNet, CoCo, random, or a path
    #[arg(long, default_value = "ImageNet")]
    pub model: WeightsSource,

    /// Logs and checkpoints directory
    #[arg(long, value_name = "DIR")]
    pub logs: Option<PathBuf>,

    /// Images to use for evaluation (0 = all)
    #[arg(long, default_value = "500")]
    pub limit: usize,

    /// Year of the validation split
    #[arg(long, default_value = "2016")]
    pub year: u32,
}

/// Arguments for the train command
#[derive(Parser, Debug, Clone, PartialEq)]
pub struct TrainArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// JSON-lines stream of per-epoch losses to replay
    #[arg(long, value_name = "FILE")]
    pub metrics: PathBuf,

    /// Override early-stopping patience (epoch count or 'unbounded')
    #[arg(long)]
    pub patience: Option<Patience>,
}

/// Arguments for the evaluate command
#[derive(Parser, Debug, Clone, PartialEq)]
pub struct EvaluateArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Evaluation type: bbox or segm
    #[arg(long = "eval_type")]
    pub eval_type: Option<EvalType>,

    /// JSON-lines stream of raw per-image detector outputs
    #[arg(long, value_name = "FILE")]
    pub detections: PathBuf,

    /// Results file (default: <logs>/coco_results_<eval_type>.json)
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,
}

/// Parse command line arguments
pub fn parse_args<I, T>(args: I) -> Result<Cli, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    Cli::try_parse_from(args)
}

/// Apply command-line overrides to a RunConfig
pub fn apply_overrides(config: &mut RunConfig, args: &CommonArgs) {
    if let Some(dataset) = &args.dataset {
        config.dataset_dir = dataset.clone();
    }
    if let Some(logs) = &args.logs {
        config.log_dir = logs.clone();
    }
}

/// Apply train-only overrides on top of the common ones
pub fn apply_train_overrides(config: &mut RunConfig, args: &TrainArgs) {
    apply_overrides(config, &args.common);
    if let Some(patience) = args.patience {
        config.early_stopping.patience = patience;
    }
}
