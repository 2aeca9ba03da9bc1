//! filament-train CLI
//!
//! # Usage
//!
//! ```bash
//! # Replay a recorded run through the staged schedule with EMA early stopping
//! filament-train train --metrics epochs.jsonl --logs ./logs --model CoCo
//!
//! # Resume the newest run, override config from YAML
//! filament-train --config run.yaml train --metrics epochs.jsonl --model last
//!
//! # Format recorded detections as COCO results
//! filament-train evaluate --eval_type segm --detections val.jsonl --dataset ./dataset
//! ```

use clap::Parser;
use filament_train::cli::{run_command, Cli};
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run_command(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
