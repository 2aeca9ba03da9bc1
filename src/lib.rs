//! filament-train: fine-tuning harness for Mask R-CNN filament segmentation
//!
//! - EMA-smoothed early stopping with checkpoint pruning
//! - Per-epoch loss history collection and JSON export
//! - Staged fine-tuning schedule driven through a pluggable training backend
//! - COCO result formatting (boxes, compressed RLE masks) and an evaluation
//!   driver behind pluggable detector and scorer traits

pub mod cli;
pub mod config;
pub mod error;
pub mod eval;
pub mod train;

pub use error::{Error, Result};
