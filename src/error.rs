//! Error types with actionable diagnostics.
//!
//! Every message states the problem first and, where the user can do something
//! about it, a `→` hint on the following line.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for filament-train operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced by the training harness and the COCO result pipeline.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration value is invalid.
    #[error("Invalid configuration value for '{field}': {message}\n  → {suggestion}")]
    Config { field: String, message: String, suggestion: String },

    /// Configuration file could not be parsed.
    #[error("Invalid configuration syntax in {path}:\n  {message}\n  → Check YAML syntax at the indicated line")]
    ConfigParse { path: PathBuf, message: String },

    /// Evaluate mode was requested without an evaluation type.
    #[error("Please specify the evaluation type.\n  → Pass --eval_type bbox or --eval_type segm")]
    MissingEvalType,

    /// No checkpoint could be located for `--model last`.
    #[error("No checkpoint found under {dir}\n  → Train first, or pass --model with an explicit weights path")]
    CheckpointNotFound { dir: PathBuf },

    /// IO error with context.
    #[error("IO error: {context}\n  Cause: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// Serialization/deserialization error.
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    /// Raw detector output is internally inconsistent.
    #[error("Invalid detector output for image {image_id}: {message}")]
    InvalidDetections { image_id: u64, message: String },

    /// A predicted class id has no entry in the dataset's category table.
    #[error("Class id {class_id} has no source category\n  → Check that the model was trained on the same annotation file")]
    UnknownCategory { class_id: usize },

    /// The external COCO scorer failed.
    #[error("COCO scorer error: {message}")]
    Scorer { message: String },

    /// The external training backend failed.
    #[error("Training backend error: {message}")]
    Backend { message: String },
}

impl Error {
    /// Create an IO error with context.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io { context: context.into(), source }
    }

    /// Create a serialization error from any displayable cause.
    pub fn serialization(message: impl std::fmt::Display) -> Self {
        Self::Serialization { message: message.to_string() }
    }

    /// Check if this error is user-recoverable.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            Self::Config { .. }
                | Self::ConfigParse { .. }
                | Self::MissingEvalType
                | Self::CheckpointNotFound { .. }
        )
    }

    /// Get the error code for structured output.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Config { .. } => "E001",
            Self::ConfigParse { .. } => "E002",
            Self::MissingEvalType => "E003",
            Self::CheckpointNotFound { .. } => "E010",
            Self::Io { .. } => "E050",
            Self::Serialization { .. } => "E051",
            Self::InvalidDetections { .. } => "E060",
            Self::UnknownCategory { .. } => "E061",
            Self::Scorer { .. } => "E070",
            Self::Backend { .. } => "E080",
        }
    }
}
