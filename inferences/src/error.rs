use std::path::PathBuf;

use thiserror::Error;

/// A field value that falls outside the record's declared domain.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RecordError {
    #[error("text fields must not be empty")]
    EmptyText,

    #[error("Capacity must be between {min} and {max} (value: {value})", min = crate::types::CAPACITY_MIN, max = crate::types::CAPACITY_MAX)]
    CapacityOutOfRange { value: i64 },

    #[error("Year must be between {min} and {max} (value: {value})", min = crate::types::YEAR_MIN, max = crate::types::YEAR_MAX)]
    YearOutOfRange { value: i64 },

    #[error("Mileage must be a finite, non-negative number (value: {value})")]
    InvalidMileage { value: f64 },

    #[error("unknown {field} option {value:?}")]
    UnknownOption { field: &'static str, value: String },
}

/// Failure while scoring a single record.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InferenceError {
    #[error("unseen category {value:?} for {field}")]
    UnseenCategory { field: &'static str, value: String },

    #[error("model returned no output")]
    EmptyOutput,

    #[error("model returned an invalid price: {0}")]
    InvalidOutput(f64),

    #[error("model runtime error: {0}")]
    Runtime(String),

    #[error("model panicked: {0}")]
    Panicked(String),
}

impl InferenceError {
    pub(crate) fn runtime(err: impl std::fmt::Display) -> Self {
        // `{:#}` keeps the anyhow context chain on a single line.
        Self::Runtime(format!("{err:#}"))
    }
}

/// Failure while loading a model artifact at startup.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("model artifact not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("unsupported model format {extension:?} for {}", .path.display())]
    UnsupportedFormat { path: PathBuf, extension: String },

    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid model artifact {}: {reason}", .path.display())]
    Invalid { path: PathBuf, reason: String },

    #[error("failed to load ONNX model {}: {reason}", .path.display())]
    Onnx { path: PathBuf, reason: String },
}
