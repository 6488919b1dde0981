//! Error types for convweight.
//!
//! Every resolution failure is fatal to the current invocation. Variants carry
//! the offending input so the message alone tells the user what to fix.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the convweight library.
#[derive(Debug, Error)]
pub enum ConvertError {
    // Identifier errors
    #[error("Unknown quantization: {name} (choices: {choices})")]
    UnknownQuantization { name: String, choices: String },

    #[error("Unknown model type: {name} (choices: {choices})")]
    UnknownModelType { name: String, choices: String },

    #[error("Unknown source format: {name} (choices: {choices})")]
    UnknownSourceFormat { name: String, choices: String },

    #[error("Invalid device {hint:?}: {message}")]
    InvalidDeviceHint { hint: String, message: String },

    // Path errors
    #[error("{role} does not exist: {path}")]
    PathNotFound { role: &'static str, path: PathBuf },

    #[error("Cannot create output directory {path}: {message}")]
    PathCreation {
        path: PathBuf,
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    // Adapter errors
    #[error("LoRA adapter path does not exist: {path} (from {entry:?})")]
    AdapterPathNotFound { entry: String, path: PathBuf },

    #[error("Malformed LoRA adapter entry {entry:?}: {reason}")]
    MalformedAdapterEntry { entry: String, reason: String },

    #[error("--lora-only requires at least one adapter in --lora-paths")]
    LoraOnlyWithoutAdapters,

    // Config errors
    #[error("Cannot find config.json under {0}")]
    ConfigNotFound(PathBuf),

    #[error("Invalid model config {path}: {message}")]
    InvalidConfig { path: PathBuf, message: String },

    #[error("'model_type' not found in {0}; pass --model-type explicitly")]
    ModelTypeMissing(PathBuf),

    // Weight format errors
    #[error("Cannot detect source weight format under {0}; pass --source-format explicitly")]
    SourceFormatNotDetected(PathBuf),

    #[error("Ambiguous source weight format under {path}: found {candidates}; pass --source-format explicitly")]
    AmbiguousSourceFormat { path: PathBuf, candidates: String },

    #[error("Invalid weight index {path}: {message}")]
    InvalidWeightIndex { path: PathBuf, message: String },

    #[error("Weight index {index} references missing shards: {missing}")]
    MissingWeightShards { index: PathBuf, missing: String },

    #[error("No {format} weights found under {path}")]
    SourceFormatMismatch { path: PathBuf, format: String },

    #[error("Model type {model} cannot load {format} weights (supported: {supported})")]
    UnsupportedSourceFormat {
        model: String,
        format: String,
        supported: String,
    },

    #[error("Quantization {quantization} is not usable here: {reason}")]
    UnsupportedQuantization { quantization: String, reason: String },

    // Device errors
    #[error("No device available (probed: {probed})")]
    NoDeviceAvailable { probed: String },

    #[error("Device is not found on this machine: {0}")]
    DeviceNotFound(String),

    // Engine errors
    #[error("Conversion engine failed: {message}")]
    EngineFailed { message: String },

    // File system errors
    #[error("IO error at {path:?}: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    // Serialization errors
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },
}

/// Result type alias for convweight operations.
pub type Result<T> = std::result::Result<T, ConvertError>;

impl From<std::io::Error> for ConvertError {
    fn from(err: std::io::Error) -> Self {
        ConvertError::Io {
            message: err.to_string(),
            path: None,
            source: Some(err),
        }
    }
}

impl From<serde_json::Error> for ConvertError {
    fn from(err: serde_json::Error) -> Self {
        ConvertError::Json {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl ConvertError {
    /// Create an IO error with path context.
    pub fn io_with_path(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        ConvertError::Io {
            message: err.to_string(),
            path: Some(path.into()),
            source: Some(err),
        }
    }

    /// Process exit code for this error.
    ///
    /// - 2: the command line itself is wrong (unknown names, malformed entries)
    /// - 3: an input path is missing or the output cannot be created
    /// - 4: detection could not settle on a concrete value
    /// - 5: the conversion engine failed
    /// - 1: anything else
    pub fn exit_code(&self) -> i32 {
        match self {
            ConvertError::UnknownQuantization { .. }
            | ConvertError::UnknownModelType { .. }
            | ConvertError::UnknownSourceFormat { .. }
            | ConvertError::InvalidDeviceHint { .. }
            | ConvertError::MalformedAdapterEntry { .. }
            | ConvertError::LoraOnlyWithoutAdapters
            | ConvertError::UnsupportedSourceFormat { .. }
            | ConvertError::UnsupportedQuantization { .. } => 2,

            ConvertError::PathNotFound { .. }
            | ConvertError::PathCreation { .. }
            | ConvertError::AdapterPathNotFound { .. }
            | ConvertError::ConfigNotFound(_)
            | ConvertError::MissingWeightShards { .. } => 3,

            ConvertError::InvalidConfig { .. }
            | ConvertError::ModelTypeMissing(_)
            | ConvertError::InvalidWeightIndex { .. }
            | ConvertError::SourceFormatNotDetected(_)
            | ConvertError::AmbiguousSourceFormat { .. }
            | ConvertError::SourceFormatMismatch { .. }
            | ConvertError::NoDeviceAvailable { .. }
            | ConvertError::DeviceNotFound(_) => 4,

            ConvertError::EngineFailed { .. } => 5,

            ConvertError::Io { .. } | ConvertError::Json { .. } => 1,
        }
    }
}

/// Join registry keys for an error message.
pub(crate) fn join_choices<I, S>(choices: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    choices
        .into_iter()
        .map(|c| c.as_ref().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ConvertError::PathNotFound {
            role: "Model source",
            path: PathBuf::from("/does/not/exist"),
        };
        assert_eq!(err.to_string(), "Model source does not exist: /does/not/exist");
    }

    #[test]
    fn test_unknown_quantization_lists_choices() {
        let err = ConvertError::UnknownQuantization {
            name: "bogus".into(),
            choices: join_choices(["q0f16", "q4f16_1"]),
        };
        assert_eq!(
            err.to_string(),
            "Unknown quantization: bogus (choices: q0f16, q4f16_1)"
        );
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(ConvertError::LoraOnlyWithoutAdapters.exit_code(), 2);
        assert_eq!(
            ConvertError::AdapterPathNotFound {
                entry: "a=/x".into(),
                path: PathBuf::from("/x"),
            }
            .exit_code(),
            3
        );
        assert_eq!(
            ConvertError::NoDeviceAvailable {
                probed: "cuda".into()
            }
            .exit_code(),
            4
        );
        assert_eq!(
            ConvertError::EngineFailed {
                message: "boom".into()
            }
            .exit_code(),
            5
        );
    }
}
