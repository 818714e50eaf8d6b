//! Error types for voxbatch

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for voxbatch
#[derive(Error, Debug)]
pub enum VoxError {
    #[error("No synthesis engine available: {0}")]
    NoEngineAvailable(String),

    #[error("Voice cloning is not supported by engine '{0}'")]
    CloningUnsupported(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Voice reference not found: {}", .0.display())]
    MissingVoiceReference(PathBuf),

    /// Engine rejected the voice reference it was given
    #[error("Engine '{engine}' rejected voice reference: {message}")]
    VoiceReferenceRejected { engine: String, message: String },

    #[error("Engine produced no usable audio: {} ({bytes} bytes)", .path.display())]
    EmptyOutput { path: PathBuf, bytes: u64 },

    #[error("Audio conversion error: {0}")]
    Conversion(String),

    #[error("Engine '{engine}' failed: {message}")]
    EngineFailure { engine: String, message: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Input error: {0}")]
    Input(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

/// Result type alias for voxbatch operations
pub type Result<T> = std::result::Result<T, VoxError>;

/// Classification of a per-item failure
///
/// This is what ends up in outcomes and batch reports; the full error
/// message travels next to it as a string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    NoEngineAvailable,
    CloningUnsupported,
    InvalidInput,
    MissingVoiceReference,
    EmptyOutput,
    ConversionError,
    EngineFailure,
}

impl FailureKind {
    /// Failures caused by the voice reference rather than the engine
    ///
    /// These fall back to plain synthesis on a non-cloning engine.
    pub fn is_voice_reference(self) -> bool {
        matches!(
            self,
            FailureKind::MissingVoiceReference | FailureKind::ConversionError
        )
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            FailureKind::NoEngineAvailable => "NoEngineAvailable",
            FailureKind::CloningUnsupported => "CloningUnsupported",
            FailureKind::InvalidInput => "InvalidInput",
            FailureKind::MissingVoiceReference => "MissingVoiceReference",
            FailureKind::EmptyOutput => "EmptyOutput",
            FailureKind::ConversionError => "ConversionError",
            FailureKind::EngineFailure => "EngineFailure",
        };
        f.write_str(name)
    }
}

impl VoxError {
    /// Map this error onto the per-item failure taxonomy
    pub fn kind(&self) -> FailureKind {
        match self {
            VoxError::NoEngineAvailable(_) => FailureKind::NoEngineAvailable,
            VoxError::CloningUnsupported(_) => FailureKind::CloningUnsupported,
            VoxError::InvalidInput(_) => FailureKind::InvalidInput,
            VoxError::MissingVoiceReference(_) | VoxError::VoiceReferenceRejected { .. } => {
                FailureKind::MissingVoiceReference
            }
            VoxError::EmptyOutput { .. } => FailureKind::EmptyOutput,
            VoxError::Conversion(_) => FailureKind::ConversionError,
            _ => FailureKind::EngineFailure,
        }
    }
}

impl From<String> for VoxError {
    fn from(s: String) -> Self {
        VoxError::Other(s)
    }
}

impl From<&str> for VoxError {
    fn from(s: &str) -> Self {
        VoxError::Other(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping() {
        let err = VoxError::VoiceReferenceRejected {
            engine: "xtts".to_string(),
            message: "speaker_wav is required".to_string(),
        };
        assert_eq!(err.kind(), FailureKind::MissingVoiceReference);
        assert!(err.kind().is_voice_reference());

        let err = VoxError::EngineFailure {
            engine: "gtts".to_string(),
            message: "exit status 1".to_string(),
        };
        assert_eq!(err.kind(), FailureKind::EngineFailure);
        assert!(!err.kind().is_voice_reference());

        let err = VoxError::Io(io::Error::new(io::ErrorKind::Other, "disk full"));
        assert_eq!(err.kind(), FailureKind::EngineFailure);
    }

    #[test]
    fn test_display() {
        assert_eq!(FailureKind::EmptyOutput.to_string(), "EmptyOutput");
        let err = VoxError::MissingVoiceReference(PathBuf::from("/tmp/ref.wav"));
        assert_eq!(err.to_string(), "Voice reference not found: /tmp/ref.wav");
    }
}
