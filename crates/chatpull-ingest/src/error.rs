//! Error types for ingestion runs
//!
//! Every variant is fatal for the run. None are retried; the pipeline only
//! makes sure the sink is left parseable before the error reaches `main`.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for ingestion operations
pub type Result<T> = std::result::Result<T, IngestError>;

/// Failure kinds surfaced by an ingestion run
#[derive(Error, Debug)]
pub enum IngestError {
    /// Credential missing or rejected by the hub
    #[error("Authentication failure: {0}")]
    AuthenticationFailure(String),

    /// The record source failed or timed out mid-stream
    #[error("Source unavailable: {0}")]
    SourceUnavailable(String),

    /// A record lacks a required field (or has one of the wrong type)
    #[error("Malformed record at row {index}: {reason}")]
    MalformedRecord { index: u64, reason: String },

    /// Appending to or finalizing the sink failed
    #[error("Sink write failure on '{}': {source}", path.display())]
    SinkWriteFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Output already exists and overwriting was not requested
    #[error("Output '{}' already exists. Pass --force to overwrite it; the previous contents will be lost.", .0.display())]
    OutputExists(PathBuf),

    /// Options failed validation
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Reading or writing the summary artifact failed
    #[error("Summary error on '{}': {reason}", path.display())]
    Summary { path: PathBuf, reason: String },

    /// Interrupted before the sink was opened
    #[error("Interrupted before any record was written")]
    Interrupted,

    /// A sink does not match its summary
    #[error("Verification failed: {0}")]
    VerificationFailed(String),
}

impl IngestError {
    pub fn source_unavailable(msg: impl Into<String>) -> Self {
        Self::SourceUnavailable(msg.into())
    }

    pub fn malformed(index: u64, reason: impl Into<String>) -> Self {
        Self::MalformedRecord {
            index,
            reason: reason.into(),
        }
    }

    pub fn sink(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::SinkWriteFailure {
            path: path.into(),
            source,
        }
    }

    pub fn summary(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::Summary {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Short machine-friendly name of the failure class
    pub fn kind(&self) -> &'static str {
        match self {
            Self::AuthenticationFailure(_) => "AuthenticationFailure",
            Self::SourceUnavailable(_) => "SourceUnavailable",
            Self::MalformedRecord { .. } => "MalformedRecord",
            Self::SinkWriteFailure { .. } => "SinkWriteFailure",
            Self::OutputExists(_) => "OutputExists",
            Self::InvalidConfig(_) => "InvalidConfig",
            Self::Summary { .. } => "Summary",
            Self::Interrupted => "Interrupted",
            Self::VerificationFailed(_) => "VerificationFailed",
        }
    }

    /// Process exit code for this failure
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::AuthenticationFailure(_) => 3,
            Self::SourceUnavailable(_) => 4,
            Self::MalformedRecord { .. } => 5,
            Self::SinkWriteFailure { .. } => 6,
            Self::Interrupted => 130,
            _ => 1,
        }
    }
}

impl From<chatpull_common::CommonError> for IngestError {
    fn from(err: chatpull_common::CommonError) -> Self {
        use chatpull_common::CommonError;
        match err {
            CommonError::MissingCredential(msg) => Self::AuthenticationFailure(msg),
            CommonError::ChecksumMismatch { expected, actual } => Self::VerificationFailed(
                format!("checksum mismatch: expected {expected}, got {actual}"),
            ),
            other => Self::InvalidConfig(other.to_string()),
        }
    }
}
