//! Error types for the sales assistant.

use std::time::Duration;

use crate::intake::model::Field;

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required configuration: {key}. {hint}")]
    MissingRequired { key: String, hint: String },

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// LLM provider errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("Authentication failed for provider {provider}")]
    AuthFailed { provider: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Failures that abort a single conversation turn.
///
/// The orchestrator turns every one of these into an apology for the user
/// and hands back the session exactly as it was received.
#[derive(Debug, thiserror::Error)]
pub enum IntakeError {
    #[error("{stage} collaborator failed: {source}")]
    Collaborator {
        stage: &'static str,
        #[source]
        source: LlmError,
    },

    #[error("{stage} collaborator timed out after {timeout:?}")]
    CollaboratorTimeout {
        stage: &'static str,
        timeout: Duration,
    },

    #[error("Invariant violated: {0}")]
    InvariantViolation(String),

    #[error("Field {field} cannot hold a {given} value")]
    FieldTypeMismatch { field: Field, given: &'static str },
}

/// Why a single extracted candidate was dropped.
///
/// Always recovered locally: the candidate is skipped and the rest of the
/// extraction is still applied.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FieldRejection {
    #[error("unknown field")]
    UnknownField,

    #[error("expected {expected}, got {got}")]
    WrongType {
        expected: &'static str,
        got: &'static str,
    },

    #[error("not a number: {0:?}")]
    NotNumeric(String),

    #[error("zip must be exactly five digits: {0:?}")]
    InvalidZip(String),

    #[error("year must be between 1900 and 2025: {0:?}")]
    YearOutOfRange(String),

    #[error("unrecognized value: {0:?}")]
    Unrecognized(String),

    #[error("ambiguous value needs clarification: {0:?}")]
    Ambiguous(String),

    #[error("empty value")]
    Empty,
}

/// Result type alias for the crate.
pub type Result<T> = std::result::Result<T, Error>;
