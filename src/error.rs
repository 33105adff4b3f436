//! Error types for swe-resolve operations.
//!
//! Shared error types for the subsystems that cross module boundaries:
//! - Task loading
//! - LLM provider interactions
//!
//! Subsystem-local errors (tools, transcript, agent loop, verifier, runner)
//! live next to the code that raises them.

use thiserror::Error;

/// Errors that can occur while loading a task description.
#[derive(Debug, Error)]
pub enum TaskError {
    #[error("Failed to read task file '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse task file '{path}': {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Missing required field '{0}' in task")]
    MissingField(&'static str),
}

/// Errors that can occur during LLM operations.
///
/// `ModelUnavailable` is the only class that triggers fallback to the next
/// candidate model; every other variant ends the current turn.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Missing API key: ANTHROPIC_API_KEY environment variable not set")]
    MissingApiKey,

    #[error("Model '{model}' is not available: {message}")]
    ModelUnavailable { model: String, message: String },

    #[error("No candidate models configured")]
    NoCandidateModels,

    #[error("HTTP request failed: {0}")]
    RequestFailed(String),

    #[error("Failed to parse LLM response: {0}")]
    ParseError(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("API error ({code}): {message}")]
    ApiError { code: u16, message: String },

    #[error("Transcript error: {0}")]
    Transcript(#[from] crate::transcript::TranscriptError),
}

impl LlmError {
    /// Whether this error means the requested model identifier was rejected.
    pub fn is_model_unavailable(&self) -> bool {
        matches!(self, LlmError::ModelUnavailable { .. })
    }
}
