//! Durable, append-only transcript of an agent run.
//!
//! Two newline-delimited JSON logs are written into the output directory:
//! - `agent.log`: one [`TranscriptEntry`] per tool invocation, model request
//!   and model response. This is the source of truth for metrics.
//! - `prompts.log`: the raw request/response payloads exchanged with the
//!   provider, kept for auditing.
//!
//! The [`TranscriptWriter`] is opened once per run and owned by the runner;
//! the metrics extractor reads entries back with [`read_entries`].

pub mod reader;
pub mod writer;

pub use reader::read_entries;
pub use writer::TranscriptWriter;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::llm::{ContentItem, Message, Usage};

/// File name of the metrics transcript.
pub const AGENT_LOG: &str = "agent.log";

/// File name of the raw payload audit log.
pub const PROMPTS_LOG: &str = "prompts.log";

/// Errors that can occur while writing or reading the transcript.
#[derive(Debug, Error)]
pub enum TranscriptError {
    /// Failed to read or write a log file.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to serialize an entry.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The writer was already closed.
    #[error("Transcript already closed")]
    Closed,
}

/// Kind of a transcript entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    ToolUse,
    Request,
    Response,
}

/// A single line of `agent.log`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: EntryKind,
    pub payload: Value,
}

impl TranscriptEntry {
    /// Build an entry stamped with the current time.
    pub fn now(kind: EntryKind, payload: Value) -> Self {
        Self {
            timestamp: Utc::now(),
            kind,
            payload,
        }
    }

    /// Decode the payload of a `tool_use` entry.
    pub fn tool_use(&self) -> Option<ToolUsePayload> {
        match self.kind {
            EntryKind::ToolUse => serde_json::from_value(self.payload.clone()).ok(),
            _ => None,
        }
    }

    /// Decode the payload of a `response` entry.
    pub fn response(&self) -> Option<ResponsePayload> {
        match self.kind {
            EntryKind::Response => serde_json::from_value(self.payload.clone()).ok(),
            _ => None,
        }
    }
}

/// Payload of a `tool_use` entry. File contents are redacted from `args`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolUsePayload {
    pub tool: String,
    #[serde(default)]
    pub args: Value,
}

/// Payload of a `request` entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestPayload {
    pub model: String,
    pub messages: Vec<Message>,
}

/// Payload of a `response` entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponsePayload {
    pub model: String,
    #[serde(default)]
    pub content: Vec<ContentItem>,
    #[serde(default)]
    pub stop_reason: Option<String>,
    #[serde(default)]
    pub usage: Option<Usage>,
}
