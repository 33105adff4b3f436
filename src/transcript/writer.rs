//! Append-only transcript writer.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use super::{
    EntryKind, RequestPayload, ResponsePayload, ToolUsePayload, TranscriptEntry, TranscriptError,
    AGENT_LOG, PROMPTS_LOG,
};
use crate::llm::{Message, ModelResponse};

/// Owns both transcript files for the lifetime of a run.
///
/// Every record is flushed as soon as it is written, so a crash never loses
/// an entry that was reported as written. Dropping the writer flushes and
/// closes both files.
pub struct TranscriptWriter {
    agent_log: Option<BufWriter<File>>,
    prompts_log: Option<BufWriter<File>>,
    agent_log_path: PathBuf,
    entries_written: usize,
}

impl TranscriptWriter {
    /// Create (or truncate) `agent.log` and `prompts.log` in `output_dir`.
    pub fn create(output_dir: &Path) -> Result<Self, TranscriptError> {
        std::fs::create_dir_all(output_dir)?;
        let agent_log_path = output_dir.join(AGENT_LOG);
        let agent_log = open_truncated(&agent_log_path)?;
        let prompts_log = open_truncated(&output_dir.join(PROMPTS_LOG))?;

        debug!(path = %agent_log_path.display(), "Opened transcript");

        Ok(Self {
            agent_log: Some(BufWriter::new(agent_log)),
            prompts_log: Some(BufWriter::new(prompts_log)),
            agent_log_path,
            entries_written: 0,
        })
    }

    /// Path of `agent.log`.
    pub fn agent_log_path(&self) -> &Path {
        &self.agent_log_path
    }

    /// Number of `agent.log` entries written so far.
    pub fn entries_written(&self) -> usize {
        self.entries_written
    }

    /// Record a tool invocation with its redacted arguments.
    pub fn record_tool_use(&mut self, tool: &str, args: Value) -> Result<(), TranscriptError> {
        let payload = ToolUsePayload {
            tool: tool.to_string(),
            args,
        };
        self.append(TranscriptEntry::now(
            EntryKind::ToolUse,
            serde_json::to_value(payload)?,
        ))
    }

    /// Record an outgoing model request.
    ///
    /// `raw_body` is the exact payload sent to the provider and only goes to
    /// `prompts.log`.
    pub fn record_request(
        &mut self,
        model: &str,
        messages: &[Message],
        raw_body: &Value,
    ) -> Result<(), TranscriptError> {
        let payload = RequestPayload {
            model: model.to_string(),
            messages: messages.to_vec(),
        };
        let entry = TranscriptEntry::now(EntryKind::Request, serde_json::to_value(payload)?);
        self.append_raw(&serde_json::json!({
            "timestamp": entry.timestamp,
            "type": "request",
            "model": model,
            "request": raw_body,
        }))?;
        self.append(entry)
    }

    /// Record a model response, including token usage.
    pub fn record_response(&mut self, response: &ModelResponse) -> Result<(), TranscriptError> {
        let payload = ResponsePayload {
            model: response.model.clone(),
            content: response.content.clone(),
            stop_reason: response.stop_reason.clone(),
            usage: response.usage.clone(),
        };
        let entry = TranscriptEntry::now(EntryKind::Response, serde_json::to_value(payload)?);
        self.append_raw(&serde_json::json!({
            "timestamp": entry.timestamp,
            "type": "response",
            "model": response.model,
            "response": response.raw,
        }))?;
        self.append(entry)
    }

    /// Append a pre-built entry to `agent.log`.
    pub fn append(&mut self, entry: TranscriptEntry) -> Result<(), TranscriptError> {
        let writer = self.agent_log.as_mut().ok_or(TranscriptError::Closed)?;
        write_line(writer, &entry)?;
        self.entries_written += 1;
        Ok(())
    }

    fn append_raw(&mut self, value: &Value) -> Result<(), TranscriptError> {
        let writer = self.prompts_log.as_mut().ok_or(TranscriptError::Closed)?;
        write_line(writer, value)
    }

    /// Flush and close both logs. Further writes fail with `Closed`.
    pub fn finish(&mut self) -> Result<(), TranscriptError> {
        if let Some(mut writer) = self.agent_log.take() {
            writer.flush()?;
            writer.get_ref().sync_all()?;
        }
        if let Some(mut writer) = self.prompts_log.take() {
            writer.flush()?;
            writer.get_ref().sync_all()?;
        }
        Ok(())
    }
}

impl Drop for TranscriptWriter {
    fn drop(&mut self) {
        if let Err(e) = self.finish() {
            warn!(error = %e, "Failed to flush transcript on drop");
        }
    }
}

fn open_truncated(path: &Path) -> Result<File, TranscriptError> {
    Ok(OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path)?)
}

fn write_line<T: Serialize>(writer: &mut BufWriter<File>, value: &T) -> Result<(), TranscriptError> {
    serde_json::to_writer(&mut *writer, value)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}
