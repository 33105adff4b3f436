//! Verification harness: runs the task's test command and captures its
//! output.
//!
//! No interpretation happens here. The raw text is written to
//! `pre_verification.log` / `post_verification.log` so it can be inspected
//! even when parsing fails later.

use std::fs;
use std::path::Path;

use serde_json::json;
use thiserror::Error;
use tracing::{info, warn};

use crate::llm::ToolCall;
use crate::scaffold::tools::bash::FAILED_EXIT_CODE;
use crate::scaffold::tools::{ExecutionContext, ToolError, ToolRegistry};
use crate::transcript::TranscriptWriter;

/// Errors raised while capturing a verification run.
#[derive(Debug, Error)]
pub enum VerifierError {
    #[error("Failed to run test command: {0}")]
    Tool(#[from] ToolError),

    #[error("Failed to write {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// When the test command runs relative to the agent loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationPhase {
    Pre,
    Post,
}

impl VerificationPhase {
    /// Artifact holding the captured output.
    pub fn log_file(&self) -> &'static str {
        match self {
            VerificationPhase::Pre => "pre_verification.log",
            VerificationPhase::Post => "post_verification.log",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            VerificationPhase::Pre => "pre",
            VerificationPhase::Post => "post",
        }
    }
}

/// Runs one test command, before and after the fix.
#[derive(Debug, Clone)]
pub struct Verifier {
    test_command: String,
    timeout_secs: u64,
}

impl Verifier {
    pub fn new(test_command: impl Into<String>, timeout_secs: u64) -> Self {
        Self {
            test_command: test_command.into(),
            timeout_secs,
        }
    }

    pub fn test_command(&self) -> &str {
        &self.test_command
    }

    /// Run the test command through the sandbox's `run_command` tool, write
    /// the output to the phase's log in `output_dir` and return it.
    pub async fn verify(
        &self,
        phase: VerificationPhase,
        tools: &ToolRegistry,
        working_dir: &Path,
        output_dir: &Path,
        transcript: &mut TranscriptWriter,
    ) -> Result<String, VerifierError> {
        info!(phase = phase.label(), command = %self.test_command, "Running verification");

        let call = ToolCall {
            id: format!("verify-{}", phase.label()),
            name: "run_command".to_string(),
            arguments: json!({
                "command": self.test_command,
                "timeout_seconds": self.timeout_secs,
            }),
        };
        let ctx = ExecutionContext::new(working_dir).with_timeout(self.timeout_secs);
        let outcome = tools.dispatch(&call, &ctx, transcript).await?;

        info!(
            phase = phase.label(),
            exit_code = ?outcome.exit_code,
            bytes = outcome.output.len(),
            "Verification finished"
        );
        if outcome.exit_code == Some(FAILED_EXIT_CODE) {
            warn!(
                phase = phase.label(),
                "Test command did not exit normally, its output will not be counted"
            );
        }

        let path = output_dir.join(phase.log_file());
        fs::write(&path, &outcome.output).map_err(|source| VerifierError::Io {
            path: path.display().to_string(),
            source,
        })?;

        Ok(outcome.output)
    }
}
