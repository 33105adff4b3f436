//! Pipeline executor: pre-verification, agent loop, post-verification,
//! patch capture and metrics.
//!
//! `result.json` is written on every path that gets as far as creating the
//! output directory. Failures after that point are recorded in the report's
//! `error` field with the affected measurements left at their defaults.

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use thiserror::Error;
use tracing::{debug, error, info, warn};

use super::config::RunConfig;
use super::verifier::{VerificationPhase, Verifier, VerifierError};
use crate::llm::{LlmProvider, Message, ModelClient, PriceTable};
use crate::metrics::{MetricsError, MetricsExtractor, MetricsReport, RESULT_FILE};
use crate::scaffold::tools::run_command;
use crate::scaffold::{AgentConfig, AgentLoop, ExecutionContext, Termination};
use crate::task::Task;
use crate::transcript::{TranscriptError, TranscriptWriter};

/// Unified diff of the working directory after the run.
pub const CHANGES_PATCH: &str = "changes.patch";

/// Human-readable interaction history.
pub const PROMPTS_MD: &str = "prompts.md";

/// Error types for the runner.
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("Setup error: {0}")]
    Setup(String),

    #[error("Transcript error: {0}")]
    Transcript(#[from] TranscriptError),

    #[error("Verification error: {0}")]
    Verifier(#[from] VerifierError),

    #[error("Metrics error: {0}")]
    Metrics(#[from] MetricsError),

    #[error("IO error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// What the agent loop reported, if it ran.
#[derive(Debug, Default)]
struct LoopSummary {
    turns: usize,
    termination: Option<Termination>,
}

/// Runs one task end to end.
pub struct PipelineRunner {
    config: RunConfig,
    provider: Arc<dyn LlmProvider>,
    prices: PriceTable,
}

impl PipelineRunner {
    /// Creates a runner using the built-in price table.
    pub fn new(config: RunConfig, provider: Arc<dyn LlmProvider>) -> Self {
        Self {
            config,
            provider,
            prices: PriceTable::default(),
        }
    }

    /// Replaces the price table used for cost accounting.
    pub fn with_prices(mut self, prices: PriceTable) -> Self {
        self.prices = prices;
        self
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Run `task` and return the report written to `result.json`.
    pub async fn run(&self, task: &Task) -> Result<MetricsReport, RunnerError> {
        let start = Instant::now();
        let output_dir = self.config.output_dir.as_path();

        info!(
            task_id = %task.task_id,
            working_dir = %self.config.working_dir.display(),
            output_dir = %output_dir.display(),
            "Starting run"
        );

        fs::create_dir_all(output_dir).map_err(|e| {
            RunnerError::Setup(format!("Failed to create output directory: {}", e))
        })?;

        let mut transcript = match TranscriptWriter::create(output_dir) {
            Ok(transcript) => transcript,
            Err(e) => {
                error!(error = %e, "Failed to open transcript");
                let mut report = MetricsReport::empty(&task.task_id);
                report.error = Some(e.to_string());
                write_report(&report, output_dir)?;
                return Err(e.into());
            }
        };

        let mut summary = LoopSummary::default();
        let result = self.execute(task, &mut transcript, &mut summary).await;

        if let Err(e) = transcript.finish() {
            warn!(error = %e, "Failed to close transcript");
        }

        let mut report = match MetricsExtractor::new(self.prices.clone())
            .extract(output_dir, &task.task_id)
        {
            Ok(report) => report,
            Err(e) => {
                warn!(error = %e, "Metrics extraction failed, writing defaults");
                let mut report = MetricsReport::empty(&task.task_id);
                report.error = Some(e.to_string());
                report
            }
        };

        report.turns = Some(summary.turns as u64);
        if let Some(termination) = &summary.termination {
            report.termination = Some(termination.label().to_string());
            if let Termination::Error(message) = termination {
                report.error.get_or_insert_with(|| message.clone());
            }
        }
        if let Err(e) = &result {
            error!(error = %e, "Run failed");
            report.error = Some(e.to_string());
        }

        write_report(&report, output_dir)?;

        info!(
            task_id = %task.task_id,
            resolved = report.resolved,
            cost_usd = report.total_cost_usd,
            elapsed = ?start.elapsed(),
            "Run finished"
        );
        Ok(report)
    }

    async fn execute(
        &self,
        task: &Task,
        transcript: &mut TranscriptWriter,
        summary: &mut LoopSummary,
    ) -> Result<(), RunnerError> {
        let working_dir = self.config.working_dir.as_path();
        let output_dir = self.config.output_dir.as_path();

        let mut client = ModelClient::new(self.provider.clone(), self.config.models.clone())
            .with_max_tokens(self.config.max_tokens);
        if let Some(temperature) = self.config.temperature {
            client = client.with_temperature(temperature);
        }
        let agent_config = AgentConfig::new()
            .with_max_turns(self.config.effective_max_turns(task))
            .with_max_tool_result_chars(self.config.max_tool_result_chars);
        let agent = AgentLoop::new(client, agent_config);
        let verifier = Verifier::new(&task.tests.test_command, self.config.test_timeout_secs);

        let pre_output = verifier
            .verify(
                VerificationPhase::Pre,
                agent.tool_registry(),
                working_dir,
                output_dir,
                transcript,
            )
            .await?;

        let ctx = ExecutionContext::new(working_dir).with_timeout(self.config.command_timeout_secs);
        let outcome = agent.run(task, &pre_output, &ctx, transcript).await;
        info!(
            turns = outcome.turns,
            termination = outcome.termination.label(),
            "Agent loop ended"
        );
        summary.turns = outcome.turns;
        summary.termination = Some(outcome.termination);

        let history_path = output_dir.join(PROMPTS_MD);
        if let Err(e) = write_interaction_history(&history_path, &outcome.conversation) {
            warn!(error = %e, "Failed to write interaction history, continuing");
        }

        verifier
            .verify(
                VerificationPhase::Post,
                agent.tool_registry(),
                working_dir,
                output_dir,
                transcript,
            )
            .await?;

        self.write_patch(working_dir, output_dir).await
    }

    /// Capture `git diff` of the working directory into `changes.patch`.
    async fn write_patch(&self, working_dir: &Path, output_dir: &Path) -> Result<(), RunnerError> {
        let diff = run_command("git diff", working_dir, self.config.command_timeout_secs).await;
        let content = if diff.exit_code == 0 {
            debug!(bytes = diff.output.len(), "Captured patch");
            diff.output
        } else {
            warn!(
                exit_code = diff.exit_code,
                output = %diff.output.trim(),
                "git diff failed, writing empty patch"
            );
            String::new()
        };

        let path = output_dir.join(CHANGES_PATCH);
        fs::write(&path, content).map_err(|source| RunnerError::Io {
            path: path.display().to_string(),
            source,
        })
    }
}

fn write_report(report: &MetricsReport, output_dir: &Path) -> Result<(), RunnerError> {
    report.write_to(&output_dir.join(RESULT_FILE))?;
    Ok(())
}

/// Render the conversation as markdown: one section per message.
pub fn render_interaction_history(conversation: &[Message]) -> String {
    let mut out = String::from("# Interaction History\n\n");
    for message in conversation {
        let content = serde_json::to_string_pretty(&message.content)
            .unwrap_or_else(|e| format!("<unserializable content: {}>", e));
        out.push_str(&format!(
            "## {}\n\n{}\n\n",
            message.role.as_str().to_uppercase(),
            content
        ));
    }
    out
}

fn write_interaction_history(path: &Path, conversation: &[Message]) -> Result<(), RunnerError> {
    fs::write(path, render_interaction_history(conversation)).map_err(|source| RunnerError::Io {
        path: path.display().to_string(),
        source,
    })
}
