//! Configuration for agent runs.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::llm::client::DEFAULT_MAX_TOKENS;
use crate::llm::cost::{PriceTable, PricingError};
use crate::scaffold::agent_loop::DEFAULT_MAX_TURNS;
use crate::scaffold::tools::{DEFAULT_COMMAND_TIMEOUT_SECS, DEFAULT_MAX_RESULT_CHARS};
use crate::task::Task;

/// Default timeout for the verification test command in seconds.
pub const DEFAULT_TEST_TIMEOUT_SECS: u64 = 1800;

/// Candidate models, most preferred first.
pub const DEFAULT_MODELS: &[&str] = &[
    "claude-3-5-sonnet-20241022",
    "claude-3-5-sonnet-20240620",
    "claude-3-haiku-20240307",
];

/// Configuration for running the agent against a task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Repository checkout the agent works in.
    pub working_dir: PathBuf,
    /// Where artifacts are written.
    pub output_dir: PathBuf,
    /// Candidate models in fallback order.
    pub models: Vec<String>,
    /// Turn budget; falls back to the task's, then to the default.
    pub max_turns: Option<usize>,
    /// Timeout for agent commands in seconds.
    pub command_timeout_secs: u64,
    /// Timeout for each verification run in seconds.
    pub test_timeout_secs: u64,
    /// Maximum tokens per model response.
    pub max_tokens: u32,
    /// Sampling temperature (provider default if unset).
    pub temperature: Option<f64>,
    /// Bound on each tool result fed back to the model.
    pub max_tool_result_chars: usize,
    /// Optional YAML price table replacing the built-in one.
    pub pricing_path: Option<PathBuf>,
}

impl RunConfig {
    /// Creates a new run configuration with defaults.
    pub fn new(working_dir: impl Into<PathBuf>) -> Self {
        Self {
            working_dir: working_dir.into(),
            output_dir: PathBuf::from("."),
            models: DEFAULT_MODELS.iter().map(|m| m.to_string()).collect(),
            max_turns: None,
            command_timeout_secs: DEFAULT_COMMAND_TIMEOUT_SECS,
            test_timeout_secs: DEFAULT_TEST_TIMEOUT_SECS,
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: None,
            max_tool_result_chars: DEFAULT_MAX_RESULT_CHARS,
            pricing_path: None,
        }
    }

    /// Sets the output directory.
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    /// Replaces the candidate model list. An empty list keeps the defaults.
    pub fn with_models(mut self, models: Vec<String>) -> Self {
        if !models.is_empty() {
            self.models = models;
        }
        self
    }

    /// Sets the turn budget.
    pub fn with_max_turns(mut self, max_turns: usize) -> Self {
        self.max_turns = Some(max_turns);
        self
    }

    /// Sets the agent command timeout.
    pub fn with_command_timeout(mut self, seconds: u64) -> Self {
        self.command_timeout_secs = seconds;
        self
    }

    /// Sets the verification timeout.
    pub fn with_test_timeout(mut self, seconds: u64) -> Self {
        self.test_timeout_secs = seconds;
        self
    }

    /// Sets the maximum tokens per response.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Sets the sampling temperature.
    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Sets the tool result bound.
    pub fn with_max_tool_result_chars(mut self, max_chars: usize) -> Self {
        self.max_tool_result_chars = max_chars;
        self
    }

    /// Sets the price table file.
    pub fn with_pricing_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.pricing_path = Some(path.into());
        self
    }

    /// Turn budget for `task`.
    pub fn effective_max_turns(&self, task: &Task) -> usize {
        self.max_turns
            .or(task.max_turns)
            .unwrap_or(DEFAULT_MAX_TURNS)
    }

    /// Load the configured price table, or the built-in one.
    pub fn price_table(&self) -> Result<PriceTable, PricingError> {
        PriceTable::load(self.pricing_path.as_deref())
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self::new("/testbed")
    }
}
