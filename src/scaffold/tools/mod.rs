//! Tool definitions and registry for the scaffold system.
//!
//! This module defines the `Tool` trait and provides a registry for managing
//! the tools the model can invoke. Every dispatch through the registry leaves
//! exactly one `tool_use` entry in the transcript.

pub mod bash;
pub mod file;

pub use bash::{run_command, CommandOutput, RunCommandTool};
pub use file::{EditFileTool, ReadFileTool, WriteFileTool};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

use crate::llm::{ContentItem, ToolCall, ToolSpec};
use crate::transcript::{TranscriptError, TranscriptWriter};

/// Default timeout for agent commands in seconds.
pub const DEFAULT_COMMAND_TIMEOUT_SECS: u64 = 300;

/// Default bound on the size of a tool result fed back to the model.
pub const DEFAULT_MAX_RESULT_CHARS: usize = 30_000;

/// Placeholder for empty tool output; results are never empty.
const EMPTY_OUTPUT: &str = "(no output)";

/// Errors that can occur during tool execution.
#[derive(Debug, Error)]
pub enum ToolError {
    /// Invalid parameters provided to the tool.
    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    /// Tool execution failed.
    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    /// File system error.
    #[error("Filesystem error: {0}")]
    FilesystemError(String),

    /// The invocation could not be recorded.
    #[error("Transcript error: {0}")]
    Transcript(#[from] TranscriptError),
}

/// Result of a tool execution.
///
/// Recoverable failures (missing file, edit target not found, non-zero exit)
/// are outcomes with `is_error` set, not `ToolError`s.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolOutcome {
    /// Textual result.
    pub output: String,
    /// Whether the call failed.
    pub is_error: bool,
    /// Exit status for process-backed tools.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
}

impl ToolOutcome {
    /// Create a successful outcome.
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            is_error: false,
            exit_code: None,
        }
    }

    /// Create a failed outcome.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            output: message.into(),
            is_error: true,
            exit_code: None,
        }
    }

    /// Outcome of a finished process; non-zero exits are errors.
    pub fn from_command(output: CommandOutput) -> Self {
        Self {
            is_error: output.exit_code != 0,
            exit_code: Some(output.exit_code),
            output: output.output,
        }
    }

    /// Render the outcome as text for the model. Never empty.
    pub fn render(&self) -> String {
        let mut text = if self.output.trim().is_empty() {
            EMPTY_OUTPUT.to_string()
        } else {
            self.output.clone()
        };
        if let Some(code) = self.exit_code.filter(|c| *c != 0) {
            if !text.ends_with('\n') {
                text.push('\n');
            }
            text.push_str(&format!("[exit code: {}]", code));
        }
        text
    }

    /// Wrap the outcome into a `tool_result` item, bounded to `max_chars`.
    pub fn into_content(self, tool_use_id: &str, max_chars: usize) -> ContentItem {
        let text = truncate_middle(&self.render(), max_chars);
        ContentItem::tool_result(tool_use_id, text, self.is_error)
    }
}

/// Keep the head and tail of `text` so that at most `max_chars` characters
/// of the original survive.
pub fn truncate_middle(text: &str, max_chars: usize) -> String {
    let total = text.chars().count();
    if total <= max_chars {
        return text.to_string();
    }
    let head_len = max_chars / 2;
    let tail_len = max_chars - head_len;
    let head: String = text.chars().take(head_len).collect();
    let tail: String = text.chars().skip(total - tail_len).collect();
    format!(
        "{}\n\n... [{} characters truncated] ...\n\n{}",
        head,
        total - max_chars,
        tail
    )
}

/// Context for tool execution.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    /// Repository checkout the tools operate on.
    pub working_dir: PathBuf,
    /// Default timeout for commands in seconds.
    pub default_timeout: u64,
}

impl ExecutionContext {
    /// Create a new execution context.
    pub fn new(working_dir: impl Into<PathBuf>) -> Self {
        Self {
            working_dir: working_dir.into(),
            default_timeout: DEFAULT_COMMAND_TIMEOUT_SECS,
        }
    }

    /// Set the default timeout for commands.
    pub fn with_timeout(mut self, timeout_seconds: u64) -> Self {
        self.default_timeout = timeout_seconds;
        self
    }
}

/// Trait for tools that can be executed by the agent.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Returns the unique name of the tool.
    fn name(&self) -> &str;

    /// Returns a description of what the tool does.
    fn description(&self) -> &str;

    /// Returns the JSON schema for the tool's parameters.
    fn parameters_schema(&self) -> Value;

    /// Arguments as they should appear in the transcript.
    ///
    /// File contents are replaced with a placeholder; everything else is
    /// logged as given.
    fn redacted_args(&self, args: &Value) -> Value {
        args.clone()
    }

    /// Execute the tool with the given arguments and context.
    ///
    /// # Arguments
    ///
    /// * `args` - JSON object containing the tool parameters
    /// * `ctx` - Execution context with the working directory
    ///
    /// # Returns
    ///
    /// A `ToolOutcome` for completed calls, recoverable failures included.
    async fn execute(&self, args: Value, ctx: &ExecutionContext)
        -> Result<ToolOutcome, ToolError>;
}

/// Registry for managing available tools, in registration order.
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolRegistry {
    /// Create a new empty tool registry.
    pub fn new() -> Self {
        Self { tools: Vec::new() }
    }

    /// Create a registry with the four sandbox tools.
    pub fn with_default_tools() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(RunCommandTool::new()));
        registry.register(Arc::new(ReadFileTool::new()));
        registry.register(Arc::new(WriteFileTool::new()));
        registry.register(Arc::new(EditFileTool::new()));
        registry
    }

    /// Register a tool, replacing any tool with the same name.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.retain(|t| t.name() != tool.name());
        self.tools.push(tool);
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.iter().find(|t| t.name() == name).cloned()
    }

    /// List all registered tool names.
    pub fn list_tools(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Tool schema presented to the model.
    pub fn tool_specs(&self) -> Vec<ToolSpec> {
        self.tools
            .iter()
            .map(|tool| ToolSpec {
                name: tool.name().to_string(),
                description: tool.description().to_string(),
                input_schema: tool.parameters_schema(),
            })
            .collect()
    }

    /// Execute one tool call and record it in the transcript.
    ///
    /// The `tool_use` entry is written before execution, so it exists
    /// whatever the outcome. Unknown tools and invalid arguments come back
    /// as error outcomes the model can react to; any other `ToolError` is
    /// returned to the caller.
    pub async fn dispatch(
        &self,
        call: &ToolCall,
        ctx: &ExecutionContext,
        transcript: &mut TranscriptWriter,
    ) -> Result<ToolOutcome, ToolError> {
        let tool = self.get(&call.name);
        let logged_args = match &tool {
            Some(tool) => tool.redacted_args(&call.arguments),
            None => call.arguments.clone(),
        };
        transcript.record_tool_use(&call.name, logged_args)?;

        let Some(tool) = tool else {
            warn!(tool = %call.name, "Model requested an unknown tool");
            return Ok(ToolOutcome::error(format!("Unknown tool: {}", call.name)));
        };

        debug!(tool = %call.name, id = %call.id, "Executing tool");
        match tool.execute(call.arguments.clone(), ctx).await {
            Ok(outcome) => {
                debug!(tool = %call.name, is_error = outcome.is_error, "Tool finished");
                Ok(outcome)
            }
            Err(ToolError::InvalidParameters(message)) => {
                warn!(tool = %call.name, error = %message, "Invalid tool arguments");
                Ok(ToolOutcome::error(format!("Invalid parameters: {}", message)))
            }
            Err(e) => Err(e),
        }
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
