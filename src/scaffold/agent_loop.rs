//! Agent execution loop for the scaffold system.
//!
//! Each turn:
//! 1. Sends the conversation to the model
//! 2. Appends the assistant reply
//! 3. Stops if the reply requests no tools
//! 4. Otherwise executes the requested tools in emission order
//! 5. Appends one user message with the results, in the same order
//!
//! The loop is bounded by a turn budget. Errors raised by the model client
//! or by tool dispatch end the loop at the turn boundary; they are reported
//! in the outcome, never returned.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::prompts::{build_initial_message, build_system_prompt};
use super::tools::{
    truncate_middle, ExecutionContext, ToolError, ToolRegistry, DEFAULT_MAX_RESULT_CHARS,
};
use crate::llm::{Message, ModelClient, ToolSpec};
use crate::task::Task;
use crate::transcript::TranscriptWriter;

/// Default turn budget.
pub const DEFAULT_MAX_TURNS: usize = 10;

/// Errors that end the loop early.
#[derive(Debug, Error)]
pub enum AgentError {
    /// LLM provider error.
    #[error("LLM error: {0}")]
    LlmError(#[from] crate::error::LlmError),

    /// Tool execution error.
    #[error("Tool error: {0}")]
    ToolError(#[from] ToolError),
}

/// Configuration for the agent loop.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Maximum number of turns.
    pub max_turns: usize,
    /// Bound on each tool result fed back to the model.
    pub max_tool_result_chars: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_turns: DEFAULT_MAX_TURNS,
            max_tool_result_chars: DEFAULT_MAX_RESULT_CHARS,
        }
    }
}

impl AgentConfig {
    /// Create a new agent configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the turn budget.
    pub fn with_max_turns(mut self, max_turns: usize) -> Self {
        self.max_turns = max_turns;
        self
    }

    /// Set the tool result bound.
    pub fn with_max_tool_result_chars(mut self, max_chars: usize) -> Self {
        self.max_tool_result_chars = max_chars;
        self
    }
}

/// How the loop ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    /// The model replied without requesting tools.
    Completed,
    /// The turn budget ran out.
    BudgetExhausted,
    /// A model or tool error ended the loop.
    Error(String),
}

impl Termination {
    /// Label used in reports.
    pub fn label(&self) -> &'static str {
        match self {
            Termination::Completed => "completed",
            Termination::BudgetExhausted => "budget_exhausted",
            Termination::Error(_) => "error",
        }
    }
}

/// Result of agent execution.
#[derive(Debug, Clone)]
pub struct AgentOutcome {
    pub termination: Termination,
    /// Turns started, including a failed last one.
    pub turns: usize,
    /// Full append-only conversation.
    pub conversation: Vec<Message>,
}

enum TurnStatus {
    Finished,
    Continue,
}

/// Main agent execution loop.
pub struct AgentLoop {
    client: ModelClient,
    tool_registry: ToolRegistry,
    config: AgentConfig,
}

impl AgentLoop {
    /// Create an agent loop with the default sandbox tools.
    pub fn new(client: ModelClient, config: AgentConfig) -> Self {
        Self::with_tools(client, config, ToolRegistry::with_default_tools())
    }

    /// Create an agent loop with a custom tool registry.
    pub fn with_tools(client: ModelClient, config: AgentConfig, tool_registry: ToolRegistry) -> Self {
        Self {
            client,
            tool_registry,
            config,
        }
    }

    /// Tools available to the model.
    pub fn tool_registry(&self) -> &ToolRegistry {
        &self.tool_registry
    }

    /// Run the loop for `task`, seeded with the pre-verification output.
    ///
    /// The pre-verification output is bounded like any tool result.
    pub async fn run(
        &self,
        task: &Task,
        pre_output: &str,
        ctx: &ExecutionContext,
        transcript: &mut TranscriptWriter,
    ) -> AgentOutcome {
        let system_prompt = build_system_prompt(task);
        let tools = self.tool_registry.tool_specs();
        let pre_output = truncate_middle(pre_output, self.config.max_tool_result_chars);
        let mut conversation = vec![Message::user_text(build_initial_message(task, &pre_output))];
        let mut turns = 0;

        while turns < self.config.max_turns {
            turns += 1;
            debug!(turn = turns, max_turns = self.config.max_turns, "Starting turn");

            match self
                .turn(&mut conversation, &system_prompt, &tools, ctx, transcript)
                .await
            {
                Ok(TurnStatus::Finished) => {
                    info!(turns, "Agent finished");
                    return AgentOutcome {
                        termination: Termination::Completed,
                        turns,
                        conversation,
                    };
                }
                Ok(TurnStatus::Continue) => {}
                Err(e) => {
                    warn!(turn = turns, error = %e, "Agent loop stopped by error");
                    return AgentOutcome {
                        termination: Termination::Error(e.to_string()),
                        turns,
                        conversation,
                    };
                }
            }
        }

        info!(turns, "Turn budget exhausted");
        AgentOutcome {
            termination: Termination::BudgetExhausted,
            turns,
            conversation,
        }
    }

    async fn turn(
        &self,
        conversation: &mut Vec<Message>,
        system_prompt: &str,
        tools: &[ToolSpec],
        ctx: &ExecutionContext,
        transcript: &mut TranscriptWriter,
    ) -> Result<TurnStatus, AgentError> {
        let reply = self
            .client
            .send(conversation, system_prompt, tools, transcript)
            .await?;
        let calls = reply.tool_calls();
        conversation.push(reply);

        if calls.is_empty() {
            return Ok(TurnStatus::Finished);
        }

        let mut results = Vec::with_capacity(calls.len());
        for call in &calls {
            let outcome = self.tool_registry.dispatch(call, ctx, transcript).await?;
            results.push(outcome.into_content(&call.id, self.config.max_tool_result_chars));
        }
        conversation.push(Message::tool_results(results));
        Ok(TurnStatus::Continue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LlmError;
    use crate::llm::{ContentItem, LlmProvider, ModelRequest, ModelResponse, Role, Usage};
    use crate::transcript::{read_entries, EntryKind, AGENT_LOG};
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    /// Replays canned replies; errors once the script runs out.
    struct ScriptedProvider {
        replies: Mutex<VecDeque<Result<Vec<ContentItem>, LlmError>>>,
    }

    impl ScriptedProvider {
        fn new(replies: Vec<Result<Vec<ContentItem>, LlmError>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
            })
        }
    }

    #[async_trait]
    impl LlmProvider for ScriptedProvider {
        async fn complete(&self, request: &ModelRequest) -> Result<ModelResponse, LlmError> {
            let next = self
                .replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(LlmError::RequestFailed("script exhausted".into())));
            next.map(|content| ModelResponse {
                id: "msg".to_string(),
                model: request.model.clone(),
                content,
                stop_reason: None,
                usage: Some(Usage {
                    input_tokens: 10,
                    output_tokens: 5,
                    ..Default::default()
                }),
                raw: json!({}),
            })
        }
    }

    fn tool_use(id: &str, name: &str, input: serde_json::Value) -> ContentItem {
        ContentItem::ToolUse {
            id: id.to_string(),
            name: name.to_string(),
            input,
        }
    }

    fn task() -> Task {
        Task::from_yaml_str("task_id: t\ndescription: fix it\ntests:\n  test_command: 'true'\n")
            .unwrap()
    }

    fn agent(provider: Arc<ScriptedProvider>, max_turns: usize) -> AgentLoop {
        let client = ModelClient::new(provider, vec!["model-a".to_string()]);
        AgentLoop::new(client, AgentConfig::new().with_max_turns(max_turns))
    }

    #[tokio::test]
    async fn test_pre_output_is_bounded() {
        let work = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let mut transcript = TranscriptWriter::create(out.path()).unwrap();
        let provider = ScriptedProvider::new(vec![Ok(vec![ContentItem::text("Done.")])]);
        let client = ModelClient::new(provider, vec!["model-a".to_string()]);
        let agent = AgentLoop::new(client, AgentConfig::new().with_max_tool_result_chars(1_000));

        let pre_output = format!("FIRST LINE\n{}\nLAST LINE", "x".repeat(50_000));
        let outcome = agent
            .run(&task(), &pre_output, &ExecutionContext::new(work.path()), &mut transcript)
            .await;

        let first = outcome.conversation[0].text();
        assert!(first.len() < 2_000);
        assert!(first.contains("FIRST LINE"));
        assert!(first.contains("LAST LINE"));
        assert!(first.contains("characters truncated"));
        assert!(first.contains("fix it"));
    }

    #[tokio::test]
    async fn test_completes_when_no_tools_requested() {
        let work = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let mut transcript = TranscriptWriter::create(out.path()).unwrap();
        let provider = ScriptedProvider::new(vec![Ok(vec![ContentItem::text("All done.")])]);

        let outcome = agent(provider, 5)
            .run(&task(), "1 failed", &ExecutionContext::new(work.path()), &mut transcript)
            .await;

        assert_eq!(outcome.termination, Termination::Completed);
        assert_eq!(outcome.turns, 1);
        assert_eq!(outcome.conversation.len(), 2);
        assert!(outcome.conversation[0].text().contains("1 failed"));
        assert_eq!(outcome.conversation[1].role, Role::Assistant);
    }

    #[tokio::test]
    async fn test_tool_results_match_calls_in_order() {
        let work = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        std::fs::write(work.path().join("a.txt"), "alpha").unwrap();
        let mut transcript = TranscriptWriter::create(out.path()).unwrap();
        let provider = ScriptedProvider::new(vec![
            Ok(vec![
                ContentItem::text("Looking around."),
                tool_use("c1", "read_file", json!({"path": "a.txt"})),
                tool_use("c2", "read_file", json!({"path": "missing.txt"})),
                tool_use("c3", "run_command", json!({"command": "echo hi"})),
            ]),
            Ok(vec![ContentItem::text("Done.")]),
        ]);

        let outcome = agent(provider, 5)
            .run(&task(), "", &ExecutionContext::new(work.path()), &mut transcript)
            .await;
        assert_eq!(outcome.termination, Termination::Completed);
        assert_eq!(outcome.turns, 2);

        let results = &outcome.conversation[2];
        assert_eq!(results.role, Role::User);
        let ids: Vec<(&str, bool)> = results
            .content
            .iter()
            .map(|item| match item {
                ContentItem::ToolResult {
                    tool_use_id,
                    is_error,
                    ..
                } => (tool_use_id.as_str(), *is_error),
                other => panic!("unexpected item: {other:?}"),
            })
            .collect();
        assert_eq!(ids, vec![("c1", false), ("c2", true), ("c3", false)]);

        transcript.finish().unwrap();
        let kinds: Vec<EntryKind> = read_entries(&out.path().join(AGENT_LOG))
            .unwrap()
            .into_iter()
            .map(|e| e.kind)
            .collect();
        assert_eq!(
            kinds,
            vec![
                EntryKind::Request,
                EntryKind::Response,
                EntryKind::ToolUse,
                EntryKind::ToolUse,
                EntryKind::ToolUse,
                EntryKind::Request,
                EntryKind::Response,
            ]
        );
    }

    #[tokio::test]
    async fn test_budget_exhaustion_is_not_an_error() {
        let work = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let mut transcript = TranscriptWriter::create(out.path()).unwrap();
        let replies = (0..5)
            .map(|i| Ok(vec![tool_use(&format!("c{i}"), "run_command", json!({"command": "true"}))]))
            .collect();
        let provider = ScriptedProvider::new(replies);

        let outcome = agent(provider, 3)
            .run(&task(), "", &ExecutionContext::new(work.path()), &mut transcript)
            .await;

        assert_eq!(outcome.termination, Termination::BudgetExhausted);
        assert_eq!(outcome.turns, 3);
        // seed + 3 * (assistant + results)
        assert_eq!(outcome.conversation.len(), 7);
    }

    #[tokio::test]
    async fn test_model_error_ends_loop_and_keeps_conversation() {
        let work = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let mut transcript = TranscriptWriter::create(out.path()).unwrap();
        let provider = ScriptedProvider::new(vec![
            Ok(vec![tool_use("c1", "run_command", json!({"command": "true"}))]),
            Err(LlmError::ApiError {
                code: 500,
                message: "boom".to_string(),
            }),
        ]);

        let outcome = agent(provider, 5)
            .run(&task(), "", &ExecutionContext::new(work.path()), &mut transcript)
            .await;

        assert!(matches!(outcome.termination, Termination::Error(ref m) if m.contains("boom")));
        assert_eq!(outcome.termination.label(), "error");
        assert_eq!(outcome.turns, 2);
        assert_eq!(outcome.conversation.len(), 3);
    }

    #[tokio::test]
    async fn test_zero_budget_never_calls_model() {
        let work = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let mut transcript = TranscriptWriter::create(out.path()).unwrap();
        let provider = ScriptedProvider::new(Vec::new());

        let outcome = agent(provider, 0)
            .run(&task(), "", &ExecutionContext::new(work.path()), &mut transcript)
            .await;

        assert_eq!(outcome.termination, Termination::BudgetExhausted);
        assert_eq!(outcome.turns, 0);
        assert_eq!(transcript.entries_written(), 0);
    }
}
