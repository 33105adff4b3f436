//! Model client with ordered fallback across candidate models.

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::{LlmProvider, Message, ModelRequest, ToolSpec};
use crate::error::LlmError;
use crate::transcript::TranscriptWriter;

/// Default response token limit.
pub const DEFAULT_MAX_TOKENS: u32 = 4096;

/// Sends conversations to a provider, degrading across candidate models.
pub struct ModelClient {
    provider: Arc<dyn LlmProvider>,
    candidate_models: Vec<String>,
    max_tokens: u32,
    temperature: Option<f64>,
}

impl ModelClient {
    /// Create a client trying `candidate_models` top to bottom.
    pub fn new(provider: Arc<dyn LlmProvider>, candidate_models: Vec<String>) -> Self {
        Self {
            provider,
            candidate_models,
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: None,
        }
    }

    /// Set the maximum number of tokens per response.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Set the sampling temperature.
    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Candidate models in fallback order.
    pub fn candidate_models(&self) -> &[String] {
        &self.candidate_models
    }

    /// Send the conversation and return the assistant's reply.
    ///
    /// Candidates are tried once each, in order. A `ModelUnavailable` error
    /// moves on to the next candidate; any other error is returned at once.
    /// On success the request and the response are appended to the
    /// transcript.
    pub async fn send(
        &self,
        conversation: &[Message],
        system_prompt: &str,
        tools: &[ToolSpec],
        transcript: &mut TranscriptWriter,
    ) -> Result<Message, LlmError> {
        let mut last_unavailable = None;

        for model in &self.candidate_models {
            let request = ModelRequest {
                model: model.clone(),
                max_tokens: self.max_tokens,
                system: system_prompt.to_string(),
                messages: conversation.to_vec(),
                tools: tools.to_vec(),
                temperature: self.temperature,
            };

            debug!(model = %model, messages = conversation.len(), "Sending model request");

            match self.provider.complete(&request).await {
                Ok(response) => {
                    let raw_request = serde_json::to_value(&request).map_err(|e| {
                        LlmError::ParseError(format!("Failed to serialize request: {}", e))
                    })?;
                    transcript.record_request(model, conversation, &raw_request)?;
                    transcript.record_response(&response)?;

                    if let Some(usage) = &response.usage {
                        info!(
                            model = %response.model,
                            input_tokens = usage.input_tokens,
                            output_tokens = usage.output_tokens,
                            "Model responded"
                        );
                    }
                    return Ok(Message::assistant(response.content));
                }
                Err(e) if e.is_model_unavailable() => {
                    warn!(model = %model, error = %e, "Model unavailable, trying next candidate");
                    last_unavailable = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_unavailable.unwrap_or(LlmError::NoCandidateModels))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{ContentItem, ModelResponse, Role, Usage};
    use crate::transcript::{read_entries, EntryKind, AGENT_LOG};
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Provider that rejects some models and records every attempt.
    struct ScriptedProvider {
        unavailable: Vec<&'static str>,
        fail_with_server_error: bool,
        attempts: Mutex<Vec<String>>,
    }

    impl ScriptedProvider {
        fn new(unavailable: Vec<&'static str>) -> Self {
            Self {
                unavailable,
                fail_with_server_error: false,
                attempts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl LlmProvider for ScriptedProvider {
        async fn complete(&self, request: &ModelRequest) -> Result<ModelResponse, LlmError> {
            self.attempts.lock().unwrap().push(request.model.clone());
            if self.unavailable.contains(&request.model.as_str()) {
                return Err(LlmError::ModelUnavailable {
                    model: request.model.clone(),
                    message: "not found".to_string(),
                });
            }
            if self.fail_with_server_error {
                return Err(LlmError::ApiError {
                    code: 500,
                    message: "internal".to_string(),
                });
            }
            Ok(ModelResponse {
                id: "msg".to_string(),
                model: request.model.clone(),
                content: vec![ContentItem::text("ok")],
                stop_reason: Some("end_turn".to_string()),
                usage: Some(Usage {
                    input_tokens: 5,
                    output_tokens: 1,
                    ..Default::default()
                }),
                raw: serde_json::Value::Null,
            })
        }
    }

    fn models(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_falls_back_on_unavailable_model() {
        let dir = tempfile::tempdir().unwrap();
        let mut transcript = TranscriptWriter::create(dir.path()).unwrap();
        let provider = Arc::new(ScriptedProvider::new(vec!["first"]));
        let client = ModelClient::new(provider.clone(), models(&["first", "second", "third"]));

        let reply = client
            .send(&[Message::user_text("hi")], "sys", &[], &mut transcript)
            .await
            .unwrap();

        assert_eq!(reply.role, Role::Assistant);
        assert_eq!(reply.text(), "ok");
        assert_eq!(*provider.attempts.lock().unwrap(), models(&["first", "second"]));

        transcript.finish().unwrap();
        let entries = read_entries(&dir.path().join(AGENT_LOG)).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].kind, EntryKind::Request);
        assert_eq!(entries[0].payload["model"], "second");
        assert_eq!(entries[1].response().unwrap().usage.unwrap().input_tokens, 5);
    }

    #[tokio::test]
    async fn test_other_errors_propagate_immediately() {
        let dir = tempfile::tempdir().unwrap();
        let mut transcript = TranscriptWriter::create(dir.path()).unwrap();
        let provider = Arc::new(ScriptedProvider {
            fail_with_server_error: true,
            ..ScriptedProvider::new(vec![])
        });
        let client = ModelClient::new(provider.clone(), models(&["first", "second"]));

        let err = client
            .send(&[Message::user_text("hi")], "sys", &[], &mut transcript)
            .await
            .unwrap_err();

        assert!(matches!(err, LlmError::ApiError { code: 500, .. }));
        assert_eq!(*provider.attempts.lock().unwrap(), models(&["first"]));
        assert_eq!(transcript.entries_written(), 0);
    }

    #[tokio::test]
    async fn test_all_candidates_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let mut transcript = TranscriptWriter::create(dir.path()).unwrap();
        let provider = Arc::new(ScriptedProvider::new(vec!["a", "b"]));
        let client = ModelClient::new(provider, models(&["a", "b"]));

        let err = client
            .send(&[Message::user_text("hi")], "sys", &[], &mut transcript)
            .await
            .unwrap_err();
        assert!(err.is_model_unavailable());

        let empty = ModelClient::new(Arc::new(ScriptedProvider::new(vec![])), Vec::new());
        let err = empty
            .send(&[Message::user_text("hi")], "sys", &[], &mut transcript)
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::NoCandidateModels));
    }
}
