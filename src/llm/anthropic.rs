//! Anthropic Messages API provider.
//!
//! Sends the full conversation, system prompt and tool schema in one request
//! and reconstructs the structured response (text and tool-use items, in
//! provider order).

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use std::env;
use std::time::Duration;

use super::{ContentItem, LlmProvider, ModelRequest, ModelResponse, Usage};
use crate::error::LlmError;

/// Default Anthropic API endpoint.
pub const ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com";

/// API version header value.
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Request timeout in seconds.
const REQUEST_TIMEOUT_SECS: u64 = 300;

/// Client for the Anthropic Messages API.
pub struct AnthropicClient {
    /// Base URL without the `/v1/messages` suffix.
    api_base: String,
    api_key: String,
    http_client: Client,
}

impl AnthropicClient {
    /// Create a new client.
    ///
    /// # Arguments
    ///
    /// * `api_key` - Anthropic API key
    /// * `api_base` - Base URL, e.g. `https://api.anthropic.com`
    pub fn new(api_key: impl Into<String>, api_base: impl Into<String>) -> Result<Self, LlmError> {
        let api_key = api_key.into().trim().to_string();
        if api_key.is_empty() {
            return Err(LlmError::MissingApiKey);
        }
        let http_client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| LlmError::RequestFailed(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            api_base: api_base.into().trim_end_matches('/').to_string(),
            api_key,
            http_client,
        })
    }

    /// Create a client from environment variables.
    ///
    /// Reads:
    /// - `ANTHROPIC_API_KEY` (required)
    /// - `ANTHROPIC_BASE_URL` (optional, defaults to the public endpoint)
    pub fn from_env() -> Result<Self, LlmError> {
        let api_key = env::var("ANTHROPIC_API_KEY").map_err(|_| LlmError::MissingApiKey)?;
        let api_base =
            env::var("ANTHROPIC_BASE_URL").unwrap_or_else(|_| ANTHROPIC_BASE_URL.to_string());
        Self::new(api_key, api_base)
    }

    /// Get the API base URL.
    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    fn messages_url(&self) -> String {
        format!("{}/v1/messages", self.api_base)
    }
}

/// Response body of a successful Messages call.
#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    id: String,
    #[serde(default)]
    model: String,
    content: Vec<ApiContentBlock>,
    #[serde(default)]
    stop_reason: Option<String>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ApiContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        #[serde(default)]
        input: Value,
    },
    #[serde(other)]
    Unsupported,
}

/// Error response from the API.
#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    #[serde(rename = "type", default)]
    error_type: String,
    #[serde(default)]
    message: String,
}

/// Map a non-success HTTP response onto the typed error taxonomy.
fn classify_error(model: &str, status: StatusCode, body: &str) -> LlmError {
    let detail = serde_json::from_str::<ApiErrorResponse>(body)
        .map(|r| r.error)
        .unwrap_or(ApiErrorDetail {
            error_type: String::new(),
            message: body.to_string(),
        });

    if status == StatusCode::NOT_FOUND || detail.error_type == "not_found_error" {
        return LlmError::ModelUnavailable {
            model: model.to_string(),
            message: detail.message,
        };
    }
    if status == StatusCode::TOO_MANY_REQUESTS {
        return LlmError::RateLimited(detail.message);
    }
    LlmError::ApiError {
        code: status.as_u16(),
        message: detail.message,
    }
}

#[async_trait]
impl LlmProvider for AnthropicClient {
    async fn complete(&self, request: &ModelRequest) -> Result<ModelResponse, LlmError> {
        let http_response = self
            .http_client
            .post(self.messages_url())
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(request)
            .send()
            .await
            .map_err(|e| LlmError::RequestFailed(e.to_string()))?;

        let status = http_response.status();
        let body = http_response
            .text()
            .await
            .map_err(|e| LlmError::RequestFailed(format!("Failed to read response: {}", e)))?;

        if !status.is_success() {
            return Err(classify_error(&request.model, status, &body));
        }

        let raw: Value = serde_json::from_str(&body)
            .map_err(|e| LlmError::ParseError(format!("Response is not JSON: {}", e)))?;
        let api_response: ApiResponse = serde_json::from_value(raw.clone())
            .map_err(|e| LlmError::ParseError(format!("Unexpected response shape: {}", e)))?;

        let content = api_response
            .content
            .into_iter()
            .filter_map(|block| match block {
                ApiContentBlock::Text { text } => Some(ContentItem::Text { text }),
                ApiContentBlock::ToolUse { id, name, input } => {
                    Some(ContentItem::ToolUse { id, name, input })
                }
                ApiContentBlock::Unsupported => None,
            })
            .collect();

        let model = if api_response.model.is_empty() {
            request.model.clone()
        } else {
            api_response.model
        };

        Ok(ModelResponse {
            id: api_response.id,
            model,
            content,
            stop_reason: api_response.stop_reason,
            usage: api_response.usage,
            raw,
        })
    }
}
