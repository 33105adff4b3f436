//! LLM integration for swe-resolve.
//!
//! - [`types`]: conversation model (messages, content items, tool specs)
//! - [`anthropic`]: Messages API provider
//! - [`client`]: [`ModelClient`], ordered fallback across candidate models
//!   with transcript recording
//! - [`cost`]: per-model price table
//!
//! ```ignore
//! use swe_resolve::llm::{AnthropicClient, ModelClient};
//!
//! let provider = Arc::new(AnthropicClient::from_env()?);
//! let client = ModelClient::new(provider, vec!["claude-3-5-sonnet-20241022".into()]);
//! let reply = client.send(&conversation, &system_prompt, &tools, &mut transcript).await?;
//! ```

pub mod anthropic;
pub mod client;
pub mod cost;
pub mod types;

pub use anthropic::AnthropicClient;
pub use client::ModelClient;
pub use cost::{ModelPrice, PriceTable};
pub use types::{
    ContentItem, Message, ModelRequest, ModelResponse, Role, ToolCall, ToolSpec, Usage,
};

use async_trait::async_trait;

use crate::error::LlmError;

/// Trait for LLM providers that can complete one conversational turn.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Complete the given request.
    async fn complete(&self, request: &ModelRequest) -> Result<ModelResponse, LlmError>;
}
