//! Unified interface for LLM providers.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::config::{ProviderConfig, ProviderKind};

use super::anthropic::AnthropicClient;
use super::openai::OpenAiClient;

/// Unified LLM client interface for both Anthropic and OpenAI.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Call the LLM with system + user prompts, return the raw text response.
    async fn chat(&self, system_prompt: &str, user_prompt: &str) -> Result<String>;

    /// Call the LLM expecting a JSON response.
    /// - For OpenAI: uses response_format json_object mode
    /// - For Anthropic: adds a JSON instruction to the system prompt
    async fn chat_json(&self, system_prompt: &str, user_prompt: &str) -> Result<String>;

    /// Model name for logging.
    fn model_name(&self) -> &str;

    /// Provider name for logging.
    fn provider_name(&self) -> &str;
}

/// Build a client for the configured provider.
pub fn build_client(config: &ProviderConfig) -> Result<Arc<dyn LlmClient>> {
    Ok(match config.provider {
        ProviderKind::Anthropic => Arc::new(AnthropicClient::new(config.clone())?),
        ProviderKind::OpenAi => Arc::new(OpenAiClient::new(config.clone())?),
    })
}
