//! LLM provider clients.
//!
//! Both pipeline providers (resolver and enrichment) are reached through
//! the [`LlmClient`] trait; the concrete implementation is chosen from
//! configuration at startup.

mod anthropic;
mod client;
mod openai;

pub use anthropic::AnthropicClient;
pub use client::{build_client, LlmClient};
pub use openai::OpenAiClient;
