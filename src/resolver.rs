//! Resolver Client
//!
//! First pipeline stage: maps a free-form user query to a canonical
//! substance name through the resolver provider. Stateless per call; the
//! only side effect is the outbound request.

use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, info};

use crate::llm::LlmClient;
use crate::model::Resolution;
use crate::parse::parse_or;

/// Client for the name-resolution provider.
pub struct ResolverClient {
    llm: Arc<dyn LlmClient>,
}

impl ResolverClient {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    /// Resolve a raw query.
    ///
    /// `resolved_name == None` in the result is the unresolved sentinel.
    /// Malformed provider output degrades to that sentinel with the
    /// standard not-found message; only a failed provider call is an `Err`.
    pub async fn resolve(&self, raw_query: &str) -> Result<Resolution> {
        let system_prompt = include_str!("prompts/resolver_system.md");
        let user_prompt = format!("Resolve this query to a substance name:\n\n{}", raw_query);

        debug!(
            provider = self.llm.provider_name(),
            model = self.llm.model_name(),
            "resolving query"
        );
        let raw = self.llm.chat_json(system_prompt, &user_prompt).await?;

        let fallback = Resolution {
            resolved_name: None,
            canonical_name: None,
            message: Some(format!("No known record of '{}'", raw_query)),
        };
        let resolution = parse_or(&raw, fallback).into_inner();

        if let Some(name) = &resolution.resolved_name {
            info!(query = raw_query, resolved = name.as_str(), "query resolved");
        } else {
            info!(query = raw_query, "query did not resolve");
        }
        Ok(resolution)
    }
}
