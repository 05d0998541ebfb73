//! Process configuration.
//!
//! Built once at startup from the environment and shared immutably by
//! reference. Nothing here is mutated after construction.

use std::path::Path;

use anyhow::{anyhow, Context, Result};

use crate::jurisdictions::JurisdictionSet;

/// Supported inference providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Anthropic,
    OpenAi,
}

/// Configuration for one provider role.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub provider: ProviderKind,
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout_seconds: u64,
}

/// Which resolved identity the cache key is derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyMode {
    /// Key on the colloquial resolved name (default).
    #[default]
    Resolved,
    /// Key on the pharmacological canonical name, falling back to the
    /// resolved name when the resolver supplies none.
    Canonical,
}

/// Immutable process-wide configuration.
#[derive(Debug, Clone)]
pub struct AtlasConfig {
    pub key_mode: KeyMode,
    pub jurisdictions: JurisdictionSet,
    pub resolver: ProviderConfig,
    pub enrichment: ProviderConfig,
}

impl AtlasConfig {
    /// Build from environment variables.
    ///
    /// Provider selection: `ANTHROPIC_API_KEY` wins when set, otherwise
    /// `OPENAI_API_KEY`; `ANTHROPIC_MODEL`/`OPENAI_MODEL` override the
    /// default models. Both roles run with temperature pinned to zero so
    /// repeated calls with identical input are maximally reproducible.
    pub fn from_env() -> Result<Self> {
        let key_mode = match std::env::var("ATLAS_KEY_MODE").ok().as_deref() {
            None | Some("resolved") => KeyMode::Resolved,
            Some("canonical") => KeyMode::Canonical,
            Some(other) => {
                return Err(anyhow!(
                    "unknown ATLAS_KEY_MODE '{}', expected 'resolved' or 'canonical'",
                    other
                ))
            }
        };

        let jurisdictions = match std::env::var("ATLAS_JURISDICTIONS_FILE") {
            Ok(path) => JurisdictionSet::load_from_file(Path::new(&path))
                .with_context(|| format!("Failed to load jurisdiction file {}", path))?,
            Err(_) => JurisdictionSet::default(),
        };

        // The resolver needs only a short structured guess; enrichment
        // returns one entry per jurisdiction and gets a larger token allowance.
        let resolver = provider_from_env(256)?;
        let enrichment = provider_from_env(2048)?;

        Ok(Self {
            key_mode,
            jurisdictions,
            resolver,
            enrichment,
        })
    }
}

fn provider_from_env(max_tokens: u32) -> Result<ProviderConfig> {
    if let Ok(api_key) = std::env::var("ANTHROPIC_API_KEY") {
        return Ok(ProviderConfig {
            provider: ProviderKind::Anthropic,
            api_key,
            model: std::env::var("ANTHROPIC_MODEL")
                .unwrap_or_else(|_| "claude-sonnet-4-20250514".to_string()),
            base_url: "https://api.anthropic.com/v1".to_string(),
            max_tokens,
            temperature: 0.0,
            timeout_seconds: 30,
        });
    }

    if let Ok(api_key) = std::env::var("OPENAI_API_KEY") {
        return Ok(ProviderConfig {
            provider: ProviderKind::OpenAi,
            api_key,
            model: std::env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-4o".to_string()),
            base_url: "https://api.openai.com/v1".to_string(),
            max_tokens,
            temperature: 0.0,
            timeout_seconds: 30,
        });
    }

    Err(anyhow!(
        "no provider credentials found: set ANTHROPIC_API_KEY or OPENAI_API_KEY"
    ))
}
