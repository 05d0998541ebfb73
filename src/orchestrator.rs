//! Orchestrator
//!
//! Composes resolve -> normalize -> cache check -> enrich -> persist into a
//! single-pass pipeline. Each request walks the stages exactly once; there
//! is no retry loop and no backtracking between stages. The orchestrator
//! holds no per-request mutable state and is shared via `Arc` across
//! concurrent requests.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::cache::StatusStore;
use crate::config::{AtlasConfig, KeyMode};
use crate::enrichment::EnrichmentClient;
use crate::error::PipelineError;
use crate::model::{
    RefreshOutcome, Resolution, Source, StatusEnvelope, StatusResponse, SubstanceKey,
};
use crate::resolver::ResolverClient;

/// Pipeline entry point: owns envelope construction end to end.
pub struct StatusOrchestrator {
    resolver: ResolverClient,
    enrichment: EnrichmentClient,
    store: Arc<dyn StatusStore>,
    config: Arc<AtlasConfig>,
}

impl StatusOrchestrator {
    /// Create an orchestrator from already-wired stage clients.
    pub fn new(
        resolver: ResolverClient,
        enrichment: EnrichmentClient,
        store: Arc<dyn StatusStore>,
        config: Arc<AtlasConfig>,
    ) -> Self {
        Self {
            resolver,
            enrichment,
            store,
            config,
        }
    }

    /// Wire up provider clients from configuration.
    pub fn from_config(
        config: Arc<AtlasConfig>,
        store: Arc<dyn StatusStore>,
    ) -> anyhow::Result<Self> {
        let resolver = ResolverClient::new(crate::llm::build_client(&config.resolver)?);
        let enrichment = EnrichmentClient::new(crate::llm::build_client(&config.enrichment)?);
        Ok(Self::new(resolver, enrichment, store, config))
    }

    /// Run the full pipeline for one query.
    pub async fn lookup(&self, raw_query: &str) -> Result<StatusResponse, PipelineError> {
        // Resolving
        let resolution = self
            .resolver
            .resolve(raw_query)
            .await
            .map_err(|source| PipelineError::Resolver { source })?;

        let Some(resolved_name) = resolution.resolved_name.clone() else {
            let message = resolution
                .message
                .clone()
                .unwrap_or_else(|| format!("No known record of '{}'", raw_query));
            return Ok(StatusResponse::Unresolved { message });
        };

        // The key is derived exactly once so the read and write paths can
        // never disagree on identity.
        let key = self.derive_key(&resolution, &resolved_name);

        // CacheCheck
        let cached = self
            .store
            .lookup(&key)
            .await
            .map_err(|source| PipelineError::CacheRead {
                key: key.to_string(),
                source,
            })?;
        if !cached.is_empty() {
            debug!(key = %key, records = cached.len(), "cache hit");
            return Ok(StatusResponse::Resolved(StatusEnvelope {
                success: true,
                source: Source::Cache,
                normalized_key: key,
                resolved_name,
                canonical_name: resolution.canonical_name,
                records: cached,
            }));
        }

        // Enriching
        debug!(key = %key, "cache miss, enriching");
        let records = self
            .enrichment
            .enrich(&resolved_name, &key, self.config.jurisdictions.codes())
            .await
            .map_err(|source| PipelineError::Enrichment {
                entity: resolved_name.clone(),
                source,
            })?;

        // Best-effort persist: a write failure is logged and never
        // downgrades a successful enrichment.
        if !records.is_empty() {
            if let Err(e) = self.store.upsert(&records).await {
                warn!(key = %key, error = %e, "failed to persist enrichment result");
            }
        }

        let source = if records.is_empty() {
            Source::None
        } else {
            Source::FreshlyComputed
        };
        info!(key = %key, records = records.len(), "enrichment complete");
        Ok(StatusResponse::Resolved(StatusEnvelope {
            success: true,
            source,
            normalized_key: key,
            resolved_name,
            canonical_name: resolution.canonical_name,
            records,
        }))
    }

    /// Forced repopulation: skips the resolver and the cache read, enriches
    /// and persists each listed substance. One bad entity never aborts the
    /// rest; persistence failures are reported per entity because this path
    /// exists precisely to write the cache.
    pub async fn refresh(&self, substances: &[String]) -> Vec<RefreshOutcome> {
        let mut outcomes = Vec::with_capacity(substances.len());
        for substance in substances {
            let key = SubstanceKey::new(substance);
            let outcome = match self
                .enrichment
                .enrich(substance, &key, self.config.jurisdictions.codes())
                .await
            {
                Ok(records) => match self.store.upsert(&records).await {
                    Ok(()) => RefreshOutcome {
                        substance: key,
                        records: records.len(),
                        error: None,
                    },
                    Err(e) => RefreshOutcome {
                        substance: key,
                        records: records.len(),
                        error: Some(format!("persistence failed: {}", e)),
                    },
                },
                Err(e) => RefreshOutcome {
                    substance: key,
                    records: 0,
                    error: Some(e.to_string()),
                },
            };
            outcomes.push(outcome);
        }
        outcomes
    }

    fn derive_key(&self, resolution: &Resolution, resolved_name: &str) -> SubstanceKey {
        match self.config.key_mode {
            KeyMode::Resolved => SubstanceKey::new(resolved_name),
            KeyMode::Canonical => SubstanceKey::new(
                resolution.canonical_name.as_deref().unwrap_or(resolved_name),
            ),
        }
    }
}
