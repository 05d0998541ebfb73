//! End-to-end pipeline tests
//!
//! Drives the orchestrator through scripted provider clients and the
//! in-memory status store: the cold-lookup, cache-hit, and unresolved
//! scenarios plus the failure channels (cache-read hard failure,
//! best-effort write failure, empty enrichment).

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use tokio::sync::Mutex;

use substance_atlas::cache::{MemoryStatusStore, StatusStore};
use substance_atlas::config::{AtlasConfig, KeyMode, ProviderConfig, ProviderKind};
use substance_atlas::enrichment::EnrichmentClient;
use substance_atlas::error::PipelineError;
use substance_atlas::jurisdictions::JurisdictionSet;
use substance_atlas::llm::LlmClient;
use substance_atlas::model::{AccessStatus, Source, StatusRecord, StatusResponse, SubstanceKey};
use substance_atlas::orchestrator::StatusOrchestrator;
use substance_atlas::resolver::ResolverClient;

// ============================================================================
// Test doubles
// ============================================================================

/// Scripted LLM client: pops canned responses in order, counts calls.
struct ScriptedLlm {
    responses: Mutex<VecDeque<Result<String, String>>>,
    calls: AtomicUsize,
}

impl ScriptedLlm {
    fn new(responses: Vec<Result<String, String>>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into_iter().collect()),
            calls: AtomicUsize::new(0),
        })
    }

    fn replying(text: &str) -> Arc<Self> {
        Self::new(vec![Ok(text.to_string())])
    }

    fn silent() -> Arc<Self> {
        Self::new(vec![])
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    async fn chat(&self, system_prompt: &str, user_prompt: &str) -> Result<String> {
        self.chat_json(system_prompt, user_prompt).await
    }

    async fn chat_json(&self, _system_prompt: &str, _user_prompt: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.responses.lock().await.pop_front() {
            Some(Ok(text)) => Ok(text),
            Some(Err(message)) => Err(anyhow!(message)),
            None => Err(anyhow!("scripted client exhausted")),
        }
    }

    fn model_name(&self) -> &str {
        "scripted"
    }

    fn provider_name(&self) -> &str {
        "Scripted"
    }
}

/// Store that fails every operation; also proves a path was never taken.
struct FailingStore;

#[async_trait]
impl StatusStore for FailingStore {
    async fn lookup(&self, _key: &SubstanceKey) -> Result<Vec<StatusRecord>> {
        Err(anyhow!("store unreachable"))
    }

    async fn upsert(&self, _records: &[StatusRecord]) -> Result<()> {
        Err(anyhow!("store unreachable"))
    }
}

/// Store with a working read path and a broken write path.
struct ReadOnlyStore {
    inner: MemoryStatusStore,
}

#[async_trait]
impl StatusStore for ReadOnlyStore {
    async fn lookup(&self, key: &SubstanceKey) -> Result<Vec<StatusRecord>> {
        self.inner.lookup(key).await
    }

    async fn upsert(&self, _records: &[StatusRecord]) -> Result<()> {
        Err(anyhow!("write path disabled"))
    }
}

// ============================================================================
// Wiring helpers
// ============================================================================

fn dummy_provider() -> ProviderConfig {
    ProviderConfig {
        provider: ProviderKind::Anthropic,
        api_key: "test-key".to_string(),
        model: "test-model".to_string(),
        base_url: "http://localhost".to_string(),
        max_tokens: 256,
        temperature: 0.0,
        timeout_seconds: 5,
    }
}

fn test_config(key_mode: KeyMode) -> Arc<AtlasConfig> {
    Arc::new(AtlasConfig {
        key_mode,
        jurisdictions: JurisdictionSet::default(),
        resolver: dummy_provider(),
        enrichment: dummy_provider(),
    })
}

fn orchestrator(
    resolver_llm: Arc<ScriptedLlm>,
    enrich_llm: Arc<ScriptedLlm>,
    store: Arc<dyn StatusStore>,
    key_mode: KeyMode,
) -> StatusOrchestrator {
    StatusOrchestrator::new(
        ResolverClient::new(resolver_llm),
        EnrichmentClient::new(enrich_llm),
        store,
        test_config(key_mode),
    )
}

const MDMA_RESOLUTION: &str =
    r#"{"resolved_name": "MDMA", "canonical_name": "3,4-methylenedioxymethamphetamine"}"#;
const US_BANNED: &str =
    r#"{"US": {"access_status": "Banned", "reference_link": "https://example.gov/us"}}"#;

fn expect_envelope(response: StatusResponse) -> substance_atlas::model::StatusEnvelope {
    match response {
        StatusResponse::Resolved(envelope) => envelope,
        StatusResponse::Unresolved { message } => {
            panic!("expected a resolved envelope, got unresolved: {}", message)
        }
    }
}

// ============================================================================
// Scenarios
// ============================================================================

#[tokio::test]
async fn cold_lookup_enriches_and_populates_the_cache() {
    let resolver_llm = ScriptedLlm::replying(MDMA_RESOLUTION);
    let enrich_llm = ScriptedLlm::replying(US_BANNED);
    let store = Arc::new(MemoryStatusStore::new());

    let orch = orchestrator(
        resolver_llm,
        enrich_llm.clone(),
        store.clone(),
        KeyMode::Resolved,
    );
    let envelope = expect_envelope(orch.lookup("molly").await.unwrap());

    assert!(envelope.success);
    assert_eq!(envelope.source, Source::FreshlyComputed);
    assert_eq!(envelope.normalized_key, SubstanceKey::new("mdma"));
    assert_eq!(envelope.resolved_name, "MDMA");
    assert_eq!(envelope.records.len(), 1);
    assert_eq!(envelope.records[0].country_code, "US");
    assert_eq!(envelope.records[0].access_status, AccessStatus::Banned);
    assert_eq!(enrich_llm.calls(), 1);

    // The enrichment landed in the cache under the normalized key.
    let cached = store.lookup(&SubstanceKey::new("MDMA")).await.unwrap();
    assert_eq!(cached.len(), 1);
}

#[tokio::test]
async fn warm_lookup_is_served_from_cache_without_enrichment() {
    let store = Arc::new(MemoryStatusStore::new());

    // First request populates the cache.
    let orch = orchestrator(
        ScriptedLlm::replying(MDMA_RESOLUTION),
        ScriptedLlm::replying(US_BANNED),
        store.clone(),
        KeyMode::Resolved,
    );
    expect_envelope(orch.lookup("molly").await.unwrap());

    // Second request: the enrichment client must never be invoked.
    let enrich_llm = ScriptedLlm::silent();
    let orch = orchestrator(
        ScriptedLlm::replying(MDMA_RESOLUTION),
        enrich_llm.clone(),
        store,
        KeyMode::Resolved,
    );
    let envelope = expect_envelope(orch.lookup("molly").await.unwrap());

    assert_eq!(envelope.source, Source::Cache);
    assert_eq!(envelope.records.len(), 1);
    assert_eq!(enrich_llm.calls(), 0);
}

#[tokio::test]
async fn unresolved_input_short_circuits_all_collaborators() {
    let resolver_llm = ScriptedLlm::replying(
        r#"{"resolved_name": null, "message": "No known record of 'randomword123'"}"#,
    );
    let enrich_llm = ScriptedLlm::silent();

    // FailingStore proves the store is never touched on this path.
    let orch = orchestrator(
        resolver_llm,
        enrich_llm.clone(),
        Arc::new(FailingStore),
        KeyMode::Resolved,
    );

    match orch.lookup("randomword123").await.unwrap() {
        StatusResponse::Unresolved { message } => {
            assert_eq!(message, "No known record of 'randomword123'");
        }
        StatusResponse::Resolved(_) => panic!("expected unresolved"),
    }
    assert_eq!(enrich_llm.calls(), 0);
}

#[tokio::test]
async fn garbage_resolver_output_degrades_to_the_fallback_message() {
    let orch = orchestrator(
        ScriptedLlm::replying("certainly! here is some prose with no data"),
        ScriptedLlm::silent(),
        Arc::new(FailingStore),
        KeyMode::Resolved,
    );

    match orch.lookup("gibberish").await.unwrap() {
        StatusResponse::Unresolved { message } => {
            assert_eq!(message, "No known record of 'gibberish'");
        }
        StatusResponse::Resolved(_) => panic!("expected unresolved"),
    }
}

#[tokio::test]
async fn case_varied_resubmission_hits_the_same_cache_key() {
    let store = Arc::new(MemoryStatusStore::new());
    let enrich_llm = ScriptedLlm::replying(US_BANNED);

    // Resolver casing differs across the two calls; the key must not.
    let orch = orchestrator(
        ScriptedLlm::new(vec![
            Ok(r#"{"resolved_name": "MDMA"}"#.to_string()),
            Ok(r#"{"resolved_name": "mdma"}"#.to_string()),
        ]),
        enrich_llm.clone(),
        store,
        KeyMode::Resolved,
    );

    let first = expect_envelope(orch.lookup("MOLLY").await.unwrap());
    let second = expect_envelope(orch.lookup("molly").await.unwrap());

    assert_eq!(first.normalized_key, second.normalized_key);
    assert_eq!(first.source, Source::FreshlyComputed);
    assert_eq!(second.source, Source::Cache);
    assert_eq!(enrich_llm.calls(), 1);
}

#[tokio::test]
async fn canonical_key_mode_keys_on_the_canonical_name() {
    let orch = orchestrator(
        ScriptedLlm::replying(MDMA_RESOLUTION),
        ScriptedLlm::replying(US_BANNED),
        Arc::new(MemoryStatusStore::new()),
        KeyMode::Canonical,
    );

    let envelope = expect_envelope(orch.lookup("molly").await.unwrap());
    assert_eq!(
        envelope.normalized_key,
        SubstanceKey::new("3,4-methylenedioxymethamphetamine")
    );
}

#[tokio::test]
async fn empty_enrichment_is_reported_as_source_none() {
    let orch = orchestrator(
        ScriptedLlm::replying(MDMA_RESOLUTION),
        ScriptedLlm::replying("{}"),
        Arc::new(MemoryStatusStore::new()),
        KeyMode::Resolved,
    );

    let envelope = expect_envelope(orch.lookup("molly").await.unwrap());
    assert!(envelope.success);
    assert_eq!(envelope.source, Source::None);
    assert!(envelope.records.is_empty());
}

#[tokio::test]
async fn cache_read_failure_is_a_hard_error() {
    let orch = orchestrator(
        ScriptedLlm::replying(MDMA_RESOLUTION),
        ScriptedLlm::silent(),
        Arc::new(FailingStore),
        KeyMode::Resolved,
    );

    match orch.lookup("molly").await {
        Err(PipelineError::CacheRead { key, .. }) => assert_eq!(key, "mdma"),
        other => panic!("expected CacheRead error, got {:?}", other.map(|_| ())),
    }
}

#[tokio::test]
async fn persistence_failure_never_downgrades_fresh_data() {
    let orch = orchestrator(
        ScriptedLlm::replying(MDMA_RESOLUTION),
        ScriptedLlm::replying(US_BANNED),
        Arc::new(ReadOnlyStore {
            inner: MemoryStatusStore::new(),
        }),
        KeyMode::Resolved,
    );

    let envelope = expect_envelope(orch.lookup("molly").await.unwrap());
    assert_eq!(envelope.source, Source::FreshlyComputed);
    assert_eq!(envelope.records.len(), 1);
}

#[tokio::test]
async fn enrichment_provider_failure_propagates() {
    let orch = orchestrator(
        ScriptedLlm::replying(MDMA_RESOLUTION),
        ScriptedLlm::new(vec![Err("provider 500".to_string())]),
        Arc::new(MemoryStatusStore::new()),
        KeyMode::Resolved,
    );

    match orch.lookup("molly").await {
        Err(PipelineError::Enrichment { entity, .. }) => assert_eq!(entity, "MDMA"),
        other => panic!("expected Enrichment error, got {:?}", other.map(|_| ())),
    }
}

#[tokio::test]
async fn refresh_bypasses_resolver_and_cache_read() {
    let resolver_llm = ScriptedLlm::silent();
    let store = Arc::new(MemoryStatusStore::new());

    let orch = orchestrator(
        resolver_llm.clone(),
        ScriptedLlm::new(vec![
            Ok(US_BANNED.to_string()),
            Err("provider 500".to_string()),
        ]),
        store.clone(),
        KeyMode::Resolved,
    );

    let outcomes = orch
        .refresh(&["MDMA".to_string(), "Ketamine".to_string()])
        .await;

    assert_eq!(resolver_llm.calls(), 0);
    assert_eq!(outcomes.len(), 2);

    assert_eq!(outcomes[0].substance, SubstanceKey::new("mdma"));
    assert_eq!(outcomes[0].records, 1);
    assert!(outcomes[0].error.is_none());

    // The failed entity reports its error without aborting the batch.
    assert_eq!(outcomes[1].substance, SubstanceKey::new("ketamine"));
    assert_eq!(outcomes[1].records, 0);
    assert!(outcomes[1].error.is_some());

    let cached = store.lookup(&SubstanceKey::new("mdma")).await.unwrap();
    assert_eq!(cached.len(), 1);
}
