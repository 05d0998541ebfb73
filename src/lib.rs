//! Substance Atlas
//!
//! Resolves a free-form user query to a canonical substance name, then
//! serves a per-jurisdiction regulatory status enrichment for it, computed
//! through external inference providers and cached in Postgres.
//!
//! Pipeline: resolve -> normalize -> cache check -> enrich -> persist.

// Core error handling
pub mod error;

// Domain types and response envelopes
pub mod model;

// Defensive parsing of provider output
pub mod parse;

// Process configuration
pub mod config;
pub mod jurisdictions;

// LLM provider clients
pub mod llm;

// Pipeline stages
pub mod cache;
pub mod enrichment;
pub mod orchestrator;
pub mod resolver;

// REST API (when enabled)
#[cfg(feature = "server")]
pub mod api;

// Re-exports for the common entry points
pub use cache::{MemoryStatusStore, StatusStore};
pub use config::{AtlasConfig, KeyMode, ProviderConfig, ProviderKind};
pub use error::PipelineError;
pub use model::{
    AccessStatus, Resolution, Source, StatusEnvelope, StatusRecord, StatusResponse, SubstanceKey,
};
pub use orchestrator::StatusOrchestrator;

#[cfg(feature = "database")]
pub use cache::PgStatusStore;
