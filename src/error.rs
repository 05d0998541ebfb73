//! Typed failure taxonomy for the status pipeline.
//!
//! Only hard stage failures live here. Malformed provider output is
//! recovered locally by the parser fallback, and cache writes are a
//! best-effort channel; neither ever becomes a request failure.

use thiserror::Error;

/// Terminal failure of one pipeline stage. All variants map to a 500-class
/// response; "unresolved" is a normal outcome, not an error.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The resolver provider call itself failed (transport or API error).
    #[error("resolver provider failure: {source}")]
    Resolver {
        #[source]
        source: anyhow::Error,
    },

    /// The cache read path failed. The request cannot safely proceed
    /// without knowing cache state.
    #[error("cache lookup failed for '{key}': {source}")]
    CacheRead {
        key: String,
        #[source]
        source: anyhow::Error,
    },

    /// The enrichment provider call itself failed (not merely bad content).
    #[error("enrichment provider failure for '{entity}': {source}")]
    Enrichment {
        entity: String,
        #[source]
        source: anyhow::Error,
    },
}
