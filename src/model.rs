//! Core data model for the status pipeline.
//!
//! Everything the pipeline passes between stages lives here: the normalized
//! cache key, the per-jurisdiction status record, the resolver output, and
//! the response envelopes the orchestrator hands to the API layer.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Case-folded cache key derived from a resolved substance name.
///
/// Two queries that resolve to the same display name must produce the same
/// key regardless of casing or incidental whitespace, so construction is the
/// only way to obtain one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct SubstanceKey(String);

impl SubstanceKey {
    /// Normalize a display name into the canonical lookup key.
    pub fn new(name: &str) -> Self {
        let folded = name
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase();
        Self(folded)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubstanceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// Deserialization funnels through `new` so a key read back from storage or
// a request body carries the same normalization as one derived in-process.
impl<'de> Deserialize<'de> for SubstanceKey {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(SubstanceKey::new(&raw))
    }
}

/// Regulatory access status for a substance in one jurisdiction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AccessStatus {
    ApprovedMedicalUse,
    Banned,
    LimitedAccessTrials,
    Unknown,
}

impl AccessStatus {
    /// Canonical storage/wire text.
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessStatus::ApprovedMedicalUse => "ApprovedMedicalUse",
            AccessStatus::Banned => "Banned",
            AccessStatus::LimitedAccessTrials => "LimitedAccessTrials",
            AccessStatus::Unknown => "Unknown",
        }
    }

    /// Total parse: anything unrecognized maps to `Unknown`.
    pub fn parse(raw: &str) -> Self {
        let folded: String = raw
            .trim()
            .chars()
            .filter(|c| !matches!(c, ' ' | '_' | '-'))
            .collect::<String>()
            .to_ascii_lowercase();
        match folded.as_str() {
            "approvedmedicaluse" => AccessStatus::ApprovedMedicalUse,
            "banned" => AccessStatus::Banned,
            "limitedaccesstrials" => AccessStatus::LimitedAccessTrials,
            _ => AccessStatus::Unknown,
        }
    }
}

impl fmt::Display for AccessStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// Deserialization is total, like `parse`: unexpected wire text becomes
// `Unknown` instead of failing the surrounding record.
impl<'de> Deserialize<'de> for AccessStatus {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(AccessStatus::parse(&raw))
    }
}

/// One cached status row: unique per (substance, country_code) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusRecord {
    pub substance: SubstanceKey,
    pub country_code: String,
    pub access_status: AccessStatus,
    pub reference_link: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// Output of the resolver provider.
///
/// `resolved_name == None` is the unresolved sentinel: the orchestrator must
/// short-circuit before any cache or enrichment traffic.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Resolution {
    #[serde(default)]
    pub resolved_name: Option<String>,
    #[serde(default)]
    pub canonical_name: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl Resolution {
    pub fn is_resolved(&self) -> bool {
        self.resolved_name.is_some()
    }
}

/// Where the records in an envelope came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Source {
    /// Served from the status cache.
    Cache,
    /// Computed by the enrichment provider on this request.
    FreshlyComputed,
    /// Enrichment ran but produced no records.
    None,
}

/// Successful response envelope. Constructed fresh per request by the
/// orchestrator, never stored.
#[derive(Debug, Clone, Serialize)]
pub struct StatusEnvelope {
    pub success: bool,
    pub source: Source,
    pub normalized_key: SubstanceKey,
    pub resolved_name: String,
    pub canonical_name: Option<String>,
    pub records: Vec<StatusRecord>,
}

/// Outcome of a single lookup.
#[derive(Debug, Clone)]
pub enum StatusResponse {
    Resolved(StatusEnvelope),
    Unresolved { message: String },
}

/// Per-entity outcome of a forced refresh.
#[derive(Debug, Clone, Serialize)]
pub struct RefreshOutcome {
    pub substance: SubstanceKey,
    pub records: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn key_folds_case_and_whitespace() {
        assert_eq!(SubstanceKey::new("MDMA").as_str(), "mdma");
        assert_eq!(SubstanceKey::new("  Ibogaine  ").as_str(), "ibogaine");
        assert_eq!(
            SubstanceKey::new("Lysergic   Acid\tDiethylamide").as_str(),
            "lysergic acid diethylamide"
        );
    }

    #[test]
    fn key_deserialization_normalizes() {
        let key: SubstanceKey = serde_json::from_str(r#""  MDMA ""#).unwrap();
        assert_eq!(key, SubstanceKey::new("mdma"));
    }

    #[test]
    fn access_status_parse_is_total() {
        assert_eq!(
            AccessStatus::parse("ApprovedMedicalUse"),
            AccessStatus::ApprovedMedicalUse
        );
        assert_eq!(
            AccessStatus::parse("approved_medical_use"),
            AccessStatus::ApprovedMedicalUse
        );
        assert_eq!(AccessStatus::parse("BANNED"), AccessStatus::Banned);
        assert_eq!(
            AccessStatus::parse("limited access trials"),
            AccessStatus::LimitedAccessTrials
        );
        assert_eq!(AccessStatus::parse("schedule I"), AccessStatus::Unknown);
        assert_eq!(AccessStatus::parse(""), AccessStatus::Unknown);
    }

    #[test]
    fn unknown_status_round_trips_from_unexpected_wire_text() {
        let status: AccessStatus = serde_json::from_str(r#""Decriminalized""#).unwrap();
        assert_eq!(status, AccessStatus::Unknown);
    }

    #[test]
    fn empty_object_is_an_unresolved_resolution() {
        let resolution: Resolution = serde_json::from_str("{}").unwrap();
        assert!(!resolution.is_resolved());
        assert!(resolution.message.is_none());
    }

    proptest! {
        #[test]
        fn key_is_stable_under_case_variation(s in "[a-zA-Z0-9 ]{1,40}") {
            prop_assert_eq!(
                SubstanceKey::new(&s.to_uppercase()),
                SubstanceKey::new(&s.to_lowercase())
            );
        }
    }
}
