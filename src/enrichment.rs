//! Enrichment Client
//!
//! Second pipeline stage: asks the enrichment provider for per-jurisdiction
//! access status for a resolved substance. One call covers the whole
//! jurisdiction list; the response is requested as JSON keyed by ISO
//! 3166-1 alpha-2 code.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::jurisdictions::is_alpha2;
use crate::llm::LlmClient;
use crate::model::{AccessStatus, StatusRecord, SubstanceKey};
use crate::parse::parse_or;

/// One jurisdiction entry as returned by the provider.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct JurisdictionEntry {
    #[serde(default)]
    pub access_status: Option<String>,
    #[serde(default)]
    pub reference_link: Option<String>,
}

/// Client for the enrichment provider.
pub struct EnrichmentClient {
    llm: Arc<dyn LlmClient>,
}

impl EnrichmentClient {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    /// Fetch status records for `display_name` across `jurisdictions`.
    ///
    /// Records carry `key` as their entity identity and a fresh timestamp.
    /// Malformed jurisdiction keys are dropped, never fatal; an empty or
    /// unparseable body yields an empty record list ("no enrichment
    /// produced"), not an error. Only a failed provider call is an `Err`.
    pub async fn enrich(
        &self,
        display_name: &str,
        key: &SubstanceKey,
        jurisdictions: &[String],
    ) -> Result<Vec<StatusRecord>> {
        let system_prompt = include_str!("prompts/enrichment_system.md");
        let user_prompt = format!(
            "Substance: {}\nCountry codes: {}",
            display_name,
            jurisdictions.join(", ")
        );

        debug!(
            provider = self.llm.provider_name(),
            model = self.llm.model_name(),
            substance = display_name,
            jurisdictions = jurisdictions.len(),
            "requesting enrichment"
        );
        let raw = self.llm.chat_json(system_prompt, &user_prompt).await?;

        let parsed: HashMap<String, JurisdictionEntry> =
            parse_or(&raw, HashMap::new()).into_inner();

        let now = Utc::now();
        let mut records = Vec::with_capacity(parsed.len());
        for (code, entry) in parsed {
            let code = code.trim().to_ascii_uppercase();
            if !is_alpha2(&code) {
                warn!(code = code.as_str(), "dropping malformed jurisdiction code");
                continue;
            }

            let status = match entry.access_status.as_deref() {
                Some(raw_status) => {
                    let status = AccessStatus::parse(raw_status);
                    if status == AccessStatus::Unknown
                        && !raw_status.trim().eq_ignore_ascii_case("unknown")
                    {
                        warn!(
                            code = code.as_str(),
                            status = raw_status,
                            "unrecognized access status, recording as Unknown"
                        );
                    }
                    status
                }
                None => AccessStatus::Unknown,
            };

            records.push(StatusRecord {
                substance: key.clone(),
                country_code: code,
                access_status: status,
                reference_link: entry.reference_link,
                updated_at: now,
            });
        }

        records.sort_by(|a, b| a.country_code.cmp(&b.country_code));
        if records.is_empty() {
            warn!(substance = display_name, "enrichment produced no records");
        }
        Ok(records)
    }
}
