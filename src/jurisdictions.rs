//! Jurisdiction coverage configuration.
//!
//! The enrichment provider is always asked about the full configured set of
//! ISO 3166-1 alpha-2 codes in a single call. The built-in set can be
//! replaced from a YAML file at startup; after that the set is immutable
//! and shared by reference.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Built-in coverage set.
const DEFAULT_CODES: &[&str] = &[
    "US", "GB", "CA", "AU", "NZ", "DE", "FR", "NL", "PT", "ES", "IT", "CH", "SE", "NO", "DK",
    "IE", "JP", "BR", "MX", "ZA",
];

/// The set of jurisdictions every enrichment call covers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JurisdictionSet {
    #[serde(default)]
    pub description: String,
    pub codes: Vec<String>,
}

#[derive(Debug, Error)]
pub enum JurisdictionError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid jurisdiction file: {0}")]
    Parse(String),

    #[error("'{0}' is not an ISO 3166-1 alpha-2 code")]
    BadCode(String),
}

impl JurisdictionSet {
    /// Load from a YAML file.
    pub fn load_from_file(path: &Path) -> Result<Self, JurisdictionError> {
        let content = std::fs::read_to_string(path).map_err(|e| JurisdictionError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::load_from_str(&content)
    }

    /// Load from a YAML string.
    pub fn load_from_str(yaml: &str) -> Result<Self, JurisdictionError> {
        let set: JurisdictionSet =
            serde_yaml::from_str(yaml).map_err(|e| JurisdictionError::Parse(e.to_string()))?;
        set.validate()?;
        Ok(set)
    }

    pub fn codes(&self) -> &[String] {
        &self.codes
    }

    fn validate(&self) -> Result<(), JurisdictionError> {
        if self.codes.is_empty() {
            return Err(JurisdictionError::Parse(
                "codes list must not be empty".to_string(),
            ));
        }
        for code in &self.codes {
            if !is_alpha2(code) {
                return Err(JurisdictionError::BadCode(code.clone()));
            }
        }
        Ok(())
    }
}

impl Default for JurisdictionSet {
    fn default() -> Self {
        Self {
            description: "Built-in coverage set".to_string(),
            codes: DEFAULT_CODES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Shape filter for ISO 3166-1 alpha-2 codes: exactly two ASCII letters.
pub fn is_alpha2(code: &str) -> bool {
    code.len() == 2 && code.chars().all(|c| c.is_ascii_alphabetic())
}
