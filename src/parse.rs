//! Defensive parsing of provider output.
//!
//! Inference-provider text is unreliable by construction: it may arrive
//! fenced in markdown, wrapped in prose, truncated, or empty. `parse_or`
//! never raises; on any decode failure it substitutes the caller's fallback
//! and reports the failure through the log only.

use serde::de::DeserializeOwned;
use tracing::warn;

/// Decode result that remembers whether the fallback was substituted.
///
/// Callers collapse to `T` with [`Parsed::into_inner`]; the tag exists for
/// diagnostics, not control flow.
#[derive(Debug, Clone, PartialEq)]
pub enum Parsed<T> {
    Decoded(T),
    Fallback(T),
}

impl<T> Parsed<T> {
    pub fn into_inner(self) -> T {
        match self {
            Parsed::Decoded(value) | Parsed::Fallback(value) => value,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Parsed::Fallback(_))
    }
}

/// Strictly decode `raw`, substituting `fallback` on any failure.
///
/// A syntactically valid but semantically empty object (`{}`) is a
/// successful decode, not a fallback case.
pub fn parse_or<T: DeserializeOwned>(raw: &str, fallback: T) -> Parsed<T> {
    let cleaned = strip_code_fences(raw);
    if cleaned.is_empty() {
        warn!("provider returned empty output, substituting fallback");
        return Parsed::Fallback(fallback);
    }

    match serde_json::from_str(cleaned) {
        Ok(value) => Parsed::Decoded(value),
        Err(first_err) => {
            // Salvage pass: models sometimes wrap the JSON in prose.
            if let (Some(start), Some(end)) = (cleaned.find('{'), cleaned.rfind('}')) {
                if start < end {
                    if let Ok(value) = serde_json::from_str(&cleaned[start..=end]) {
                        return Parsed::Decoded(value);
                    }
                }
            }
            warn!(error = %first_err, "failed to decode provider output, substituting fallback");
            Parsed::Fallback(fallback)
        }
    }
}

/// Strip ```json ... ``` (or bare ``` ... ```) fencing if present.
fn strip_code_fences(text: &str) -> &str {
    let text = text.trim();
    let inner = if let Some((_, rest)) = text.split_once("```json") {
        rest.split("```").next().unwrap_or(rest)
    } else if text.contains("```") {
        text.split("```").nth(1).unwrap_or(text)
    } else {
        text
    };
    inner.trim()
}
