//! PHI redaction.
//!
//! Every piece of document text passes through [`PhiRedactor`] before it can
//! reach a model. Downstream analysers only accept [`RedactedText`], which can
//! only be produced here, so an unredacted call path does not type-check.

pub mod patterns;
pub mod redactor;

pub use patterns::*;
pub use redactor::*;

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde::Serialize;
use thiserror::Error;
use zeroize::Zeroize;

use crate::models::RiskLevel;

#[derive(Error, Debug)]
pub enum RedactionError {
    #[error("PHI pattern for {category} failed to compile: {reason}")]
    Pattern { category: String, reason: String },

    #[error("Redacted output still matches {count} PHI pattern(s)")]
    ResidualPhi { count: usize },

    #[error("No placeholder index left for {category}")]
    PlaceholderExhausted { category: String },
}

/// Text that has been through the redactor.
#[derive(Clone, PartialEq, Eq)]
pub struct RedactedText(String);

impl RedactedText {
    pub(crate) fn new(text: String) -> Self {
        Self(text)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for RedactedText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("RedactedText").field(&self.0.len()).finish()
    }
}

/// Placeholder → original value. In-process only: not serializable,
/// values hidden from `Debug`, zeroized on drop.
#[derive(Default)]
pub struct RedactionMap {
    entries: HashMap<String, String>,
}

impl RedactionMap {
    pub(crate) fn insert(&mut self, placeholder: String, original: String) {
        self.entries.insert(placeholder, original);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains_placeholder(&self, placeholder: &str) -> bool {
        self.entries.contains_key(placeholder)
    }

    /// Put the original values back. Placeholders not in the map are left as is.
    pub fn restore(&self, redacted: &str) -> String {
        PLACEHOLDER_PATTERN
            .replace_all(redacted, |caps: &regex::Captures| {
                let token = &caps[0];
                self.entries
                    .get(token)
                    .cloned()
                    .unwrap_or_else(|| token.to_string())
            })
            .into_owned()
    }
}

impl Drop for RedactionMap {
    fn drop(&mut self) {
        for value in self.entries.values_mut() {
            value.zeroize();
        }
    }
}

impl fmt::Debug for RedactionMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedactionMap")
            .field("placeholders", &self.entries.len())
            .finish()
    }
}

#[derive(Debug)]
pub struct RedactionResult {
    pub redacted: RedactedText,
    pub mapping: RedactionMap,
    /// Category → number of redacted spans.
    pub categories: BTreeMap<String, usize>,
}

impl RedactionResult {
    pub fn total_redactions(&self) -> usize {
        self.categories.values().sum()
    }
}

/// Read-only PHI scan of a text.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComplianceReport {
    pub phi_detected: bool,
    pub phi_count: usize,
    pub categories: BTreeMap<String, usize>,
    pub risk_level: RiskLevel,
}

impl ComplianceReport {
    pub(crate) fn from_counts(categories: BTreeMap<String, usize>) -> Self {
        let phi_count: usize = categories.values().sum();
        let risk_level = if phi_count > 5 {
            RiskLevel::High
        } else if phi_count > 0 {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        };
        Self {
            phi_detected: phi_count > 0,
            phi_count,
            categories,
            risk_level,
        }
    }
}
