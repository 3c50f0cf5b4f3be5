use std::collections::{BTreeMap, HashMap};

use super::patterns::{select_non_overlapping, PhiPattern, PhiSpan, PLACEHOLDER_PATTERN};
use super::{ComplianceReport, RedactedText, RedactionError, RedactionMap, RedactionResult};
use crate::config::RedactionConfig;
use crate::models::{AuditAction, AuditDetail, AuditEvent, AuditScope, SubAnalysis};
use crate::pipeline::traits::AuditSink;

/// Pattern-based PHI redactor. Synchronous and in-process.
pub struct PhiRedactor {
    patterns: Vec<PhiPattern>,
}

impl PhiRedactor {
    /// Compile every configured pattern. Any failure rejects the whole set.
    pub fn new(config: &RedactionConfig) -> Result<Self, RedactionError> {
        let patterns = config
            .patterns
            .iter()
            .map(PhiPattern::compile)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.patterns.iter().map(|p| p.category.as_str())
    }

    fn find_spans(&self, text: &str) -> Vec<PhiSpan> {
        let all = self
            .patterns
            .iter()
            .enumerate()
            .flat_map(|(i, p)| p.spans(text, i))
            .collect();
        select_non_overlapping(all)
    }

    /// Replace every PHI span with a `[CATEGORY_n]` placeholder.
    ///
    /// Counters are per category and start after the highest index already
    /// present in `text`, so redacting redacted text never collides. The
    /// same value within a category always gets the same placeholder.
    pub fn redact(&self, text: &str) -> Result<RedactionResult, RedactionError> {
        let spans = self.find_spans(text);
        let mut counters = existing_placeholder_indices(text);
        let mut assigned: HashMap<(usize, &str), String> = HashMap::new();
        let mut mapping = RedactionMap::default();
        let mut categories: BTreeMap<String, usize> = BTreeMap::new();
        let mut output = String::with_capacity(text.len());
        let mut cursor = 0;

        for span in &spans {
            let category = &self.patterns[span.pattern].category;
            let original = &text[span.start..span.end];

            let placeholder = match assigned.get(&(span.pattern, original)) {
                Some(existing) => existing.clone(),
                None => {
                    let counter = counters.entry(category.clone()).or_insert(0);
                    *counter = counter.checked_add(1).ok_or_else(|| {
                        RedactionError::PlaceholderExhausted {
                            category: category.clone(),
                        }
                    })?;
                    let placeholder = format!("[{category}_{counter}]");
                    mapping.insert(placeholder.clone(), original.to_string());
                    assigned.insert((span.pattern, original), placeholder.clone());
                    placeholder
                }
            };

            output.push_str(&text[cursor..span.start]);
            output.push_str(&placeholder);
            cursor = span.end;
            *categories.entry(category.clone()).or_insert(0) += 1;
        }
        output.push_str(&text[cursor..]);

        let residual = self.find_spans(&output).len();
        if residual > 0 {
            return Err(RedactionError::ResidualPhi { count: residual });
        }

        Ok(RedactionResult {
            redacted: RedactedText::new(output),
            mapping,
            categories,
        })
    }

    /// Redact and emit the audit record for this pass. A failure is audited
    /// too; the error is still returned so the caller can fail closed.
    pub fn redact_with_audit(
        &self,
        text: &str,
        scope: &AuditScope,
        audit: &dyn AuditSink,
    ) -> Result<RedactionResult, RedactionError> {
        let outcome = self.redact(text);
        let event = match &outcome {
            Ok(result) => AuditEvent::new(
                AuditAction::PhiRedaction,
                scope.clone(),
                AuditDetail::CategoryCounts {
                    categories: result.categories.clone(),
                },
            ),
            Err(e) => AuditEvent::new(
                AuditAction::RedactionFailed,
                scope.clone(),
                AuditDetail::Failure {
                    step: SubAnalysis::Redaction,
                    reason: e.to_string(),
                },
            ),
        };

        if let Err(e) = audit.record(&event) {
            tracing::error!(
                document_id = scope.document_id.as_deref().unwrap_or("unknown"),
                action = event.action.as_str(),
                error = %e,
                "Failed to write redaction audit record"
            );
        }

        match &outcome {
            Ok(result) => tracing::info!(
                document_id = scope.document_id.as_deref().unwrap_or("unknown"),
                redactions = result.total_redactions(),
                "PHI redaction complete"
            ),
            Err(e) => tracing::warn!(
                document_id = scope.document_id.as_deref().unwrap_or("unknown"),
                error = %e,
                "PHI redaction failed, document will not leave the process"
            ),
        }

        outcome
    }

    /// Count PHI without changing the text.
    pub fn scan(&self, text: &str) -> ComplianceReport {
        let mut categories: BTreeMap<String, usize> = BTreeMap::new();
        for span in self.find_spans(text) {
            *categories
                .entry(self.patterns[span.pattern].category.clone())
                .or_insert(0) += 1;
        }
        ComplianceReport::from_counts(categories)
    }
}

/// Highest placeholder index per category already present in a text.
fn existing_placeholder_indices(text: &str) -> HashMap<String, u64> {
    let mut indices: HashMap<String, u64> = HashMap::new();
    for caps in PLACEHOLDER_PATTERN.captures_iter(text) {
        // Digits past u64 range count as the largest index.
        let n: u64 = caps[2].parse().unwrap_or(u64::MAX);
        let entry = indices.entry(caps[1].to_string()).or_insert(0);
        *entry = (*entry).max(n);
    }
    indices
}
