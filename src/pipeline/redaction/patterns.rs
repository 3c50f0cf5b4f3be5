use std::sync::LazyLock;

use regex::{Regex, RegexBuilder};

use super::RedactionError;
use crate::config::PhiPatternConfig;

/// Shape of every placeholder the redactor emits: `[CATEGORY_n]`.
pub static PLACEHOLDER_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[([A-Z][A-Z0-9_]*)_(\d+)\]").expect("placeholder pattern is valid")
});

/// Upper bound on a compiled pattern; oversized configs fail at startup.
const PATTERN_SIZE_LIMIT: usize = 1 << 20;

/// A compiled PHI pattern.
pub struct PhiPattern {
    pub category: String,
    regex: Regex,
}

/// A PHI span found in a text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PhiSpan {
    pub start: usize,
    pub end: usize,
    pub pattern: usize,
}

impl PhiPattern {
    pub fn compile(config: &PhiPatternConfig) -> Result<Self, RedactionError> {
        let category = normalize_category(&config.category);
        if category.is_empty() {
            return Err(RedactionError::Pattern {
                category: config.category.clone(),
                reason: "category label is empty".into(),
            });
        }
        let regex = RegexBuilder::new(&config.pattern)
            .size_limit(PATTERN_SIZE_LIMIT)
            .build()
            .map_err(|e| RedactionError::Pattern {
                category: category.clone(),
                reason: e.to_string(),
            })?;
        Ok(Self { category, regex })
    }

    /// Spans to redact: the `phi` group when the pattern has one,
    /// otherwise the whole match. Empty matches are skipped.
    pub(crate) fn spans(&self, text: &str, pattern_index: usize) -> Vec<PhiSpan> {
        self.regex
            .captures_iter(text)
            .filter_map(|caps| caps.name("phi").or_else(|| caps.get(0)))
            .filter(|m| !m.is_empty())
            .map(|m| PhiSpan {
                start: m.start(),
                end: m.end(),
                pattern: pattern_index,
            })
            .collect()
    }
}

/// `"medical record"` → `"MEDICAL_RECORD"`.
pub fn normalize_category(label: &str) -> String {
    let mut out = String::with_capacity(label.len());
    for c in label.trim().chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_uppercase());
        } else if !out.ends_with('_') {
            out.push('_');
        }
    }
    out.trim_matches('_').to_string()
}

/// Resolve overlaps: earliest start wins, then the longest span.
pub(crate) fn select_non_overlapping(mut spans: Vec<PhiSpan>) -> Vec<PhiSpan> {
    spans.sort_by(|a, b| a.start.cmp(&b.start).then(b.end.cmp(&a.end)));
    let mut selected: Vec<PhiSpan> = Vec::with_capacity(spans.len());
    for span in spans {
        match selected.last() {
            Some(last) if span.start < last.end => continue,
            _ => selected.push(span),
        }
    }
    selected
}
