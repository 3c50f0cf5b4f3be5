//! Analysis configuration.
//!
//! Every tunable the pipeline depends on lives here: tier price tables and
//! timeouts, routing thresholds, PHI patterns, classifier thresholds, merit
//! weights, statute-of-limitations periods, pool sizes and cost budgets.
//! The config is loaded once, validated, and shared as `Arc<AnalysisConfig>`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::models::{ModelTier, TaskType};

/// Application-level constants
pub const APP_NAME: &str = "docmerit";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Environment variable naming the JSON config file.
pub const CONFIG_ENV_VAR: &str = "DOCMERIT_CONFIG";

/// SQLCipher passphrase for the result store. Read from the environment only.
pub const DB_KEY_ENV_VAR: &str = "DOCMERIT_DB_KEY";

/// Log filter used when `RUST_LOG` is not set.
pub fn default_log_filter() -> &'static str {
    "docmerit=info,warn"
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid config value for {field}: {reason}")]
    Invalid { field: String, reason: String },
}

fn invalid(field: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field: field.to_string(),
        reason: reason.into(),
    }
}

// ═══════════════════════════════════════════════════════════
// Root
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub tiers: TierTable,
    pub routing: RoutingConfig,
    pub redaction: RedactionConfig,
    pub classifier: ClassifierConfig,
    pub merit: MeritConfig,
    /// Jurisdiction → case type → limitation period in months.
    pub statutes: BTreeMap<String, BTreeMap<String, u32>>,
    pub concurrency: ConcurrencyConfig,
    pub cost: CostConfig,
    /// SQLite file for results, audit and usage. In-memory when absent.
    pub database_path: Option<PathBuf>,
    /// Base directory that document file references resolve against.
    pub document_root: Option<PathBuf>,
}

impl AnalysisConfig {
    /// Load and validate a JSON config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        let mut config: AnalysisConfig = serde_json::from_str(&raw)?;
        if config.statutes.is_empty() {
            config.statutes = default_statutes();
        }
        config.validate()?;
        Ok(config)
    }

    /// Load from the file named by `DOCMERIT_CONFIG`, or the defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        match std::env::var_os(CONFIG_ENV_VAR) {
            Some(path) => Self::load(Path::new(&path)),
            None => Ok(Self::with_defaults()),
        }
    }

    /// Defaults including the built-in statute table.
    pub fn with_defaults() -> Self {
        Self {
            statutes: default_statutes(),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for tier in [ModelTier::Cheap, ModelTier::HighReasoning] {
            self.tiers.get(tier).validate(tier)?;
        }
        self.routing.validate()?;
        if self.redaction.patterns.is_empty() {
            return Err(invalid("redaction.patterns", "at least one PHI pattern is required"));
        }
        self.classifier.validate()?;
        self.merit.validate()?;
        if self.concurrency.document_pool_size == 0 {
            return Err(invalid("concurrency.document_pool_size", "must be at least 1"));
        }
        if self.concurrency.backoff_base_ms > self.concurrency.backoff_max_ms {
            return Err(invalid(
                "concurrency.backoff_base_ms",
                "must not exceed backoff_max_ms",
            ));
        }
        self.cost.validate()
    }

    /// Limitation period for a jurisdiction and case type, case-insensitive.
    pub fn statute_months(&self, jurisdiction: &str, case_type: &str) -> Option<u32> {
        let jurisdiction = jurisdiction.trim().to_ascii_uppercase();
        let case_type = case_type.trim().to_ascii_lowercase();
        self.statutes
            .iter()
            .find(|(j, _)| j.to_ascii_uppercase() == jurisdiction)
            .and_then(|(_, periods)| periods.get(&case_type).copied())
    }

    pub fn has_jurisdiction(&self, jurisdiction: &str) -> bool {
        let jurisdiction = jurisdiction.trim().to_ascii_uppercase();
        self.statutes
            .keys()
            .any(|j| j.to_ascii_uppercase() == jurisdiction)
    }
}

// ═══════════════════════════════════════════════════════════
// Model tiers
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TierTable {
    pub cheap: TierConfig,
    pub high_reasoning: TierConfig,
}

impl TierTable {
    pub fn get(&self, tier: ModelTier) -> &TierConfig {
        match tier {
            ModelTier::Cheap => &self.cheap,
            ModelTier::HighReasoning => &self.high_reasoning,
        }
    }
}

impl Default for TierTable {
    fn default() -> Self {
        Self {
            cheap: TierConfig {
                model_id: "gpt-4o-mini".into(),
                endpoint: "https://api.openai.com/v1".into(),
                api_key_env: Some("OPENAI_API_KEY".into()),
                input_price_per_1k: 0.000_15,
                output_price_per_1k: 0.000_6,
                timeout_secs: 30,
                max_concurrent_calls: 8,
            },
            high_reasoning: TierConfig {
                model_id: "claude-3-5-sonnet-20241022".into(),
                endpoint: "https://api.anthropic.com/v1".into(),
                api_key_env: Some("ANTHROPIC_API_KEY".into()),
                input_price_per_1k: 0.003,
                output_price_per_1k: 0.015,
                timeout_secs: 120,
                max_concurrent_calls: 4,
            },
        }
    }
}

/// One model tier: identity, endpoint, prices and call limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TierConfig {
    pub model_id: String,
    /// Base URL of an OpenAI-compatible chat completions API.
    pub endpoint: String,
    /// Environment variable holding the API key, if the endpoint needs one.
    pub api_key_env: Option<String>,
    /// USD per 1 000 input tokens.
    pub input_price_per_1k: f64,
    /// USD per 1 000 output tokens.
    pub output_price_per_1k: f64,
    /// Per-call timeout.
    pub timeout_secs: u64,
    /// Concurrent in-flight calls allowed against this tier.
    pub max_concurrent_calls: usize,
}

impl TierConfig {
    fn validate(&self, tier: ModelTier) -> Result<(), ConfigError> {
        let field = |name: &str| format!("tiers.{}.{name}", tier.as_str());
        if self.model_id.trim().is_empty() {
            return Err(invalid(&field("model_id"), "must not be empty"));
        }
        if !(self.input_price_per_1k > 0.0) || !(self.output_price_per_1k > 0.0) {
            return Err(invalid(&field("price"), "prices must be positive"));
        }
        if self.timeout_secs == 0 {
            return Err(invalid(&field("timeout_secs"), "must be at least 1"));
        }
        if self.max_concurrent_calls == 0 {
            return Err(invalid(&field("max_concurrent_calls"), "must be at least 1"));
        }
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════
// Routing
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    /// Complexity strictly above this goes to the high-reasoning tier.
    pub complexity_threshold: f64,
    /// Estimated input tokens strictly above this count as a large document.
    pub large_document_tokens: u64,
    /// Characters per token used for estimates.
    pub chars_per_token: f64,
    /// Expected output tokens per task type.
    pub output_tokens: OutputTokenBudget,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            complexity_threshold: 0.8,
            large_document_tokens: 30_000,
            chars_per_token: 4.0,
            output_tokens: OutputTokenBudget::default(),
        }
    }
}

impl RoutingConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.complexity_threshold) {
            return Err(invalid("routing.complexity_threshold", "must be within 0..=1"));
        }
        if !(self.chars_per_token > 0.0) {
            return Err(invalid("routing.chars_per_token", "must be positive"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputTokenBudget {
    pub classification: u64,
    pub medical_extraction: u64,
    pub legal_analysis: u64,
    pub case_merit: u64,
}

impl Default for OutputTokenBudget {
    fn default() -> Self {
        Self {
            classification: 300,
            medical_extraction: 1_000,
            legal_analysis: 1_500,
            case_merit: 2_000,
        }
    }
}

impl OutputTokenBudget {
    pub fn for_task(&self, task: TaskType) -> u64 {
        match task {
            TaskType::Classification => self.classification,
            TaskType::MedicalExtraction => self.medical_extraction,
            TaskType::LegalAnalysis => self.legal_analysis,
            TaskType::CaseMerit => self.case_merit,
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Redaction
// ═══════════════════════════════════════════════════════════

/// A PHI pattern. When the regex has a named group `phi`, only that
/// group is replaced; otherwise the whole match is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhiPatternConfig {
    pub category: String,
    pub pattern: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RedactionConfig {
    pub patterns: Vec<PhiPatternConfig>,
}

impl Default for RedactionConfig {
    fn default() -> Self {
        Self {
            patterns: default_phi_patterns(),
        }
    }
}

pub fn default_phi_patterns() -> Vec<PhiPatternConfig> {
    let p = |category: &str, pattern: &str| PhiPatternConfig {
        category: category.into(),
        pattern: pattern.into(),
    };
    vec![
        p("SSN", r"\b\d{3}-?\d{2}-?\d{4}\b"),
        p(
            "PHONE",
            r"(?:\+1[-.\s]?)?(?:\(\d{3}\)\s?|\b\d{3}[-.\s]?)\d{3}[-.\s]?\d{4}\b",
        ),
        p("EMAIL", r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b"),
        p(
            "MRN",
            r"(?i)\b(?:MRN|MR#|Medical Record(?: Number| No\.?)?|Chart #|Patient ID)\s*[:#]?\s*(?P<phi>[A-Z]{0,3}\d[A-Z0-9-]{3,})\b",
        ),
        p(
            "DOB",
            r"(?i)\b(?:DOB|D\.O\.B\.|Date of Birth|Birth ?date|Born)\s*[:#]?\s*(?P<phi>\d{1,2}[/-]\d{1,2}[/-]\d{2,4}|\d{4}-\d{2}-\d{2}|(?:Jan|Feb|Mar|Apr|May|Jun|Jul|Aug|Sep|Sept|Oct|Nov|Dec)[a-z]*\.? \d{1,2},? \d{4})",
        ),
        p(
            "NAME",
            r"\b(?:Dr|DR|Doctor|Patient|PATIENT|Pt|Nurse|RN|NP|PA)(?:\s+Name)?\.?:?[ \t]+(?P<phi>[A-Z][a-z]+(?:[ \t]+[A-Z]\.)?(?:[ \t]+[A-Z][a-z]+(?:-[A-Z][a-z]+)?)?)",
        ),
    ]
}

// ═══════════════════════════════════════════════════════════
// Classifier
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Confidence strictly below this marks the document for human review.
    pub review_threshold: f64,
    /// Fixed confidence reported by the rule-based fallback.
    pub fallback_confidence: f64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            review_threshold: 0.6,
            fallback_confidence: 0.5,
        }
    }
}

impl ClassifierConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.review_threshold) {
            return Err(invalid("classifier.review_threshold", "must be within 0..=1"));
        }
        if !(0.0..=1.0).contains(&self.fallback_confidence) {
            return Err(invalid("classifier.fallback_confidence", "must be within 0..=1"));
        }
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════
// Merit
// ═══════════════════════════════════════════════════════════

/// Weights of the six component scores in the overall merit score.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MeritWeights {
    pub liability_strength: f64,
    pub damages_potential: f64,
    pub collectibility: f64,
    pub complexity: f64,
    pub resource_requirements: f64,
    pub success_probability: f64,
}

impl Default for MeritWeights {
    fn default() -> Self {
        Self {
            liability_strength: 0.30,
            damages_potential: 0.25,
            collectibility: 0.20,
            complexity: 0.10,
            resource_requirements: 0.10,
            success_probability: 0.05,
        }
    }
}

impl MeritWeights {
    pub fn total(&self) -> f64 {
        self.liability_strength
            + self.damages_potential
            + self.collectibility
            + self.complexity
            + self.resource_requirements
            + self.success_probability
    }
}

/// Overall-score cut-offs on the 0–100 scale.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RecommendationThresholds {
    /// Scores at or above this are accepted.
    pub accept: f64,
    /// Scores strictly below this are declined.
    pub decline: f64,
}

impl Default for RecommendationThresholds {
    fn default() -> Self {
        Self {
            accept: 70.0,
            decline: 40.0,
        }
    }
}

/// Resource requirements = complexity·w_c + (100 − liability)·w_l, normalised.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ResourceWeights {
    pub complexity: f64,
    pub liability_gap: f64,
}

impl Default for ResourceWeights {
    fn default() -> Self {
        Self {
            complexity: 0.7,
            liability_gap: 0.3,
        }
    }
}

/// Success probability = weighted mean of liability, damages, collectibility.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SuccessWeights {
    pub liability_strength: f64,
    pub damages_potential: f64,
    pub collectibility: f64,
}

impl Default for SuccessWeights {
    fn default() -> Self {
        Self {
            liability_strength: 1.0,
            damages_potential: 1.0,
            collectibility: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct SettlementMultiplier {
    pub low: f64,
    pub likely: f64,
    pub high: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct AmountRange {
    pub low: f64,
    pub likely: f64,
    pub high: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SettlementConfig {
    /// Case type → damages multiplier.
    pub multipliers: BTreeMap<String, SettlementMultiplier>,
    /// Used when the case type has no entry.
    pub default_multiplier: SettlementMultiplier,
    /// Liability strength (`strong`, `moderate`, `weak`, `unknown`) → factor.
    pub liability_adjustment: BTreeMap<String, f64>,
    /// Factor for a liability bucket missing from `liability_adjustment`.
    pub default_liability_adjustment: f64,
    /// Severity → settlement range used when no treatment costs were found.
    pub severity_fallback: BTreeMap<String, AmountRange>,
}

impl Default for SettlementConfig {
    fn default() -> Self {
        let m = |low, likely, high| SettlementMultiplier { low, likely, high };
        let r = |low, likely, high| AmountRange { low, likely, high };
        Self {
            multipliers: BTreeMap::from([
                ("motor_vehicle".to_string(), m(1.5, 3.0, 5.0)),
                ("premises_liability".to_string(), m(1.8, 2.8, 4.5)),
                ("medical_malpractice".to_string(), m(2.0, 4.5, 8.0)),
                ("product_liability".to_string(), m(3.0, 6.0, 10.0)),
                ("workplace_injury".to_string(), m(1.2, 2.2, 3.5)),
            ]),
            default_multiplier: m(1.5, 3.0, 5.0),
            liability_adjustment: BTreeMap::from([
                ("strong".to_string(), 1.0),
                ("moderate".to_string(), 0.8),
                ("weak".to_string(), 0.5),
                ("unknown".to_string(), 0.6),
            ]),
            default_liability_adjustment: 0.8,
            severity_fallback: BTreeMap::from([
                ("critical".to_string(), r(100_000.0, 300_000.0, 1_000_000.0)),
                ("severe".to_string(), r(50_000.0, 150_000.0, 500_000.0)),
                ("moderate".to_string(), r(15_000.0, 50_000.0, 150_000.0)),
                ("minor".to_string(), r(2_500.0, 15_000.0, 50_000.0)),
            ]),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MeritConfig {
    pub weights: MeritWeights,
    pub thresholds: RecommendationThresholds,
    pub resource_weights: ResourceWeights,
    pub success_weights: SuccessWeights,
    pub settlement: SettlementConfig,
    /// Share of a valid model component score in the blended score.
    pub ai_blend_weight: f64,
    /// Overall adjustment per risk point away from neutral (50).
    pub risk_adjustment_factor: f64,
}

impl Default for MeritConfig {
    fn default() -> Self {
        Self {
            weights: MeritWeights::default(),
            thresholds: RecommendationThresholds::default(),
            resource_weights: ResourceWeights::default(),
            success_weights: SuccessWeights::default(),
            settlement: SettlementConfig::default(),
            ai_blend_weight: 0.6,
            risk_adjustment_factor: 0.2,
        }
    }
}

impl MeritConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if !(self.weights.total() > 0.0) {
            return Err(invalid("merit.weights", "weights must sum to a positive value"));
        }
        let t = &self.thresholds;
        if !(0.0..=100.0).contains(&t.accept) || !(0.0..=100.0).contains(&t.decline) {
            return Err(invalid("merit.thresholds", "thresholds must be within 0..=100"));
        }
        if t.decline > t.accept {
            return Err(invalid("merit.thresholds", "decline must not exceed accept"));
        }
        if !(0.0..=1.0).contains(&self.ai_blend_weight) {
            return Err(invalid("merit.ai_blend_weight", "must be within 0..=1"));
        }
        let rw = &self.resource_weights;
        if !(rw.complexity + rw.liability_gap > 0.0) {
            return Err(invalid("merit.resource_weights", "must sum to a positive value"));
        }
        let sw = &self.success_weights;
        if !(sw.liability_strength + sw.damages_potential + sw.collectibility > 0.0) {
            return Err(invalid("merit.success_weights", "must sum to a positive value"));
        }
        self.settlement.validate()
    }

    /// SHA-256 of the serialized merit configuration.
    ///
    /// Stored with every merit result so a score can be traced back to the
    /// exact weights and thresholds that produced it.
    pub fn fingerprint(&self) -> String {
        let bytes = serde_json::to_vec(self).unwrap_or_default();
        let digest = Sha256::digest(&bytes);
        let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
        format!("sha256:{}", &hex[..16])
    }
}

// ═══════════════════════════════════════════════════════════
// Statutes
// ═══════════════════════════════════════════════════════════

/// Built-in limitation periods in months.
pub fn default_statutes() -> BTreeMap<String, BTreeMap<String, u32>> {
    let table = |entries: &[(&str, u32)]| -> BTreeMap<String, u32> {
        entries.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    };
    BTreeMap::from([
        (
            "CA".to_string(),
            table(&[
                ("personal_injury", 24),
                ("motor_vehicle", 24),
                ("premises_liability", 24),
                ("product_liability", 24),
                ("medical_malpractice", 36),
                ("workplace_injury", 12),
            ]),
        ),
        (
            "NY".to_string(),
            table(&[
                ("personal_injury", 36),
                ("motor_vehicle", 36),
                ("premises_liability", 36),
                ("product_liability", 36),
                ("medical_malpractice", 30),
            ]),
        ),
        (
            "TX".to_string(),
            table(&[
                ("personal_injury", 24),
                ("motor_vehicle", 24),
                ("premises_liability", 24),
                ("product_liability", 24),
                ("medical_malpractice", 24),
            ]),
        ),
        (
            "FL".to_string(),
            table(&[
                ("personal_injury", 24),
                ("motor_vehicle", 24),
                ("premises_liability", 24),
                ("product_liability", 48),
                ("medical_malpractice", 24),
            ]),
        ),
    ])
}

// ═══════════════════════════════════════════════════════════
// Concurrency and cost
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConcurrencyConfig {
    /// Documents analysed concurrently within one case.
    pub document_pool_size: usize,
    /// Retries after a rate-limited or transient model response.
    pub max_retries: u32,
    pub backoff_base_ms: u64,
    pub backoff_max_ms: u64,
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self {
            document_pool_size: 4,
            max_retries: 3,
            backoff_base_ms: 500,
            backoff_max_ms: 8_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CostConfig {
    /// Soft per-case budget in USD. Crossing a ratio only logs a warning.
    pub case_budget_usd: Option<f64>,
    pub warning_ratio: f64,
    pub critical_ratio: f64,
}

impl Default for CostConfig {
    fn default() -> Self {
        Self {
            case_budget_usd: Some(5.0),
            warning_ratio: 0.8,
            critical_ratio: 0.95,
        }
    }
}

impl SettlementConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        let factors = self
            .liability_adjustment
            .values()
            .chain(std::iter::once(&self.default_liability_adjustment));
        for factor in factors {
            if !(*factor > 0.0) {
                return Err(invalid("merit.settlement.liability_adjustment", "factors must be positive"));
            }
        }
        Ok(())
    }

    /// Liability factor for a bucket, or the configured default.
    pub fn liability_factor(&self, bucket: &str) -> f64 {
        self.liability_adjustment
            .get(bucket)
            .copied()
            .unwrap_or(self.default_liability_adjustment)
    }
}

impl CostConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(budget) = self.case_budget_usd {
            if !(budget > 0.0) {
                return Err(invalid("cost.case_budget_usd", "must be positive"));
            }
        }
        if !(0.0 < self.warning_ratio && self.warning_ratio <= self.critical_ratio) {
            return Err(invalid("cost.warning_ratio", "must be positive and <= critical_ratio"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        AnalysisConfig::with_defaults().validate().unwrap();
    }

    #[test]
    fn zero_liability_factor_is_rejected() {
        let mut config = AnalysisConfig::with_defaults();
        config.merit.settlement.default_liability_adjustment = 0.0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn default_prices_match_tier_table() {
        let config = AnalysisConfig::default();
        assert_eq!(config.tiers.cheap.input_price_per_1k, 0.000_15);
        assert_eq!(config.tiers.high_reasoning.output_price_per_1k, 0.015);
    }

    #[test]
    fn default_merit_weights_sum_to_one() {
        let total = MeritWeights::default().total();
        assert!((total - 1.0).abs() < 1e-9, "got {total}");
    }

    #[test]
    fn inverted_thresholds_rejected() {
        let mut config = AnalysisConfig::with_defaults();
        config.merit.thresholds.decline = 80.0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("merit.thresholds"));
    }

    #[test]
    fn zero_price_rejected() {
        let mut config = AnalysisConfig::with_defaults();
        config.tiers.high_reasoning.input_price_per_1k = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn empty_patterns_rejected() {
        let mut config = AnalysisConfig::with_defaults();
        config.redaction.patterns.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn fingerprint_tracks_weights() {
        let a = MeritConfig::default();
        let mut b = MeritConfig::default();
        assert_eq!(a.fingerprint(), b.fingerprint());
        b.weights.liability_strength = 0.4;
        assert_ne!(a.fingerprint(), b.fingerprint());
        assert!(a.fingerprint().starts_with("sha256:"));
    }

    #[test]
    fn statute_lookup_is_case_insensitive() {
        let config = AnalysisConfig::with_defaults();
        assert_eq!(config.statute_months("ca", "Personal_Injury"), Some(24));
        assert_eq!(config.statute_months("NY", "medical_malpractice"), Some(30));
        assert_eq!(config.statute_months("ZZ", "personal_injury"), None);
        assert!(config.has_jurisdiction("tx"));
    }

    #[test]
    fn partial_json_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{ "classifier": { "review_threshold": 0.7 }, "concurrency": { "document_pool_size": 2 } }"#,
        )
        .unwrap();

        let config = AnalysisConfig::load(&path).unwrap();
        assert_eq!(config.classifier.review_threshold, 0.7);
        assert_eq!(config.classifier.fallback_confidence, 0.5);
        assert_eq!(config.concurrency.document_pool_size, 2);
        assert_eq!(config.routing.large_document_tokens, 30_000);
        assert!(config.has_jurisdiction("CA"));
    }

    #[test]
    fn malformed_json_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(AnalysisConfig::load(&path), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn output_budget_per_task() {
        let budget = OutputTokenBudget::default();
        assert_eq!(budget.for_task(TaskType::Classification), 300);
        assert_eq!(budget.for_task(TaskType::CaseMerit), 2_000);
    }

    #[test]
    fn app_name_is_docmerit() {
        assert_eq!(APP_NAME, "docmerit");
    }
}
