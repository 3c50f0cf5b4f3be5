use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{Recommendation, RiskLevel, Severity, Urgency};
use super::routing::RoutingDecision;

/// The six merit components, each on a 0–100 scale.
///
/// Liability, damages, collectibility and success probability are
/// favourable (higher is better). Complexity and resource requirements
/// are burdens (higher is worse).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ComponentScores {
    pub liability_strength: f64,
    pub damages_potential: f64,
    pub collectibility: f64,
    pub complexity: f64,
    pub resource_requirements: f64,
    pub success_probability: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub level: RiskLevel,
    /// 0–100; 50 is neutral.
    pub score: f64,
    pub factors: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SettlementBasis {
    TreatmentCosts { total: f64 },
    SeverityFallback { severity: Severity },
    NoDamagesData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettlementRange {
    pub low: f64,
    pub likely: f64,
    pub high: f64,
    pub case_type: String,
    pub basis: SettlementBasis,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseMeritResult {
    pub result_id: Uuid,
    pub case_id: String,
    pub components: ComponentScores,
    /// Weighted score before the risk adjustment.
    pub raw_score: f64,
    pub risk: RiskAssessment,
    /// 0–100.
    pub overall_score: f64,
    pub recommendation: Recommendation,
    pub settlement: SettlementRange,
    /// 0.0–1.0.
    pub confidence: f64,
    pub reasoning: String,
    pub data_gaps: Vec<String>,
    pub documents_processed: usize,
    pub documents_succeeded: usize,
    pub next_steps: Vec<String>,
    pub urgency: Urgency,
    /// Fingerprint of the weights and thresholds used.
    pub weights_version: String,
    pub routing: RoutingDecision,
    pub created_at: DateTime<Utc>,
}

/// A reviewer's decision, recorded next to (never over) a computed result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeritOverride {
    pub override_id: Uuid,
    pub merit_result_id: Uuid,
    pub case_id: String,
    pub reviewer: String,
    pub decision: Recommendation,
    pub rationale: String,
    pub recorded_at: DateTime<Utc>,
}

impl MeritOverride {
    pub fn new(
        result: &CaseMeritResult,
        reviewer: &str,
        decision: Recommendation,
        rationale: &str,
    ) -> Self {
        Self {
            override_id: Uuid::new_v4(),
            merit_result_id: result.result_id,
            case_id: result.case_id.clone(),
            reviewer: reviewer.to_string(),
            decision,
            rationale: rationale.to_string(),
            recorded_at: Utc::now(),
        }
    }
}
