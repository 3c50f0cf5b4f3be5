use serde::Deserialize;

use crate::models::{LegalTheory, LiabilityAssessment, LiabilityStrength, SettlementFactors};
use crate::pipeline::llm::{parse_date, parse_json_reply, ModelError};

/// The model's part of a legal analysis. The statute of limitations is
/// never taken from the model; only the incident date it reports is.
#[derive(Debug, Clone, PartialEq)]
pub struct LegalReply {
    pub theories: Vec<LegalTheory>,
    pub liability: LiabilityAssessment,
    pub damages_factors: Vec<String>,
    pub settlement_factors: SettlementFactors,
    pub party_count: Option<u32>,
    pub incident_date: Option<chrono::NaiveDate>,
}

#[derive(Deserialize)]
struct RawReply {
    #[serde(default)]
    theories: Vec<RawTheory>,
    liability: RawLiability,
    #[serde(default)]
    damages_factors: Vec<String>,
    #[serde(default)]
    settlement_factors: RawSettlement,
    party_count: Option<u32>,
    incident_date: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawTheory {
    Named { name: String, #[serde(default)] rationale: String },
    Bare(String),
}

#[derive(Deserialize)]
struct RawLiability {
    strength: String,
    #[serde(default)]
    evidence: Vec<String>,
}

#[derive(Deserialize, Default)]
struct RawSettlement {
    #[serde(default)]
    comparable: Vec<String>,
    #[serde(default)]
    aggravating: Vec<String>,
    #[serde(default)]
    mitigating: Vec<String>,
}

/// `unclear` reads as weak: an unsupported liability theory scores like one.
fn parse_strength(raw: &str) -> Option<LiabilityStrength> {
    match raw.trim().to_lowercase().as_str() {
        "strong" => Some(LiabilityStrength::Strong),
        "moderate" | "medium" => Some(LiabilityStrength::Moderate),
        "weak" | "unclear" => Some(LiabilityStrength::Weak),
        _ => None,
    }
}

pub fn parse_legal_reply(response: &str) -> Result<LegalReply, ModelError> {
    let raw: RawReply = parse_json_reply(response)?;
    let strength = parse_strength(&raw.liability.strength).ok_or_else(|| {
        ModelError::MalformedResponse(format!(
            "unknown liability strength {:?}",
            raw.liability.strength
        ))
    })?;

    let theories = raw
        .theories
        .into_iter()
        .map(|t| match t {
            RawTheory::Named { name, rationale } => LegalTheory { name, rationale },
            RawTheory::Bare(name) => LegalTheory {
                name,
                rationale: String::new(),
            },
        })
        .filter(|t| !t.name.trim().is_empty())
        .collect();

    Ok(LegalReply {
        theories,
        liability: LiabilityAssessment {
            strength,
            evidence: raw.liability.evidence,
        },
        damages_factors: raw.damages_factors,
        settlement_factors: SettlementFactors {
            comparable: raw.settlement_factors.comparable,
            aggravating: raw.settlement_factors.aggravating,
            mitigating: raw.settlement_factors.mitigating,
        },
        party_count: raw.party_count,
        incident_date: raw.incident_date.as_deref().and_then(parse_date),
    })
}
