use chrono::NaiveDate;

use super::scoring::{CaseEvidence, DataGaps};
use crate::config::RecommendationThresholds;
use crate::models::{ComponentScores, Recommendation, RiskAssessment, Urgency};

/// Accept at or above `accept`, decline strictly below `decline`. The band
/// between asks for more information when a critical gap exists and is
/// referred for review otherwise.
pub fn recommend(
    overall: f64,
    critical_gap: bool,
    thresholds: &RecommendationThresholds,
) -> Recommendation {
    if overall >= thresholds.accept {
        Recommendation::Accept
    } else if overall < thresholds.decline {
        Recommendation::Decline
    } else if critical_gap {
        Recommendation::MoreInfoNeeded
    } else {
        Recommendation::Refer
    }
}

fn urgency_rank(urgency: Urgency) -> u8 {
    match urgency {
        Urgency::Expired => 3,
        Urgency::Urgent => 2,
        Urgency::Active => 1,
        Urgency::Unknown => 0,
    }
}

/// The most pressing statute urgency across the legal findings.
pub fn case_urgency(evidence: &CaseEvidence, today: NaiveDate) -> Urgency {
    evidence
        .legal
        .iter()
        .map(|l| l.statute_of_limitations.urgency(today))
        .max_by_key(|u| urgency_rank(*u))
        .unwrap_or(Urgency::Unknown)
}

pub fn next_steps(
    recommendation: Recommendation,
    components: &ComponentScores,
    risk: &RiskAssessment,
    gaps: &DataGaps,
    urgency: Urgency,
) -> Vec<String> {
    let mut steps: Vec<&str> = Vec::new();
    match urgency {
        Urgency::Expired => steps.push("Verify statute of limitations: computed deadline has passed"),
        Urgency::Urgent => steps.push("Calendar statute of limitations deadline (under 90 days)"),
        Urgency::Active | Urgency::Unknown => {}
    }

    match recommendation {
        Recommendation::Accept => {
            steps.extend([
                "Obtain signed retainer agreement",
                "Request complete medical records",
                "Initiate formal investigation",
            ]);
            if components.liability_strength < 70.0 {
                steps.push("Conduct additional liability investigation");
            }
        }
        Recommendation::Refer => {
            steps.extend([
                "Conduct attorney review meeting",
                "Assess resource allocation",
            ]);
            if risk.factors.iter().any(|f| f == "disputed_liability") {
                steps.push("Investigate liability issues further");
            }
            if components.damages_potential < 50.0 {
                steps.push("Obtain complete medical records and bills");
            }
        }
        Recommendation::MoreInfoNeeded => {
            if gaps.no_legal_analysis {
                steps.push("Obtain police report or incident documentation");
            }
            if gaps.no_damages_data {
                steps.push("Obtain complete medical records and bills");
            }
            steps.push("Re-run merit analysis once documents are added");
        }
        Recommendation::Decline => {
            steps.extend([
                "Prepare declination letter",
                "Consider referral to appropriate firm",
                "Document reasons for declination",
            ]);
        }
    }
    steps.into_iter().map(str::to_string).collect()
}

/// 0–1: share of documents that succeeded, less 0.25 per critical gap.
pub fn confidence(evidence: &CaseEvidence, gaps: &DataGaps) -> f64 {
    if evidence.documents_processed == 0 {
        return 0.05;
    }
    let coverage = evidence.documents_succeeded as f64 / evidence.documents_processed as f64;
    let value = (coverage - 0.25 * gaps.critical_count() as f64).clamp(0.05, 1.0);
    (value * 100.0).round() / 100.0
}
