//! Risk-factor assessment over the extracted findings.

use chrono::NaiveDate;

use super::scoring::CaseEvidence;
use crate::models::{RiskAssessment, RiskLevel, Severity, Urgency};

const HIGH_RISK: &[&str] = &[
    "pre_existing_condition",
    "disputed_liability",
    "no_witnesses",
    "poor_documentation",
    "uninsured_defendant",
    "comparative_fault",
    "statute_of_limitations_close",
    "weak_causation",
];

const MEDIUM_RISK: &[&str] = &[
    "insurance_coverage_limits",
    "economic_damages_only",
    "minor_injuries",
    "some_comparative_fault",
    "limited_medical_treatment",
    "jurisdiction_issues",
];

const LOW_RISK: &[&str] = &[
    "clear_liability",
    "well_documented",
    "serious_injuries",
    "good_insurance_coverage",
    "strong_medical_records",
    "no_fault_issues",
];

const HIGH_PENALTY: f64 = 15.0;
const MEDIUM_PENALTY: f64 = 8.0;
const LOW_BONUS: f64 = 10.0;

/// Lower-cased text of every finding the risk phrases are matched against.
fn findings_text(evidence: &CaseEvidence) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for legal in &evidence.legal {
        for theory in &legal.theories {
            parts.push(&theory.name);
            parts.push(&theory.rationale);
        }
        parts.extend(legal.liability.evidence.iter().map(String::as_str));
        parts.extend(legal.damages_factors.iter().map(String::as_str));
        let s = &legal.settlement_factors;
        parts.extend(
            s.comparable
                .iter()
                .chain(&s.aggravating)
                .chain(&s.mitigating)
                .map(String::as_str),
        );
    }
    for medical in &evidence.medical {
        parts.extend(medical.diagnoses.iter().map(String::as_str));
    }
    parts.join("\n").to_lowercase().replace('_', " ")
}

/// Factors implied by structured fields rather than wording.
fn derived_factors(evidence: &CaseEvidence, today: NaiveDate) -> Vec<&'static str> {
    let mut factors = Vec::new();
    if evidence.context.defendant_insured == Some(false) {
        factors.push("uninsured_defendant");
    }
    if evidence
        .legal
        .iter()
        .any(|l| l.statute_of_limitations.urgency(today) == Urgency::Urgent)
    {
        factors.push("statute_of_limitations_close");
    }
    match evidence.worst_severity() {
        Some(Severity::Severe | Severity::Critical) => factors.push("serious_injuries"),
        Some(Severity::Minor) => factors.push("minor_injuries"),
        _ => {}
    }
    factors
}

pub fn assess_risk(evidence: &CaseEvidence, today: NaiveDate) -> RiskAssessment {
    let text = findings_text(evidence);
    let derived = derived_factors(evidence, today);
    let present = |factor: &&str| {
        text.contains(&factor.replace('_', " ")) || derived.iter().any(|d| d == factor)
    };

    let high: Vec<&str> = HIGH_RISK.iter().copied().filter(present).collect();
    let medium: Vec<&str> = MEDIUM_RISK.iter().copied().filter(present).collect();
    let low: Vec<&str> = LOW_RISK.iter().copied().filter(present).collect();

    let score = (50.0 - high.len() as f64 * HIGH_PENALTY - medium.len() as f64 * MEDIUM_PENALTY
        + low.len() as f64 * LOW_BONUS)
        .clamp(0.0, 100.0);
    let level = if score < 30.0 {
        RiskLevel::High
    } else if score < 70.0 {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    };

    RiskAssessment {
        level,
        score,
        factors: high
            .into_iter()
            .chain(medium)
            .chain(low)
            .map(str::to_string)
            .collect(),
    }
}
