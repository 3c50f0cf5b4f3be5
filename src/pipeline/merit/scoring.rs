use std::collections::BTreeSet;

use crate::config::MeritConfig;
use crate::models::{
    CaseContext, ComponentScores, DocumentAnalysisResult, DocumentType, LegalFindings,
    LiabilityStrength, MedicalFindings, Severity,
};

/// Everything the merit rules read, gathered from the succeeded documents.
pub struct CaseEvidence<'a> {
    pub context: &'a CaseContext,
    pub medical: Vec<&'a MedicalFindings>,
    pub legal: Vec<&'a LegalFindings>,
    pub document_types: Vec<DocumentType>,
    pub documents_processed: usize,
    pub documents_succeeded: usize,
}

impl<'a> CaseEvidence<'a> {
    pub fn collect(context: &'a CaseContext, documents: &'a [DocumentAnalysisResult]) -> Self {
        let succeeded: Vec<&DocumentAnalysisResult> =
            documents.iter().filter(|d| d.succeeded()).collect();
        Self {
            context,
            medical: succeeded
                .iter()
                .filter_map(|d| d.medical.as_ref().and_then(|m| m.findings()))
                .collect(),
            legal: succeeded
                .iter()
                .filter_map(|d| d.legal.as_ref().and_then(|l| l.findings()))
                .collect(),
            document_types: succeeded.iter().filter_map(|d| d.document_type()).collect(),
            documents_processed: documents.len(),
            documents_succeeded: succeeded.len(),
        }
    }

    pub fn worst_severity(&self) -> Option<Severity> {
        self.medical
            .iter()
            .filter_map(|m| m.severity)
            .max_by_key(Severity::rank)
    }

    pub fn total_costs(&self) -> f64 {
        self.medical.iter().map(|m| m.total_costs()).sum()
    }

    pub fn ongoing_care(&self) -> bool {
        self.medical.iter().any(|m| m.ongoing_care)
    }

    pub fn specialties(&self) -> BTreeSet<&str> {
        self.medical
            .iter()
            .filter_map(|m| m.specialty.as_deref())
            .collect()
    }

    /// Distinct theory names, case-insensitive.
    pub fn theories(&self) -> BTreeSet<String> {
        self.legal
            .iter()
            .flat_map(|l| l.theories.iter())
            .map(|t| t.name.trim().to_lowercase())
            .collect()
    }

    pub fn party_count(&self) -> Option<u32> {
        self.context
            .party_count
            .into_iter()
            .chain(self.legal.iter().filter_map(|l| l.party_count))
            .max()
    }

    pub fn has_document(&self, document_type: DocumentType) -> bool {
        self.document_types.contains(&document_type)
    }

    /// Findings with at least one diagnosis, procedure, medication, cost
    /// or severity. Empty partial extractions do not count.
    fn has_medical_data(&self) -> bool {
        self.medical.iter().any(|m| !m.is_empty())
    }

    fn has_damages_factors(&self) -> bool {
        self.legal.iter().any(|l| !l.damages_factors.is_empty())
    }

    pub fn gaps(&self) -> DataGaps {
        DataGaps {
            no_legal_analysis: self.legal.is_empty(),
            no_damages_data: !self.has_medical_data() && !self.has_damages_factors(),
            failed_documents: self.documents_processed - self.documents_succeeded,
            statute_unknown: !self.legal.is_empty()
                && self
                    .legal
                    .iter()
                    .all(|l| l.statute_of_limitations.deadline().is_none()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataGaps {
    pub no_legal_analysis: bool,
    pub no_damages_data: bool,
    pub failed_documents: usize,
    pub statute_unknown: bool,
}

impl DataGaps {
    /// A gap that makes the middle band ask for more information.
    pub fn is_critical(&self) -> bool {
        self.no_legal_analysis || self.no_damages_data
    }

    pub fn critical_count(&self) -> usize {
        usize::from(self.no_legal_analysis) + usize::from(self.no_damages_data)
    }

    pub fn describe(&self) -> Vec<String> {
        let mut gaps = Vec::new();
        if self.no_legal_analysis {
            gaps.push("no successful legal analysis".to_string());
        }
        if self.no_damages_data {
            gaps.push("no damages data".to_string());
        }
        if self.statute_unknown {
            gaps.push("statute of limitations could not be computed".to_string());
        }
        if self.failed_documents > 0 {
            gaps.push(format!("{} document(s) failed analysis", self.failed_documents));
        }
        gaps
    }
}

pub fn strength_score(strength: LiabilityStrength) -> f64 {
    match strength {
        LiabilityStrength::Strong => 85.0,
        LiabilityStrength::Moderate => 65.0,
        LiabilityStrength::Weak => 35.0,
    }
}

fn severity_score(severity: Severity) -> f64 {
    match severity {
        Severity::Critical => 95.0,
        Severity::Severe => 90.0,
        Severity::Moderate => 70.0,
        Severity::Minor => 45.0,
    }
}

fn cost_score(total: f64) -> f64 {
    if total > 100_000.0 {
        90.0
    } else if total > 25_000.0 {
        70.0
    } else if total > 5_000.0 {
        45.0
    } else {
        0.0
    }
}

pub fn damages_potential(evidence: &CaseEvidence) -> f64 {
    if !evidence.has_medical_data() {
        return if evidence.has_damages_factors() { 25.0 } else { 0.0 };
    }
    let from_findings = evidence
        .worst_severity()
        .map(severity_score)
        .unwrap_or(0.0)
        .max(cost_score(evidence.total_costs()));
    if from_findings == 0.0 {
        return 25.0;
    }
    let bump = if evidence.ongoing_care() { 5.0 } else { 0.0 };
    (from_findings + bump).min(100.0)
}

/// Mean per-document strength; neutral when no legal analysis succeeded.
pub fn liability_strength(evidence: &CaseEvidence) -> f64 {
    if evidence.legal.is_empty() {
        return 50.0;
    }
    let total: f64 = evidence
        .legal
        .iter()
        .map(|l| strength_score(l.liability.strength))
        .sum();
    total / evidence.legal.len() as f64
}

pub fn collectibility(evidence: &CaseEvidence) -> f64 {
    let mut score: f64 = 50.0;
    if evidence.has_document(DocumentType::InsuranceDocument) {
        score += 20.0;
    }
    if evidence.has_document(DocumentType::EmploymentRecord) {
        score += 10.0;
    }
    let mentions_coverage = evidence
        .legal
        .iter()
        .flat_map(|l| {
            let s = &l.settlement_factors;
            s.comparable.iter().chain(&s.aggravating).chain(&s.mitigating)
        })
        .map(|f| f.to_lowercase())
        .any(|f| f.contains("insurance") || f.contains("policy limit"));
    if mentions_coverage {
        score += 10.0;
    }
    if evidence.context.defendant_insured == Some(false) {
        score -= 20.0;
    }
    score.clamp(0.0, 100.0)
}

pub fn complexity(evidence: &CaseEvidence) -> f64 {
    let mut score: f64 = 50.0;
    if evidence.theories().len() > 2 {
        score += 10.0;
    }
    if evidence.party_count().is_some_and(|n| n > 2) {
        score += 10.0;
    }
    if evidence.specialties().len() > 3 {
        score += 15.0;
    }
    let extra_documents = evidence.documents_processed.saturating_sub(5) as f64;
    score += (extra_documents * 5.0).min(20.0);
    score.clamp(10.0, 90.0)
}

/// Rule-based value of all six components.
pub fn rule_components(config: &MeritConfig, evidence: &CaseEvidence) -> ComponentScores {
    let liability = liability_strength(evidence);
    let damages = damages_potential(evidence);
    let collect = collectibility(evidence);
    let complex = complexity(evidence);
    derive_components(config, liability, damages, collect, complex)
}

fn derive_components(
    config: &MeritConfig,
    liability: f64,
    damages: f64,
    collect: f64,
    complex: f64,
) -> ComponentScores {
    let rw = &config.resource_weights;
    let resource = (complex * rw.complexity + (100.0 - liability) * rw.liability_gap)
        / (rw.complexity + rw.liability_gap);

    let sw = &config.success_weights;
    let success = (liability * sw.liability_strength
        + damages * sw.damages_potential
        + collect * sw.collectibility)
        / (sw.liability_strength + sw.damages_potential + sw.collectibility);

    ComponentScores {
        liability_strength: liability,
        damages_potential: damages,
        collectibility: collect,
        complexity: complex,
        resource_requirements: resource.clamp(0.0, 100.0),
        success_probability: success.clamp(0.0, 100.0),
    }
}

/// Component scores proposed by the model. Each is `None` when absent or
/// outside 0..=100.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ModelComponents {
    pub liability_strength: Option<f64>,
    pub damages_potential: Option<f64>,
    pub collectibility: Option<f64>,
    pub complexity: Option<f64>,
    pub resource_requirements: Option<f64>,
    pub success_probability: Option<f64>,
}

/// `ai_weight · model + (1 − ai_weight) · rule` for each component the
/// model scored validly; the rule score otherwise.
pub fn blend(rule: &ComponentScores, model: &ModelComponents, ai_weight: f64) -> ComponentScores {
    let mix = |rule: f64, model: Option<f64>| match model {
        Some(m) => m * ai_weight + rule * (1.0 - ai_weight),
        None => rule,
    };
    ComponentScores {
        liability_strength: mix(rule.liability_strength, model.liability_strength),
        damages_potential: mix(rule.damages_potential, model.damages_potential),
        collectibility: mix(rule.collectibility, model.collectibility),
        complexity: mix(rule.complexity, model.complexity),
        resource_requirements: mix(rule.resource_requirements, model.resource_requirements),
        success_probability: mix(rule.success_probability, model.success_probability),
    }
}

/// Weighted mean with burden components inverted.
pub fn weighted_score(config: &MeritConfig, c: &ComponentScores) -> f64 {
    let w = &config.weights;
    let sum = w.liability_strength * c.liability_strength
        + w.damages_potential * c.damages_potential
        + w.collectibility * c.collectibility
        + w.complexity * (100.0 - c.complexity)
        + w.resource_requirements * (100.0 - c.resource_requirements)
        + w.success_probability * c.success_probability;
    (sum / w.total()).clamp(0.0, 100.0)
}

/// Weighted score shifted by the risk assessment, clamped to the scale.
pub fn risk_adjusted(config: &MeritConfig, raw: f64, risk_score: f64) -> f64 {
    (raw + (risk_score - 50.0) * config.risk_adjustment_factor).clamp(0.0, 100.0)
}
