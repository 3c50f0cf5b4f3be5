//! Case merit aggregation.
//!
//! Rule scores are computed from the succeeded documents' findings, then a
//! high-reasoning model reviews a re-redacted case summary. Valid model
//! component scores are blended in and the model's narrative becomes the
//! reasoning. A failed or unreadable model reply fails the evaluation.

pub mod overrides;
pub mod recommendation;
pub mod risk;
pub mod scoring;
pub mod settlement;

pub use overrides::record_override;
pub use recommendation::recommend;

use std::fmt::Write as _;
use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    AuditScope, CaseContext, CaseMeritResult, ComponentScores, DocumentAnalysisResult, TaskType,
};
use crate::pipeline::llm::{extract_json, sanitize_prompt_input, CallContext, ModelError, ModelGateway};
use crate::pipeline::model_router::ComplexitySignals;
use crate::pipeline::redaction::{PhiRedactor, RedactionError};
use crate::pipeline::traits::AuditSink;

use recommendation::{case_urgency, confidence, next_steps};
use risk::assess_risk;
use scoring::{blend, risk_adjusted, rule_components, weighted_score, CaseEvidence, ModelComponents};
use settlement::estimate_settlement;

#[derive(Error, Debug)]
pub enum MeritError {
    #[error("Case summary redaction failed: {0}")]
    Redaction(#[from] RedactionError),

    #[error("Merit model call failed: {0}")]
    Model(ModelError),

    #[error("Merit analysis cancelled")]
    Cancelled,
}

impl From<ModelError> for MeritError {
    fn from(e: ModelError) -> Self {
        match e {
            ModelError::Cancelled => Self::Cancelled,
            other => Self::Model(other),
        }
    }
}

const MERIT_SYSTEM_PROMPT: &str = r#"
You are a senior personal-injury attorney deciding whether a firm should take a case.
You receive a summary of findings already extracted from the case documents.
Identifiers have been replaced by placeholders such as [NAME_1].

Score each component from 0 to 100:
- liability_strength: how clearly the defendant is liable
- damages_potential: size of recoverable damages
- collectibility: likelihood damages can actually be collected
- case_complexity: how complex the case is (higher = more complex)
- resource_requirements: cost to pursue (higher = more expensive)
- success_probability: chance of a favourable outcome

Reply with a single JSON object and nothing else.
"#;

fn build_merit_prompt(summary: &str) -> String {
    format!(
        r#"<case_summary>
{summary}
</case_summary>

Evaluate the case above into this JSON structure:

{{
  "component_analysis": {{
    "liability_strength": {{"score": 0, "reasoning": "..."}},
    "damages_potential": {{"score": 0, "reasoning": "..."}},
    "collectibility": {{"score": 0, "reasoning": "..."}},
    "case_complexity": {{"score": 0, "reasoning": "..."}},
    "resource_requirements": {{"score": 0, "reasoning": "..."}},
    "success_probability": {{"score": 0, "reasoning": "..."}}
  }},
  "investigation_priorities": ["what to investigate first"],
  "overall_assessment": "narrative assessment"
}}"#
    )
}

/// Findings-only case summary. No document text is included.
fn case_summary(evidence: &CaseEvidence) -> String {
    let mut s = String::new();
    let ctx = evidence.context;
    let _ = writeln!(s, "Case type: {}", ctx.case_type.as_deref().unwrap_or("unknown"));
    let _ = writeln!(s, "Jurisdiction: {}", ctx.jurisdiction.as_deref().unwrap_or("unknown"));
    if let Some(insured) = ctx.defendant_insured {
        let _ = writeln!(s, "Defendant insured: {}", if insured { "yes" } else { "no" });
    }
    let _ = writeln!(
        s,
        "Documents: {} processed, {} succeeded",
        evidence.documents_processed, evidence.documents_succeeded
    );
    let types: Vec<&str> = evidence.document_types.iter().map(|t| t.as_str()).collect();
    let _ = writeln!(s, "Document types: {}", types.join(", "));

    if !evidence.medical.is_empty() {
        let diagnoses: Vec<&str> = evidence
            .medical
            .iter()
            .flat_map(|m| m.diagnoses.iter().map(String::as_str))
            .collect();
        let specialties: Vec<&str> = evidence.specialties().into_iter().collect();
        let _ = writeln!(s, "\nMEDICAL FINDINGS");
        let _ = writeln!(s, "Diagnoses: {}", diagnoses.join("; "));
        let _ = writeln!(
            s,
            "Worst severity: {}",
            evidence.worst_severity().map_or("unknown", |v| v.as_str())
        );
        let _ = writeln!(s, "Treatment costs: ${:.2} total", evidence.total_costs());
        let _ = writeln!(s, "Specialties: {}", specialties.join(", "));
        let _ = writeln!(s, "Ongoing care: {}", if evidence.ongoing_care() { "yes" } else { "no" });
    }

    for (i, legal) in evidence.legal.iter().enumerate() {
        let theories: Vec<&str> = legal.theories.iter().map(|t| t.name.as_str()).collect();
        let _ = writeln!(s, "\nLEGAL FINDINGS {}", i + 1);
        let _ = writeln!(s, "Theories: {}", theories.join("; "));
        let _ = writeln!(
            s,
            "Liability: {} ({})",
            legal.liability.strength,
            legal.liability.evidence.join("; ")
        );
        let _ = writeln!(s, "Damages factors: {}", legal.damages_factors.join("; "));
        let f = &legal.settlement_factors;
        let _ = writeln!(
            s,
            "Settlement factors: comparable [{}], aggravating [{}], mitigating [{}]",
            f.comparable.join("; "),
            f.aggravating.join("; "),
            f.mitigating.join("; ")
        );
        match legal.statute_of_limitations.deadline() {
            Some(deadline) => {
                let _ = writeln!(s, "Statute of limitations deadline: {deadline}");
            }
            None => {
                let _ = writeln!(s, "Statute of limitations: unknown");
            }
        }
    }
    s
}

const COMPONENT_KEYS: [&str; 6] = [
    "liability_strength",
    "damages_potential",
    "collectibility",
    "case_complexity",
    "resource_requirements",
    "success_probability",
];

struct MeritReply {
    components: ModelComponents,
    narrative: String,
    priorities: Vec<String>,
}

fn component_score(analysis: &Value, key: &str) -> Option<f64> {
    let entry = match analysis.get(key) {
        Some(v) => v,
        None if key == "case_complexity" => analysis.get("complexity")?,
        None => return None,
    };
    entry
        .get("score")
        .unwrap_or(entry)
        .as_f64()
        .filter(|s| s.is_finite() && (0.0..=100.0).contains(s))
}

fn parse_merit_reply(response: &str) -> Result<MeritReply, ModelError> {
    let value: Value = serde_json::from_str(extract_json(response)?)
        .map_err(|e| ModelError::MalformedResponse(e.to_string()))?;
    let analysis = value
        .get("component_analysis")
        .filter(|v| v.is_object())
        .ok_or_else(|| ModelError::MalformedResponse("missing component_analysis".into()))?;
    let narrative = value["overall_assessment"]
        .as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ModelError::MalformedResponse("missing overall_assessment".into()))?;

    let [liability, damages, collect, complex, resource, success] =
        COMPONENT_KEYS.map(|k| component_score(analysis, k));
    Ok(MeritReply {
        components: ModelComponents {
            liability_strength: liability,
            damages_potential: damages,
            collectibility: collect,
            complexity: complex,
            resource_requirements: resource,
            success_probability: success,
        },
        narrative: narrative.to_string(),
        priorities: value["investigation_priorities"]
            .as_array()
            .map(|a| {
                a.iter()
                    .filter_map(Value::as_str)
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default(),
    })
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

fn rounded(c: &ComponentScores) -> ComponentScores {
    ComponentScores {
        liability_strength: round1(c.liability_strength),
        damages_potential: round1(c.damages_potential),
        collectibility: round1(c.collectibility),
        complexity: round1(c.complexity),
        resource_requirements: round1(c.resource_requirements),
        success_probability: round1(c.success_probability),
    }
}

/// Model-reported investigation priorities kept as next steps.
const MAX_MODEL_STEPS: usize = 3;

pub struct MeritAggregator {
    gateway: Arc<ModelGateway>,
    redactor: Arc<PhiRedactor>,
    audit: Arc<dyn AuditSink>,
}

impl MeritAggregator {
    pub fn new(
        gateway: Arc<ModelGateway>,
        redactor: Arc<PhiRedactor>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            gateway,
            redactor,
            audit,
        }
    }

    /// Score a case from its document results.
    ///
    /// Only succeeded documents contribute findings; all of them count
    /// towards `documents_processed`. The result is not persisted here.
    pub async fn evaluate_merit(
        &self,
        case_id: &str,
        context: &CaseContext,
        documents: &[DocumentAnalysisResult],
        ctx: &CallContext,
    ) -> Result<CaseMeritResult, MeritError> {
        let config = &self.gateway.config().merit;
        let evidence = CaseEvidence::collect(context, documents);
        let gaps = evidence.gaps();
        let rule = rule_components(config, &evidence);

        let summary = self
            .redactor
            .redact_with_audit(&case_summary(&evidence), &AuditScope::case(case_id), self.audit.as_ref())?
            .redacted;
        let body = sanitize_prompt_input(summary.as_str(), None);
        let signals = ComplexitySignals {
            party_count: evidence.party_count(),
            requires_reasoning: true,
            high_stakes: true,
        };
        let router = self.gateway.router();
        let routing = router.route(&router.task(TaskType::CaseMerit, &body, &signals));

        let response = self
            .gateway
            .complete(&routing, MERIT_SYSTEM_PROMPT, &build_merit_prompt(&body), ctx)
            .await?;
        let reply = parse_merit_reply(&response.content).inspect_err(|e| {
            tracing::warn!(case_id, error = %e, "Merit reply unreadable");
        })?;

        let components = blend(&rule, &reply.components, config.ai_blend_weight);
        let raw_score = weighted_score(config, &components);
        let today = Utc::now().date_naive();
        let risk = assess_risk(&evidence, today);
        let overall_score = round1(risk_adjusted(config, raw_score, risk.score));
        let recommendation = recommend(overall_score, gaps.is_critical(), &config.thresholds);
        let urgency = case_urgency(&evidence, today);

        let mut steps = next_steps(recommendation, &components, &risk, &gaps, urgency);
        for priority in reply.priorities.into_iter().take(MAX_MODEL_STEPS) {
            if !steps.contains(&priority) {
                steps.push(priority);
            }
        }

        let result = CaseMeritResult {
            result_id: Uuid::new_v4(),
            case_id: case_id.to_string(),
            components: rounded(&components),
            raw_score: round1(raw_score),
            settlement: estimate_settlement(&config.settlement, &evidence, components.liability_strength),
            confidence: confidence(&evidence, &gaps),
            risk,
            overall_score,
            recommendation,
            reasoning: reply.narrative,
            data_gaps: gaps.describe(),
            documents_processed: evidence.documents_processed,
            documents_succeeded: evidence.documents_succeeded,
            next_steps: steps,
            urgency,
            weights_version: config.fingerprint(),
            routing,
            created_at: Utc::now(),
        };

        tracing::info!(
            case_id,
            overall = result.overall_score,
            recommendation = result.recommendation.as_str(),
            gaps = result.data_gaps.len(),
            "Merit analysis complete"
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnalysisConfig;
    use crate::cost::CostLedger;
    use crate::models::{
        AnalysisOutcome, AuditAction, Classification, ClassificationMethod, DocumentRequest,
        DocumentStatus, DocumentType, LegalFindings, LegalTheory, LiabilityAssessment,
        LiabilityStrength, MedicalFindings, ModelTier, Recommendation, RoutingDecision,
        RoutingReason, Severity, SettlementFactors, StatuteOfLimitations, StatuteUnknownReason,
    };
    use crate::pipeline::llm::mock::{MockModelClient, RecordingSinks};
    use crate::pipeline::llm::TierClients;
    use crate::pipeline::traits::{ResultStore, UsageSink};
    use tokio_util::sync::CancellationToken;

    struct Harness {
        client: Arc<MockModelClient>,
        sinks: Arc<RecordingSinks>,
        aggregator: MeritAggregator,
    }

    fn harness() -> Harness {
        let client = Arc::new(MockModelClient::new());
        let sinks = Arc::new(RecordingSinks::default());
        let mut config = AnalysisConfig::with_defaults();
        config.concurrency.max_retries = 0;
        let redactor = Arc::new(PhiRedactor::new(&config.redaction).unwrap());
        let gateway = Arc::new(ModelGateway::new(
            Arc::new(config),
            TierClients::shared(Arc::clone(&client) as _),
            Arc::clone(&sinks) as Arc<dyn AuditSink>,
            Arc::clone(&sinks) as Arc<dyn UsageSink>,
        ));
        let aggregator =
            MeritAggregator::new(gateway, redactor, Arc::clone(&sinks) as Arc<dyn AuditSink>);
        Harness {
            client,
            sinks,
            aggregator,
        }
    }

    fn ctx(cancel: CancellationToken) -> CallContext {
        CallContext::new(Some("case-7"), None, cancel, Arc::new(CostLedger::unbounded()))
    }

    fn routing(task_type: TaskType) -> RoutingDecision {
        RoutingDecision {
            task_type,
            tier: ModelTier::Cheap,
            model_id: "m".into(),
            reason: RoutingReason::Standard,
            complexity: 0.3,
            estimated_input_tokens: 1,
            estimated_output_tokens: 1,
            estimated_cost: 0.0,
        }
    }

    fn completed(id: &str, label: DocumentType) -> DocumentAnalysisResult {
        let request = DocumentRequest {
            document_id: id.into(),
            file_reference: format!("{id}.txt"),
            document_type_hint: None,
        };
        let mut result = DocumentAnalysisResult::pending(&request, Some("case-7"));
        result.status = DocumentStatus::Completed;
        result.classification = Some(Classification {
            label,
            confidence: 0.9,
            method: ClassificationMethod::Model,
            needs_review: false,
            routing: None,
            fallback_reason: None,
        });
        result
    }

    fn case_documents() -> Vec<DocumentAnalysisResult> {
        let mut medical = completed("doc-1", DocumentType::MedicalRecord);
        medical.medical = Some(AnalysisOutcome::Completed {
            findings: MedicalFindings {
                diagnoses: vec!["lumbar strain".into()],
                severity: Some(Severity::Moderate),
                treatment_costs: vec![2_400.0],
                specialty: Some("orthopedic".into()),
                ..Default::default()
            },
            routing: routing(TaskType::MedicalExtraction),
        });
        let mut police = completed("doc-2", DocumentType::PoliceReport);
        police.legal = Some(AnalysisOutcome::Completed {
            findings: LegalFindings {
                theories: vec![LegalTheory {
                    name: "negligence".into(),
                    rationale: "red light violation".into(),
                }],
                liability: LiabilityAssessment {
                    strength: LiabilityStrength::Strong,
                    evidence: vec!["witness reachable at 555-123-4567".into()],
                },
                statute_of_limitations: StatuteOfLimitations::Unknown {
                    reason: StatuteUnknownReason::MissingIncidentDate,
                },
                damages_factors: vec![],
                settlement_factors: SettlementFactors::default(),
                party_count: Some(2),
                incident_date: None,
            },
            routing: routing(TaskType::LegalAnalysis),
        });
        vec![medical, police]
    }

    const REPLY: &str = r#"{
        "component_analysis": {
            "liability_strength": {"score": 90, "reasoning": "red light"},
            "case_complexity": {"score": 140}
        },
        "investigation_priorities": ["Obtain intersection camera footage"],
        "overall_assessment": "Clear liability with moderate soft-tissue damages."
    }"#;

    #[tokio::test]
    async fn blends_model_scores_and_keeps_narrative() {
        let h = harness();
        h.client.respond(TaskType::CaseMerit, REPLY);
        let context = CaseContext {
            case_type: Some("motor_vehicle".into()),
            jurisdiction: Some("CA".into()),
            ..CaseContext::default()
        };
        let result = h
            .aggregator
            .evaluate_merit("case-7", &context, &case_documents(), &ctx(CancellationToken::new()))
            .await
            .unwrap();

        assert_eq!(result.routing.tier, ModelTier::HighReasoning);
        assert_eq!(result.routing.reason, RoutingReason::CaseMerit);
        // 0.6 * 90 + 0.4 * 85
        assert_eq!(result.components.liability_strength, 88.0);
        // out-of-range model score ignored
        assert_eq!(result.components.complexity, 50.0);
        assert_eq!(result.reasoning, "Clear liability with moderate soft-tissue damages.");
        assert_eq!(result.documents_processed, 2);
        assert_eq!(result.documents_succeeded, 2);
        assert!(result.data_gaps.iter().any(|g| g.contains("statute")));
        assert_eq!(
            result.recommendation,
            recommend(result.overall_score, false, &AnalysisConfig::default().merit.thresholds)
        );
        assert_eq!(result.recommendation, Recommendation::Refer);
        assert!(result.next_steps.iter().any(|s| s == "Obtain intersection camera footage"));
        assert_eq!(result.weights_version, AnalysisConfig::default().merit.fingerprint());
        assert_eq!(result.settlement.likely, 7_200.0);
    }

    #[tokio::test]
    async fn summary_is_re_redacted_before_the_call() {
        let h = harness();
        h.client.respond(TaskType::CaseMerit, REPLY);
        h.aggregator
            .evaluate_merit(
                "case-7",
                &CaseContext::default(),
                &case_documents(),
                &ctx(CancellationToken::new()),
            )
            .await
            .unwrap();

        let prompt = &h.client.requests(TaskType::CaseMerit)[0].prompt;
        assert!(!prompt.contains("555-123-4567"));
        assert!(prompt.contains("[PHONE_1]"));
        assert!(prompt.contains("lumbar strain"));
        assert!(h.sinks.actions().contains(&AuditAction::PhiRedaction));
    }

    #[tokio::test]
    async fn empty_case_is_declined_with_gaps() {
        let h = harness();
        h.client.respond(
            TaskType::CaseMerit,
            r#"{"component_analysis": {}, "overall_assessment": "Nothing to evaluate."}"#,
        );
        let result = h
            .aggregator
            .evaluate_merit("case-7", &CaseContext::default(), &[], &ctx(CancellationToken::new()))
            .await
            .unwrap();
        assert_eq!(result.recommendation, Recommendation::Decline);
        assert_eq!(result.data_gaps.len(), 2);
        assert_eq!(result.confidence, 0.05);
    }

    #[tokio::test]
    async fn model_failure_is_merit_error() {
        let h = harness();
        h.client.fail(TaskType::CaseMerit, ModelError::Timeout(120));
        let err = h
            .aggregator
            .evaluate_merit("case-7", &CaseContext::default(), &case_documents(), &ctx(CancellationToken::new()))
            .await
            .unwrap_err();
        assert!(matches!(err, MeritError::Model(ModelError::Timeout(120))));
    }

    #[tokio::test]
    async fn reply_without_components_is_merit_error() {
        let h = harness();
        h.client.respond(TaskType::CaseMerit, r#"{"overall_assessment": "Looks good."}"#);
        let err = h
            .aggregator
            .evaluate_merit("case-7", &CaseContext::default(), &case_documents(), &ctx(CancellationToken::new()))
            .await
            .unwrap_err();
        assert!(matches!(err, MeritError::Model(ModelError::MalformedResponse(_))));
    }

    #[tokio::test]
    async fn cancelled_before_call() {
        let h = harness();
        h.client.respond(TaskType::CaseMerit, REPLY);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = h
            .aggregator
            .evaluate_merit("case-7", &CaseContext::default(), &case_documents(), &ctx(cancel))
            .await
            .unwrap_err();
        assert!(matches!(err, MeritError::Cancelled));
        assert_eq!(h.client.call_count(TaskType::CaseMerit), 0);
    }

    #[tokio::test]
    async fn override_is_recorded_beside_the_result() {
        let h = harness();
        h.client.respond(TaskType::CaseMerit, REPLY);
        let result = h
            .aggregator
            .evaluate_merit("case-7", &CaseContext::default(), &case_documents(), &ctx(CancellationToken::new()))
            .await
            .unwrap();
        h.sinks.save_merit_result(&result).unwrap();

        let record = record_override(
            h.sinks.as_ref(),
            h.sinks.as_ref(),
            &result,
            "reviewer-3",
            Recommendation::Accept,
            "Client has dashcam footage",
        )
        .unwrap();

        assert_eq!(record.merit_result_id, result.result_id);
        assert!(h.sinks.actions().contains(&AuditAction::MeritOverride));
        let stored = h.sinks.latest_merit_result("case-7").unwrap().unwrap();
        assert_eq!(stored.recommendation, result.recommendation);
    }

    #[test]
    fn bare_numbers_accepted_as_scores() {
        let reply = parse_merit_reply(
            r#"{"component_analysis": {"collectibility": 75, "complexity": {"score": 20}}, "overall_assessment": "ok"}"#,
        )
        .unwrap();
        assert_eq!(reply.components.collectibility, Some(75.0));
        assert_eq!(reply.components.complexity, Some(20.0));
        assert_eq!(reply.components.success_probability, None);
    }
}
