//! Legal analysis specialist.
//!
//! Runs on the high-reasoning tier. There is no rule-based substitute:
//! any call or parse failure is a `Failed` outcome.

pub mod parser;
pub mod statute;

use std::sync::Arc;

use crate::models::{AnalysisOutcome, CaseContext, LegalFindings, TaskType};
use crate::pipeline::llm::{sanitize_prompt_input, CallContext, ModelGateway};
use crate::pipeline::model_router::ComplexitySignals;
use crate::pipeline::redaction::RedactedText;

use parser::parse_legal_reply;
use statute::compute_statute;

const LEGAL_SYSTEM_PROMPT: &str = r#"
You are a legal analyst for a personal-injury firm reviewing one document.
Identifiers have been replaced by placeholders such as [NAME_1]; keep them.

RULES:
1. Base every finding on the document. Quote or paraphrase evidence briefly.
2. Liability strength is one of: strong, moderate, weak.
3. Do not compute deadlines; report the incident date only if the document states it.
4. Reply with a single JSON object and nothing else.
"#;

fn build_legal_prompt(text: &str, context: Option<&CaseContext>) -> String {
    let mut context_lines = String::new();
    if let Some(c) = context {
        if let Some(case_type) = &c.case_type {
            context_lines.push_str(&format!("Case type: {case_type}\n"));
        }
        if let Some(j) = &c.jurisdiction {
            context_lines.push_str(&format!("Jurisdiction: {j}\n"));
        }
        if let Some(n) = c.party_count {
            context_lines.push_str(&format!("Parties: {n}\n"));
        }
    }
    format!(
        r#"{context_lines}<document>
{text}
</document>

Analyze the document above into this JSON structure:

{{
  "theories": [{{"name": "legal theory", "rationale": "why it applies"}}],
  "liability": {{"strength": "strong | moderate | weak", "evidence": ["short quote"]}},
  "damages_factors": ["factor"],
  "settlement_factors": {{"comparable": [], "aggravating": [], "mitigating": []}},
  "party_count": null,
  "incident_date": "YYYY-MM-DD or null"
}}"#
    )
}

pub struct LegalAnalyzer {
    gateway: Arc<ModelGateway>,
}

impl LegalAnalyzer {
    pub fn new(gateway: Arc<ModelGateway>) -> Self {
        Self { gateway }
    }

    pub async fn analyze(
        &self,
        text: &RedactedText,
        context: Option<&CaseContext>,
        ctx: &CallContext,
    ) -> AnalysisOutcome<LegalFindings> {
        let doc_id = ctx.document_id.as_deref().unwrap_or("unknown");
        let body = sanitize_prompt_input(text.as_str(), ctx.document_id.as_deref());
        let signals = ComplexitySignals {
            party_count: context.and_then(|c| c.party_count),
            requires_reasoning: true,
            high_stakes: false,
        };
        let router = self.gateway.router();
        let routing = router.route(&router.task(TaskType::LegalAnalysis, &body, &signals));

        let reply = match self
            .gateway
            .complete(&routing, LEGAL_SYSTEM_PROMPT, &build_legal_prompt(&body, context), ctx)
            .await
            .and_then(|r| parse_legal_reply(&r.content))
        {
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!(document_id = doc_id, error = %e, "Legal analysis failed");
                return AnalysisOutcome::Failed {
                    routing: Some(routing),
                    reason: e.to_string(),
                };
            }
        };

        let statute = compute_statute(self.gateway.config(), context, reply.incident_date);
        tracing::info!(
            document_id = doc_id,
            theories = reply.theories.len(),
            liability = reply.liability.strength.as_str(),
            statute_known = statute.deadline().is_some(),
            "Legal analysis complete"
        );

        AnalysisOutcome::Completed {
            findings: LegalFindings {
                theories: reply.theories,
                liability: reply.liability,
                statute_of_limitations: statute,
                damages_factors: reply.damages_factors,
                settlement_factors: reply.settlement_factors,
                party_count: reply.party_count.or(context.and_then(|c| c.party_count)),
                incident_date: reply.incident_date,
            },
            routing,
        }
    }
}
