//! Medical extraction specialist.
//!
//! Always runs on the cheap tier. A failed call yields a `Failed` outcome;
//! a reply that cannot be read yields `Partial` with empty findings.

pub mod parser;
pub mod prompt;

use std::sync::Arc;

use crate::models::{AnalysisOutcome, MedicalFindings, ModelTier, TaskType};
use crate::pipeline::llm::{sanitize_prompt_input, CallContext, ModelGateway};
use crate::pipeline::model_router::ComplexitySignals;
use crate::pipeline::redaction::RedactedText;

use parser::{amounts_in_text, detect_specialty, parse_medical_reply};
use prompt::{build_medical_prompt, MEDICAL_SYSTEM_PROMPT};

pub struct MedicalExtractor {
    gateway: Arc<ModelGateway>,
}

impl MedicalExtractor {
    pub fn new(gateway: Arc<ModelGateway>) -> Self {
        Self { gateway }
    }

    pub async fn extract(
        &self,
        text: &RedactedText,
        ctx: &CallContext,
    ) -> AnalysisOutcome<MedicalFindings> {
        let doc_id = ctx.document_id.as_deref().unwrap_or("unknown");
        let body = sanitize_prompt_input(text.as_str(), ctx.document_id.as_deref());
        let router = self.gateway.router();
        let task = router.task(TaskType::MedicalExtraction, &body, &ComplexitySignals::default());
        let routing = router.route_pinned(&task, ModelTier::Cheap);

        let response = match self
            .gateway
            .complete(&routing, MEDICAL_SYSTEM_PROMPT, &build_medical_prompt(&body), ctx)
            .await
        {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(document_id = doc_id, error = %e, "Medical extraction call failed");
                return AnalysisOutcome::Failed {
                    routing: Some(routing),
                    reason: e.to_string(),
                };
            }
        };

        match parse_medical_reply(&response.content) {
            Ok(mut findings) => {
                if findings.treatment_costs.is_empty() {
                    findings.treatment_costs = amounts_in_text(&body);
                }
                if findings.specialty.is_none() {
                    findings.specialty = detect_specialty(&body);
                }
                tracing::info!(
                    document_id = doc_id,
                    diagnoses = findings.diagnoses.len(),
                    costs = findings.treatment_costs.len(),
                    "Medical extraction complete"
                );
                AnalysisOutcome::Completed { findings, routing }
            }
            Err(e) => {
                tracing::warn!(document_id = doc_id, error = %e, "Medical reply unreadable");
                AnalysisOutcome::Partial {
                    findings: MedicalFindings::default(),
                    routing,
                    reason: e.to_string(),
                }
            }
        }
    }
}
