use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use super::keywords::best_match;
use super::{ClassificationError, Classifier};
use crate::config::ClassifierConfig;
use crate::models::{Classification, ClassificationMethod, DocumentType, TaskType};
use crate::pipeline::llm::{parse_json_reply, sanitize_prompt_input, CallContext, ModelGateway};
use crate::pipeline::model_router::ComplexitySignals;
use crate::pipeline::redaction::RedactedText;

const CLASSIFIER_SYSTEM_PROMPT: &str = r#"
You classify documents submitted for a personal-injury case review.
Identifiers in the text have been replaced by placeholders such as [NAME_1].

Choose exactly one label:
medical_record, police_report, insurance_document, employment_record,
correspondence, bill_invoice, legal_document, other

Reply with a single JSON object and nothing else:
{"document_type": "<label>", "confidence": <number between 0 and 1>}
"#;

fn build_classifier_prompt(text: &str, hint: Option<DocumentType>) -> String {
    let hint_line = match hint {
        Some(h) => format!(
            "The uploader suggested \"{}\". This is unverified; judge from the content.\n",
            h.as_str()
        ),
        None => String::new(),
    };
    format!("{hint_line}<document>\n{text}\n</document>")
}

#[derive(Deserialize)]
struct ClassifierReply {
    document_type: String,
    confidence: f64,
}

// ──────────────────────────────────────────────
// Model
// ──────────────────────────────────────────────

/// Routed model call with a constrained JSON reply.
pub struct ModelClassifier {
    gateway: Arc<ModelGateway>,
}

impl ModelClassifier {
    pub fn new(gateway: Arc<ModelGateway>) -> Self {
        Self { gateway }
    }
}

#[async_trait]
impl Classifier for ModelClassifier {
    async fn classify(
        &self,
        text: &RedactedText,
        hint: Option<DocumentType>,
        ctx: &CallContext,
    ) -> Result<Classification, ClassificationError> {
        let body = sanitize_prompt_input(text.as_str(), ctx.document_id.as_deref());
        let router = self.gateway.router();
        let task = router.task(TaskType::Classification, &body, &ComplexitySignals::default());
        let decision = router.route(&task);

        let response = self
            .gateway
            .complete(
                &decision,
                CLASSIFIER_SYSTEM_PROMPT,
                &build_classifier_prompt(&body, hint),
                ctx,
            )
            .await?;

        let reply: ClassifierReply = parse_json_reply(&response.content)?;
        let label = DocumentType::from_str(reply.document_type.trim().to_lowercase().as_str())
            .map_err(|_| {
                ClassificationError::Unparseable(format!("unknown label {:?}", reply.document_type))
            })?;
        if !reply.confidence.is_finite() {
            return Err(ClassificationError::Unparseable("confidence is not a number".into()));
        }
        let confidence = reply.confidence.clamp(0.0, 1.0);
        let threshold = self.gateway.config().classifier.review_threshold;

        Ok(Classification {
            label,
            confidence,
            method: ClassificationMethod::Model,
            needs_review: confidence < threshold,
            routing: Some(decision),
            fallback_reason: None,
        })
    }
}

// ──────────────────────────────────────────────
// Rules
// ──────────────────────────────────────────────

/// Keyword scoring. Always answers, at a fixed reduced confidence.
pub struct RuleBasedClassifier {
    config: ClassifierConfig,
}

impl RuleBasedClassifier {
    pub fn new(config: ClassifierConfig) -> Self {
        Self { config }
    }

    pub fn classify_text(&self, text: &str) -> Classification {
        let (label, _) = best_match(text);
        let confidence = self.config.fallback_confidence;
        Classification {
            label,
            confidence,
            method: ClassificationMethod::RuleFallback,
            needs_review: confidence < self.config.review_threshold,
            routing: None,
            fallback_reason: None,
        }
    }
}

#[async_trait]
impl Classifier for RuleBasedClassifier {
    async fn classify(
        &self,
        text: &RedactedText,
        _hint: Option<DocumentType>,
        ctx: &CallContext,
    ) -> Result<Classification, ClassificationError> {
        if ctx.cancel.is_cancelled() {
            return Err(ClassificationError::Cancelled);
        }
        Ok(self.classify_text(text.as_str()))
    }
}

// ──────────────────────────────────────────────
// Fallback chain
// ──────────────────────────────────────────────

/// Runs `primary`; runs `fallback` only if `primary` fails for a reason
/// other than cancellation.
pub struct FallbackClassifier {
    primary: Box<dyn Classifier>,
    fallback: Box<dyn Classifier>,
}

impl FallbackClassifier {
    pub fn new(primary: Box<dyn Classifier>, fallback: Box<dyn Classifier>) -> Self {
        Self { primary, fallback }
    }

    /// Model first, keyword rules on failure.
    pub fn standard(gateway: Arc<ModelGateway>) -> Self {
        let config = gateway.config().classifier.clone();
        Self::new(
            Box::new(ModelClassifier::new(gateway)),
            Box::new(RuleBasedClassifier::new(config)),
        )
    }
}

#[async_trait]
impl Classifier for FallbackClassifier {
    async fn classify(
        &self,
        text: &RedactedText,
        hint: Option<DocumentType>,
        ctx: &CallContext,
    ) -> Result<Classification, ClassificationError> {
        match self.primary.classify(text, hint, ctx).await {
            Ok(result) => Ok(result),
            Err(ClassificationError::Cancelled) => Err(ClassificationError::Cancelled),
            Err(e) => {
                tracing::warn!(
                    document_id = ctx.document_id.as_deref().unwrap_or("unknown"),
                    error = %e,
                    "Primary classifier failed, using keyword rules"
                );
                let mut result = self.fallback.classify(text, hint, ctx).await?;
                result.fallback_reason = Some(e.to_string());
                Ok(result)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnalysisConfig;
    use crate::cost::CostLedger;
    use crate::pipeline::llm::mock::{MockModelClient, RecordingSinks};
    use crate::pipeline::llm::{ModelError, TierClients};
    use crate::pipeline::traits::{AuditSink, UsageSink};
    use tokio_util::sync::CancellationToken;

    fn gateway(client: &Arc<MockModelClient>) -> Arc<ModelGateway> {
        let sinks = Arc::new(RecordingSinks::default());
        let mut config = AnalysisConfig::with_defaults();
        config.concurrency.max_retries = 0;
        Arc::new(ModelGateway::new(
            Arc::new(config),
            TierClients::shared(Arc::clone(client) as _),
            Arc::clone(&sinks) as Arc<dyn AuditSink>,
            sinks as Arc<dyn UsageSink>,
        ))
    }

    fn ctx() -> CallContext {
        CallContext::new(None, Some("doc-1"), CancellationToken::new(), Arc::new(CostLedger::unbounded()))
    }

    fn note() -> RedactedText {
        RedactedText::new("Patient [NAME_1] seen at clinic. Diagnosis: lumbar strain. 400 mg ibuprofen.".into())
    }

    #[tokio::test]
    async fn model_label_and_confidence() {
        let client = Arc::new(MockModelClient::new());
        client.respond(
            TaskType::Classification,
            r#"{"document_type": "medical_record", "confidence": 0.92}"#,
        );
        let result = ModelClassifier::new(gateway(&client))
            .classify(&note(), None, &ctx())
            .await
            .unwrap();
        assert_eq!(result.label, DocumentType::MedicalRecord);
        assert_eq!(result.method, ClassificationMethod::Model);
        assert!(!result.needs_review);
        assert!(result.routing.is_some());
    }

    #[tokio::test]
    async fn confidence_clamped_and_review_flagged() {
        let client = Arc::new(MockModelClient::new());
        client.respond(TaskType::Classification, r#"{"document_type": "other", "confidence": 1.7}"#);
        client.respond(TaskType::Classification, r#"{"document_type": "other", "confidence": 0.59}"#);
        let classifier = ModelClassifier::new(gateway(&client));

        let high = classifier.classify(&note(), None, &ctx()).await.unwrap();
        assert_eq!(high.confidence, 1.0);
        let low = classifier.classify(&note(), None, &ctx()).await.unwrap();
        assert!(low.needs_review);
    }

    #[tokio::test]
    async fn unknown_label_is_unparseable() {
        let client = Arc::new(MockModelClient::new());
        client.respond(TaskType::Classification, r#"{"document_type": "x_ray", "confidence": 0.9}"#);
        client.respond(TaskType::Classification, r#"{"document_type": "other"}"#);
        client.respond(TaskType::Classification, "I think it's a medical record.");
        let classifier = ModelClassifier::new(gateway(&client));

        for _ in 0..3 {
            let err = classifier.classify(&note(), None, &ctx()).await.unwrap_err();
            assert!(matches!(err, ClassificationError::Unparseable(_)), "{err}");
        }
    }

    #[tokio::test]
    async fn hint_reaches_prompt_but_not_label() {
        let client = Arc::new(MockModelClient::new());
        client.respond(
            TaskType::Classification,
            r#"{"document_type": "medical_record", "confidence": 0.8}"#,
        );
        let result = ModelClassifier::new(gateway(&client))
            .classify(&note(), Some(DocumentType::PoliceReport), &ctx())
            .await
            .unwrap();
        assert_eq!(result.label, DocumentType::MedicalRecord);
        let prompt = &client.requests(TaskType::Classification)[0].prompt;
        assert!(prompt.contains("\"police_report\""));
        assert!(prompt.contains("unverified"));
    }

    #[tokio::test]
    async fn fallback_used_only_on_primary_failure() {
        let client = Arc::new(MockModelClient::new());
        client.fail(TaskType::Classification, ModelError::Timeout(30));
        let classifier = FallbackClassifier::standard(gateway(&client));

        let result = classifier.classify(&note(), None, &ctx()).await.unwrap();
        assert_eq!(result.method, ClassificationMethod::RuleFallback);
        assert_eq!(result.label, DocumentType::MedicalRecord);
        assert_eq!(result.confidence, 0.5);
        assert!(result.needs_review);
        assert!(result.fallback_reason.unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn primary_success_skips_fallback() {
        struct Panicking;
        #[async_trait]
        impl Classifier for Panicking {
            async fn classify(
                &self,
                _: &RedactedText,
                _: Option<DocumentType>,
                _: &CallContext,
            ) -> Result<Classification, ClassificationError> {
                panic!("fallback must not run");
            }
        }

        let client = Arc::new(MockModelClient::new());
        client.respond(TaskType::Classification, r#"{"document_type": "bill_invoice", "confidence": 0.7}"#);
        let classifier = FallbackClassifier::new(
            Box::new(ModelClassifier::new(gateway(&client))),
            Box::new(Panicking),
        );
        let result = classifier.classify(&note(), None, &ctx()).await.unwrap();
        assert_eq!(result.label, DocumentType::BillInvoice);
    }

    #[tokio::test]
    async fn cancellation_is_not_masked_by_fallback() {
        let client = Arc::new(MockModelClient::new());
        client.respond(TaskType::Classification, r#"{"document_type": "other", "confidence": 0.9}"#);
        let classifier = FallbackClassifier::standard(gateway(&client));
        let ctx = ctx();
        ctx.cancel.cancel();

        let err = classifier.classify(&note(), None, &ctx).await.unwrap_err();
        assert!(matches!(err, ClassificationError::Cancelled));
        assert_eq!(client.call_count(TaskType::Classification), 0);
    }

    #[test]
    fn rules_without_match_are_other() {
        let rules = RuleBasedClassifier::new(ClassifierConfig::default());
        let result = rules.classify_text("zzz");
        assert_eq!(result.label, DocumentType::Other);
        assert_eq!(result.confidence, 0.5);
        assert!(result.routing.is_none());
    }
}
