//! Single-document orchestration.
//!
//! Drives one document through storage read → OCR → PHI redaction →
//! classification → specialist analyses → summary, then persists the
//! result. Every step records where the document got to, so a failure keeps
//! the outputs of the steps before it.
//!
//! Collaborators are trait objects so the processor can be exercised with
//! in-memory doubles.

use std::fmt::Write as _;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tokio_util::sync::CancellationToken;

use crate::cost::CostLedger;
use crate::models::{
    AnalysisIssue, AnalysisOutcome, AuditScope, CaseContext, DocumentAnalysisResult,
    DocumentRequest, DocumentStatus, OcrQuality, PipelineStage, StageFailure, SubAnalysis,
};
use crate::pipeline::classification::{ClassificationError, Classifier, FallbackClassifier};
use crate::pipeline::extraction::{OcrError, StorageError};
use crate::pipeline::legal::LegalAnalyzer;
use crate::pipeline::llm::{CallContext, ModelGateway};
use crate::pipeline::medical::MedicalExtractor;
use crate::pipeline::redaction::{PhiRedactor, RedactionError};
use crate::pipeline::traits::{AuditSink, DocumentStore, OcrEngine, ResultStore, SinkError};

/// Diagnoses listed in a document summary.
const SUMMARY_DIAGNOSES: usize = 3;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Why a document pipeline stopped. Each variant maps to the step it
/// stopped in.
#[derive(Debug, thiserror::Error)]
pub enum ProcessingError {
    #[error("Storage read failed: {0}")]
    Storage(#[from] StorageError),

    #[error("OCR failed: {0}")]
    Ocr(#[from] OcrError),

    #[error("Redaction failed: {0}")]
    Redaction(#[from] RedactionError),

    #[error("Classification failed: {0}")]
    Classification(ClassificationError),

    #[error("Failed to persist result: {0}")]
    Persist(#[from] SinkError),

    #[error("cancelled")]
    Cancelled(SubAnalysis),
}

impl From<ClassificationError> for ProcessingError {
    fn from(e: ClassificationError) -> Self {
        match e {
            ClassificationError::Cancelled => Self::Cancelled(SubAnalysis::Classification),
            other => Self::Classification(other),
        }
    }
}

impl ProcessingError {
    pub fn step(&self) -> SubAnalysis {
        match self {
            Self::Storage(_) => SubAnalysis::Storage,
            Self::Ocr(_) => SubAnalysis::Ocr,
            Self::Redaction(_) => SubAnalysis::Redaction,
            Self::Classification(_) => SubAnalysis::Classification,
            Self::Persist(_) => SubAnalysis::Persist,
            Self::Cancelled(step) => *step,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled(_))
    }
}

fn check_cancel(cancel: &CancellationToken, step: SubAnalysis) -> Result<(), ProcessingError> {
    if cancel.is_cancelled() {
        return Err(ProcessingError::Cancelled(step));
    }
    Ok(())
}

/// Await `fut` unless `cancel` fires first.
async fn unless_cancelled<T, E, F>(
    cancel: &CancellationToken,
    step: SubAnalysis,
    fut: F,
) -> Result<T, ProcessingError>
where
    F: Future<Output = Result<T, E>>,
    ProcessingError: From<E>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ProcessingError::Cancelled(step)),
        out = fut => out.map_err(ProcessingError::from),
    }
}

// ---------------------------------------------------------------------------
// Processor
// ---------------------------------------------------------------------------

pub struct DocumentProcessor {
    redactor: Arc<PhiRedactor>,
    store: Arc<dyn DocumentStore>,
    ocr: Arc<dyn OcrEngine>,
    results: Arc<dyn ResultStore>,
    audit: Arc<dyn AuditSink>,
    classifier: Box<dyn Classifier>,
    medical: MedicalExtractor,
    legal: LegalAnalyzer,
}

impl DocumentProcessor {
    pub fn new(
        gateway: Arc<ModelGateway>,
        redactor: Arc<PhiRedactor>,
        store: Arc<dyn DocumentStore>,
        ocr: Arc<dyn OcrEngine>,
        results: Arc<dyn ResultStore>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            redactor,
            store,
            ocr,
            results,
            audit,
            classifier: Box::new(FallbackClassifier::standard(Arc::clone(&gateway))),
            medical: MedicalExtractor::new(Arc::clone(&gateway)),
            legal: LegalAnalyzer::new(gateway),
        }
    }

    /// Replace the default model-then-rules classifier.
    pub fn with_classifier(mut self, classifier: Box<dyn Classifier>) -> Self {
        self.classifier = classifier;
        self
    }

    /// Run one document to a terminal state and persist it.
    ///
    /// Never returns an error: failures are recorded on the result. Model
    /// spend for the document is tracked on its own ledger, which also
    /// rolls up into `case_ledger`.
    pub async fn process(
        &self,
        request: &DocumentRequest,
        case_id: Option<&str>,
        context: Option<&CaseContext>,
        cancel: CancellationToken,
        case_ledger: Arc<CostLedger>,
    ) -> DocumentAnalysisResult {
        let started = Instant::now();
        let doc_id = request.document_id.as_str();
        let ledger = Arc::new(CostLedger::child(&case_ledger));
        let ctx = CallContext::new(case_id, Some(doc_id), cancel, Arc::clone(&ledger));
        let mut result = DocumentAnalysisResult::pending(request, case_id);

        tracing::info!(document_id = doc_id, case_id = case_id.unwrap_or("none"), "Document analysis started");

        let outcome = self.run(request, context, &ctx, &mut result).await;

        result.completed_at = Some(Utc::now());
        result.duration_ms = Some(started.elapsed().as_millis() as u64);
        result.estimated_cost = ledger.total_cost();

        match outcome {
            Ok(()) => {
                let reached = result.stage;
                result.status = DocumentStatus::Completed;
                result.stage = PipelineStage::Completed;
                match self.results.save_document_result(&result) {
                    Ok(()) => tracing::info!(
                        document_id = doc_id,
                        label = result.document_type().map(|t| t.as_str()).unwrap_or("none"),
                        issues = result.issues.len(),
                        duration_ms = result.duration_ms.unwrap_or_default(),
                        cost_usd = result.estimated_cost,
                        "Document analysis complete"
                    ),
                    Err(e) => {
                        result.stage = reached;
                        mark_failed(&mut result, &ProcessingError::Persist(e));
                    }
                }
            }
            Err(e) => {
                mark_failed(&mut result, &e);
                if let Err(save_err) = self.results.save_document_result(&result) {
                    tracing::error!(
                        document_id = doc_id,
                        error = %save_err,
                        "Failed to persist failed document result"
                    );
                }
            }
        }

        result
    }

    async fn run(
        &self,
        request: &DocumentRequest,
        context: Option<&CaseContext>,
        ctx: &CallContext,
        result: &mut DocumentAnalysisResult,
    ) -> Result<(), ProcessingError> {
        let doc_id = request.document_id.as_str();

        // Storage
        check_cancel(&ctx.cancel, SubAnalysis::Storage)?;
        result.performed.push(SubAnalysis::Storage);
        let bytes = unless_cancelled(
            &ctx.cancel,
            SubAnalysis::Storage,
            self.store.read(&request.file_reference),
        )
        .await?;

        // OCR
        result.performed.push(SubAnalysis::Ocr);
        let ocr = unless_cancelled(
            &ctx.cancel,
            SubAnalysis::Ocr,
            self.ocr.extract(&bytes, &request.file_reference),
        )
        .await?;
        let confidence = ocr.mean_confidence();
        let quality = OcrQuality::from_confidence(confidence);
        tracing::debug!(
            document_id = doc_id,
            pages = ocr.per_page_confidence.len(),
            confidence,
            quality = quality.as_str(),
            "OCR complete"
        );
        result.ocr_confidence = Some(confidence);
        result.ocr_quality = Some(quality);
        result.ocr_text = Some(ocr.text);
        result.stage = PipelineStage::OcrDone;

        // Redaction. The mapping never leaves this scope.
        check_cancel(&ctx.cancel, SubAnalysis::Redaction)?;
        result.performed.push(SubAnalysis::Redaction);
        let raw = result.ocr_text.as_deref().unwrap_or_default();
        let redaction = self.redactor.redact_with_audit(
            raw,
            &AuditScope::document(ctx.case_id.as_deref(), doc_id),
            self.audit.as_ref(),
        )?;
        result.phi_categories = redaction.categories;
        let text = redaction.redacted;
        result.stage = PipelineStage::Redacted;

        // Classification
        result.performed.push(SubAnalysis::Classification);
        let classification = self
            .classifier
            .classify(&text, request.document_type_hint, ctx)
            .await?;
        if let Some(reason) = &classification.fallback_reason {
            result.issues.push(AnalysisIssue {
                step: SubAnalysis::Classification,
                reason: reason.clone(),
            });
        }
        let label = classification.label;
        result.classification = Some(classification);
        result.stage = PipelineStage::Classified;

        // Specialists
        if label.needs_medical_extraction() {
            result.performed.push(SubAnalysis::MedicalExtraction);
            let outcome = self.medical.extract(&text, ctx).await;
            check_cancel(&ctx.cancel, SubAnalysis::MedicalExtraction)?;
            note_degraded(result, SubAnalysis::MedicalExtraction, &outcome);
            result.medical = Some(outcome);
        }
        if label.needs_legal_analysis() {
            result.performed.push(SubAnalysis::LegalAnalysis);
            let outcome = self.legal.analyze(&text, context, ctx).await;
            check_cancel(&ctx.cancel, SubAnalysis::LegalAnalysis)?;
            note_degraded(result, SubAnalysis::LegalAnalysis, &outcome);
            result.legal = Some(outcome);
        }
        result.stage = PipelineStage::SpecialistDone;

        // Summary
        result.performed.push(SubAnalysis::Summary);
        result.summary = Some(summarize(result));

        Ok(())
    }
}

fn mark_failed(result: &mut DocumentAnalysisResult, error: &ProcessingError) {
    tracing::warn!(
        document_id = %result.document_id,
        step = error.step().as_str(),
        stage = result.stage.as_str(),
        cancelled = error.is_cancelled(),
        error = %error,
        "Document analysis failed"
    );
    result.failure = Some(StageFailure {
        step: error.step(),
        stage: result.stage,
        message: error.to_string(),
        cancelled: error.is_cancelled(),
    });
    result.status = DocumentStatus::Failed;
    result.stage = PipelineStage::Failed;
}

fn note_degraded<T>(
    result: &mut DocumentAnalysisResult,
    step: SubAnalysis,
    outcome: &AnalysisOutcome<T>,
) {
    if let Some(reason) = outcome.degradation_reason() {
        result.issues.push(AnalysisIssue {
            step,
            reason: format!("{}: {reason}", outcome.status()),
        });
    }
}

/// Short description of what was found. Built from labels, counts and
/// extracted terms only; OCR text never goes in.
fn summarize(result: &DocumentAnalysisResult) -> String {
    let mut out = String::new();
    if let Some(c) = &result.classification {
        let _ = write!(out, "Classified as {} (confidence {:.2}", c.label, c.confidence);
        if c.needs_review {
            out.push_str(", needs review");
        }
        out.push_str(").");
    }

    match &result.medical {
        Some(outcome) => match outcome.findings() {
            Some(m) if !m.is_empty() => {
                if !m.diagnoses.is_empty() {
                    let shown: Vec<&str> = m
                        .diagnoses
                        .iter()
                        .take(SUMMARY_DIAGNOSES)
                        .map(String::as_str)
                        .collect();
                    let _ = write!(out, " Diagnoses: {}", shown.join(", "));
                    if m.diagnoses.len() > SUMMARY_DIAGNOSES {
                        let _ = write!(out, " (+{} more)", m.diagnoses.len() - SUMMARY_DIAGNOSES);
                    }
                    out.push('.');
                }
                if let Some(severity) = m.severity {
                    let _ = write!(out, " Severity: {severity}.");
                }
                if !m.treatment_costs.is_empty() {
                    let _ = write!(out, " Treatment costs: ${:.2}.", m.total_costs());
                }
            }
            Some(_) => out.push_str(" No medical findings extracted."),
            None => out.push_str(" Medical extraction failed."),
        },
        None => {}
    }

    match &result.legal {
        Some(outcome) => match outcome.findings() {
            Some(l) => {
                let _ = write!(
                    out,
                    " Liability: {} ({} theor{}).",
                    l.liability.strength,
                    l.theories.len(),
                    if l.theories.len() == 1 { "y" } else { "ies" }
                );
            }
            None => out.push_str(" Legal analysis failed."),
        },
        None => {}
    }

    out.trim().to_string()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnalysisConfig;
    use crate::models::{
        ClassificationMethod, DocumentType, LiabilityStrength, TaskType,
    };
    use crate::pipeline::extraction::PlainTextOcr;
    use crate::pipeline::llm::mock::{MemoryDocumentStore, MockModelClient, RecordingSinks};
    use crate::pipeline::llm::{ModelError, TierClients};
    use crate::pipeline::traits::UsageSink;
    use std::sync::atomic::Ordering;

    const NOTE: &str = "Patient: John Smith\nSSN: 123-45-6789\n\
        Patient seen at clinic after rear-end collision.\n\
        Diagnosis: lumbar strain. Treatment plan: physical therapy, ibuprofen 400 mg.";

    const POLICE: &str = "Police report. Officer responded to collision at intersection. \
        Driver cited for running a red light. Witness statement attached.";

    struct Harness {
        client: Arc<MockModelClient>,
        sinks: Arc<RecordingSinks>,
        store: Arc<MemoryDocumentStore>,
        processor: DocumentProcessor,
    }

    fn harness() -> Harness {
        let client = Arc::new(MockModelClient::new());
        let sinks = Arc::new(RecordingSinks::default());
        let store = Arc::new(MemoryDocumentStore::default());
        let mut config = AnalysisConfig::with_defaults();
        config.concurrency.max_retries = 0;
        let redactor = Arc::new(PhiRedactor::new(&config.redaction).unwrap());
        let gateway = Arc::new(ModelGateway::new(
            Arc::new(config),
            TierClients::shared(Arc::clone(&client) as _),
            Arc::clone(&sinks) as Arc<dyn AuditSink>,
            Arc::clone(&sinks) as Arc<dyn UsageSink>,
        ));
        let processor = DocumentProcessor::new(
            gateway,
            redactor,
            Arc::clone(&store) as Arc<dyn DocumentStore>,
            Arc::new(PlainTextOcr),
            Arc::clone(&sinks) as Arc<dyn ResultStore>,
            Arc::clone(&sinks) as Arc<dyn AuditSink>,
        );
        Harness {
            client,
            sinks,
            store,
            processor,
        }
    }

    fn request(id: &str) -> DocumentRequest {
        DocumentRequest {
            document_id: id.into(),
            file_reference: format!("{id}.txt"),
            document_type_hint: None,
        }
    }

    async fn run(h: &Harness, id: &str, cancel: CancellationToken) -> DocumentAnalysisResult {
        h.processor
            .process(
                &request(id),
                Some("case-1"),
                None,
                cancel,
                Arc::new(CostLedger::unbounded()),
            )
            .await
    }

    #[tokio::test]
    async fn medical_record_end_to_end() {
        let h = harness();
        h.store.insert("doc-1.txt", NOTE);
        h.client.respond(
            TaskType::Classification,
            r#"{"document_type": "medical_record", "confidence": 0.92}"#,
        );
        h.client.respond(
            TaskType::MedicalExtraction,
            r#"{"diagnoses": ["lumbar strain"], "severity": "moderate", "treatment_costs": [1250]}"#,
        );

        let result = run(&h, "doc-1", CancellationToken::new()).await;

        assert_eq!(result.status, DocumentStatus::Completed);
        assert_eq!(result.stage, PipelineStage::Completed);
        let prompt = &h.client.requests(TaskType::Classification)[0].prompt;
        assert!(prompt.contains("[SSN_1]"));
        assert!(!prompt.contains("123-45-6789"));
        assert_eq!(result.phi_categories.get("SSN"), Some(&1));

        let classification = result.classification.as_ref().unwrap();
        assert_eq!(classification.label, DocumentType::MedicalRecord);
        assert!(classification.confidence >= 0.6);

        let medical = result.medical.as_ref().unwrap().findings().unwrap();
        assert_eq!(medical.diagnoses, vec!["lumbar strain".to_string()]);
        assert!(result.legal.is_none());
        assert_eq!(h.client.call_count(TaskType::LegalAnalysis), 0);

        let summary = result.summary.as_deref().unwrap();
        assert!(summary.contains("lumbar strain"));
        assert!(!summary.contains("John Smith"));
        assert_eq!(h.sinks.documents().len(), 1);
        assert!(result.issues.is_empty());
    }

    #[tokio::test]
    async fn police_report_runs_legal_only() {
        let h = harness();
        h.store.insert("doc-2.txt", POLICE);
        h.client.respond(
            TaskType::Classification,
            r#"{"document_type": "police_report", "confidence": 0.88}"#,
        );
        h.client.respond(
            TaskType::LegalAnalysis,
            r#"{"theories": [{"name": "negligence", "rationale": "red light"}],
                "liability": {"strength": "strong", "evidence": ["cited"]}}"#,
        );

        let result = run(&h, "doc-2", CancellationToken::new()).await;

        assert!(result.succeeded());
        assert_eq!(h.client.call_count(TaskType::MedicalExtraction), 0);
        let legal = result.legal.as_ref().unwrap().findings().unwrap();
        assert_eq!(legal.liability.strength, LiabilityStrength::Strong);
        assert!(result.summary.as_deref().unwrap().contains("Liability: strong"));
    }

    #[tokio::test]
    async fn other_documents_skip_specialists() {
        let h = harness();
        h.store.insert("doc-3.txt", "Parking receipt, lot B.");
        h.client.respond(
            TaskType::Classification,
            r#"{"document_type": "other", "confidence": 0.7}"#,
        );

        let result = run(&h, "doc-3", CancellationToken::new()).await;

        assert!(result.succeeded());
        assert!(result.medical.is_none() && result.legal.is_none());
        assert_eq!(h.client.call_count(TaskType::MedicalExtraction), 0);
        assert_eq!(h.client.call_count(TaskType::LegalAnalysis), 0);
        assert!(!result.performed.contains(&SubAnalysis::MedicalExtraction));
    }

    #[tokio::test]
    async fn correspondence_runs_legal_only() {
        let h = harness();
        h.store.insert("doc-6.txt", "Letter from opposing counsel regarding the collision claim.");
        h.client.respond(
            TaskType::Classification,
            r#"{"document_type": "correspondence", "confidence": 0.81}"#,
        );
        h.client.respond(
            TaskType::LegalAnalysis,
            r#"{"theories": [{"name": "negligence", "rationale": "admitted fault"}],
                "liability": {"strength": "moderate", "evidence": []}}"#,
        );

        let result = run(&h, "doc-6", CancellationToken::new()).await;

        assert!(result.succeeded());
        assert_eq!(h.client.call_count(TaskType::LegalAnalysis), 1);
        assert_eq!(h.client.call_count(TaskType::MedicalExtraction), 0);
        assert!(result.legal.is_some());
        assert!(result.medical.is_none());
    }

    #[tokio::test]
    async fn bill_invoice_runs_medical_only() {
        let h = harness();
        h.store.insert("doc-7.txt", "Invoice: physical therapy, 6 sessions. Amount due $1,200.00.");
        h.client.respond(
            TaskType::Classification,
            r#"{"document_type": "bill_invoice", "confidence": 0.9}"#,
        );
        h.client.respond(
            TaskType::MedicalExtraction,
            r#"{"procedures": ["physical therapy"], "treatment_costs": [1200]}"#,
        );

        let result = run(&h, "doc-7", CancellationToken::new()).await;

        assert!(result.succeeded());
        assert_eq!(h.client.call_count(TaskType::MedicalExtraction), 1);
        assert_eq!(h.client.call_count(TaskType::LegalAnalysis), 0);
        assert!(result.medical.is_some());
        assert!(result.legal.is_none());
    }

    #[tokio::test]
    async fn unreadable_classifier_reply_falls_back_to_rules() {
        let h = harness();
        h.store.insert("doc-4.txt", NOTE);
        h.client.respond(TaskType::Classification, "I think it's probably medical?");
        h.client.respond(TaskType::MedicalExtraction, r#"{"diagnoses": ["lumbar strain"]}"#);

        let result = run(&h, "doc-4", CancellationToken::new()).await;

        assert!(result.succeeded());
        let classification = result.classification.as_ref().unwrap();
        assert_eq!(classification.method, ClassificationMethod::RuleFallback);
        assert_eq!(classification.label, DocumentType::MedicalRecord);
        assert!(classification.needs_review);
        assert!(result
            .issues
            .iter()
            .any(|i| i.step == SubAnalysis::Classification));
    }

    #[tokio::test]
    async fn ocr_failure_makes_no_model_calls() {
        let h = harness();
        h.store.insert("doc-5.txt", vec![0xff, 0xfe, 0x00, 0x41]);

        let result = run(&h, "doc-5", CancellationToken::new()).await;

        assert_eq!(result.status, DocumentStatus::Failed);
        let failure = result.failure.as_ref().unwrap();
        assert_eq!(failure.step, SubAnalysis::Ocr);
        assert_eq!(failure.stage, PipelineStage::Pending);
        assert!(!failure.cancelled);
        assert_eq!(h.client.call_count(TaskType::Classification), 0);
        assert_eq!(h.sinks.documents().len(), 1);
    }

    #[tokio::test]
    async fn missing_document_fails_at_storage() {
        let h = harness();
        let result = run(&h, "ghost", CancellationToken::new()).await;
        assert_eq!(result.failure.as_ref().unwrap().step, SubAnalysis::Storage);
        assert!(result.ocr_text.is_none());
    }

    #[tokio::test]
    async fn cancelled_before_start() {
        let h = harness();
        h.store.insert("doc-6.txt", NOTE);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = run(&h, "doc-6", cancel).await;

        assert_eq!(result.status, DocumentStatus::Failed);
        let failure = result.failure.as_ref().unwrap();
        assert!(failure.cancelled);
        assert_eq!(failure.message, "cancelled");
        assert_eq!(h.client.call_count(TaskType::Classification), 0);
    }

    #[tokio::test]
    async fn specialist_timeout_still_completes() {
        let h = harness();
        h.store.insert("doc-7.txt", NOTE);
        h.client.respond(
            TaskType::Classification,
            r#"{"document_type": "medical_record", "confidence": 0.9}"#,
        );
        h.client.fail(TaskType::MedicalExtraction, ModelError::Timeout(30));

        let result = run(&h, "doc-7", CancellationToken::new()).await;

        assert!(result.succeeded());
        assert!(result.medical.as_ref().unwrap().is_failed());
        assert!(result
            .issues
            .iter()
            .any(|i| i.step == SubAnalysis::MedicalExtraction && i.reason.starts_with("failed")));
        assert!(result.summary.as_deref().unwrap().contains("Medical extraction failed"));
    }

    #[tokio::test]
    async fn persist_failure_fails_the_document() {
        let h = harness();
        h.store.insert("doc-8.txt", "Parking receipt, lot B.");
        h.client.respond(
            TaskType::Classification,
            r#"{"document_type": "other", "confidence": 0.7}"#,
        );
        h.sinks.fail_saves.store(true, Ordering::Relaxed);

        let result = run(&h, "doc-8", CancellationToken::new()).await;

        assert_eq!(result.status, DocumentStatus::Failed);
        let failure = result.failure.as_ref().unwrap();
        assert_eq!(failure.step, SubAnalysis::Persist);
        assert_eq!(failure.stage, PipelineStage::SpecialistDone);
        assert!(result.summary.is_some());
    }

    #[test]
    fn classification_cancel_maps_to_cancelled() {
        let err: ProcessingError = ClassificationError::Cancelled.into();
        assert!(err.is_cancelled());
        assert_eq!(err.step(), SubAnalysis::Classification);
    }
}
