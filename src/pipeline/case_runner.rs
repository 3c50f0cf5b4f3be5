//! Case-level orchestration.
//!
//! Every document of a case runs through [`DocumentProcessor`] on its own
//! task, bounded by the document pool. One document failing never stops
//! the others. Merit analysis starts only once every document has reached a
//! terminal state, and its failure leaves the case retryable.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use super::llm::CallContext;
use super::merit::MeritAggregator;
use super::processor::DocumentProcessor;
use super::traits::ResultStore;
use crate::config::AnalysisConfig;
use crate::cost::CostLedger;
use crate::models::{
    CaseAnalysisOutcome, CaseContext, CaseRequest, DocumentAnalysisResult, DocumentRequest,
    DocumentStatus, MeritStatus, PipelineStage, StageFailure, SubAnalysis,
};

pub struct CaseAnalysisRunner {
    config: Arc<AnalysisConfig>,
    processor: Arc<DocumentProcessor>,
    merit: Arc<MeritAggregator>,
    results: Arc<dyn ResultStore>,
}

impl CaseAnalysisRunner {
    pub fn new(
        config: Arc<AnalysisConfig>,
        processor: Arc<DocumentProcessor>,
        merit: Arc<MeritAggregator>,
        results: Arc<dyn ResultStore>,
    ) -> Self {
        Self {
            config,
            processor,
            merit,
            results,
        }
    }

    /// Analyse every document of a case, then the case itself.
    ///
    /// Cancelling `cancel` stops all document tasks; their results are
    /// recorded as cancelled failures and merit is left pending.
    pub async fn analyze_case(
        &self,
        request: &CaseRequest,
        cancel: CancellationToken,
    ) -> CaseAnalysisOutcome {
        let case_id = request.case_id.as_str();
        let ledger = Arc::new(CostLedger::new(&self.config.cost));

        tracing::info!(
            case_id,
            documents = request.documents.len(),
            pool = self.config.concurrency.document_pool_size,
            "Case analysis started"
        );

        let documents = self.run_documents(request, &cancel, &ledger).await;
        let documents_processed = documents.len();
        let documents_succeeded = documents.iter().filter(|d| d.succeeded()).count();
        let cancelled = cancel.is_cancelled();

        let merit = if cancelled {
            tracing::warn!(case_id, "Case cancelled, merit analysis skipped");
            MeritStatus::Pending {
                reason: "case analysis cancelled".into(),
            }
        } else {
            self.run_merit(case_id, &request.context, &documents, &cancel, &ledger)
                .await
        };

        tracing::info!(
            case_id,
            documents_processed,
            documents_succeeded,
            merit = merit.result().map(|r| r.recommendation.as_str()).unwrap_or("pending"),
            cost_usd = ledger.total_cost(),
            tokens = ledger.total_tokens(),
            "Case analysis complete"
        );

        CaseAnalysisOutcome {
            case_id: request.case_id.clone(),
            documents,
            documents_processed,
            documents_succeeded,
            merit,
            total_cost: ledger.total_cost(),
            total_tokens: ledger.total_tokens(),
            cancelled,
        }
    }

    /// Re-run merit from the stored document results, without analysing
    /// any document again.
    pub async fn retry_merit(&self, request: &CaseRequest, cancel: CancellationToken) -> MeritStatus {
        let case_id = request.case_id.as_str();
        let mut documents = Vec::with_capacity(request.documents.len());
        for doc in &request.documents {
            match self.results.latest_document_result(&doc.document_id) {
                Ok(Some(result)) if result.is_terminal() => documents.push(result),
                Ok(_) => {
                    return MeritStatus::Pending {
                        reason: format!("no stored result for document {}", doc.document_id),
                    }
                }
                Err(e) => {
                    tracing::warn!(case_id, document_id = %doc.document_id, error = %e, "Failed to load document result");
                    return MeritStatus::Pending {
                        reason: e.to_string(),
                    };
                }
            }
        }
        let ledger = Arc::new(CostLedger::new(&self.config.cost));
        self.run_merit(case_id, &request.context, &documents, &cancel, &ledger)
            .await
    }

    async fn run_documents(
        &self,
        request: &CaseRequest,
        cancel: &CancellationToken,
        ledger: &Arc<CostLedger>,
    ) -> Vec<DocumentAnalysisResult> {
        let case_id = request.case_id.as_str();
        let pool = Arc::new(Semaphore::new(self.config.concurrency.document_pool_size));
        let context = Arc::new(request.context.clone());
        let mut tasks = JoinSet::new();

        for (index, doc) in request.documents.iter().enumerate() {
            let processor = Arc::clone(&self.processor);
            let pool = Arc::clone(&pool);
            let context = Arc::clone(&context);
            let ledger = Arc::clone(ledger);
            let token = cancel.child_token();
            let doc = doc.clone();
            let case_id = case_id.to_string();

            tasks.spawn(async move {
                // A cancelled document skips the queue; the processor records it.
                let _permit = tokio::select! {
                    biased;
                    _ = token.cancelled() => None,
                    permit = pool.acquire_owned() => permit.ok(),
                };
                let result = processor
                    .process(&doc, Some(case_id.as_str()), Some(context.as_ref()), token, ledger)
                    .await;
                (index, result)
            });
        }

        let mut slots: Vec<Option<DocumentAnalysisResult>> =
            (0..request.documents.len()).map(|_| None).collect();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, result)) => slots[index] = Some(result),
                Err(e) => tracing::error!(case_id, error = %e, "Document task aborted"),
            }
        }

        slots
            .into_iter()
            .zip(&request.documents)
            .map(|(slot, doc)| match slot {
                Some(result) => result,
                None => self.lost_document(doc, case_id),
            })
            .collect()
    }

    /// Terminal result for a document whose task never reported back.
    fn lost_document(&self, doc: &DocumentRequest, case_id: &str) -> DocumentAnalysisResult {
        let mut result = DocumentAnalysisResult::pending(doc, Some(case_id));
        result.failure = Some(StageFailure {
            step: SubAnalysis::Storage,
            stage: PipelineStage::Pending,
            message: "document task aborted before reporting a result".into(),
            cancelled: false,
        });
        result.status = DocumentStatus::Failed;
        result.stage = PipelineStage::Failed;
        if let Err(e) = self.results.save_document_result(&result) {
            tracing::error!(case_id, document_id = %doc.document_id, error = %e, "Failed to persist aborted document result");
        }
        result
    }

    async fn run_merit(
        &self,
        case_id: &str,
        context: &CaseContext,
        documents: &[DocumentAnalysisResult],
        cancel: &CancellationToken,
        ledger: &Arc<CostLedger>,
    ) -> MeritStatus {
        let ctx = CallContext::new(Some(case_id), None, cancel.clone(), Arc::clone(ledger));
        let result = match self
            .merit
            .evaluate_merit(case_id, context, documents, &ctx)
            .await
        {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!(case_id, error = %e, "Merit analysis failed, case left pending");
                return MeritStatus::Pending {
                    reason: e.to_string(),
                };
            }
        };

        match self.results.save_merit_result(&result) {
            Ok(()) => MeritStatus::Completed {
                result: Box::new(result),
            },
            Err(e) => {
                tracing::error!(case_id, error = %e, "Failed to persist merit result");
                MeritStatus::Pending {
                    reason: format!("merit result not persisted: {e}"),
                }
            }
        }
    }
}
