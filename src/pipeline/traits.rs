//! Boundary traits for everything the pipeline reads from or writes to.
//!
//! Orchestrators receive these as `Arc<dyn …>` so tests can swap in
//! in-memory implementations.

use async_trait::async_trait;
use thiserror::Error;

use super::extraction::{OcrError, OcrOutput, StorageError};
use crate::db::DatabaseError;
use crate::models::{AuditEvent, CaseMeritResult, DocumentAnalysisResult, MeritOverride, UsageEvent};

#[derive(Error, Debug)]
pub enum SinkError {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Sink unavailable: {0}")]
    Unavailable(String),
}

/// Reads the raw bytes of a stored document.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn read(&self, file_reference: &str) -> Result<Vec<u8>, StorageError>;
}

/// Turns document bytes into text plus per-page confidence.
#[async_trait]
pub trait OcrEngine: Send + Sync {
    async fn extract(&self, bytes: &[u8], file_reference: &str) -> Result<OcrOutput, OcrError>;
}

/// Append-only compliance log.
pub trait AuditSink: Send + Sync {
    fn record(&self, event: &AuditEvent) -> Result<(), SinkError>;
}

/// Per-call token and cost accounting.
pub trait UsageSink: Send + Sync {
    fn record_usage(&self, event: &UsageEvent) -> Result<(), SinkError>;
}

/// Durable, append-only result history.
pub trait ResultStore: Send + Sync {
    fn save_document_result(&self, result: &DocumentAnalysisResult) -> Result<(), SinkError>;

    fn save_merit_result(&self, result: &CaseMeritResult) -> Result<(), SinkError>;

    fn record_override(&self, record: &MeritOverride) -> Result<(), SinkError>;

    fn latest_document_result(
        &self,
        document_id: &str,
    ) -> Result<Option<DocumentAnalysisResult>, SinkError>;

    fn latest_merit_result(&self, case_id: &str) -> Result<Option<CaseMeritResult>, SinkError>;
}
