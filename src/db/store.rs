//! SQLite-backed result store, audit sink and usage sink.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::Connection;
use uuid::Uuid;

use super::repository::{self, UsageTotals};
use super::sqlite::{open_database, open_memory_database};
use super::DatabaseError;
use crate::models::{
    AuditEvent, CaseMeritResult, DocumentAnalysisResult, MeritOverride, UsageEvent,
};
use crate::pipeline::traits::{AuditSink, ResultStore, SinkError, UsageSink};

/// Default audit retention: seven years.
pub const AUDIT_RETENTION_DAYS: i64 = 2555;

/// In-memory store with migrations applied.
pub fn open_memory_store() -> Result<SqliteStore, DatabaseError> {
    SqliteStore::open_in_memory()
}

pub struct SqliteStore {
    conn: Mutex<Connection>,
    /// Raw OCR text is only written to encrypted or in-memory databases.
    persist_ocr_text: bool,
}

impl SqliteStore {
    /// Plaintext file store. Document results are saved without OCR text.
    pub fn open(path: &Path) -> Result<Self, DatabaseError> {
        Ok(Self {
            conn: Mutex::new(open_database(path, None)?),
            persist_ocr_text: false,
        })
    }

    /// SQLCipher file store keyed with `key`. Results are saved whole.
    pub fn open_encrypted(path: &Path, key: &str) -> Result<Self, DatabaseError> {
        Ok(Self {
            conn: Mutex::new(open_database(path, Some(key))?),
            persist_ocr_text: true,
        })
    }

    pub fn open_in_memory() -> Result<Self, DatabaseError> {
        Ok(Self {
            conn: Mutex::new(open_memory_database()?),
            persist_ocr_text: true,
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, DatabaseError> {
        self.conn.lock().map_err(|_| DatabaseError::LockPoisoned)
    }

    pub fn document_history(
        &self,
        document_id: &str,
    ) -> Result<Vec<DocumentAnalysisResult>, DatabaseError> {
        repository::document_history(&*self.conn()?, document_id)
    }

    pub fn latest_results_for_case(
        &self,
        case_id: &str,
    ) -> Result<Vec<DocumentAnalysisResult>, DatabaseError> {
        repository::latest_results_for_case(&*self.conn()?, case_id)
    }

    pub fn audit_events_for_case(&self, case_id: &str) -> Result<Vec<AuditEvent>, DatabaseError> {
        repository::audit_events_for_case(&*self.conn()?, case_id)
    }

    pub fn overrides_for_result(
        &self,
        merit_result_id: &Uuid,
    ) -> Result<Vec<MeritOverride>, DatabaseError> {
        repository::overrides_for_result(&*self.conn()?, merit_result_id)
    }

    pub fn usage_totals(&self, case_id: &str) -> Result<UsageTotals, DatabaseError> {
        repository::usage_totals(&*self.conn()?, case_id)
    }

    pub fn prune_audit_log(&self, retention_days: i64) -> Result<usize, DatabaseError> {
        let deleted = repository::prune_audit_log(&*self.conn()?, retention_days)?;
        if deleted > 0 {
            tracing::info!(deleted, retention_days, "Pruned audit log");
        }
        Ok(deleted)
    }
}

impl AuditSink for SqliteStore {
    fn record(&self, event: &AuditEvent) -> Result<(), SinkError> {
        repository::insert_audit_event(&*self.conn()?, event)?;
        Ok(())
    }
}

impl UsageSink for SqliteStore {
    fn record_usage(&self, event: &UsageEvent) -> Result<(), SinkError> {
        repository::insert_usage_event(&*self.conn()?, event)?;
        Ok(())
    }
}

impl ResultStore for SqliteStore {
    fn save_document_result(&self, result: &DocumentAnalysisResult) -> Result<(), SinkError> {
        if self.persist_ocr_text || result.ocr_text.is_none() {
            repository::insert_document_result(&*self.conn()?, result)?;
        } else {
            let stored = DocumentAnalysisResult {
                ocr_text: None,
                ..result.clone()
            };
            repository::insert_document_result(&*self.conn()?, &stored)?;
        }
        Ok(())
    }

    fn save_merit_result(&self, result: &CaseMeritResult) -> Result<(), SinkError> {
        repository::insert_merit_result(&*self.conn()?, result)?;
        Ok(())
    }

    fn record_override(&self, record: &MeritOverride) -> Result<(), SinkError> {
        repository::insert_override(&*self.conn()?, record)?;
        Ok(())
    }

    fn latest_document_result(
        &self,
        document_id: &str,
    ) -> Result<Option<DocumentAnalysisResult>, SinkError> {
        Ok(repository::latest_document_result(&*self.conn()?, document_id)?)
    }

    fn latest_merit_result(&self, case_id: &str) -> Result<Option<CaseMeritResult>, SinkError> {
        Ok(repository::latest_merit_result(&*self.conn()?, case_id)?)
    }
}
