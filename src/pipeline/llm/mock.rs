//! In-memory doubles for model calls and sinks.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use super::{ModelClient, ModelError, ModelRequest, ModelResponse};
use crate::models::{
    AuditAction, AuditEvent, CaseMeritResult, DocumentAnalysisResult, MeritOverride, TaskType,
    UsageEvent,
};
use crate::pipeline::extraction::StorageError;
use crate::pipeline::traits::{AuditSink, DocumentStore, ResultStore, SinkError, UsageSink};

#[derive(Clone)]
enum Reply {
    Content(String),
    Error(ModelError),
    Delayed(String, Duration),
}

/// Scripted model client. Replies are queued per task type; once a queue
/// is empty the task's standing reply (if any) is used.
#[derive(Default)]
pub struct MockModelClient {
    queued: Mutex<HashMap<TaskType, VecDeque<Reply>>>,
    standing: Mutex<HashMap<TaskType, Reply>>,
    calls: Mutex<Vec<ModelRequest>>,
}

impl MockModelClient {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, task: TaskType, reply: Reply) {
        self.queued
            .lock()
            .unwrap()
            .entry(task)
            .or_default()
            .push_back(reply);
    }

    pub fn respond(&self, task: TaskType, content: &str) {
        self.push(task, Reply::Content(content.to_string()));
    }

    pub fn fail(&self, task: TaskType, error: ModelError) {
        self.push(task, Reply::Error(error));
    }

    pub fn respond_after(&self, task: TaskType, content: &str, delay: Duration) {
        self.push(task, Reply::Delayed(content.to_string(), delay));
    }

    pub fn respond_always(&self, task: TaskType, content: &str) {
        self.standing
            .lock()
            .unwrap()
            .insert(task, Reply::Content(content.to_string()));
    }

    pub fn fail_always(&self, task: TaskType, error: ModelError) {
        self.standing.lock().unwrap().insert(task, Reply::Error(error));
    }

    pub fn call_count(&self, task: TaskType) -> usize {
        self.calls.lock().unwrap().iter().filter(|r| r.task == task).count()
    }

    pub fn requests(&self, task: TaskType) -> Vec<ModelRequest> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.task == task)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl ModelClient for MockModelClient {
    async fn complete(&self, request: &ModelRequest) -> Result<ModelResponse, ModelError> {
        self.calls.lock().unwrap().push(request.clone());
        let reply = {
            let queued = self
                .queued
                .lock()
                .unwrap()
                .get_mut(&request.task)
                .and_then(VecDeque::pop_front);
            queued.or_else(|| self.standing.lock().unwrap().get(&request.task).cloned())
        };
        match reply {
            Some(Reply::Content(content)) => Ok(ModelResponse::text(content)),
            Some(Reply::Error(e)) => Err(e),
            Some(Reply::Delayed(content, delay)) => {
                tokio::time::sleep(delay).await;
                Ok(ModelResponse::text(content))
            }
            None => Err(ModelError::MalformedResponse(format!(
                "no scripted reply for {}",
                request.task
            ))),
        }
    }
}

/// Document bytes keyed by file reference.
#[derive(Default)]
pub struct MemoryDocumentStore {
    files: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryDocumentStore {
    pub fn insert(&self, file_reference: &str, bytes: impl Into<Vec<u8>>) {
        self.files
            .lock()
            .unwrap()
            .insert(file_reference.to_string(), bytes.into());
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn read(&self, file_reference: &str) -> Result<Vec<u8>, StorageError> {
        self.files
            .lock()
            .unwrap()
            .get(file_reference)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(file_reference.to_string()))
    }
}

/// Audit, usage and result sinks that keep everything in memory.
#[derive(Default)]
pub struct RecordingSinks {
    audits: Mutex<Vec<AuditEvent>>,
    usage: Mutex<Vec<UsageEvent>>,
    documents: Mutex<Vec<DocumentAnalysisResult>>,
    merits: Mutex<Vec<CaseMeritResult>>,
    overrides: Mutex<Vec<MeritOverride>>,
    pub fail_saves: AtomicBool,
}

impl RecordingSinks {
    pub fn audits(&self) -> Vec<AuditEvent> {
        self.audits.lock().unwrap().clone()
    }

    pub fn actions(&self) -> Vec<AuditAction> {
        self.audits.lock().unwrap().iter().map(|e| e.action).collect()
    }

    pub fn usage(&self) -> Vec<UsageEvent> {
        self.usage.lock().unwrap().clone()
    }

    pub fn documents(&self) -> Vec<DocumentAnalysisResult> {
        self.documents.lock().unwrap().clone()
    }

    pub fn merits(&self) -> Vec<CaseMeritResult> {
        self.merits.lock().unwrap().clone()
    }

    fn check_available(&self) -> Result<(), SinkError> {
        if self.fail_saves.load(Ordering::Relaxed) {
            return Err(SinkError::Unavailable("store offline".into()));
        }
        Ok(())
    }
}

impl AuditSink for RecordingSinks {
    fn record(&self, event: &AuditEvent) -> Result<(), SinkError> {
        self.audits.lock().unwrap().push(event.clone());
        Ok(())
    }
}

impl UsageSink for RecordingSinks {
    fn record_usage(&self, event: &UsageEvent) -> Result<(), SinkError> {
        self.usage.lock().unwrap().push(event.clone());
        Ok(())
    }
}

impl ResultStore for RecordingSinks {
    fn save_document_result(&self, result: &DocumentAnalysisResult) -> Result<(), SinkError> {
        self.check_available()?;
        self.documents.lock().unwrap().push(result.clone());
        Ok(())
    }

    fn save_merit_result(&self, result: &CaseMeritResult) -> Result<(), SinkError> {
        self.check_available()?;
        self.merits.lock().unwrap().push(result.clone());
        Ok(())
    }

    fn record_override(&self, record: &MeritOverride) -> Result<(), SinkError> {
        self.check_available()?;
        self.overrides.lock().unwrap().push(record.clone());
        Ok(())
    }

    fn latest_document_result(
        &self,
        document_id: &str,
    ) -> Result<Option<DocumentAnalysisResult>, SinkError> {
        Ok(self
            .documents
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|d| d.document_id == document_id)
            .cloned())
    }

    fn latest_merit_result(&self, case_id: &str) -> Result<Option<CaseMeritResult>, SinkError> {
        Ok(self
            .merits
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|m| m.case_id == case_id)
            .cloned())
    }
}
