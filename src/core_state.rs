//! Wired application state.
//!
//! `CoreState` builds every pipeline component once from an
//! [`AnalysisConfig`] and shares them behind `Arc`. The SQLite store plays
//! all three sink roles: results, audit and usage.

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;
use zeroize::Zeroizing;

use crate::config::{AnalysisConfig, ConfigError, DB_KEY_ENV_VAR};
use crate::db::{open_memory_store, DatabaseError, SqliteStore};
use crate::models::{MeritOverride, Recommendation};
use crate::pipeline::case_runner::CaseAnalysisRunner;
use crate::pipeline::extraction::{FsDocumentStore, PlainTextOcr};
use crate::pipeline::llm::{HttpModelClient, ModelError, ModelGateway, TierClients};
use crate::pipeline::merit::{record_override, MeritAggregator};
use crate::pipeline::processor::DocumentProcessor;
use crate::pipeline::redaction::{PhiRedactor, RedactionError};
use crate::pipeline::traits::{
    AuditSink, DocumentStore, OcrEngine, ResultStore, SinkError, UsageSink,
};

#[derive(Error, Debug)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error(transparent)]
    Redaction(#[from] RedactionError),

    #[error(transparent)]
    Model(#[from] ModelError),
}

#[derive(Error, Debug)]
pub enum OverrideError {
    #[error("No merit result recorded for case {0}")]
    NoMeritResult(String),

    #[error(transparent)]
    Sink(#[from] SinkError),
}

pub struct CoreState {
    pub config: Arc<AnalysisConfig>,
    pub store: Arc<SqliteStore>,
    pub redactor: Arc<PhiRedactor>,
    pub runner: CaseAnalysisRunner,
}

impl CoreState {
    /// Build with HTTP model clients for both tiers.
    pub fn build(config: AnalysisConfig) -> Result<Self, StartupError> {
        let clients = TierClients {
            cheap: Arc::new(HttpModelClient::new(&config.tiers.cheap)?),
            high_reasoning: Arc::new(HttpModelClient::new(&config.tiers.high_reasoning)?),
        };
        Self::with_clients(config, clients)
    }

    pub fn with_clients(config: AnalysisConfig, clients: TierClients) -> Result<Self, StartupError> {
        config.validate()?;
        let config = Arc::new(config);

        let db_key = std::env::var(DB_KEY_ENV_VAR).ok().map(Zeroizing::new);
        let store = Arc::new(match (&config.database_path, &db_key) {
            (Some(path), Some(key)) => SqliteStore::open_encrypted(path, key)?,
            (Some(path), None) => {
                tracing::warn!("No database key set, OCR text will not be stored");
                SqliteStore::open(path)?
            }
            (None, _) => open_memory_store()?,
        });
        let redactor = Arc::new(PhiRedactor::new(&config.redaction)?);
        let audit = Arc::clone(&store) as Arc<dyn AuditSink>;
        let results = Arc::clone(&store) as Arc<dyn ResultStore>;

        let gateway = Arc::new(ModelGateway::new(
            Arc::clone(&config),
            clients,
            Arc::clone(&audit),
            Arc::clone(&store) as Arc<dyn UsageSink>,
        ));
        let root = config
            .document_root
            .clone()
            .unwrap_or_else(|| PathBuf::from("."));
        let documents: Arc<dyn DocumentStore> = Arc::new(FsDocumentStore::new(root));
        let ocr: Arc<dyn OcrEngine> = Arc::new(PlainTextOcr);

        let processor = Arc::new(DocumentProcessor::new(
            Arc::clone(&gateway),
            Arc::clone(&redactor),
            documents,
            ocr,
            Arc::clone(&results),
            Arc::clone(&audit),
        ));
        let merit = Arc::new(MeritAggregator::new(gateway, Arc::clone(&redactor), audit));
        let runner = CaseAnalysisRunner::new(Arc::clone(&config), processor, merit, results);

        let database = config
            .database_path
            .as_deref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "memory".into());
        tracing::info!(
            database = database.as_str(),
            pool = config.concurrency.document_pool_size,
            "Core state ready"
        );

        Ok(Self {
            config,
            store,
            redactor,
            runner,
        })
    }

    /// Record a reviewer decision against the latest merit result of a case.
    pub fn override_latest(
        &self,
        case_id: &str,
        reviewer: &str,
        decision: Recommendation,
        rationale: &str,
    ) -> Result<MeritOverride, OverrideError> {
        let latest = self
            .store
            .latest_merit_result(case_id)?
            .ok_or_else(|| OverrideError::NoMeritResult(case_id.to_string()))?;
        Ok(record_override(
            self.store.as_ref(),
            self.store.as_ref(),
            &latest,
            reviewer,
            decision,
            rationale,
        )?)
    }
}
