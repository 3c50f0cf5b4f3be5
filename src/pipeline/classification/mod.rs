//! Document classification.
//!
//! Three strategies share the [`Classifier`] trait: a routed model call,
//! a keyword ruleset, and a wrapper that falls back from the first to the
//! second only when the first fails.

pub mod keywords;
pub mod strategies;

pub use strategies::*;

use async_trait::async_trait;
use thiserror::Error;

use super::llm::{CallContext, ModelError};
use super::redaction::RedactedText;
use crate::models::{Classification, DocumentType};

#[derive(Error, Debug)]
pub enum ClassificationError {
    #[error("Classifier reply could not be used: {0}")]
    Unparseable(String),

    #[error("Classifier model call failed: {0}")]
    Model(ModelError),

    #[error("Classification cancelled")]
    Cancelled,
}

impl From<ModelError> for ClassificationError {
    fn from(e: ModelError) -> Self {
        match e {
            ModelError::Cancelled => Self::Cancelled,
            ModelError::MalformedResponse(reason) => Self::Unparseable(reason),
            other => Self::Model(other),
        }
    }
}

#[async_trait]
pub trait Classifier: Send + Sync {
    /// Label a redacted document. `hint` is the uploader's guess and is
    /// never taken as the answer.
    async fn classify(
        &self,
        text: &RedactedText,
        hint: Option<DocumentType>,
        ctx: &CallContext,
    ) -> Result<Classification, ClassificationError>;
}
