//! Model access.
//!
//! `ModelClient` is the seam to a concrete model endpoint. Analysers never
//! hold a client directly: every call goes through [`ModelGateway`], which
//! applies the tier pool, timeout, retry, cancellation, usage and audit
//! bookkeeping in one place.

pub mod gateway;
pub mod http;
#[cfg(test)]
pub mod mock;
pub mod response;
pub mod sanitize;

pub use gateway::*;
pub use http::*;
pub use response::*;
pub use sanitize::*;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::TaskType;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("Cannot connect to model endpoint at {0}")]
    Connection(String),

    #[error("Model endpoint returned {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Model endpoint rate limited the request")]
    RateLimited,

    #[error("Model call timed out after {0}s")]
    Timeout(u64),

    #[error("Model call cancelled")]
    Cancelled,

    #[error("Malformed model response: {0}")]
    MalformedResponse(String),

    #[error("API key variable {0} is not set")]
    MissingApiKey(String),

    #[error("HTTP client error: {0}")]
    Transport(String),
}

impl ModelError {
    /// Whether backing off and trying again can help.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::RateLimited | Self::Connection(_) | Self::Transport(_) => true,
            Self::Http { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

/// One chat completion request. `task` travels with the request so
/// logs and test doubles can tell calls apart.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelRequest {
    pub task: TaskType,
    pub model_id: String,
    pub system: String,
    pub prompt: String,
    pub max_tokens: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModelResponse {
    pub content: String,
    /// Token counts reported by the endpoint, when it reports them.
    pub input_tokens: Option<u64>,
    pub output_tokens: Option<u64>,
}

impl ModelResponse {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            input_tokens: None,
            output_tokens: None,
        }
    }
}

#[async_trait]
pub trait ModelClient: Send + Sync {
    async fn complete(&self, request: &ModelRequest) -> Result<ModelResponse, ModelError>;
}
