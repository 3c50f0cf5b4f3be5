//! Document bytes and text: the storage read and OCR collaborators.
//!
//! The OCR algorithm itself is out of scope; engines only have to return
//! text plus a per-page confidence.

pub mod ocr;
pub mod storage;

pub use ocr::*;
pub use storage::*;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Document not found: {0}")]
    NotFound(String),

    #[error("File reference escapes the document root: {0}")]
    InvalidReference(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum OcrError {
    #[error("Text encoding error: {0}")]
    Encoding(String),

    #[error("No text could be extracted")]
    EmptyDocument,

    #[error("OCR engine failed: {0}")]
    Engine(String),
}

/// Text recognised from a document, one confidence per page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcrOutput {
    pub text: String,
    pub per_page_confidence: Vec<f64>,
}

impl OcrOutput {
    /// Mean page confidence, 0.0 for a document without pages.
    pub fn mean_confidence(&self) -> f64 {
        if self.per_page_confidence.is_empty() {
            return 0.0;
        }
        self.per_page_confidence.iter().sum::<f64>() / self.per_page_confidence.len() as f64
    }

    /// Pages below the given confidence, 1-based.
    pub fn low_confidence_pages(&self, threshold: f64) -> Vec<usize> {
        self.per_page_confidence
            .iter()
            .enumerate()
            .filter(|(_, c)| **c < threshold)
            .map(|(i, _)| i + 1)
            .collect()
    }
}
