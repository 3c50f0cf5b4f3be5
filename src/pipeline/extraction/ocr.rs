use async_trait::async_trait;

use super::{OcrError, OcrOutput};
use crate::pipeline::traits::OcrEngine;

/// Confidence reported for a page read from a digital text layer.
const TEXT_LAYER_CONFIDENCE: f64 = 0.99;

/// Page separator in plain-text exports.
const PAGE_BREAK: char = '\u{000C}';

/// OCR engine for documents that already carry text (UTF-8 exports,
/// e-filed correspondence). Pages are split on form feeds.
pub struct PlainTextOcr;

#[async_trait]
impl OcrEngine for PlainTextOcr {
    async fn extract(&self, bytes: &[u8], file_reference: &str) -> Result<OcrOutput, OcrError> {
        let text = std::str::from_utf8(bytes).map_err(|e| OcrError::Encoding(e.to_string()))?;
        let text = sanitize_extracted_text(text);
        if text.trim().is_empty() {
            return Err(OcrError::EmptyDocument);
        }

        let per_page_confidence: Vec<f64> = text
            .split(PAGE_BREAK)
            .map(|page| {
                if page.trim().is_empty() {
                    0.0
                } else {
                    TEXT_LAYER_CONFIDENCE
                }
            })
            .collect();

        tracing::debug!(
            file_reference,
            pages = per_page_confidence.len(),
            "Plain-text OCR complete"
        );

        Ok(OcrOutput {
            text,
            per_page_confidence,
        })
    }
}

/// Drop control characters other than newlines, tabs and page breaks,
/// and normalise line endings.
pub fn sanitize_extracted_text(text: &str) -> String {
    text.replace("\r\n", "\n")
        .chars()
        .filter(|c| !c.is_control() || matches!(*c, '\n' | '\t' | PAGE_BREAK))
        .collect()
}
