use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::enums::{
    ClassificationMethod, DocumentStatus, DocumentType, OcrQuality, PipelineStage, SubAnalysis,
};
use super::findings::{AnalysisOutcome, LegalFindings, MedicalFindings};
use super::routing::RoutingDecision;

/// One document to analyse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRequest {
    pub document_id: String,
    /// Opaque reference resolved by the document store.
    pub file_reference: String,
    /// Uploader's guess at the document type. Never trusted as a label.
    #[serde(default)]
    pub document_type_hint: Option<DocumentType>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub label: DocumentType,
    /// 0.0 to 1.0.
    pub confidence: f64,
    pub method: ClassificationMethod,
    pub needs_review: bool,
    /// Present when a model was called.
    pub routing: Option<RoutingDecision>,
    /// Why the primary strategy was abandoned, when it was.
    pub fallback_reason: Option<String>,
}

/// A sub-analysis that degraded without failing the document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisIssue {
    pub step: SubAnalysis,
    pub reason: String,
}

/// Where and why a document pipeline stopped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageFailure {
    pub step: SubAnalysis,
    /// Last stage reached before the failing step.
    pub stage: PipelineStage,
    pub message: String,
    pub cancelled: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentAnalysisResult {
    pub document_id: String,
    pub case_id: Option<String>,
    pub ocr_text: Option<String>,
    pub ocr_confidence: Option<f64>,
    pub ocr_quality: Option<OcrQuality>,
    /// PHI category → number of redactions. Counts only.
    pub phi_categories: BTreeMap<String, usize>,
    pub classification: Option<Classification>,
    pub medical: Option<AnalysisOutcome<MedicalFindings>>,
    pub legal: Option<AnalysisOutcome<LegalFindings>>,
    pub summary: Option<String>,
    pub status: DocumentStatus,
    pub stage: PipelineStage,
    pub failure: Option<StageFailure>,
    /// Steps that ran, in order.
    pub performed: Vec<SubAnalysis>,
    pub issues: Vec<AnalysisIssue>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub duration_ms: Option<u64>,
    /// USD across every model call made for this document.
    pub estimated_cost: f64,
}

impl DocumentAnalysisResult {
    pub fn pending(request: &DocumentRequest, case_id: Option<&str>) -> Self {
        Self {
            document_id: request.document_id.clone(),
            case_id: case_id.map(str::to_string),
            ocr_text: None,
            ocr_confidence: None,
            ocr_quality: None,
            phi_categories: BTreeMap::new(),
            classification: None,
            medical: None,
            legal: None,
            summary: None,
            status: DocumentStatus::Pending,
            stage: PipelineStage::Pending,
            failure: None,
            performed: Vec::new(),
            issues: Vec::new(),
            started_at: Utc::now(),
            completed_at: None,
            duration_ms: None,
            estimated_cost: 0.0,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status != DocumentStatus::Pending
    }

    pub fn succeeded(&self) -> bool {
        self.status == DocumentStatus::Completed
    }

    pub fn document_type(&self) -> Option<DocumentType> {
        self.classification.as_ref().map(|c| c.label)
    }
}
