use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::document::{DocumentAnalysisResult, DocumentRequest};
use super::merit::CaseMeritResult;

/// Structured facts about a case supplied by intake. Free text is kept out
/// on purpose: everything here may be sent to a model.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaseContext {
    /// e.g. `motor_vehicle`, `premises_liability`, `medical_malpractice`.
    pub case_type: Option<String>,
    /// Jurisdiction code, e.g. `CA`.
    pub jurisdiction: Option<String>,
    pub incident_date: Option<NaiveDate>,
    pub party_count: Option<u32>,
    /// Whether the opposing party is known to carry insurance.
    pub defendant_insured: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseRequest {
    pub case_id: String,
    pub documents: Vec<DocumentRequest>,
    #[serde(default)]
    pub context: CaseContext,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MeritStatus {
    Completed { result: Box<CaseMeritResult> },
    /// Merit can be retried without re-running document analysis.
    Pending { reason: String },
}

impl MeritStatus {
    pub fn result(&self) -> Option<&CaseMeritResult> {
        match self {
            Self::Completed { result } => Some(result),
            Self::Pending { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseAnalysisOutcome {
    pub case_id: String,
    /// In request order.
    pub documents: Vec<DocumentAnalysisResult>,
    pub documents_processed: usize,
    pub documents_succeeded: usize,
    pub merit: MeritStatus,
    pub total_cost: f64,
    pub total_tokens: u64,
    pub cancelled: bool,
}
