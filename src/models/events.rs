use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{AuditAction, ModelTier, Recommendation, SubAnalysis, TaskType};
use super::routing::RoutingDecision;

/// Which case/document an event belongs to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditScope {
    pub case_id: Option<String>,
    pub document_id: Option<String>,
}

impl AuditScope {
    pub fn document(case_id: Option<&str>, document_id: &str) -> Self {
        Self {
            case_id: case_id.map(str::to_string),
            document_id: Some(document_id.to_string()),
        }
    }

    pub fn case(case_id: &str) -> Self {
        Self {
            case_id: Some(case_id.to_string()),
            document_id: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AuditDetail {
    /// PHI category → count. Never values.
    CategoryCounts { categories: BTreeMap<String, usize> },
    Routing { decision: RoutingDecision },
    Failure { step: SubAnalysis, reason: String },
    Override {
        merit_result_id: Uuid,
        decision: Recommendation,
    },
}

/// Append-only compliance record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub action: AuditAction,
    pub scope: AuditScope,
    pub detail: AuditDetail,
    pub timestamp: DateTime<Utc>,
}

impl AuditEvent {
    pub fn new(action: AuditAction, scope: AuditScope, detail: AuditDetail) -> Self {
        Self {
            action,
            scope,
            detail,
            timestamp: Utc::now(),
        }
    }
}

/// Emitted once per routed model call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageEvent {
    pub task_type: TaskType,
    pub model_tier: ModelTier,
    pub model_id: String,
    pub tokens: u64,
    pub estimated_cost: f64,
    pub case_id: Option<String>,
    pub document_id: Option<String>,
    pub succeeded: bool,
    pub recorded_at: DateTime<Utc>,
}
