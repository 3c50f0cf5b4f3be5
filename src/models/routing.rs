use serde::{Deserialize, Serialize};

use super::enums::{ModelTier, RoutingReason, TaskType};

/// A unit of work to route: what kind of task, how large, how hard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisTask {
    pub task_type: TaskType,
    pub input_chars: usize,
    /// 0.0 (trivial) to 1.0 (hardest).
    pub complexity: f64,
}

/// The router's choice for one model call, kept on every result for audit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingDecision {
    pub task_type: TaskType,
    pub tier: ModelTier,
    pub model_id: String,
    pub reason: RoutingReason,
    pub complexity: f64,
    pub estimated_input_tokens: u64,
    pub estimated_output_tokens: u64,
    /// USD, from the tier price table.
    pub estimated_cost: f64,
}

impl RoutingDecision {
    pub fn estimated_tokens(&self) -> u64 {
        self.estimated_input_tokens + self.estimated_output_tokens
    }
}
