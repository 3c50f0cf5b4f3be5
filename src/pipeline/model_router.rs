//! Model router: tier selection and cost estimation.
//!
//! Given a task descriptor, deterministically picks the cheap or the
//! high-reasoning tier. Rules, in priority order:
//! 1. case-merit tasks always go to the high-reasoning tier
//! 2. complexity above the configured threshold goes high
//! 3. large documents and legal analysis go high
//! 4. everything else goes cheap
//!
//! Routing is a pure function of the task and the configuration. It never
//! performs I/O and cannot fail: tier config is validated at load time.

use std::sync::Arc;

use crate::config::AnalysisConfig;
use crate::models::{AnalysisTask, ModelTier, RoutingDecision, RoutingReason, TaskType};

// ──────────────────────────────────────────────
// Complexity scoring
// ──────────────────────────────────────────────

/// Facts about the request beyond its text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComplexitySignals {
    pub party_count: Option<u32>,
    pub requires_reasoning: bool,
    pub high_stakes: bool,
}

/// Pluggable complexity scorer. Must be deterministic.
pub trait ComplexityScorer: Send + Sync {
    /// Score in `0.0..=1.0`.
    fn score(&self, task_type: TaskType, text: &str, signals: &ComplexitySignals) -> f64;
}

const LEGAL_INDICATORS: &[&str] = &[
    "liability",
    "negligence",
    "causation",
    "damages",
    "statute of limitations",
    "comparative fault",
    "strict liability",
    "breach of duty",
    "proximate cause",
];

const MEDICAL_COMPLEXITY_INDICATORS: &[&str] = &[
    "differential diagnosis",
    "comorbidities",
    "prognosis",
    "treatment plan",
    "medical causation",
    "permanent impairment",
    "disability rating",
];

/// Task-type base plus bumps for length, domain vocabulary and context.
pub struct HeuristicComplexityScorer;

impl HeuristicComplexityScorer {
    fn base(task_type: TaskType) -> f64 {
        match task_type {
            TaskType::Classification => 0.2,
            TaskType::MedicalExtraction => 0.3,
            TaskType::LegalAnalysis => 0.8,
            TaskType::CaseMerit => 0.9,
        }
    }

    fn length_bump(chars: usize) -> f64 {
        if chars > 50_000 {
            0.3
        } else if chars > 20_000 {
            0.2
        } else if chars > 10_000 {
            0.1
        } else {
            0.0
        }
    }
}

impl ComplexityScorer for HeuristicComplexityScorer {
    fn score(&self, task_type: TaskType, text: &str, signals: &ComplexitySignals) -> f64 {
        let mut score = Self::base(task_type) + Self::length_bump(text.chars().count());

        let lower = text.to_lowercase();
        let legal_hits = LEGAL_INDICATORS.iter().filter(|i| lower.contains(*i)).count();
        let medical_hits = MEDICAL_COMPLEXITY_INDICATORS
            .iter()
            .filter(|i| lower.contains(*i))
            .count();
        if legal_hits >= 3 {
            score += 0.2;
        }
        if medical_hits >= 3 {
            score += 0.1;
        }

        if signals.party_count.is_some_and(|n| n > 2) {
            score += 0.1;
        }
        if signals.requires_reasoning {
            score += 0.2;
        }
        if signals.high_stakes {
            score += 0.1;
        }

        score.clamp(0.0, 1.0)
    }
}

// ──────────────────────────────────────────────
// Routing
// ──────────────────────────────────────────────

pub struct ModelRouter {
    config: Arc<AnalysisConfig>,
    scorer: Box<dyn ComplexityScorer>,
}

impl ModelRouter {
    pub fn new(config: Arc<AnalysisConfig>) -> Self {
        Self::with_scorer(config, Box::new(HeuristicComplexityScorer))
    }

    pub fn with_scorer(config: Arc<AnalysisConfig>, scorer: Box<dyn ComplexityScorer>) -> Self {
        Self { config, scorer }
    }

    /// Build a task descriptor for `text`, scoring its complexity.
    pub fn task(&self, task_type: TaskType, text: &str, signals: &ComplexitySignals) -> AnalysisTask {
        AnalysisTask {
            task_type,
            input_chars: text.chars().count(),
            complexity: self.scorer.score(task_type, text, signals),
        }
    }

    /// Pick a tier for the task.
    pub fn route(&self, task: &AnalysisTask) -> RoutingDecision {
        let routing = &self.config.routing;
        let input_tokens = self.estimate_tokens(task.input_chars);

        let (tier, reason) = if task.task_type == TaskType::CaseMerit {
            (ModelTier::HighReasoning, RoutingReason::CaseMerit)
        } else if task.complexity > routing.complexity_threshold {
            (ModelTier::HighReasoning, RoutingReason::HighComplexity)
        } else if input_tokens > routing.large_document_tokens {
            (ModelTier::HighReasoning, RoutingReason::LargeDocument)
        } else if task.task_type == TaskType::LegalAnalysis {
            (ModelTier::HighReasoning, RoutingReason::LegalAnalysis)
        } else {
            (ModelTier::Cheap, RoutingReason::Standard)
        };

        self.decision(task, tier, reason, input_tokens)
    }

    /// Decision for a tier fixed by the caller.
    pub fn route_pinned(&self, task: &AnalysisTask, tier: ModelTier) -> RoutingDecision {
        let input_tokens = self.estimate_tokens(task.input_chars);
        self.decision(task, tier, RoutingReason::Pinned, input_tokens)
    }

    pub fn estimate_tokens(&self, chars: usize) -> u64 {
        (chars as f64 / self.config.routing.chars_per_token).ceil() as u64
    }

    /// USD for the given token counts on a tier.
    pub fn estimate_cost(&self, tier: ModelTier, input_tokens: u64, output_tokens: u64) -> f64 {
        let prices = self.config.tiers.get(tier);
        input_tokens as f64 / 1000.0 * prices.input_price_per_1k
            + output_tokens as f64 / 1000.0 * prices.output_price_per_1k
    }

    fn decision(
        &self,
        task: &AnalysisTask,
        tier: ModelTier,
        reason: RoutingReason,
        input_tokens: u64,
    ) -> RoutingDecision {
        let output_tokens = self.config.routing.output_tokens.for_task(task.task_type);
        RoutingDecision {
            task_type: task.task_type,
            tier,
            model_id: self.config.tiers.get(tier).model_id.clone(),
            reason,
            complexity: task.complexity,
            estimated_input_tokens: input_tokens,
            estimated_output_tokens: output_tokens,
            estimated_cost: self.estimate_cost(tier, input_tokens, output_tokens),
        }
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
