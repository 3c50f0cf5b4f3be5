//! Per-case spend tracking.
//!
//! Every routed model call adds its cost and tokens here. Counters are
//! atomic so concurrent document tasks can share one ledger without a lock.
//! The budget is soft: crossing a ratio logs once, it never blocks a call.

use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;

use crate::config::CostConfig;

/// Spend is stored in micro-dollars to keep the counter integral.
const MICROS_PER_USD: f64 = 1_000_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum BudgetLevel {
    Normal = 0,
    Warning = 1,
    Critical = 2,
}

#[derive(Debug)]
pub struct CostLedger {
    micro_usd: AtomicU64,
    tokens: AtomicU64,
    calls: AtomicU64,
    budget_usd: Option<f64>,
    warning_ratio: f64,
    critical_ratio: f64,
    /// Highest level already reported.
    reported: AtomicU8,
    /// Ledger that also receives every record, e.g. the case for a document.
    parent: Option<Arc<CostLedger>>,
}

impl CostLedger {
    pub fn new(config: &CostConfig) -> Self {
        Self {
            micro_usd: AtomicU64::new(0),
            tokens: AtomicU64::new(0),
            calls: AtomicU64::new(0),
            budget_usd: config.case_budget_usd,
            warning_ratio: config.warning_ratio,
            critical_ratio: config.critical_ratio,
            reported: AtomicU8::new(BudgetLevel::Normal as u8),
            parent: None,
        }
    }

    /// A budget-less ledger whose records also land in `parent`.
    pub fn child(parent: &Arc<CostLedger>) -> Self {
        Self {
            parent: Some(Arc::clone(parent)),
            ..Self::unbounded()
        }
    }

    /// A ledger without a budget.
    pub fn unbounded() -> Self {
        Self::new(&CostConfig {
            case_budget_usd: None,
            ..CostConfig::default()
        })
    }

    pub fn record(&self, cost_usd: f64, tokens: u64, scope: &str) {
        let micros = (cost_usd.max(0.0) * MICROS_PER_USD).round() as u64;
        self.micro_usd.fetch_add(micros, Ordering::Relaxed);
        self.tokens.fetch_add(tokens, Ordering::Relaxed);
        self.calls.fetch_add(1, Ordering::Relaxed);

        let level = self.level();
        let previous = self.reported.fetch_max(level as u8, Ordering::Relaxed);
        if (level as u8) > previous {
            let spent = self.total_cost();
            let budget = self.budget_usd.unwrap_or_default();
            match level {
                BudgetLevel::Critical => tracing::warn!(
                    scope,
                    spent_usd = spent,
                    budget_usd = budget,
                    "Case spend crossed the critical budget ratio"
                ),
                BudgetLevel::Warning => tracing::warn!(
                    scope,
                    spent_usd = spent,
                    budget_usd = budget,
                    "Case spend crossed the warning budget ratio"
                ),
                BudgetLevel::Normal => {}
            }
        }

        if let Some(parent) = &self.parent {
            parent.record(cost_usd, tokens, scope);
        }
    }

    pub fn total_cost(&self) -> f64 {
        self.micro_usd.load(Ordering::Relaxed) as f64 / MICROS_PER_USD
    }

    pub fn total_tokens(&self) -> u64 {
        self.tokens.load(Ordering::Relaxed)
    }

    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }

    pub fn level(&self) -> BudgetLevel {
        let Some(budget) = self.budget_usd else {
            return BudgetLevel::Normal;
        };
        let used = self.total_cost() / budget;
        if used >= self.critical_ratio {
            BudgetLevel::Critical
        } else if used >= self.warning_ratio {
            BudgetLevel::Warning
        } else {
            BudgetLevel::Normal
        }
    }
}
