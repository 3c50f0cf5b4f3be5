use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::enums::{LiabilityStrength, Severity, StatuteUnknownReason, Urgency};
use super::routing::RoutingDecision;

/// Result of a specialist analysis.
///
/// `Partial` carries valid but possibly empty findings; `Failed` carries none.
/// Consumers must never treat a `Failed` outcome as an empty success.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AnalysisOutcome<T> {
    Completed {
        findings: T,
        routing: RoutingDecision,
    },
    Partial {
        findings: T,
        routing: RoutingDecision,
        reason: String,
    },
    Failed {
        routing: Option<RoutingDecision>,
        reason: String,
    },
}

impl<T> AnalysisOutcome<T> {
    pub fn findings(&self) -> Option<&T> {
        match self {
            Self::Completed { findings, .. } | Self::Partial { findings, .. } => Some(findings),
            Self::Failed { .. } => None,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    pub fn status(&self) -> &'static str {
        match self {
            Self::Completed { .. } => "completed",
            Self::Partial { .. } => "partial",
            Self::Failed { .. } => "failed",
        }
    }

    /// Why the outcome is degraded, if it is.
    pub fn degradation_reason(&self) -> Option<&str> {
        match self {
            Self::Completed { .. } => None,
            Self::Partial { reason, .. } | Self::Failed { reason, .. } => Some(reason),
        }
    }

    pub fn routing(&self) -> Option<&RoutingDecision> {
        match self {
            Self::Completed { routing, .. } | Self::Partial { routing, .. } => Some(routing),
            Self::Failed { routing, .. } => routing.as_ref(),
        }
    }
}

// ─── Medical ─────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineEvent {
    pub date: NaiveDate,
    pub event: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MedicalFindings {
    pub diagnoses: Vec<String>,
    pub procedures: Vec<String>,
    pub medications: Vec<String>,
    pub treatment_dates: Vec<NaiveDate>,
    pub providers: Vec<String>,
    pub specialty: Option<String>,
    pub severity: Option<Severity>,
    /// USD amounts billed or quoted for treatment.
    pub treatment_costs: Vec<f64>,
    /// Sorted by date.
    pub timeline: Vec<TimelineEvent>,
    pub ongoing_care: bool,
}

impl MedicalFindings {
    pub fn total_costs(&self) -> f64 {
        self.treatment_costs.iter().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.diagnoses.is_empty()
            && self.procedures.is_empty()
            && self.medications.is_empty()
            && self.treatment_costs.is_empty()
            && self.severity.is_none()
    }
}

// ─── Legal ───────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegalTheory {
    pub name: String,
    pub rationale: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiabilityAssessment {
    pub strength: LiabilityStrength,
    /// Short quotes or paraphrases from the (redacted) document.
    pub evidence: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementFactors {
    pub comparable: Vec<String>,
    pub aggravating: Vec<String>,
    pub mitigating: Vec<String>,
}

/// Statute-of-limitations deadline, or a reason it could not be computed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StatuteOfLimitations {
    Computed {
        jurisdiction: String,
        case_type: String,
        incident_date: NaiveDate,
        period_months: u32,
        deadline: NaiveDate,
    },
    Unknown {
        reason: StatuteUnknownReason,
    },
}

impl StatuteOfLimitations {
    pub fn deadline(&self) -> Option<NaiveDate> {
        match self {
            Self::Computed { deadline, .. } => Some(*deadline),
            Self::Unknown { .. } => None,
        }
    }

    /// Expired, urgent (under 90 days left) or active as of `today`.
    pub fn urgency(&self, today: NaiveDate) -> Urgency {
        match self.deadline() {
            None => Urgency::Unknown,
            Some(deadline) => {
                let days_left = (deadline - today).num_days();
                if days_left < 0 {
                    Urgency::Expired
                } else if days_left < 90 {
                    Urgency::Urgent
                } else {
                    Urgency::Active
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegalFindings {
    pub theories: Vec<LegalTheory>,
    pub liability: LiabilityAssessment,
    pub statute_of_limitations: StatuteOfLimitations,
    pub damages_factors: Vec<String>,
    pub settlement_factors: SettlementFactors,
    pub party_count: Option<u32>,
    /// Incident date as stated in the document, when one was found.
    pub incident_date: Option<NaiveDate>,
}
