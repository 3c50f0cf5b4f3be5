use super::scoring::CaseEvidence;
use crate::config::SettlementConfig;
use crate::models::{LiabilityStrength, SettlementBasis, SettlementRange};

/// Case type for the multiplier table: the intake case type, else one
/// inferred from the leading theory.
fn settlement_case_type(evidence: &CaseEvidence) -> String {
    if let Some(case_type) = evidence.context.case_type.as_deref() {
        return case_type.trim().to_ascii_lowercase();
    }
    let leading = evidence
        .legal
        .iter()
        .flat_map(|l| l.theories.first())
        .map(|t| t.name.to_lowercase())
        .next()
        .unwrap_or_default();
    if leading.contains("medical") || leading.contains("malpractice") {
        "medical_malpractice".to_string()
    } else if leading.contains("premises") {
        "premises_liability".to_string()
    } else if leading.contains("product") {
        "product_liability".to_string()
    } else {
        "motor_vehicle".to_string()
    }
}

/// Bucket for the liability adjustment table.
pub fn liability_bucket(evidence: &CaseEvidence, liability_score: f64) -> &'static str {
    if evidence.legal.is_empty() {
        "unknown"
    } else if liability_score >= 75.0 {
        LiabilityStrength::Strong.as_str()
    } else if liability_score >= 50.0 {
        LiabilityStrength::Moderate.as_str()
    } else {
        LiabilityStrength::Weak.as_str()
    }
}

/// Low / likely / high settlement estimate in whole dollars.
///
/// Treatment costs are scaled by the case-type multipliers; without costs
/// the severity range is used as is. Either way the liability adjustment
/// applies. With neither costs nor severity the range is zero.
pub fn estimate_settlement(
    config: &SettlementConfig,
    evidence: &CaseEvidence,
    liability_score: f64,
) -> SettlementRange {
    let case_type = settlement_case_type(evidence);
    let adjustment = config.liability_factor(liability_bucket(evidence, liability_score));

    let total = evidence.total_costs();
    let (low, likely, high, basis) = if total > 0.0 {
        let m = config
            .multipliers
            .get(&case_type)
            .copied()
            .unwrap_or(config.default_multiplier);
        (
            total * m.low,
            total * m.likely,
            total * m.high,
            SettlementBasis::TreatmentCosts { total },
        )
    } else if let Some((severity, range)) = evidence
        .worst_severity()
        .and_then(|s| config.severity_fallback.get(s.as_str()).map(|r| (s, r)))
    {
        (
            range.low,
            range.likely,
            range.high,
            SettlementBasis::SeverityFallback { severity },
        )
    } else {
        (0.0, 0.0, 0.0, SettlementBasis::NoDamagesData)
    };

    SettlementRange {
        low: (low * adjustment).round(),
        likely: (likely * adjustment).round(),
        high: (high * adjustment).round(),
        case_type,
        basis,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        CaseContext, LegalFindings, LegalTheory, LiabilityAssessment, MedicalFindings, Severity,
        SettlementFactors, StatuteOfLimitations, StatuteUnknownReason,
    };

    fn legal(theory: &str) -> LegalFindings {
        LegalFindings {
            theories: vec![LegalTheory {
                name: theory.into(),
                rationale: String::new(),
            }],
            liability: LiabilityAssessment {
                strength: LiabilityStrength::Strong,
                evidence: vec![],
            },
            statute_of_limitations: StatuteOfLimitations::Unknown {
                reason: StatuteUnknownReason::UnknownJurisdiction,
            },
            damages_factors: vec![],
            settlement_factors: SettlementFactors::default(),
            party_count: None,
            incident_date: None,
        }
    }

    fn evidence<'a>(
        context: &'a CaseContext,
        medical: Vec<&'a MedicalFindings>,
        legal: Vec<&'a LegalFindings>,
    ) -> CaseEvidence<'a> {
        CaseEvidence {
            context,
            medical,
            legal,
            document_types: vec![],
            documents_processed: 1,
            documents_succeeded: 1,
        }
    }

    #[test]
    fn costs_scaled_by_case_type_and_liability() {
        let config = SettlementConfig::default();
        let context = CaseContext {
            case_type: Some("Motor_Vehicle".into()),
            ..CaseContext::default()
        };
        let medical = MedicalFindings {
            treatment_costs: vec![8_000.0, 2_000.0],
            ..Default::default()
        };
        let finding = legal("negligence");
        let range = estimate_settlement(&config, &evidence(&context, vec![&medical], vec![&finding]), 65.0);
        assert_eq!(range.case_type, "motor_vehicle");
        assert_eq!((range.low, range.likely, range.high), (12_000.0, 24_000.0, 40_000.0));
        assert_eq!(range.basis, SettlementBasis::TreatmentCosts { total: 10_000.0 });
    }

    #[test]
    fn severity_fallback_without_costs() {
        let config = SettlementConfig::default();
        let context = CaseContext::default();
        let medical = MedicalFindings {
            severity: Some(Severity::Severe),
            ..Default::default()
        };
        let finding = legal("premises liability");
        let range = estimate_settlement(&config, &evidence(&context, vec![&medical], vec![&finding]), 85.0);
        assert_eq!(range.case_type, "premises_liability");
        assert_eq!(range.likely, 150_000.0);
        assert_eq!(
            range.basis,
            SettlementBasis::SeverityFallback {
                severity: Severity::Severe
            }
        );
    }

    #[test]
    fn no_damages_is_zero_range() {
        let config = SettlementConfig::default();
        let context = CaseContext::default();
        let range = estimate_settlement(&config, &evidence(&context, vec![], vec![]), 50.0);
        assert_eq!((range.low, range.likely, range.high), (0.0, 0.0, 0.0));
        assert_eq!(range.basis, SettlementBasis::NoDamagesData);
        assert_eq!(range.case_type, "motor_vehicle");
    }

    #[test]
    fn missing_bucket_uses_configured_default() {
        let mut config = SettlementConfig::default();
        config.liability_adjustment.remove("moderate");
        config.default_liability_adjustment = 0.5;
        let context = CaseContext::default();
        let medical = MedicalFindings {
            treatment_costs: vec![10_000.0],
            ..Default::default()
        };
        let finding = legal("negligence");
        let range = estimate_settlement(&config, &evidence(&context, vec![&medical], vec![&finding]), 60.0);
        assert_eq!(range.likely, 15_000.0);
    }

    #[test]
    fn unknown_liability_bucket_without_legal() {
        let context = CaseContext::default();
        assert_eq!(liability_bucket(&evidence(&context, vec![], vec![]), 90.0), "unknown");
    }
}
