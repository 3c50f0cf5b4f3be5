use chrono::{Months, NaiveDate};

use crate::config::AnalysisConfig;
use crate::models::{CaseContext, StatuteOfLimitations, StatuteUnknownReason};

/// Deadline from the configured period table.
///
/// The incident date comes from the case context, or from the document when
/// the context has none. A missing date, jurisdiction or case type yields
/// `Unknown` with the reason; no default period is ever assumed.
pub fn compute_statute(
    config: &AnalysisConfig,
    context: Option<&CaseContext>,
    reported_incident: Option<NaiveDate>,
) -> StatuteOfLimitations {
    let unknown = |reason| StatuteOfLimitations::Unknown { reason };

    let Some(incident_date) = context.and_then(|c| c.incident_date).or(reported_incident) else {
        return unknown(StatuteUnknownReason::MissingIncidentDate);
    };
    let Some(jurisdiction) = context
        .and_then(|c| c.jurisdiction.as_deref())
        .filter(|j| config.has_jurisdiction(j))
    else {
        return unknown(StatuteUnknownReason::UnknownJurisdiction);
    };
    let Some((case_type, period_months)) = context
        .and_then(|c| c.case_type.as_deref())
        .and_then(|ct| config.statute_months(jurisdiction, ct).map(|m| (ct, m)))
    else {
        return unknown(StatuteUnknownReason::UnsupportedCaseType);
    };
    let Some(deadline) = incident_date.checked_add_months(Months::new(period_months)) else {
        return unknown(StatuteUnknownReason::UnsupportedCaseType);
    };

    StatuteOfLimitations::Computed {
        jurisdiction: jurisdiction.trim().to_ascii_uppercase(),
        case_type: case_type.trim().to_ascii_lowercase(),
        incident_date,
        period_months,
        deadline,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Urgency;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn context(jurisdiction: &str, case_type: &str, incident: Option<NaiveDate>) -> CaseContext {
        CaseContext {
            case_type: Some(case_type.into()),
            jurisdiction: Some(jurisdiction.into()),
            incident_date: incident,
            ..CaseContext::default()
        }
    }

    #[test]
    fn computes_deadline_from_table() {
        let config = AnalysisConfig::with_defaults();
        let ctx = context("ca", "motor_vehicle", Some(date(2024, 1, 31)));
        let statute = compute_statute(&config, Some(&ctx), None);
        match &statute {
            StatuteOfLimitations::Computed {
                jurisdiction,
                period_months,
                deadline,
                ..
            } => {
                assert_eq!(jurisdiction, "CA");
                assert_eq!(*period_months, 24);
                assert_eq!(*deadline, date(2026, 1, 31));
            }
            other => panic!("expected computed, got {other:?}"),
        }
        assert_eq!(statute.urgency(date(2025, 12, 1)), Urgency::Urgent);
        assert_eq!(statute.urgency(date(2026, 2, 1)), Urgency::Expired);
        assert_eq!(statute.urgency(date(2024, 6, 1)), Urgency::Active);
    }

    #[test]
    fn reported_date_used_when_context_has_none() {
        let config = AnalysisConfig::with_defaults();
        let ctx = context("NY", "medical_malpractice", None);
        let statute = compute_statute(&config, Some(&ctx), Some(date(2023, 5, 1)));
        assert_eq!(statute.deadline(), Some(date(2025, 11, 1)));
    }

    #[test]
    fn context_date_wins_over_reported() {
        let config = AnalysisConfig::with_defaults();
        let ctx = context("TX", "personal_injury", Some(date(2022, 3, 1)));
        let statute = compute_statute(&config, Some(&ctx), Some(date(2023, 1, 1)));
        assert_eq!(statute.deadline(), Some(date(2024, 3, 1)));
    }

    #[test]
    fn unknown_reasons() {
        let config = AnalysisConfig::with_defaults();
        let reason = |s: StatuteOfLimitations| match s {
            StatuteOfLimitations::Unknown { reason } => reason,
            other => panic!("expected unknown, got {other:?}"),
        };

        assert_eq!(
            reason(compute_statute(&config, None, None)),
            StatuteUnknownReason::MissingIncidentDate
        );
        let ctx = context("ZZ", "motor_vehicle", Some(date(2024, 1, 1)));
        assert_eq!(
            reason(compute_statute(&config, Some(&ctx), None)),
            StatuteUnknownReason::UnknownJurisdiction
        );
        let ctx = context("CA", "maritime", Some(date(2024, 1, 1)));
        assert_eq!(
            reason(compute_statute(&config, Some(&ctx), None)),
            StatuteUnknownReason::UnsupportedCaseType
        );
        assert_eq!(
            reason(compute_statute(&config, None, Some(date(2024, 1, 1)))),
            StatuteUnknownReason::UnknownJurisdiction
        );
    }
}
