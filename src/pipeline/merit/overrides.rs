use crate::models::{
    AuditAction, AuditDetail, AuditEvent, AuditScope, CaseMeritResult, MeritOverride,
    Recommendation,
};
use crate::pipeline::traits::{AuditSink, ResultStore, SinkError};

/// Record a reviewer's decision next to a computed merit result.
///
/// The computed result is never changed. The override is stored and audited;
/// a failed audit write is logged and does not undo the stored override.
pub fn record_override(
    store: &dyn ResultStore,
    audit: &dyn AuditSink,
    result: &CaseMeritResult,
    reviewer: &str,
    decision: Recommendation,
    rationale: &str,
) -> Result<MeritOverride, SinkError> {
    let record = MeritOverride::new(result, reviewer, decision, rationale);
    store.record_override(&record)?;

    let event = AuditEvent::new(
        AuditAction::MeritOverride,
        AuditScope::case(&result.case_id),
        AuditDetail::Override {
            merit_result_id: result.result_id,
            decision,
        },
    );
    if let Err(e) = audit.record(&event) {
        tracing::error!(case_id = %result.case_id, error = %e, "Failed to audit merit override");
    }

    tracing::info!(
        case_id = %result.case_id,
        computed = result.recommendation.as_str(),
        decision = decision.as_str(),
        "Merit override recorded"
    );
    Ok(record)
}
