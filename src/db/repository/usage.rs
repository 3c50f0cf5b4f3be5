use rusqlite::{params, Connection};
use serde::Serialize;

use super::audit::format_timestamp;
use crate::db::DatabaseError;
use crate::models::UsageEvent;

/// Aggregated model usage for a case.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UsageTotals {
    pub calls: u64,
    pub failed_calls: u64,
    pub tokens: u64,
    pub estimated_cost: f64,
}

pub fn insert_usage_event(conn: &Connection, event: &UsageEvent) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO usage_log
            (recorded_at, task_type, model_tier, model_id, tokens, estimated_cost, case_id, document_id, succeeded)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            format_timestamp(&event.recorded_at),
            event.task_type.as_str(),
            event.model_tier.as_str(),
            event.model_id,
            event.tokens as i64,
            event.estimated_cost,
            event.case_id,
            event.document_id,
            event.succeeded,
        ],
    )?;
    Ok(())
}

pub fn usage_totals(conn: &Connection, case_id: &str) -> Result<UsageTotals, DatabaseError> {
    let totals = conn.query_row(
        "SELECT COUNT(*),
                COALESCE(SUM(CASE WHEN succeeded = 0 THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(tokens), 0),
                COALESCE(SUM(estimated_cost), 0.0)
         FROM usage_log WHERE case_id = ?1",
        params![case_id],
        |row| {
            Ok(UsageTotals {
                calls: row.get::<_, i64>(0)? as u64,
                failed_calls: row.get::<_, i64>(1)? as u64,
                tokens: row.get::<_, i64>(2)? as u64,
                estimated_cost: row.get::<_, f64>(3)?,
            })
        },
    )?;
    Ok(totals)
}
