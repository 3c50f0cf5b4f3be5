use chrono::{NaiveDateTime, Utc};
use rusqlite::{params, Connection};

use crate::db::DatabaseError;
use crate::models::{AuditDetail, AuditEvent, AuditScope};

/// SQLite `datetime()` compatible timestamp format.
pub(crate) const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

pub(crate) fn format_timestamp(ts: &chrono::DateTime<Utc>) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

pub(crate) fn parse_timestamp(raw: &str) -> Result<chrono::DateTime<Utc>, DatabaseError> {
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(|e| DatabaseError::Serialization(format!("timestamp {raw}: {e}")))
}

/// Append one audit event.
pub fn insert_audit_event(conn: &Connection, event: &AuditEvent) -> Result<(), DatabaseError> {
    let detail = serde_json::to_string(&event.detail)
        .map_err(|e| DatabaseError::Serialization(e.to_string()))?;
    conn.execute(
        "INSERT INTO audit_log (timestamp, action, case_id, document_id, detail)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            format_timestamp(&event.timestamp),
            event.action.as_str(),
            event.scope.case_id,
            event.scope.document_id,
            detail,
        ],
    )?;
    Ok(())
}

/// Prune audit entries older than the given number of days.
pub fn prune_audit_log(conn: &Connection, retention_days: i64) -> Result<usize, DatabaseError> {
    let deleted = conn.execute(
        "DELETE FROM audit_log WHERE timestamp < datetime('now', ?1)",
        params![format!("-{retention_days} days")],
    )?;
    Ok(deleted)
}

/// All audit events recorded for a case, oldest first.
pub fn audit_events_for_case(
    conn: &Connection,
    case_id: &str,
) -> Result<Vec<AuditEvent>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT timestamp, action, case_id, document_id, detail FROM audit_log
         WHERE case_id = ?1
         ORDER BY id ASC",
    )?;
    let rows = stmt
        .query_map(params![case_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<String>>(2)?,
                row.get::<_, Option<String>>(3)?,
                row.get::<_, String>(4)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    rows.into_iter()
        .map(|(timestamp, action, case_id, document_id, detail)| -> Result<AuditEvent, DatabaseError> {
            let detail: AuditDetail = serde_json::from_str(&detail)
                .map_err(|e| DatabaseError::Serialization(e.to_string()))?;
            Ok(AuditEvent {
                action: action.parse()?,
                scope: AuditScope {
                    case_id,
                    document_id,
                },
                detail,
                timestamp: parse_timestamp(&timestamp)?,
            })
        })
        .collect()
}
