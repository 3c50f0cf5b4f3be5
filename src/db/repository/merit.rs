use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::audit::{format_timestamp, parse_timestamp};
use crate::db::DatabaseError;
use crate::models::{CaseMeritResult, MeritOverride};

/// Append a merit result.
pub fn insert_merit_result(conn: &Connection, result: &CaseMeritResult) -> Result<(), DatabaseError> {
    let payload =
        serde_json::to_string(result).map_err(|e| DatabaseError::Serialization(e.to_string()))?;
    conn.execute(
        "INSERT INTO case_merit_results
            (result_id, case_id, overall_score, recommendation, weights_version, payload, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            result.result_id.to_string(),
            result.case_id,
            result.overall_score,
            result.recommendation.as_str(),
            result.weights_version,
            payload,
            format_timestamp(&result.created_at),
        ],
    )?;
    Ok(())
}

/// Most recent merit result for a case.
pub fn latest_merit_result(
    conn: &Connection,
    case_id: &str,
) -> Result<Option<CaseMeritResult>, DatabaseError> {
    let payload: Option<String> = conn
        .query_row(
            "SELECT payload FROM case_merit_results
             WHERE case_id = ?1
             ORDER BY seq DESC LIMIT 1",
            params![case_id],
            |row| row.get(0),
        )
        .optional()?;
    payload
        .map(|p| {
            serde_json::from_str(&p).map_err(|e| DatabaseError::Serialization(e.to_string()))
        })
        .transpose()
}

/// Record a reviewer override. The referenced merit result must exist.
pub fn insert_override(conn: &Connection, record: &MeritOverride) -> Result<(), DatabaseError> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM case_merit_results WHERE result_id = ?1)",
        params![record.merit_result_id.to_string()],
        |row| row.get(0),
    )?;
    if !exists {
        return Err(DatabaseError::NotFound {
            entity_type: "case_merit_results".into(),
            id: record.merit_result_id.to_string(),
        });
    }

    conn.execute(
        "INSERT INTO merit_overrides
            (override_id, merit_result_id, case_id, reviewer, decision, rationale, recorded_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            record.override_id.to_string(),
            record.merit_result_id.to_string(),
            record.case_id,
            record.reviewer,
            record.decision.as_str(),
            record.rationale,
            format_timestamp(&record.recorded_at),
        ],
    )?;
    Ok(())
}

/// Overrides recorded against one merit result, oldest first.
pub fn overrides_for_result(
    conn: &Connection,
    merit_result_id: &Uuid,
) -> Result<Vec<MeritOverride>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT override_id, case_id, reviewer, decision, rationale, recorded_at
         FROM merit_overrides
         WHERE merit_result_id = ?1
         ORDER BY recorded_at ASC",
    )?;
    let rows = stmt
        .query_map(params![merit_result_id.to_string()], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    rows.into_iter()
        .map(
            |(override_id, case_id, reviewer, decision, rationale, recorded_at)| -> Result<MeritOverride, DatabaseError> {
                Ok(MeritOverride {
                    override_id: Uuid::parse_str(&override_id)
                        .map_err(|e| DatabaseError::Serialization(e.to_string()))?,
                    merit_result_id: *merit_result_id,
                    case_id,
                    reviewer,
                    decision: decision.parse()?,
                    rationale,
                    recorded_at: parse_timestamp(&recorded_at)?,
                })
            },
        )
        .collect()
}
