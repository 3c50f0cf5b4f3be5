use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

use super::audit::format_timestamp;
use crate::db::DatabaseError;
use crate::models::DocumentAnalysisResult;

fn to_payload(result: &DocumentAnalysisResult) -> Result<String, DatabaseError> {
    serde_json::to_string(result).map_err(|e| DatabaseError::Serialization(e.to_string()))
}

fn from_payload(payload: &str) -> Result<DocumentAnalysisResult, DatabaseError> {
    serde_json::from_str(payload).map_err(|e| DatabaseError::Serialization(e.to_string()))
}

/// Append a document result. Returns the history sequence number.
pub fn insert_document_result(
    conn: &Connection,
    result: &DocumentAnalysisResult,
) -> Result<i64, DatabaseError> {
    conn.execute(
        "INSERT INTO document_analysis_results
            (document_id, case_id, status, stage, document_type, estimated_cost, payload, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            result.document_id,
            result.case_id,
            result.status.as_str(),
            result.stage.as_str(),
            result.document_type().map(|t| t.as_str()),
            result.estimated_cost,
            to_payload(result)?,
            format_timestamp(&Utc::now()),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Most recent result for a document.
pub fn latest_document_result(
    conn: &Connection,
    document_id: &str,
) -> Result<Option<DocumentAnalysisResult>, DatabaseError> {
    let payload: Option<String> = conn
        .query_row(
            "SELECT payload FROM document_analysis_results
             WHERE document_id = ?1
             ORDER BY seq DESC LIMIT 1",
            params![document_id],
            |row| row.get(0),
        )
        .optional()?;
    payload.as_deref().map(from_payload).transpose()
}

/// Every result ever recorded for a document, oldest first.
pub fn document_history(
    conn: &Connection,
    document_id: &str,
) -> Result<Vec<DocumentAnalysisResult>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT payload FROM document_analysis_results
         WHERE document_id = ?1
         ORDER BY seq ASC",
    )?;
    let payloads = stmt
        .query_map(params![document_id], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    payloads.iter().map(|p| from_payload(p)).collect()
}

/// Latest result of every document in a case.
pub fn latest_results_for_case(
    conn: &Connection,
    case_id: &str,
) -> Result<Vec<DocumentAnalysisResult>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT payload FROM document_analysis_results r
         WHERE case_id = ?1
           AND seq = (SELECT MAX(seq) FROM document_analysis_results
                      WHERE document_id = r.document_id)
         ORDER BY seq ASC",
    )?;
    let payloads = stmt
        .query_map(params![case_id], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    payloads.iter().map(|p| from_payload(p)).collect()
}
