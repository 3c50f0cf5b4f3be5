//! Reading structured data out of model replies.

use chrono::NaiveDate;
use serde::de::DeserializeOwned;

use super::ModelError;

/// Pull the JSON object out of a reply.
///
/// Accepts a ```json fenced block, a bare fenced block, or the outermost
/// `{…}` of the text.
pub fn extract_json(response: &str) -> Result<&str, ModelError> {
    if let Some(start) = response.find("```json") {
        let body = &response[start + 7..];
        let end = body
            .find("```")
            .ok_or_else(|| ModelError::MalformedResponse("unclosed JSON block".into()))?;
        return Ok(body[..end].trim());
    }
    if let Some(start) = response.find("```") {
        let body = &response[start + 3..];
        if let Some(end) = body.find("```") {
            let inner = body[..end].trim();
            if inner.starts_with('{') {
                return Ok(inner);
            }
        }
    }
    match (response.find('{'), response.rfind('}')) {
        (Some(start), Some(end)) if end > start => Ok(&response[start..=end]),
        _ => Err(ModelError::MalformedResponse("no JSON object found".into())),
    }
}

/// Extract and deserialize the JSON object of a reply.
pub fn parse_json_reply<T: DeserializeOwned>(response: &str) -> Result<T, ModelError> {
    let json = extract_json(response)?;
    serde_json::from_str(json).map_err(|e| ModelError::MalformedResponse(e.to_string()))
}

/// Parse a date as models tend to write it: ISO first, then US, then
/// textual month forms.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim().trim_end_matches('.');
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("null") || trimmed.eq_ignore_ascii_case("unknown") {
        return None;
    }
    const FORMATS: &[&str] = &[
        "%Y-%m-%d",
        "%m/%d/%Y",
        "%m-%d-%Y",
        "%Y/%m/%d",
        "%B %d, %Y",
        "%B %d %Y",
        "%b %d, %Y",
        "%b %d %Y",
        "%d %B %Y",
    ];
    FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(trimmed, fmt).ok())
        .or_else(|| {
            // ISO timestamps: keep the date part.
            trimmed
                .get(..10)
                .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
        })
}

/// Parse a money amount such as `"$12,500.00"` or `12500`.
pub fn parse_amount(value: &serde_json::Value) -> Option<f64> {
    let amount = match value {
        serde_json::Value::Number(n) => n.as_f64()?,
        serde_json::Value::String(s) => {
            let cleaned: String = s
                .chars()
                .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
                .collect();
            cleaned.parse().ok()?
        }
        _ => return None,
    };
    (amount.is_finite() && amount >= 0.0).then_some(amount)
}
