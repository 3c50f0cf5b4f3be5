use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::models::{MedicalFindings, Severity, TimelineEvent};
use crate::pipeline::llm::{extract_json, parse_amount, parse_date, ModelError};

/// Object keys that commonly carry the name when a model returns objects
/// instead of plain strings.
const NAME_KEYS: &[&str] = &["name", "condition", "diagnosis", "procedure", "medication", "provider"];

/// Parse the extractor's JSON reply. Fields are read leniently; only a
/// reply without a JSON object is an error.
pub fn parse_medical_reply(response: &str) -> Result<MedicalFindings, ModelError> {
    let json = extract_json(response)?;
    let value: Value =
        serde_json::from_str(json).map_err(|e| ModelError::MalformedResponse(e.to_string()))?;
    if !value.is_object() {
        return Err(ModelError::MalformedResponse("reply is not a JSON object".into()));
    }

    let mut treatment_dates: Vec<_> = value["treatment_dates"]
        .as_array()
        .map(|a| a.iter().filter_map(Value::as_str).filter_map(parse_date).collect())
        .unwrap_or_default();
    treatment_dates.sort();
    treatment_dates.dedup();

    let mut timeline: Vec<TimelineEvent> = value["timeline"]
        .as_array()
        .map(|a| a.iter().filter_map(timeline_event).collect())
        .unwrap_or_default();
    timeline.sort_by_key(|e| e.date);

    Ok(MedicalFindings {
        diagnoses: string_list(&value["diagnoses"]),
        procedures: string_list(&value["procedures"]),
        medications: string_list(&value["medications"]),
        treatment_dates,
        providers: string_list(&value["providers"]),
        specialty: value["specialty"]
            .as_str()
            .map(str::trim)
            .filter(|s| !s.is_empty() && !s.eq_ignore_ascii_case("null"))
            .map(str::to_lowercase),
        severity: value["severity"].as_str().and_then(parse_severity),
        treatment_costs: value["treatment_costs"]
            .as_array()
            .map(|a| a.iter().filter_map(parse_amount).collect())
            .unwrap_or_default(),
        timeline,
        ongoing_care: value["ongoing_care"].as_bool().unwrap_or(false),
    })
}

fn string_list(value: &Value) -> Vec<String> {
    let Some(items) = value.as_array() else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| match item {
            Value::String(s) => Some(s.trim().to_string()),
            Value::Object(map) => NAME_KEYS
                .iter()
                .find_map(|k| map.get(*k).and_then(Value::as_str))
                .map(|s| s.trim().to_string()),
            _ => None,
        })
        .filter(|s| !s.is_empty())
        .collect()
}

fn timeline_event(item: &Value) -> Option<TimelineEvent> {
    let date = parse_date(item["date"].as_str()?)?;
    let event = item["event"].as_str()?.trim();
    (!event.is_empty()).then(|| TimelineEvent {
        date,
        event: event.to_string(),
    })
}

pub fn parse_severity(raw: &str) -> Option<Severity> {
    match raw.trim().to_lowercase().as_str() {
        "minor" | "mild" => Some(Severity::Minor),
        "moderate" => Some(Severity::Moderate),
        "severe" => Some(Severity::Severe),
        "critical" | "catastrophic" => Some(Severity::Critical),
        _ => None,
    }
}

// ──────────────────────────────────────────────
// Local enrichment
// ──────────────────────────────────────────────

static DOLLAR_AMOUNT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\$\s*\d{1,3}(?:,\d{3})*(?:\.\d{2})?|\b\d{1,3}(?:,\d{3})*(?:\.\d{2})?\s*dollars?\b")
        .expect("dollar pattern is valid")
});

/// Dollar amounts written in the text.
pub fn amounts_in_text(text: &str) -> Vec<f64> {
    DOLLAR_AMOUNT
        .find_iter(text)
        .filter_map(|m| {
            let digits: String = m
                .as_str()
                .chars()
                .filter(|c| c.is_ascii_digit() || *c == '.')
                .collect();
            digits.parse::<f64>().ok()
        })
        .filter(|a| *a > 0.0)
        .collect()
}

const SPECIALTY_TERMS: &[(&str, &[&str])] = &[
    ("orthopedic", &["bone", "joint", "fracture", "spine", "orthopedic", "musculoskeletal"]),
    ("neurological", &["brain", "nerve", "neurological", "concussion", "tbi", "spinal cord"]),
    ("cardiology", &["heart", "cardiac", "cardiovascular", "chest pain"]),
    ("emergency", &["emergency", "trauma", "emergency room"]),
    ("physical_therapy", &["physical therapy", "rehabilitation", "therapy"]),
    ("radiology", &["x-ray", "mri", "ct scan", "ultrasound", "imaging"]),
    ("pain_management", &["pain management", "nerve block", "chronic pain"]),
];

/// Specialty with the most indicator terms in the text.
pub fn detect_specialty(text: &str) -> Option<String> {
    let lower = text.to_lowercase();
    SPECIALTY_TERMS
        .iter()
        .map(|(name, terms)| (*name, terms.iter().filter(|t| lower.contains(*t)).count()))
        .filter(|(_, hits)| *hits > 0)
        .fold(None, |best: Option<(&str, usize)>, (name, hits)| match best {
            Some((_, best_hits)) if best_hits >= hits => best,
            _ => Some((name, hits)),
        })
        .map(|(name, _)| name.to_string())
}
