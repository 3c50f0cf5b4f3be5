pub const MEDICAL_SYSTEM_PROMPT: &str = r#"
You extract medical facts from documents for a personal-injury case review.
Identifiers have been replaced by placeholders such as [NAME_1]; keep them as
they are and never guess the values behind them.

RULES:
1. Extract ONLY what the document states. No interpretation or advice.
2. If a field is absent, use null or an empty list.
3. Dates as YYYY-MM-DD. Amounts as plain numbers in USD.
4. Reply with a single JSON object and nothing else.
"#;

pub fn build_medical_prompt(text: &str) -> String {
    format!(
        r#"<document>
{text}
</document>

Extract the medical information above into this JSON structure:

{{
  "diagnoses": ["condition"],
  "procedures": ["procedure"],
  "medications": ["medication and dose"],
  "treatment_dates": ["YYYY-MM-DD"],
  "providers": ["provider or facility"],
  "specialty": "main treating specialty or null",
  "severity": "minor | moderate | severe | critical | null",
  "treatment_costs": [0.0],
  "timeline": [{{"date": "YYYY-MM-DD", "event": "what happened"}}],
  "ongoing_care": false
}}"#
    )
}
