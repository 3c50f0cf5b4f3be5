use crate::models::DocumentType;

/// Indicator terms for one document type. Keywords score 1, patterns 2.
pub struct RuleSet {
    pub document_type: DocumentType,
    pub keywords: &'static [&'static str],
    pub patterns: &'static [&'static str],
}

impl RuleSet {
    /// Score lowercase text against this ruleset.
    pub fn score(&self, lower: &str) -> u32 {
        let keyword_hits = self.keywords.iter().filter(|k| lower.contains(*k)).count();
        let pattern_hits = self.patterns.iter().filter(|p| lower.contains(*p)).count();
        (keyword_hits + 2 * pattern_hits) as u32
    }
}

/// Rulesets in label order; ties go to the earlier entry.
pub const RULESETS: &[RuleSet] = &[
    RuleSet {
        document_type: DocumentType::MedicalRecord,
        keywords: &["patient", "diagnosis", "treatment", "medication", "doctor", "hospital", "clinic", "medical", "health"],
        patterns: &["mrn", "dob", "bp", "mg", "ml", "diagnosis", "prescription"],
    },
    RuleSet {
        document_type: DocumentType::PoliceReport,
        keywords: &["incident", "officer", "police", "report number", "citation", "arrest", "violation", "accident"],
        patterns: &["incident #", "case #", "officer", "badge", "violation"],
    },
    RuleSet {
        document_type: DocumentType::InsuranceDocument,
        keywords: &["policy", "claim", "coverage", "premium", "deductible", "insurance", "carrier", "adjuster"],
        patterns: &["policy #", "claim #", "effective date", "coverage"],
    },
    RuleSet {
        document_type: DocumentType::EmploymentRecord,
        keywords: &["employee", "employer", "wage", "salary", "w-2", "1099", "payroll", "benefits", "hr"],
        patterns: &["employee id", "ssn", "wage", "salary", "benefits"],
    },
    RuleSet {
        document_type: DocumentType::Correspondence,
        keywords: &["dear", "sincerely", "regards", "letter", "email", "memo", "communication"],
        patterns: &["dear", "sincerely", "best regards", "cc:", "subject:"],
    },
    RuleSet {
        document_type: DocumentType::BillInvoice,
        keywords: &["invoice", "bill", "amount due", "payment", "total", "charges", "balance", "statement"],
        patterns: &["$", "total:", "amount due:", "invoice #", "due date"],
    },
    RuleSet {
        document_type: DocumentType::LegalDocument,
        keywords: &["attorney", "lawyer", "legal", "court", "case", "lawsuit", "contract", "agreement", "complaint"],
        patterns: &["attorney", "esq.", "court", "case no.", "plaintiff", "defendant"],
    },
];

/// Best-scoring label, or `Other` when nothing matched.
pub fn best_match(text: &str) -> (DocumentType, u32) {
    let lower = text.to_lowercase();
    let mut best = (DocumentType::Other, 0);
    for rules in RULESETS {
        let score = rules.score(&lower);
        if score > best.1 {
            best = (rules.document_type, score);
        }
    }
    best
}
