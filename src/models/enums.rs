use crate::db::DatabaseError;
use serde::{Deserialize, Serialize};

/// Macro to generate enum with as_str + std::str::FromStr pattern
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = DatabaseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(DatabaseError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }
    };
}

str_enum!(DocumentType {
    MedicalRecord => "medical_record",
    PoliceReport => "police_report",
    InsuranceDocument => "insurance_document",
    EmploymentRecord => "employment_record",
    Correspondence => "correspondence",
    BillInvoice => "bill_invoice",
    LegalDocument => "legal_document",
    Other => "other",
});

impl DocumentType {
    pub const ALL: [DocumentType; 8] = [
        Self::MedicalRecord,
        Self::PoliceReport,
        Self::InsuranceDocument,
        Self::EmploymentRecord,
        Self::Correspondence,
        Self::BillInvoice,
        Self::LegalDocument,
        Self::Other,
    ];

    /// Document types that get a medical extraction pass.
    pub fn needs_medical_extraction(&self) -> bool {
        matches!(self, Self::MedicalRecord | Self::BillInvoice)
    }

    /// Document types that get a legal analysis pass.
    pub fn needs_legal_analysis(&self) -> bool {
        matches!(
            self,
            Self::LegalDocument | Self::Correspondence | Self::PoliceReport
        )
    }
}

str_enum!(TaskType {
    Classification => "classification",
    MedicalExtraction => "medical_extraction",
    LegalAnalysis => "legal_analysis",
    CaseMerit => "case_merit",
});

str_enum!(ModelTier {
    Cheap => "cheap",
    HighReasoning => "high_reasoning",
});

str_enum!(RoutingReason {
    CaseMerit => "case_merit",
    HighComplexity => "high_complexity",
    LargeDocument => "large_document",
    LegalAnalysis => "legal_analysis",
    Standard => "standard",
    Pinned => "pinned",
});

str_enum!(ClassificationMethod {
    Model => "model",
    RuleFallback => "rule_fallback",
});

str_enum!(Severity {
    Minor => "minor",
    Moderate => "moderate",
    Severe => "severe",
    Critical => "critical",
});

impl Severity {
    /// Ordinal for picking the worst severity across documents.
    pub fn rank(&self) -> u8 {
        match self {
            Self::Minor => 1,
            Self::Moderate => 2,
            Self::Severe => 3,
            Self::Critical => 4,
        }
    }
}

str_enum!(LiabilityStrength {
    Weak => "weak",
    Moderate => "moderate",
    Strong => "strong",
});

str_enum!(Recommendation {
    Accept => "accept",
    Decline => "decline",
    Refer => "refer",
    MoreInfoNeeded => "more_info_needed",
});

str_enum!(DocumentStatus {
    Pending => "pending",
    Completed => "completed",
    Failed => "failed",
});

str_enum!(PipelineStage {
    Pending => "pending",
    OcrDone => "ocr_done",
    Redacted => "redacted",
    Classified => "classified",
    SpecialistDone => "specialist_done",
    Completed => "completed",
    Failed => "failed",
});

str_enum!(SubAnalysis {
    Storage => "storage",
    Ocr => "ocr",
    Redaction => "redaction",
    Classification => "classification",
    MedicalExtraction => "medical_extraction",
    LegalAnalysis => "legal_analysis",
    Summary => "summary",
    Persist => "persist",
    Merit => "merit",
});

impl SubAnalysis {
    /// The step a model call for `task` belongs to.
    pub fn for_task(task: TaskType) -> Self {
        match task {
            TaskType::Classification => Self::Classification,
            TaskType::MedicalExtraction => Self::MedicalExtraction,
            TaskType::LegalAnalysis => Self::LegalAnalysis,
            TaskType::CaseMerit => Self::Merit,
        }
    }
}

str_enum!(AuditAction {
    PhiRedaction => "phi_redaction",
    RedactionFailed => "redaction_failed",
    ModelRouting => "model_routing",
    ModelCallFailed => "model_call_failed",
    MeritOverride => "merit_override",
});

str_enum!(OcrQuality {
    Excellent => "excellent",
    Good => "good",
    Fair => "fair",
    Poor => "poor",
});

impl OcrQuality {
    /// Grade a 0–1 OCR confidence.
    pub fn from_confidence(confidence: f64) -> Self {
        if confidence >= 0.85 {
            Self::Excellent
        } else if confidence >= 0.70 {
            Self::Good
        } else if confidence >= 0.50 {
            Self::Fair
        } else {
            Self::Poor
        }
    }
}

str_enum!(Urgency {
    Expired => "expired",
    Urgent => "urgent",
    Active => "active",
    Unknown => "unknown",
});

str_enum!(StatuteUnknownReason {
    MissingIncidentDate => "missing_incident_date",
    UnknownJurisdiction => "unknown_jurisdiction",
    UnsupportedCaseType => "unsupported_case_type",
});

str_enum!(RiskLevel {
    Low => "low",
    Medium => "medium",
    High => "high",
});
