pub mod case_runner; // Case orchestration: document pool + merit
pub mod classification;
pub mod extraction;
pub mod legal;
pub mod llm;
pub mod medical;
pub mod merit;
pub mod model_router; // Tiered routing by task type and complexity
pub mod processor; // Single-document orchestration
pub mod redaction;
pub mod traits;
