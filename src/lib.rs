//! docmerit: document analysis and case-merit scoring for personal-injury
//! intake.
//!
//! Documents are read, OCR'd and PHI-redacted before any model sees them,
//! classified, passed to the medical or legal specialist their type calls
//! for, and finally aggregated into a case-merit recommendation.

pub mod config;
pub mod core_state;
pub mod cost;
pub mod db;
pub mod models;
pub mod phi_audit;
pub mod pipeline;

use tracing_subscriber::EnvFilter;

/// Install the global fmt subscriber, filtered by `RUST_LOG` or
/// [`config::default_log_filter`]. Safe to call more than once.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .try_init();
}
