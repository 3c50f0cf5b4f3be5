// PHI audit: static scan of every Rust source file for tracing calls that
// reference document text, redaction mappings or patient fields. Logs may
// carry ids, counts, labels and reasons only.
