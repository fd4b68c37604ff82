//! Process-wide tracing setup shared by the binaries.

/// Initialize process-wide observability (structured JSON logs).
///
/// Safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    tracing::init(tracing::DEFAULT_FILTER);
}

/// Same as [`init`] with a caller-chosen fallback filter for when `RUST_LOG`
/// is unset (e.g. `"fixtrack_infra=debug,info"`).
pub fn init_with_default(filter: &str) {
    tracing::init(filter);
}

/// Subscriber construction (filters, JSON formatting).
pub mod tracing;
