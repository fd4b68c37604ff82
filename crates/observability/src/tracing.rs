//! Tracing/logging initialization.
//!
//! JSON lines on stdout, filtered by `RUST_LOG`. Reconciliation runs log one
//! `info` summary each and one `warn` per data-integrity anomaly, so `warn`
//! alone is a usable production filter.

use tracing_subscriber::EnvFilter;

pub const DEFAULT_FILTER: &str = "info";

/// Build the env filter: `RUST_LOG` when set and valid, else `fallback`.
pub fn env_filter(fallback: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback))
}

/// Install the global subscriber. Later calls are no-ops.
pub fn init(fallback: &str) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter(fallback))
        .json()
        .with_timer(tracing_subscriber::fmt::time::SystemTime)
        .with_target(true)
        .with_current_span(true)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_is_idempotent() {
        init(DEFAULT_FILTER);
        init("debug");
        ::tracing::info!(check = "twice", "subscriber installed");
    }

    #[test]
    fn fallback_filter_parses() {
        let filter = EnvFilter::new("fixtrack_infra=debug,info");
        assert!(filter.to_string().contains("fixtrack_infra=debug"));
    }
}
