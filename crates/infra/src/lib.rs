//! Infrastructure layer: store adapters, configuration, and the read-side
//! reconciliation and report engine.

pub mod config;
pub mod projections;
pub mod reconciliation;
pub mod reporting;
pub mod store;
pub mod window;

pub use config::{ConfigError, TrackerConfig};
pub use reconciliation::{ReconcileError, Reconciliation, ReconciliationEngine};
pub use reporting::{ReportError, ReportRequest, ReportService};
pub use window::{CivilCalendar, TimeWindow};
