//! Projection implementations (read model builders).
//!
//! Projections here consume container history and build disposable read
//! models. They are rebuilt from the log on demand, never persisted.

pub mod item_snapshot;

pub use item_snapshot::{DriftField, ItemSnapshotProjection, SnapshotAudit, SnapshotDrift};
