//! Windowed reconciliation of the container history.
//!
//! `seed` reconstructs each item's state just before a window, `machine`
//! replays the window on top of it and `engine` wires both to the stores.

pub mod access;
pub mod engine;
pub mod integrity;
pub mod machine;
pub mod seed;

pub use access::{HistoryReader, ItemStreams};
pub use engine::{ReconcileError, Reconciliation, ReconciliationEngine};
pub use integrity::{Column, Discontinuity, IntegrityReport, UnrecognizedValue};
pub use machine::{classify, DispenseRecord, MachineOutput, ReconciliationStats, Rule, WindowMachine};
pub use seed::{latest_at_each, seed_items, Seed};
