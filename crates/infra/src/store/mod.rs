//! Store boundary: the snapshot table and the append-only history log.
//!
//! The engine only reads through these traits; adapters decide how rows are
//! fetched. Writes exist on the in-memory adapter for tests and dev data.

pub mod in_memory;
pub mod postgres;
pub mod query;
pub mod r#trait;

pub use in_memory::InMemoryTracker;
pub use postgres::{PostgresSettings, PostgresTracker};
pub use query::{EventFilter, EventPage, ItemFilter, Pagination, UpperBound, MAX_PAGE_LIMIT};
pub use r#trait::{HistoryStore, ItemStore, StoreError};
