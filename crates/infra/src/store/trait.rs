use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;

use fixtrack_containers::{HistoryEvent, Item};
use fixtrack_core::{DomainError, ItemId};

use super::query::{EventFilter, EventPage, ItemFilter, Pagination, UpperBound};

/// Store operation error.
///
/// These are **infrastructure errors** (connectivity, malformed rows) as
/// opposed to domain errors. Reads are never retried here; callers decide.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("query failed in {operation}: {message}")]
    Query { operation: String, message: String },

    #[error("malformed row: {0}")]
    Decode(String),

    /// A write was rejected by the container aggregate.
    #[error("write rejected: {0}")]
    Rejected(#[from] DomainError),

    #[error("optimistic concurrency check failed: {0}")]
    Concurrency(String),
}

/// Append-only audit log of container transitions.
///
/// Read-only from the engine's point of view; writers append elsewhere while
/// reads run, so results are best-effort as of read time.
pub trait HistoryStore: Send + Sync {
    /// Events matching `filter`, ordered by `(item, occurred_at, history_id)`,
    /// one page at a time.
    fn query_events(&self, filter: &EventFilter, pagination: Pagination) -> Result<EventPage, StoreError>;

    /// The single most recent event for `item_id` admitted by `at`, ties
    /// broken by history id.
    fn latest_event_at(&self, item_id: ItemId, at: UpperBound) -> Result<Option<HistoryEvent>, StoreError>;

    /// The single most recent event for `item_id` with `occurred_at < before`.
    fn latest_event_before(
        &self,
        item_id: ItemId,
        before: DateTime<Utc>,
    ) -> Result<Option<HistoryEvent>, StoreError> {
        self.latest_event_at(item_id, UpperBound::Exclusive(before))
    }
}

/// Current snapshot of every tracked container.
pub trait ItemStore: Send + Sync {
    /// Items matching `filter`, ordered by id.
    fn list_items(&self, filter: &ItemFilter) -> Result<Vec<Item>, StoreError>;

    fn get_item(&self, id: ItemId) -> Result<Option<Item>, StoreError>;
}

impl<S> HistoryStore for Arc<S>
where
    S: HistoryStore + ?Sized,
{
    fn query_events(&self, filter: &EventFilter, pagination: Pagination) -> Result<EventPage, StoreError> {
        (**self).query_events(filter, pagination)
    }

    fn latest_event_at(&self, item_id: ItemId, at: UpperBound) -> Result<Option<HistoryEvent>, StoreError> {
        (**self).latest_event_at(item_id, at)
    }
}

impl<S> ItemStore for Arc<S>
where
    S: ItemStore + ?Sized,
{
    fn list_items(&self, filter: &ItemFilter) -> Result<Vec<Item>, StoreError> {
        (**self).list_items(filter)
    }

    fn get_item(&self, id: ItemId) -> Result<Option<Item>, StoreError> {
        (**self).get_item(id)
    }
}
