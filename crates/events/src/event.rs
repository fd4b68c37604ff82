use chrono::{DateTime, Utc};

/// An append-only history record.
///
/// Events are:
/// - **immutable** (treat them as facts)
/// - **stream-scoped** (one stream per tracked item; orphans have none)
/// - **totally ordered** within a stream by `(occurred_at, sequence)`
pub trait Event: Clone + core::fmt::Debug + Send + Sync + 'static {
    /// Identifier of the stream (tracked item) this event belongs to.
    type StreamId: Copy + Eq + Ord + core::hash::Hash + core::fmt::Debug + Send + Sync;

    /// Stable event name/type identifier (e.g. "container.transitioned").
    fn event_type(&self) -> &'static str;

    /// Owning stream, or `None` for orphaned rows (e.g. a bulk import whose
    /// item lookup failed).
    fn stream_id(&self) -> Option<Self::StreamId>;

    /// When the event occurred (business time).
    fn occurred_at(&self) -> DateTime<Utc>;

    /// Store-assigned insertion order; breaks `occurred_at` ties.
    fn sequence(&self) -> u64;
}
