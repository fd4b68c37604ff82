//! Projection runner utilities (read model builders).
//!
//! Deterministic replay with per-stream cursor tracking and no storage
//! assumptions.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::{Event, Projection};

/// Position of the last event applied to one stream.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct StreamCursor {
    pub occurred_at: DateTime<Utc>,
    pub sequence: u64,
}

impl StreamCursor {
    pub fn of<E: Event>(event: &E) -> Self {
        Self {
            occurred_at: event.occurred_at(),
            sequence: event.sequence(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProjectionError {
    #[error("out-of-order event in stream {stream}: last={last:?}, found={found:?}")]
    OutOfOrder {
        stream: String,
        last: StreamCursor,
        found: StreamCursor,
    },
}

/// What the runner did with one event.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Applied {
    Applied,
    /// Same position as the stream cursor; already applied.
    Duplicate,
    /// No owning stream; never reaches the projection.
    SkippedOrphan,
}

/// Runs events through a projection and tracks per-stream progress.
#[derive(Debug)]
pub struct ProjectionRunner<P>
where
    P: Projection,
{
    projection: P,
    cursors: HashMap<<P::Ev as Event>::StreamId, StreamCursor>,
    orphans_skipped: u64,
}

impl<P> ProjectionRunner<P>
where
    P: Projection,
{
    pub fn new(projection: P) -> Self {
        Self {
            projection,
            cursors: HashMap::new(),
            orphans_skipped: 0,
        }
    }

    pub fn projection(&self) -> &P {
        &self.projection
    }

    pub fn into_projection(self) -> P {
        self.projection
    }

    pub fn cursor(&self, stream: &<P::Ev as Event>::StreamId) -> Option<StreamCursor> {
        self.cursors.get(stream).copied()
    }

    pub fn orphans_skipped(&self) -> u64 {
        self.orphans_skipped
    }

    /// Apply a single event, enforcing monotonic `(occurred_at, sequence)`
    /// order within its stream.
    pub fn apply(&mut self, event: &P::Ev) -> Result<Applied, ProjectionError> {
        let Some(stream) = event.stream_id() else {
            self.orphans_skipped += 1;
            tracing::warn!(
                event_type = event.event_type(),
                sequence = event.sequence(),
                "skipping orphaned event during projection"
            );
            return Ok(Applied::SkippedOrphan);
        };

        let found = StreamCursor::of(event);
        if let Some(last) = self.cursors.get(&stream).copied() {
            if found == last {
                return Ok(Applied::Duplicate);
            }
            if found < last {
                return Err(ProjectionError::OutOfOrder {
                    stream: format!("{stream:?}"),
                    last,
                    found,
                });
            }
        }

        self.projection.apply(event);
        self.cursors.insert(stream, found);
        Ok(Applied::Applied)
    }

    /// Apply many events in the given order.
    pub fn run<'a>(
        &mut self,
        events: impl IntoIterator<Item = &'a P::Ev>,
    ) -> Result<(), ProjectionError>
    where
        P::Ev: 'a,
    {
        for ev in events {
            self.apply(ev)?;
        }
        Ok(())
    }

    /// Rebuild a projection from scratch by replaying a full history.
    ///
    /// Events are sorted into `(stream, occurred_at, sequence)` order first, so
    /// the input may come in any order.
    pub fn rebuild_from_scratch(
        factory: impl FnOnce() -> P,
        events: impl IntoIterator<Item = P::Ev>,
    ) -> Result<Self, ProjectionError> {
        let mut events: Vec<_> = events.into_iter().collect();
        events.sort_by_key(|e| (e.stream_id(), e.occurred_at(), e.sequence()));

        let mut runner = ProjectionRunner::new(factory());
        runner.run(events.iter())?;
        Ok(runner)
    }
}
