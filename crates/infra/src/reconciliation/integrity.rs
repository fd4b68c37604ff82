//! Data-integrity findings collected during a run.
//!
//! Nothing here aborts a run: anomalies are skipped or defaulted, recorded
//! and logged at `warn`.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::Serialize;

use fixtrack_containers::{HistoryEvent, StatusValue};
use fixtrack_core::{HistoryId, ItemId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Column {
    OldStatus,
    NewStatus,
    OldPlace,
    NewPlace,
}

/// A history column holding text outside the closed value sets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnrecognizedValue {
    pub history_id: HistoryId,
    pub item_id: ItemId,
    pub column: Column,
    pub value: String,
}

/// An event whose old status disagrees with the previous event's new status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Discontinuity {
    pub history_id: HistoryId,
    pub item_id: ItemId,
    pub occurred_at: DateTime<Utc>,
    pub expected: StatusValue,
    pub found: StatusValue,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IntegrityReport {
    /// In-window rows with no item reference.
    pub orphaned_events: Vec<HistoryId>,
    /// Items referenced by in-window rows but missing from the item store.
    pub unknown_items: BTreeSet<ItemId>,
    pub unrecognized_values: Vec<UnrecognizedValue>,
    pub discontinuities: Vec<Discontinuity>,
    /// Candidate items whose snapshot predates the window but which have no
    /// history row before or inside it.
    pub eventless_items: Vec<ItemId>,
}

impl IntegrityReport {
    pub fn is_clean(&self) -> bool {
        self.anomaly_count() == 0
    }

    pub fn anomaly_count(&self) -> usize {
        self.orphaned_events.len()
            + self.unknown_items.len()
            + self.unrecognized_values.len()
            + self.discontinuities.len()
            + self.eventless_items.len()
    }

    pub fn record_orphan(&mut self, event: &HistoryEvent) {
        tracing::warn!(
            history_id = %event.history_id,
            occurred_at = %event.transition.occurred_at,
            "history row has no item reference; skipped"
        );
        self.orphaned_events.push(event.history_id);
    }

    pub fn record_unknown_item(&mut self, event: &HistoryEvent, item_id: ItemId) {
        if self.unknown_items.insert(item_id) {
            tracing::warn!(
                item_id = %item_id,
                history_id = %event.history_id,
                "history references an item missing from the item store; skipped"
            );
        }
    }

    /// Flag every out-of-set status/place column of `event`.
    pub fn check_values(&mut self, item_id: ItemId, event: &HistoryEvent) {
        let t = &event.transition;
        let statuses = [(Column::OldStatus, &t.old_status), (Column::NewStatus, &t.new_status)];
        for (column, value) in statuses {
            if let StatusValue::Unrecognized(raw) = value {
                self.push_unrecognized(item_id, event.history_id, column, raw);
            }
        }
        let places = [(Column::OldPlace, &t.old_place), (Column::NewPlace, &t.new_place)];
        for (column, place) in places {
            if place.is_unlisted() {
                self.push_unrecognized(item_id, event.history_id, column, &place.label());
            }
        }
    }

    fn push_unrecognized(&mut self, item_id: ItemId, history_id: HistoryId, column: Column, raw: &str) {
        tracing::warn!(
            item_id = %item_id,
            history_id = %history_id,
            column = ?column,
            value = raw,
            "unrecognized value in history row"
        );
        self.unrecognized_values.push(UnrecognizedValue {
            history_id,
            item_id,
            column,
            value: raw.to_string(),
        });
    }

    pub fn record_discontinuity(&mut self, item_id: ItemId, event: &HistoryEvent, expected: &StatusValue) {
        tracing::warn!(
            item_id = %item_id,
            history_id = %event.history_id,
            expected = %expected,
            found = %event.transition.old_status,
            "history row does not continue from the previous status"
        );
        self.discontinuities.push(Discontinuity {
            history_id: event.history_id,
            item_id,
            occurred_at: event.transition.occurred_at,
            expected: expected.clone(),
            found: event.transition.old_status.clone(),
        });
    }

    pub fn record_eventless(&mut self, item_id: ItemId) {
        tracing::warn!(item_id = %item_id, "item has no history rows");
        self.eventless_items.push(item_id);
    }
}
