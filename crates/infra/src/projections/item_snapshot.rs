use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use fixtrack_containers::{HistoryEvent, Item, ItemState};
use fixtrack_core::{HistoryId, ItemId};
use fixtrack_events::Projection;

/// Item states rebuilt from history alone.
///
/// Disposable: built per audit from a full history read and dropped.
#[derive(Debug, Default)]
pub struct ItemSnapshotProjection {
    states: BTreeMap<ItemId, ItemState>,
    /// First rows whose new status is not a known one; the item cannot be
    /// rebuilt past them.
    unusable_creations: Vec<HistoryId>,
}

impl ItemSnapshotProjection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: ItemId) -> Option<&ItemState> {
        self.states.get(&id)
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn unusable_creations(&self) -> &[HistoryId] {
        &self.unusable_creations
    }
}

impl Projection for ItemSnapshotProjection {
    type Ev = HistoryEvent;

    fn apply(&mut self, event: &HistoryEvent) {
        let Some(id) = event.item_id else {
            return;
        };
        match self.states.get_mut(&id) {
            Some(state) => state.apply(&event.transition),
            None => match ItemState::from_creation(&event.transition) {
                Some(state) => {
                    self.states.insert(id, state);
                }
                None => self.unusable_creations.push(event.history_id),
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DriftField {
    Status,
    Place,
    ReturnBy,
    LastTransitionAt,
}

/// One field where the stored snapshot and the replay disagree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SnapshotDrift {
    pub item_id: ItemId,
    pub field: DriftField,
    pub stored: String,
    pub replayed: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SnapshotAudit {
    pub items_checked: usize,
    pub drifts: Vec<SnapshotDrift>,
    /// Items whose history could not be replayed into any state.
    pub unreplayable: Vec<ItemId>,
}

impl SnapshotAudit {
    pub fn is_consistent(&self) -> bool {
        self.drifts.is_empty() && self.unreplayable.is_empty()
    }

    /// Compare every stored item with its replayed state.
    pub fn compare(items: &[Item], replayed: &ItemSnapshotProjection) -> Self {
        let mut audit = Self {
            items_checked: items.len(),
            ..Self::default()
        };

        for item in items {
            let Some(state) = replayed.get(item.id) else {
                tracing::warn!(item_id = %item.id, "item history does not replay to a state");
                audit.unreplayable.push(item.id);
                continue;
            };
            audit.check(item, state);
        }

        if !audit.is_consistent() {
            tracing::warn!(
                drifts = audit.drifts.len(),
                unreplayable = audit.unreplayable.len(),
                "snapshot audit found inconsistencies"
            );
        }
        audit
    }

    fn check(&mut self, item: &Item, replayed: &ItemState) {
        let stored = &item.state;
        if stored.status != replayed.status {
            self.drift(item.id, DriftField::Status, stored.status.label(), replayed.status.label());
        }
        if stored.place != replayed.place {
            self.drift(item.id, DriftField::Place, &stored.place.label(), &replayed.place.label());
        }
        if stored.return_by != replayed.return_by {
            self.drift(
                item.id,
                DriftField::ReturnBy,
                stored.return_by.as_deref().unwrap_or_default(),
                replayed.return_by.as_deref().unwrap_or_default(),
            );
        }
        if stored.last_transition_at != replayed.last_transition_at {
            self.drift(
                item.id,
                DriftField::LastTransitionAt,
                &rfc3339(stored.last_transition_at),
                &rfc3339(replayed.last_transition_at),
            );
        }
    }

    fn drift(&mut self, item_id: ItemId, field: DriftField, stored: &str, replayed: &str) {
        tracing::warn!(item_id = %item_id, ?field, stored, replayed, "snapshot drift");
        self.drifts.push(SnapshotDrift {
            item_id,
            field,
            stored: stored.to_string(),
            replayed: replayed.to_string(),
        });
    }
}

fn rfc3339(at: DateTime<Utc>) -> String {
    at.to_rfc3339()
}
