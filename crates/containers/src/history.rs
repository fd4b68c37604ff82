use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use fixtrack_core::{ActorId, HistoryId, ItemId};
use fixtrack_events::Event;

use crate::place::Place;
use crate::status::{ItemStatus, StatusValue};

/// One status/place change as recorded in the audit log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    pub actor: ActorId,
    pub occurred_at: DateTime<Utc>,
    pub old_status: StatusValue,
    pub new_status: StatusValue,
    pub old_place: Place,
    pub new_place: Place,
}

impl Transition {
    pub fn changes_status(&self) -> bool {
        self.old_status != self.new_status
    }

    /// `"" -> Intake`: the row that brought the item into existence.
    pub fn is_intake(&self) -> bool {
        self.old_status.is_absent() && self.new_status.is(ItemStatus::Intake)
    }

    pub fn has_unrecognized_status(&self) -> bool {
        self.old_status.is_unrecognized() || self.new_status.is_unrecognized()
    }

    pub fn has_unlisted_place(&self) -> bool {
        self.old_place.is_unlisted() || self.new_place.is_unlisted()
    }
}

/// A row of `container_history`.
///
/// `item_id` is `None` for orphaned rows left behind by bulk imports whose
/// item lookup failed; those never take part in reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEvent {
    pub history_id: HistoryId,
    pub item_id: Option<ItemId>,
    #[serde(flatten)]
    pub transition: Transition,
}

impl HistoryEvent {
    pub fn new(history_id: HistoryId, item_id: Option<ItemId>, transition: Transition) -> Self {
        Self {
            history_id,
            item_id,
            transition,
        }
    }

    /// Stream order key: `(item, occurred_at, history_id)`.
    pub fn order_key(&self) -> (Option<ItemId>, DateTime<Utc>, HistoryId) {
        (self.item_id, self.transition.occurred_at, self.history_id)
    }
}

impl Event for HistoryEvent {
    type StreamId = ItemId;

    fn event_type(&self) -> &'static str {
        "container.transitioned"
    }

    fn stream_id(&self) -> Option<ItemId> {
        self.item_id
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        self.transition.occurred_at
    }

    fn sequence(&self) -> u64 {
        self.history_id.get()
    }
}
