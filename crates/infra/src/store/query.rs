//! Query parameters for store reads.
//!
//! Every history read is filtered and paginated; callers that need a full
//! result walk the pages (see `reconciliation::access`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use fixtrack_containers::{ContainerSize, HistoryEvent, Item, ItemStatus};
use fixtrack_core::ItemId;

use crate::window::TimeWindow;

pub const DEFAULT_PAGE_LIMIT: u32 = 50;
pub const MAX_PAGE_LIMIT: u32 = 1000;

/// Pagination parameters for event queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    /// Maximum number of events to return.
    pub limit: u32,
    /// Offset for pagination (0-based).
    pub offset: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            limit: DEFAULT_PAGE_LIMIT,
            offset: 0,
        }
    }
}

impl Pagination {
    pub fn new(limit: Option<u32>, offset: Option<u32>) -> Self {
        Self {
            limit: limit.unwrap_or(DEFAULT_PAGE_LIMIT).clamp(1, MAX_PAGE_LIMIT),
            offset: offset.unwrap_or(0),
        }
    }

    pub fn next(self) -> Self {
        Self {
            limit: self.limit,
            offset: self.offset.saturating_add(self.limit),
        }
    }
}

/// Upper time bound of an event query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UpperBound {
    Exclusive(DateTime<Utc>),
    Inclusive(DateTime<Utc>),
}

impl UpperBound {
    pub fn admits(self, at: DateTime<Utc>) -> bool {
        match self {
            UpperBound::Exclusive(t) => at < t,
            UpperBound::Inclusive(t) => at <= t,
        }
    }
}

/// Filter criteria for history queries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventFilter {
    /// Restrict to these items. `Some(vec![])` matches nothing.
    pub item_ids: Option<Vec<ItemId>>,
    /// Inclusive lower bound on `occurred_at`.
    pub from: Option<DateTime<Utc>>,
    pub to: Option<UpperBound>,
    /// Also return rows with no item reference, whatever `item_ids` says.
    pub include_orphans: bool,
}

impl EventFilter {
    /// Events with `occurred_at` in `[window.start, window.end)`.
    pub fn within(window: TimeWindow) -> Self {
        Self {
            from: Some(window.start()),
            to: Some(UpperBound::Exclusive(window.end())),
            ..Self::default()
        }
    }

    pub fn for_items(mut self, ids: impl IntoIterator<Item = ItemId>) -> Self {
        self.item_ids = Some(ids.into_iter().collect());
        self
    }

    pub fn with_orphans(mut self) -> Self {
        self.include_orphans = true;
        self
    }

    pub fn matches(&self, event: &HistoryEvent) -> bool {
        let at = event.transition.occurred_at;
        let item_ok = match (&self.item_ids, event.item_id) {
            (Some(ids), Some(id)) => ids.contains(&id),
            (None, Some(_)) => true,
            (_, None) => self.include_orphans,
        };
        item_ok
            && self.from.is_none_or(|from| at >= from)
            && self.to.is_none_or(|to| to.admits(at))
    }
}

/// Filter criteria for snapshot listings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemFilter {
    pub size: Option<ContainerSize>,
    pub status: Option<ItemStatus>,
    /// Last transition within the window.
    pub transitioned_within: Option<TimeWindow>,
}

impl ItemFilter {
    pub fn of_size(size: Option<ContainerSize>) -> Self {
        Self {
            size,
            ..Self::default()
        }
    }

    pub fn with_status(mut self, status: ItemStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn transitioned_within(mut self, window: TimeWindow) -> Self {
        self.transitioned_within = Some(window);
        self
    }

    pub fn matches(&self, item: &Item) -> bool {
        self.size.is_none_or(|s| item.size() == s)
            && self.status.is_none_or(|s| item.status() == s)
            && self
                .transitioned_within
                .is_none_or(|w| w.contains(item.state.last_transition_at))
    }
}

/// Paginated history query result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventPage {
    pub events: Vec<HistoryEvent>,
    /// Rows matching the filter across all pages, as of this read.
    pub total: u64,
    pub pagination: Pagination,
    pub has_more: bool,
}
