//! Paged history reads.

use std::collections::{BTreeMap, HashSet};

use fixtrack_containers::HistoryEvent;
use fixtrack_core::ItemId;

use crate::store::{EventFilter, HistoryStore, Pagination, StoreError};

/// Result of a full paged read, split by owning item.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemStreams {
    /// Per item, in `(occurred_at, history_id)` order.
    pub by_item: BTreeMap<ItemId, Vec<HistoryEvent>>,
    /// Rows with no item reference.
    pub orphans: Vec<HistoryEvent>,
}

impl ItemStreams {
    pub fn event_count(&self) -> usize {
        self.by_item.values().map(Vec::len).sum::<usize>() + self.orphans.len()
    }

    /// Item events in global `(item, occurred_at, history_id)` order.
    pub fn item_events(&self) -> impl Iterator<Item = &HistoryEvent> {
        self.by_item.values().flatten()
    }
}

/// Walks every page of a history query.
///
/// Concurrent appends can shift offsets between pages, so a row may show up
/// twice; rows are de-duplicated by history id and re-sorted at the end.
#[derive(Debug)]
pub struct HistoryReader<'a, H: ?Sized> {
    store: &'a H,
    page_size: u32,
}

impl<'a, H> HistoryReader<'a, H>
where
    H: HistoryStore + ?Sized,
{
    pub fn new(store: &'a H, page_size: u32) -> Self {
        Self { store, page_size }
    }

    pub fn read_all(&self, filter: &EventFilter) -> Result<Vec<HistoryEvent>, StoreError> {
        let mut seen = HashSet::new();
        let mut events = Vec::new();
        let mut pagination = Pagination::new(Some(self.page_size), None);
        let mut pages = 0u32;

        loop {
            let page = self.store.query_events(filter, pagination)?;
            pages += 1;
            tracing::debug!(
                offset = pagination.offset,
                returned = page.events.len(),
                total = page.total,
                "read history page"
            );

            let exhausted = !page.has_more || page.events.is_empty();
            events.extend(page.events.into_iter().filter(|e| seen.insert(e.history_id)));

            if exhausted {
                break;
            }
            pagination = pagination.next();
        }

        events.sort_by_key(HistoryEvent::order_key);
        tracing::debug!(pages, events = events.len(), "history read complete");
        Ok(events)
    }

    pub fn read_streams(&self, filter: &EventFilter) -> Result<ItemStreams, StoreError> {
        let mut streams = ItemStreams::default();
        for event in self.read_all(filter)? {
            match event.item_id {
                Some(id) => streams.by_item.entry(id).or_default().push(event),
                None => streams.orphans.push(event),
            }
        }
        Ok(streams)
    }
}
