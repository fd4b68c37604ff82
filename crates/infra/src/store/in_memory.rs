use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use fixtrack_containers::{Container, ContainerCommand, HistoryEvent, Item, Transition};
use fixtrack_core::aggregate::execute;
use fixtrack_core::{AggregateRoot, ExpectedVersion, HistoryId, ItemId};

use super::query::{EventFilter, EventPage, ItemFilter, Pagination, UpperBound};
use super::r#trait::{HistoryStore, ItemStore, StoreError};

#[derive(Debug, Default)]
struct Tables {
    containers: BTreeMap<ItemId, Container>,
    history: Vec<HistoryEvent>,
    /// Positions in `history`, per item.
    by_item: HashMap<ItemId, Vec<usize>>,
    last_history_id: u64,
}

impl Tables {
    fn push_history(&mut self, item_id: Option<ItemId>, transition: Transition) -> HistoryEvent {
        self.last_history_id += 1;
        let row = HistoryEvent::new(HistoryId::new(self.last_history_id), item_id, transition);
        if let Some(id) = item_id {
            self.by_item.entry(id).or_default().push(self.history.len());
        }
        self.history.push(row.clone());
        row
    }
}

/// In-memory item snapshot table plus history log.
///
/// Intended for tests/dev. Commands update the snapshot and append history
/// under one lock, mirroring the transactional write path.
#[derive(Debug, Default)]
pub struct InMemoryTracker {
    tables: RwLock<Tables>,
}

impl InMemoryTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn poisoned() -> StoreError {
        StoreError::Unavailable("lock poisoned".to_string())
    }

    /// Run a container command; on success the snapshot is updated and the
    /// resulting history rows are returned.
    pub fn execute(
        &self,
        command: &ContainerCommand,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<HistoryEvent>, StoreError> {
        let item_id = command.item_id();
        let mut tables = self.tables.write().map_err(|_| Self::poisoned())?;

        let mut container = tables
            .containers
            .get(&item_id)
            .cloned()
            .unwrap_or_else(|| Container::empty(item_id));

        if !expected_version.matches(container.version()) {
            return Err(StoreError::Concurrency(format!(
                "expected {expected_version:?}, found {}",
                container.version()
            )));
        }

        let events = execute(&mut container, command)?;
        let rows: Vec<HistoryEvent> = events
            .into_iter()
            .map(|ev| tables.push_history(Some(item_id), ev.into_transition()))
            .collect();
        tables.containers.insert(item_id, container);
        Ok(rows)
    }

    /// Append a raw history row without touching any snapshot.
    ///
    /// Used to load legacy data: orphaned rows, unrecognized values, rows that
    /// disagree with the snapshot.
    pub fn append_raw(&self, item_id: Option<ItemId>, transition: Transition) -> Result<HistoryEvent, StoreError> {
        let mut tables = self.tables.write().map_err(|_| Self::poisoned())?;
        Ok(tables.push_history(item_id, transition))
    }

    /// Overwrite an item snapshot without writing history.
    pub fn import_snapshot(&self, item: Item) -> Result<(), StoreError> {
        let mut tables = self.tables.write().map_err(|_| Self::poisoned())?;
        let version = tables
            .containers
            .get(&item.id)
            .map(|c| c.version())
            .unwrap_or(0);
        tables.containers.insert(item.id, Container::from_snapshot(item, version));
        Ok(())
    }

    pub fn history_len(&self) -> Result<usize, StoreError> {
        let tables = self.tables.read().map_err(|_| Self::poisoned())?;
        Ok(tables.history.len())
    }
}

impl HistoryStore for InMemoryTracker {
    fn query_events(&self, filter: &EventFilter, pagination: Pagination) -> Result<EventPage, StoreError> {
        let tables = self.tables.read().map_err(|_| Self::poisoned())?;

        let mut matching: Vec<&HistoryEvent> = tables.history.iter().filter(|e| filter.matches(e)).collect();
        matching.sort_by_key(|e| e.order_key());

        let total = matching.len() as u64;
        let offset = pagination.offset as usize;
        let events: Vec<HistoryEvent> = matching
            .into_iter()
            .skip(offset)
            .take(pagination.limit as usize)
            .cloned()
            .collect();
        let has_more = (offset + events.len()) < total as usize;

        Ok(EventPage {
            events,
            total,
            pagination,
            has_more,
        })
    }

    fn latest_event_at(&self, item_id: ItemId, at: UpperBound) -> Result<Option<HistoryEvent>, StoreError> {
        let tables = self.tables.read().map_err(|_| Self::poisoned())?;
        let Some(positions) = tables.by_item.get(&item_id) else {
            return Ok(None);
        };
        Ok(positions
            .iter()
            .filter_map(|&pos| tables.history.get(pos))
            .filter(|e| at.admits(e.transition.occurred_at))
            .max_by_key(|e| (e.transition.occurred_at, e.history_id))
            .cloned())
    }
}

impl ItemStore for InMemoryTracker {
    fn list_items(&self, filter: &ItemFilter) -> Result<Vec<Item>, StoreError> {
        let tables = self.tables.read().map_err(|_| Self::poisoned())?;
        Ok(tables
            .containers
            .values()
            .filter_map(Container::item)
            .filter(|item| filter.matches(item))
            .cloned()
            .collect())
    }

    fn get_item(&self, id: ItemId) -> Result<Option<Item>, StoreError> {
        let tables = self.tables.read().map_err(|_| Self::poisoned())?;
        Ok(tables.containers.get(&id).and_then(Container::item).cloned())
    }
}
