//! Point-in-time state reconstruction.
//!
//! For a cutoff `S`, an item "was counted" iff its latest event strictly
//! before `S` left it Dispensed or Submitted. Each item is independent, so
//! large candidate sets are fanned out on the rayon pool; small ones stay
//! sequential.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::Serialize;

use fixtrack_containers::{HistoryEvent, ItemStatus, StatusValue};
use fixtrack_core::ItemId;

use crate::store::{HistoryStore, StoreError, UpperBound};

/// Starting condition of one item at a cutoff.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Seed {
    pub counted: bool,
    /// New status of the latest event before the cutoff; `None` when the
    /// item had no event yet.
    pub prior_status: Option<StatusValue>,
}

impl Seed {
    pub fn from_prior(prior: Option<&HistoryEvent>) -> Self {
        let prior_status = prior.map(|e| e.transition.new_status.clone());
        let counted = prior_status
            .as_ref()
            .and_then(StatusValue::known)
            .is_some_and(ItemStatus::is_counted);
        Self { counted, prior_status }
    }

    pub fn has_prior(&self) -> bool {
        self.prior_status.is_some()
    }

    /// Status the item was in at the cutoff, if it was a known one.
    pub fn status(&self) -> Option<ItemStatus> {
        self.prior_status.as_ref().and_then(StatusValue::known)
    }
}

/// Latest event admitted by `at` for each of `items`.
///
/// Runs on the rayon pool once `items` reaches `parallel_threshold`.
pub fn latest_at_each<H>(
    store: &H,
    items: &[ItemId],
    at: UpperBound,
    parallel_threshold: usize,
) -> Result<BTreeMap<ItemId, Option<HistoryEvent>>, StoreError>
where
    H: HistoryStore + ?Sized,
{
    let fetch = |id: &ItemId| -> Result<(ItemId, Option<HistoryEvent>), StoreError> {
        Ok((*id, store.latest_event_at(*id, at)?))
    };

    let latest = if items.len() < parallel_threshold.max(1) {
        items.iter().map(fetch).collect::<Result<BTreeMap<_, _>, _>>()?
    } else {
        items.par_iter().map(fetch).collect::<Result<BTreeMap<_, _>, _>>()?
    };

    tracing::debug!(items = items.len(), cutoff = ?at, "fetched latest prior events");
    Ok(latest)
}

/// Seeds for `items` at cutoff `before` (exclusive).
pub fn seed_items<H>(
    store: &H,
    items: &[ItemId],
    before: DateTime<Utc>,
    parallel_threshold: usize,
) -> Result<BTreeMap<ItemId, Seed>, StoreError>
where
    H: HistoryStore + ?Sized,
{
    let latest = latest_at_each(store, items, UpperBound::Exclusive(before), parallel_threshold)?;
    Ok(latest
        .into_iter()
        .map(|(id, prior)| (id, Seed::from_prior(prior.as_ref())))
        .collect())
}
