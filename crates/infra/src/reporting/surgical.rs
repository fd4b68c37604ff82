//! Daily surgical-theatre figures for the biopsy and lymph-node containers.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use fixtrack_containers::{ContainerSize, Item, ItemStatus, Place};
use fixtrack_core::ItemId;

use crate::window::TimeWindow;

use super::point_in_time::PointInTimeCount;

/// An item that left a surgical place during the day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReturnedItem {
    pub item_id: ItemId,
    pub combined_key: String,
    pub return_by: String,
    pub status: ItemStatus,
    pub place: Place,
    pub transitioned_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SurgicalDayReport {
    pub date: NaiveDate,
    pub size: ContainerSize,
    pub window: TimeWindow,
    /// Dispensed at a surgical place as the day began.
    pub at_day_start: PointInTimeCount,
    /// Dispensed at a surgical place as the day ended.
    pub at_day_end: PointInTimeCount,
    pub returned: Vec<ReturnedItem>,
}

/// Items carrying a return-by label, ordered by their last transition.
///
/// `items` should already be restricted to the size and day.
pub fn returned_items(items: &[Item]) -> Vec<ReturnedItem> {
    let mut returned: Vec<ReturnedItem> = items
        .iter()
        .filter_map(|item| {
            let return_by = item.state.return_by.clone()?;
            Some(ReturnedItem {
                item_id: item.id,
                combined_key: item.classification.combined_key(),
                return_by,
                status: item.state.status,
                place: item.state.place.clone(),
                transitioned_at: item.state.last_transition_at,
            })
        })
        .collect();
    returned.sort_by_key(|r| (r.transitioned_at, r.item_id));
    returned
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    use crate::reporting::aggregate::fixtures::item;

    #[test]
    fn only_labelled_items_in_time_order() {
        let base = Utc.with_ymd_and_hms(2025, 10, 1, 0, 0, 0).unwrap();
        let mut late = item(1, ContainerSize::Lymph40, "L");
        late.state.return_by = Some("operating-room".to_string());
        late.state.last_transition_at = base + Duration::hours(5);
        let mut early = item(2, ContainerSize::Lymph40, "L");
        early.state.return_by = Some("operating-room/room 1".to_string());
        early.state.last_transition_at = base + Duration::hours(1);
        let unlabelled = item(3, ContainerSize::Lymph40, "L");

        let returned = returned_items(&[late, unlabelled, early]);
        let ids: Vec<_> = returned.iter().map(|r| r.item_id.get()).collect();
        assert_eq!(ids, vec![2, 1]);
        assert_eq!(returned[0].combined_key, "L - B1 - K0002");
    }
}
