//! Point-in-time counts ("how many were X at instant T").

use chrono::{DateTime, Utc};
use serde::Serialize;

use fixtrack_containers::{ContainerSize, HistoryEvent, ItemStatus, Place};
use fixtrack_core::ItemId;

use crate::reconciliation::latest_at_each;
use crate::store::{HistoryStore, ItemFilter, ItemStore, StoreError, UpperBound};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "place")]
pub enum PlaceCriterion {
    Any,
    /// Operating room or any of its sub-locations (`operating-room/<name>`).
    /// The legacy screens matched only the operating room itself; use
    /// `Exactly(Department::OperatingRoom.into())` to reproduce their figures.
    Surgical,
    Exactly(Place),
}

impl PlaceCriterion {
    pub fn admits(&self, place: &Place) -> bool {
        match self {
            PlaceCriterion::Any => true,
            PlaceCriterion::Surgical => place.is_surgical(),
            PlaceCriterion::Exactly(p) => p == place,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CountCriteria {
    pub size: ContainerSize,
    pub status: Option<ItemStatus>,
    pub place: PlaceCriterion,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PointInTimeCount {
    pub criteria: CountCriteria,
    pub at: UpperBound,
    pub lookback_from: Option<DateTime<Utc>>,
    pub count: usize,
    pub items: Vec<ItemId>,
}

/// Place an event left the item in. An empty new place means unchanged.
fn place_after(event: &HistoryEvent) -> &Place {
    let t = &event.transition;
    if t.new_place.is_unset() { &t.old_place } else { &t.new_place }
}

fn matches(criteria: &CountCriteria, event: &HistoryEvent) -> bool {
    let status_ok = match criteria.status {
        Some(status) => event.transition.new_status.is(status),
        None => event.transition.new_status.known().is_some(),
    };
    status_ok && criteria.place.admits(place_after(event))
}

/// Count items of `criteria.size` whose latest event admitted by `at` left
/// them matching `criteria`.
///
/// With `lookback_from`, an item whose latest event is older than that
/// instant is not counted.
pub fn count_as_of<H, I>(
    history: &H,
    items: &I,
    criteria: CountCriteria,
    at: UpperBound,
    lookback_from: Option<DateTime<Utc>>,
    parallel_threshold: usize,
) -> Result<PointInTimeCount, StoreError>
where
    H: HistoryStore + ?Sized,
    I: ItemStore + ?Sized,
{
    let candidates = items.list_items(&ItemFilter::of_size(Some(criteria.size)))?;
    let ids: Vec<ItemId> = candidates.iter().map(|item| item.id).collect();
    let latest = latest_at_each(history, &ids, at, parallel_threshold)?;

    let matching: Vec<ItemId> = latest
        .into_iter()
        .filter_map(|(id, event)| event.map(|e| (id, e)))
        .filter(|(_, event)| lookback_from.is_none_or(|from| event.transition.occurred_at >= from))
        .filter(|(_, event)| matches(&criteria, event))
        .map(|(id, _)| id)
        .collect();

    tracing::debug!(
        size = criteria.size.label(),
        candidates = candidates.len(),
        count = matching.len(),
        "point-in-time count"
    );

    Ok(PointInTimeCount {
        criteria,
        at,
        lookback_from,
        count: matching.len(),
        items: matching,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use fixtrack_containers::{
        Classification, ContainerCommand, Department, Dispense, Receive, Relocate, StatusValue, Submit,
        Transition,
    };
    use fixtrack_core::{ActorId, ExpectedVersion};

    use crate::store::InMemoryTracker;

    fn t(h: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 9, 1, 0, 0, 0).unwrap() + Duration::hours(h)
    }

    fn run(store: &InMemoryTracker, command: ContainerCommand) {
        store.execute(&command, ExpectedVersion::Any).unwrap();
    }

    fn receive(id: i64, at: i64) -> ContainerCommand {
        ContainerCommand::Receive(Receive {
            item_id: ItemId::new(id),
            classification: Classification {
                serial: format!("S{id}"),
                size: ContainerSize::Biopsy30,
                lot_number: "L".to_string(),
                box_number: "B".to_string(),
                product_code: "P".to_string(),
                expires_on: None,
            },
            place: Place::Unset,
            actor: ActorId::from("lab"),
            occurred_at: t(at),
        })
    }

    fn dispense(id: i64, at: i64, to: Place) -> ContainerCommand {
        ContainerCommand::Dispense(Dispense {
            item_id: ItemId::new(id),
            destination: to,
            actor: ActorId::from("nurse"),
            occurred_at: t(at),
        })
    }

    fn surgical_dispensed() -> CountCriteria {
        CountCriteria {
            size: ContainerSize::Biopsy30,
            status: Some(ItemStatus::Dispensed),
            place: PlaceCriterion::Surgical,
        }
    }

    #[test]
    fn surgical_criterion_admits_sub_locations() {
        let room: Place = Department::OperatingRoom.into();
        let theatre = Place::parse("operating-room/theatre 1");
        assert!(PlaceCriterion::Surgical.admits(&room));
        assert!(PlaceCriterion::Surgical.admits(&theatre));
        assert!(!PlaceCriterion::Surgical.admits(&Department::Endoscopy.into()));

        let exact = PlaceCriterion::Exactly(room.clone());
        assert!(exact.admits(&room));
        assert!(!exact.admits(&theatre));
    }

    #[test]
    fn counts_latest_state_before_cutoff() {
        let store = InMemoryTracker::new();
        for id in 1..=3 {
            run(&store, receive(id, 0));
        }
        run(&store, dispense(1, 1, Department::OperatingRoom.into()));
        run(&store, dispense(2, 1, Place::parse("operating-room/theatre 2")));
        run(&store, dispense(3, 1, Department::Endoscopy.into()));
        run(
            &store,
            ContainerCommand::Submit(Submit {
                item_id: ItemId::new(2),
                actor: ActorId::from("nurse"),
                occurred_at: t(5),
            }),
        );

        let before = count_as_of(&store, &store, surgical_dispensed(), UpperBound::Exclusive(t(5)), None, 64).unwrap();
        assert_eq!(before.items, vec![ItemId::new(1), ItemId::new(2)]);

        let inclusive = count_as_of(&store, &store, surgical_dispensed(), UpperBound::Inclusive(t(5)), None, 64).unwrap();
        assert_eq!(inclusive.items, vec![ItemId::new(1)]);
    }

    #[test]
    fn inclusive_cutoff_is_exact_below_microseconds() {
        let store = InMemoryTracker::new();
        run(&store, receive(1, 0));
        run(&store, dispense(1, 1, Department::OperatingRoom.into()));
        let just_after = t(5) + Duration::nanoseconds(500);
        run(
            &store,
            ContainerCommand::Submit(Submit {
                item_id: ItemId::new(1),
                actor: ActorId::from("nurse"),
                occurred_at: just_after,
            }),
        );

        let at_t = count_as_of(&store, &store, surgical_dispensed(), UpperBound::Inclusive(t(5)), None, 64).unwrap();
        assert_eq!(at_t.items, vec![ItemId::new(1)]);
        let after = count_as_of(&store, &store, surgical_dispensed(), UpperBound::Inclusive(just_after), None, 64).unwrap();
        assert!(after.items.is_empty());
    }

    #[test]
    fn lookback_excludes_stale_items() {
        let store = InMemoryTracker::new();
        run(&store, receive(1, 0));
        run(&store, receive(2, 0));
        run(&store, dispense(1, 1, Department::OperatingRoom.into()));
        run(&store, dispense(2, 1, Department::OperatingRoom.into()));
        run(
            &store,
            ContainerCommand::Relocate(Relocate {
                item_id: ItemId::new(2),
                place: Place::parse("operating-room/recovery"),
                actor: ActorId::from("nurse"),
                occurred_at: t(40),
            }),
        );

        let count = count_as_of(
            &store,
            &store,
            surgical_dispensed(),
            UpperBound::Exclusive(t(48)),
            Some(t(24)),
            64,
        )
        .unwrap();
        assert_eq!(count.items, vec![ItemId::new(2)]);
    }

    #[test]
    fn unset_new_place_keeps_previous_place() {
        let store = InMemoryTracker::new();
        run(&store, receive(1, 0));
        run(&store, dispense(1, 1, Department::OperatingRoom.into()));
        store
            .append_raw(
                Some(ItemId::new(1)),
                Transition {
                    actor: ActorId::from("admin"),
                    occurred_at: t(2),
                    old_status: StatusValue::parse("dispensed"),
                    new_status: StatusValue::parse("dispensed"),
                    old_place: Department::OperatingRoom.into(),
                    new_place: Place::Unset,
                },
            )
            .unwrap();

        let count = count_as_of(&store, &store, surgical_dispensed(), UpperBound::Exclusive(t(3)), None, 1).unwrap();
        assert_eq!(count.count, 1);
    }
}
