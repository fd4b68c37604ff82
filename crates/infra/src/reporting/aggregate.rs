//! Grouping of reconciled records into report rows.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;

use fixtrack_containers::{Item, Place};
use fixtrack_core::ActorId;

use crate::reconciliation::DispenseRecord;
use crate::window::CivilCalendar;

use super::collate;

/// Valid dispenses sharing lot, civil date, destination and actor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispenseRow {
    pub date: NaiveDate,
    pub lot_number: String,
    pub place: Place,
    pub actor: ActorId,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LotCount {
    pub lot_number: String,
    pub count: usize,
}

/// Group dispenses into rows, ordered by date, then lot, actor and place.
pub fn dispense_rows<'a>(
    dispenses: impl IntoIterator<Item = (&'a DispenseRecord, &'a Item)>,
    calendar: &CivilCalendar,
) -> Vec<DispenseRow> {
    let mut groups: BTreeMap<(NaiveDate, String, ActorId, Place), usize> = BTreeMap::new();
    for (record, item) in dispenses {
        let key = (
            calendar.civil_date(record.occurred_at),
            item.classification.lot_number.clone(),
            record.actor.clone(),
            record.destination.clone(),
        );
        *groups.entry(key).or_default() += 1;
    }

    let mut rows: Vec<DispenseRow> = groups
        .into_iter()
        .map(|((date, lot_number, actor, place), count)| DispenseRow {
            date,
            lot_number,
            place,
            actor,
            count,
        })
        .collect();
    rows.sort_by(|a, b| {
        a.date
            .cmp(&b.date)
            .then_with(|| collate::compare(&a.lot_number, &b.lot_number))
            .then_with(|| collate::compare(a.actor.as_str(), b.actor.as_str()))
            .then_with(|| collate::compare(&a.place.label(), &b.place.label()))
    });
    rows
}

/// Count items per lot, ordered by lot.
pub fn lot_counts<'a>(items: impl IntoIterator<Item = &'a Item>) -> Vec<LotCount> {
    let mut groups: BTreeMap<&str, usize> = BTreeMap::new();
    for item in items {
        *groups.entry(item.classification.lot_number.as_str()).or_default() += 1;
    }
    let mut counts: Vec<LotCount> = groups
        .into_iter()
        .map(|(lot, count)| LotCount {
            lot_number: lot.to_string(),
            count,
        })
        .collect();
    counts.sort_by(|a, b| collate::compare(&a.lot_number, &b.lot_number));
    counts
}


#[cfg(test)]
mod tests {
    use super::fixtures::{item, record};
    use super::*;
    use chrono::{TimeZone, Utc};
    use fixtrack_containers::{ContainerSize, Department};

    #[test]
    fn ten_identical_dispenses_make_one_row() {
        let calendar = CivilCalendar::default();
        let at = Utc.with_ymd_and_hms(2025, 4, 1, 1, 0, 0).unwrap();
        let items: Vec<_> = (1..=10).map(|i| item(i, ContainerSize::Biopsy30, "L7")).collect();
        let records: Vec<_> = (1..=10)
            .map(|i| record(i, at, "suzuki", Department::Endoscopy.into()))
            .collect();

        let rows = dispense_rows(records.iter().zip(items.iter()), &calendar);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].count, 10);
        assert_eq!(rows[0].date, NaiveDate::from_ymd_opt(2025, 4, 1).unwrap());
    }

    #[test]
    fn rows_sort_by_date_lot_actor_place() {
        let calendar = CivilCalendar::default();
        // 15:30 UTC is already the next civil day at +09:00.
        let late = Utc.with_ymd_and_hms(2025, 4, 1, 15, 30, 0).unwrap();
        let early = Utc.with_ymd_and_hms(2025, 4, 1, 2, 0, 0).unwrap();
        let items = [
            item(1, ContainerSize::Neutral25, "L2"),
            item(2, ContainerSize::Neutral25, "l1"),
            item(3, ContainerSize::Neutral25, "L1"),
            item(4, ContainerSize::Neutral25, "L1"),
        ];
        let records = [
            record(1, early, "b", Department::Ward.into()),
            record(2, late, "a", Department::Ward.into()),
            record(3, early, "b", Department::Urology.into()),
            record(4, early, "a", Department::Ward.into()),
        ];

        let rows = dispense_rows(records.iter().zip(items.iter()), &calendar);
        let summary: Vec<_> = rows
            .iter()
            .map(|r| (r.date.to_string(), r.lot_number.as_str(), r.actor.as_str()))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("2025-04-01".to_string(), "L1", "a"),
                ("2025-04-01".to_string(), "L1", "b"),
                ("2025-04-01".to_string(), "L2", "b"),
                ("2025-04-02".to_string(), "l1", "a"),
            ]
        );
    }

    #[test]
    fn lots_roll_up() {
        let items = [
            item(1, ContainerSize::Lymph40, "L2"),
            item(2, ContainerSize::Lymph40, "L1"),
            item(3, ContainerSize::Lymph40, "L2"),
        ];
        let counts = lot_counts(items.iter());
        assert_eq!(
            counts,
            vec![
                LotCount { lot_number: "L1".to_string(), count: 1 },
                LotCount { lot_number: "L2".to_string(), count: 2 },
            ]
        );
    }
}
