//! Export-ready outbound ledgers, one sheet per size.

use std::collections::BTreeMap;

use chrono::{DateTime, FixedOffset};
use serde::Serialize;

use fixtrack_containers::{ContainerSize, ItemStatus, Place};
use fixtrack_core::ActorId;

use crate::reconciliation::Reconciliation;
use crate::window::{CivilCalendar, TimeWindow};

use super::aggregate::{dispense_rows, DispenseRow};
use super::collate;

/// One valid dispense, as printed on the detail ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerRow {
    /// `lot - box - serial`
    pub combined_key: String,
    pub size: ContainerSize,
    pub actor: ActorId,
    pub local_time: DateTime<FixedOffset>,
    pub destination: Place,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LotBreakdown {
    pub lot_number: String,
    pub dispensed: usize,
    /// Dispenses that went straight from stock to submitted.
    pub submitted: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutboundSummary {
    pub size: ContainerSize,
    pub window: TimeWindow,
    pub rows: Vec<DispenseRow>,
    pub lots: Vec<LotBreakdown>,
}

fn empty_per_size<T>() -> BTreeMap<ContainerSize, Vec<T>> {
    ContainerSize::ALL.into_iter().map(|size| (size, Vec::new())).collect()
}

/// Detail ledger per size, rows in time order. Every size gets a sheet.
pub fn outbound_ledger(
    rec: &Reconciliation,
    calendar: &CivilCalendar,
) -> BTreeMap<ContainerSize, Vec<LedgerRow>> {
    let mut sheets = empty_per_size();
    for (record, item) in rec.dispenses_with_items() {
        sheets.entry(item.size()).or_default().push(LedgerRow {
            combined_key: item.classification.combined_key(),
            size: item.size(),
            actor: record.actor.clone(),
            local_time: calendar.local(record.occurred_at),
            destination: record.destination.clone(),
        });
    }
    sheets
}

/// Grouped ledger and per-lot breakdown per size.
pub fn outbound_summary(
    rec: &Reconciliation,
    calendar: &CivilCalendar,
) -> BTreeMap<ContainerSize, OutboundSummary> {
    let mut per_size = empty_per_size();
    for pair in rec.dispenses_with_items() {
        per_size.entry(pair.1.size()).or_default().push(pair);
    }

    per_size
        .into_iter()
        .map(|(size, dispenses)| {
            let mut lots: BTreeMap<&str, LotBreakdown> = BTreeMap::new();
            for (record, item) in &dispenses {
                let lot = item.classification.lot_number.as_str();
                let entry = lots.entry(lot).or_insert_with(|| LotBreakdown {
                    lot_number: lot.to_string(),
                    dispensed: 0,
                    submitted: 0,
                });
                match record.status {
                    ItemStatus::Submitted => entry.submitted += 1,
                    _ => entry.dispensed += 1,
                }
            }
            let mut lots: Vec<LotBreakdown> = lots.into_values().collect();
            lots.sort_by(|a, b| collate::compare(&a.lot_number, &b.lot_number));

            let summary = OutboundSummary {
                size,
                window: rec.window,
                rows: dispense_rows(dispenses, calendar),
                lots,
            };
            (size, summary)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    use chrono::{Duration, TimeZone, Utc};
    use fixtrack_containers::Department;

    use crate::reconciliation::{IntegrityReport, ReconciliationStats};
    use crate::reporting::aggregate::fixtures::{item, record};

    fn reconciliation() -> Reconciliation {
        let start = Utc.with_ymd_and_hms(2025, 11, 3, 15, 0, 0).unwrap();
        let items = [
            item(1, ContainerSize::Biopsy30, "L2"),
            item(2, ContainerSize::Biopsy30, "L1"),
            item(3, ContainerSize::Lymph40, "L9"),
        ];
        let mut direct = record(2, start + Duration::hours(1), "a", Department::Endoscopy.into());
        direct.status = ItemStatus::Submitted;
        Reconciliation {
            window: TimeWindow::new(start, start + Duration::days(1)).unwrap(),
            size: None,
            valid_dispenses: BTreeMap::from([
                (items[0].id, record(1, start + Duration::hours(2), "a", Department::Endoscopy.into())),
                (items[1].id, direct),
                (items[2].id, record(3, start + Duration::hours(3), "b", Department::Ward.into())),
            ]),
            counted_flags: BTreeMap::new(),
            intake_items: BTreeSet::new(),
            stats: ReconciliationStats::default(),
            integrity: IntegrityReport::default(),
            items: items.iter().map(|i| (i.id, i.clone())).collect(),
        }
    }

    #[test]
    fn ledger_rows_are_time_ordered_per_size() {
        let sheets = outbound_ledger(&reconciliation(), &CivilCalendar::default());
        assert_eq!(sheets.len(), 3);
        assert!(sheets[&ContainerSize::Neutral25].is_empty());
        let biopsy: Vec<_> = sheets[&ContainerSize::Biopsy30].iter().map(|r| r.combined_key.as_str()).collect();
        assert_eq!(biopsy, vec!["L1 - B1 - K0002", "L2 - B1 - K0001"]);
        assert_eq!(sheets[&ContainerSize::Lymph40][0].local_time.to_rfc3339(), "2025-11-04T03:00:00+09:00");
    }

    #[test]
    fn lot_breakdown_splits_direct_submissions() {
        let summaries = outbound_summary(&reconciliation(), &CivilCalendar::default());
        let biopsy = &summaries[&ContainerSize::Biopsy30];
        assert_eq!(
            biopsy.lots,
            vec![
                LotBreakdown { lot_number: "L1".to_string(), dispensed: 0, submitted: 1 },
                LotBreakdown { lot_number: "L2".to_string(), dispensed: 1, submitted: 0 },
            ]
        );
        assert_eq!(biopsy.rows.len(), 2);
        assert!(summaries[&ContainerSize::Neutral25].rows.is_empty());
    }

    #[test]
    fn rows_serialize_with_canonical_labels() {
        let sheets = outbound_ledger(&reconciliation(), &CivilCalendar::default());
        let json = serde_json::to_value(&sheets[&ContainerSize::Lymph40][0]).unwrap();
        assert_eq!(json["size"], "40ml");
        assert_eq!(json["destination"], "ward");
        assert_eq!(json["actor"], "b");
    }
}
