//! Per-size window summaries (the on-screen inventory figures).

use std::collections::BTreeMap;

use serde::Serialize;

use fixtrack_containers::{ContainerSize, Item, ItemStatus};
use fixtrack_core::ItemId;

use crate::reconciliation::{Reconciliation, Seed};
use crate::window::{CivilCalendar, TimeWindow};

use super::aggregate::{dispense_rows, lot_counts, DispenseRow, LotCount};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SizeSummary {
    pub size: ContainerSize,
    pub window: TimeWindow,
    /// Distinct items received in the window.
    pub in_count: usize,
    /// Valid dispenses after reconciliation.
    pub out_count: usize,
    /// Items in stock as of the window end.
    pub stock_count: usize,
    /// Items currently submitted whose last transition fell in the window.
    pub submission_count: usize,
    pub inbound_details: Vec<LotCount>,
    pub outbound_details: Vec<DispenseRow>,
    pub stock_details: Vec<LotCount>,
}

/// Everything a summary needs beyond the reconciliation itself.
#[derive(Debug, Clone, Copy)]
pub struct SummaryInputs<'a> {
    pub reconciliation: &'a Reconciliation,
    /// Seeds of the candidate items at the window end.
    pub end_seeds: &'a BTreeMap<ItemId, Seed>,
    /// Submitted items whose last transition fell in the window.
    pub submitted: &'a [Item],
    pub calendar: &'a CivilCalendar,
}

#[derive(Debug, Default)]
struct Partition<'a> {
    intakes: Vec<&'a Item>,
    stock: Vec<&'a Item>,
    submitted: usize,
}

/// One summary per size in `sizes`, from a single pass over the inputs.
pub fn summarize_sizes(sizes: &[ContainerSize], inputs: SummaryInputs<'_>) -> BTreeMap<ContainerSize, SizeSummary> {
    let rec = inputs.reconciliation;
    let mut parts: BTreeMap<ContainerSize, Partition<'_>> =
        sizes.iter().map(|size| (*size, Partition::default())).collect();

    for item in rec.intakes_with_items() {
        if let Some(part) = parts.get_mut(&item.size()) {
            part.intakes.push(item);
        }
    }
    for (id, seed) in inputs.end_seeds {
        if seed.status() != Some(ItemStatus::Intake) {
            continue;
        }
        if let Some(item) = rec.items.get(id) {
            if let Some(part) = parts.get_mut(&item.size()) {
                part.stock.push(item);
            }
        }
    }
    for item in inputs.submitted {
        if let Some(part) = parts.get_mut(&item.size()) {
            part.submitted += 1;
        }
    }

    let mut dispenses: BTreeMap<ContainerSize, Vec<_>> = BTreeMap::new();
    for (record, item) in rec.dispenses_with_items() {
        dispenses.entry(item.size()).or_default().push((record, item));
    }

    parts
        .into_iter()
        .map(|(size, part)| {
            let outbound = dispenses.remove(&size).unwrap_or_default();
            let summary = SizeSummary {
                size,
                window: rec.window,
                in_count: part.intakes.len(),
                out_count: outbound.len(),
                stock_count: part.stock.len(),
                submission_count: part.submitted,
                inbound_details: lot_counts(part.intakes.iter().copied()),
                outbound_details: dispense_rows(outbound, inputs.calendar),
                stock_details: lot_counts(part.stock.iter().copied()),
            };
            (size, summary)
        })
        .collect()
}
