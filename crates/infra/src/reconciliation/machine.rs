//! The windowed reconciliation state machine.
//!
//! Each item carries one flag, `counted`, seeded from its state just before
//! the window. In-window events are classified against that flag, first match
//! wins:
//!
//! | # | counted | old | new | effect |
//! |---|---------|-----|-----|--------|
//! | 1 | false | Intake | Dispensed / Submitted | emit a valid dispense, `counted = true` |
//! | 2 | true | Dispensed | Intake | retract the live dispense, `counted = false` |
//! | 3 | true | non-empty, not Intake | Intake | same as 2 |
//! | 4 | any | Submitted | Dispensed | none |
//! | 5 | anything else | | | none |
//!
//! Rows with an unrecognized status on either side always fall to rule 5.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::Serialize;

use fixtrack_containers::{HistoryEvent, ItemStatus, Place, StatusValue, Transition};
use fixtrack_core::{ActorId, HistoryId, ItemId};
use fixtrack_events::Projection;

use super::integrity::IntegrityReport;
use super::seed::Seed;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Rule {
    GenuineDispense,
    SimpleReversal,
    ForcedReversal,
    IgnoredRedispense,
    NoEffect,
}

/// Pure rule classifier shared by every report.
pub fn classify(counted: bool, transition: &Transition) -> Rule {
    use ItemStatus::{Dispensed, Intake, Submitted};

    if transition.has_unrecognized_status() {
        return Rule::NoEffect;
    }
    match (counted, transition.old_status.known(), transition.new_status.known()) {
        (false, Some(Intake), Some(Dispensed | Submitted)) => Rule::GenuineDispense,
        (true, Some(Dispensed), Some(Intake)) => Rule::SimpleReversal,
        (true, Some(old), Some(Intake)) if old != Intake => Rule::ForcedReversal,
        (_, Some(Submitted), Some(Dispensed)) => Rule::IgnoredRedispense,
        _ => Rule::NoEffect,
    }
}

/// A dispense that survived reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispenseRecord {
    pub history_id: HistoryId,
    pub item_id: ItemId,
    pub occurred_at: DateTime<Utc>,
    pub actor: ActorId,
    pub destination: Place,
    /// Dispensed, or Submitted for a direct intake-to-submission.
    pub status: ItemStatus,
}

impl DispenseRecord {
    fn from_event(item_id: ItemId, event: &HistoryEvent, status: ItemStatus) -> Self {
        let t = &event.transition;
        Self {
            history_id: event.history_id,
            item_id,
            occurred_at: t.occurred_at,
            actor: t.actor.clone(),
            destination: t.new_place.clone(),
            status,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReconciliationStats {
    pub items_seeded: usize,
    pub items_replayed: usize,
    pub events_replayed: u64,
    pub dispenses_emitted: u64,
    pub dispenses_retracted: u64,
    /// Reversals of dispenses made before the window (nothing to retract).
    pub carried_reversals: u64,
    pub ignored_redispenses: u64,
    pub no_effect: u64,
}

#[derive(Debug, Clone)]
struct Track {
    counted: bool,
    last_status: StatusValue,
}

/// Replays one window's events on top of per-item seeds.
///
/// Driven through `ProjectionRunner`, which guarantees per-item order and
/// drops orphans and duplicate rows before they get here.
#[derive(Debug)]
pub struct WindowMachine {
    seeds: BTreeMap<ItemId, Seed>,
    tracks: BTreeMap<ItemId, Track>,
    valid: BTreeMap<ItemId, DispenseRecord>,
    intakes: BTreeSet<ItemId>,
    stats: ReconciliationStats,
    integrity: IntegrityReport,
}

/// Everything a finished replay produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MachineOutput {
    pub valid_dispenses: BTreeMap<ItemId, DispenseRecord>,
    /// Final flag per seeded item; the seed for the next adjacent window.
    pub counted_flags: BTreeMap<ItemId, bool>,
    /// Items with an `"" -> Intake` row in the window.
    pub intake_items: BTreeSet<ItemId>,
    pub stats: ReconciliationStats,
    pub integrity: IntegrityReport,
}

impl WindowMachine {
    /// `seeds` is the candidate set: rows for other items are reported as
    /// unknown and skipped.
    pub fn new(seeds: BTreeMap<ItemId, Seed>, integrity: IntegrityReport) -> Self {
        let stats = ReconciliationStats {
            items_seeded: seeds.len(),
            ..ReconciliationStats::default()
        };
        Self {
            seeds,
            tracks: BTreeMap::new(),
            valid: BTreeMap::new(),
            intakes: BTreeSet::new(),
            stats,
            integrity,
        }
    }

    pub fn is_counted(&self, item_id: ItemId) -> bool {
        match self.tracks.get(&item_id) {
            Some(track) => track.counted,
            None => self.seeds.get(&item_id).is_some_and(|s| s.counted),
        }
    }

    fn step(&mut self, item_id: ItemId, event: &HistoryEvent) {
        let Some(seed) = self.seeds.get(&item_id) else {
            self.integrity.record_unknown_item(event, item_id);
            return;
        };
        let track = self.tracks.entry(item_id).or_insert_with(|| Track {
            counted: seed.counted,
            last_status: seed.prior_status.clone().unwrap_or(StatusValue::Absent),
        });

        let t = &event.transition;
        if t.old_status != track.last_status {
            self.integrity.record_discontinuity(item_id, event, &track.last_status);
        }
        self.integrity.check_values(item_id, event);
        if t.is_intake() {
            self.intakes.insert(item_id);
        }

        let rule = classify(track.counted, t);
        match rule {
            Rule::GenuineDispense => {
                let status = t.new_status.known().unwrap_or(ItemStatus::Dispensed);
                self.valid
                    .insert(item_id, DispenseRecord::from_event(item_id, event, status));
                track.counted = true;
                self.stats.dispenses_emitted += 1;
            }
            Rule::SimpleReversal | Rule::ForcedReversal => {
                if self.valid.remove(&item_id).is_some() {
                    self.stats.dispenses_retracted += 1;
                } else {
                    self.stats.carried_reversals += 1;
                }
                track.counted = false;
            }
            Rule::IgnoredRedispense => self.stats.ignored_redispenses += 1,
            Rule::NoEffect => self.stats.no_effect += 1,
        }
        track.last_status = t.new_status.clone();
        self.stats.events_replayed += 1;

        tracing::trace!(item_id = %item_id, history_id = %event.history_id, ?rule, "replayed");
    }

    pub fn finish(self) -> MachineOutput {
        let mut stats = self.stats;
        stats.items_replayed = self.tracks.len();

        let mut counted_flags: BTreeMap<ItemId, bool> =
            self.seeds.iter().map(|(id, seed)| (*id, seed.counted)).collect();
        for (id, track) in &self.tracks {
            counted_flags.insert(*id, track.counted);
        }

        MachineOutput {
            valid_dispenses: self.valid,
            counted_flags,
            intake_items: self.intakes,
            stats,
            integrity: self.integrity,
        }
    }
}

impl Projection for WindowMachine {
    type Ev = HistoryEvent;

    fn apply(&mut self, event: &HistoryEvent) {
        if let Some(item_id) = event.item_id {
            self.step(item_id, event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use fixtrack_containers::Department;
    use fixtrack_events::ProjectionRunner;

    fn t(m: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 7, 1, 0, 0, 0).unwrap() + Duration::minutes(m)
    }

    fn transition(old: &str, new: &str) -> Transition {
        Transition {
            actor: ActorId::from("nurse"),
            occurred_at: t(0),
            old_status: StatusValue::parse(old),
            new_status: StatusValue::parse(new),
            old_place: Place::PathologyStock,
            new_place: Department::OperatingRoom.into(),
        }
    }

    fn ev(id: u64, item: i64, minute: i64, old: &str, new: &str) -> HistoryEvent {
        let mut tr = transition(old, new);
        tr.occurred_at = t(minute);
        HistoryEvent::new(HistoryId::new(id), Some(ItemId::new(item)), tr)
    }

    fn seeds(entries: &[(i64, Option<&str>)]) -> BTreeMap<ItemId, Seed> {
        entries
            .iter()
            .map(|(id, prior)| {
                let prior_status = prior.map(StatusValue::parse);
                let counted = prior_status
                    .as_ref()
                    .and_then(StatusValue::known)
                    .is_some_and(ItemStatus::is_counted);
                (ItemId::new(*id), Seed { counted, prior_status })
            })
            .collect()
    }

    fn run(seeds: BTreeMap<ItemId, Seed>, events: Vec<HistoryEvent>) -> MachineOutput {
        let machine = WindowMachine::new(seeds, IntegrityReport::default());
        ProjectionRunner::rebuild_from_scratch(|| machine, events)
            .unwrap()
            .into_projection()
            .finish()
    }

    #[test]
    fn classifier_table() {
        assert_eq!(classify(false, &transition("intake", "dispensed")), Rule::GenuineDispense);
        assert_eq!(classify(false, &transition("intake", "submitted")), Rule::GenuineDispense);
        assert_eq!(classify(true, &transition("intake", "dispensed")), Rule::NoEffect);
        assert_eq!(classify(true, &transition("dispensed", "intake")), Rule::SimpleReversal);
        assert_eq!(classify(false, &transition("dispensed", "intake")), Rule::NoEffect);
        assert_eq!(classify(true, &transition("submitted", "intake")), Rule::ForcedReversal);
        assert_eq!(classify(true, &transition("submitted", "dispensed")), Rule::IgnoredRedispense);
        assert_eq!(classify(false, &transition("submitted", "dispensed")), Rule::IgnoredRedispense);
        assert_eq!(classify(true, &transition("dispensed", "submitted")), Rule::NoEffect);
        assert_eq!(classify(true, &transition("", "intake")), Rule::NoEffect);
        assert_eq!(classify(true, &transition("intake", "intake")), Rule::NoEffect);
        assert_eq!(classify(true, &transition("lost", "intake")), Rule::NoEffect);
        assert_eq!(classify(false, &transition("intake", "lost")), Rule::NoEffect);
    }

    #[test]
    fn dispense_then_reversal_nets_zero() {
        let out = run(
            seeds(&[(1, None)]),
            vec![
                ev(1, 1, 0, "", "intake"),
                ev(2, 1, 1, "intake", "dispensed"),
                ev(3, 1, 2, "dispensed", "intake"),
            ],
        );
        assert!(out.valid_dispenses.is_empty());
        assert_eq!(out.counted_flags[&ItemId::new(1)], false);
        assert_eq!(out.stats.dispenses_emitted, 1);
        assert_eq!(out.stats.dispenses_retracted, 1);
        assert!(out.intake_items.contains(&ItemId::new(1)));
        assert!(out.integrity.is_clean());
    }

    #[test]
    fn forced_redispense_after_submission_is_ignored() {
        let out = run(
            seeds(&[(2, Some("submitted"))]),
            vec![ev(1, 2, 0, "submitted", "dispensed")],
        );
        assert!(out.valid_dispenses.is_empty());
        assert_eq!(out.counted_flags[&ItemId::new(2)], true);
        assert_eq!(out.stats.ignored_redispenses, 1);
    }

    #[test]
    fn single_dispense_is_one_record() {
        let out = run(seeds(&[(3, Some("intake"))]), vec![ev(7, 3, 0, "intake", "dispensed")]);
        assert_eq!(out.valid_dispenses.len(), 1);
        let record = &out.valid_dispenses[&ItemId::new(3)];
        assert_eq!(record.history_id, HistoryId::new(7));
        assert_eq!(record.destination, Place::Department(Department::OperatingRoom));
        assert_eq!(record.status, ItemStatus::Dispensed);
    }

    #[test]
    fn carried_over_dispense_reversal_does_not_go_negative() {
        let out = run(
            seeds(&[(4, Some("dispensed"))]),
            vec![
                ev(1, 4, 0, "dispensed", "intake"),
                ev(2, 4, 1, "intake", "dispensed"),
            ],
        );
        // The reversal has nothing to retract; the re-dispense counts once.
        assert_eq!(out.valid_dispenses.len(), 1);
        assert_eq!(out.stats.carried_reversals, 1);
        assert_eq!(out.counted_flags[&ItemId::new(4)], true);
    }

    #[test]
    fn anomalies_are_reported_not_fatal() {
        let mut orphan = ev(9, 0, 0, "intake", "dispensed");
        orphan.item_id = None;
        let out = run(
            seeds(&[(5, Some("intake"))]),
            vec![
                orphan,
                ev(1, 5, 0, "dispensed", "submitted"),
                ev(2, 6, 0, "intake", "dispensed"),
                ev(3, 5, 1, "submitted", "lost"),
            ],
        );
        assert!(out.valid_dispenses.is_empty());
        assert_eq!(out.integrity.discontinuities.len(), 1);
        assert!(out.integrity.unknown_items.contains(&ItemId::new(6)));
        assert_eq!(out.integrity.unrecognized_values.len(), 1);
        assert!(!out.counted_flags.contains_key(&ItemId::new(6)));
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        fn arb_status() -> impl Strategy<Value = &'static str> {
            prop_oneof![Just("intake"), Just("dispensed"), Just("submitted")]
        }

        /// A continuous status chain for one item, starting from intake.
        fn chain(statuses: &[&'static str]) -> Vec<HistoryEvent> {
            let mut old = "intake";
            let mut events = vec![ev(1, 1, 0, "", "intake")];
            for (i, &new) in statuses.iter().enumerate() {
                events.push(ev(i as u64 + 2, 1, i as i64 + 1, old, new));
                old = new;
            }
            events
        }

        proptest! {
            #[test]
            fn replay_is_idempotent(statuses in proptest::collection::vec(arb_status(), 0..20)) {
                let a = run(seeds(&[(1, None)]), chain(&statuses));
                let b = run(seeds(&[(1, None)]), chain(&statuses));
                prop_assert_eq!(a, b);
            }

            #[test]
            fn counted_tracks_final_status(statuses in proptest::collection::vec(arb_status(), 0..20)) {
                let out = run(seeds(&[(1, None)]), chain(&statuses));
                let last = statuses.last().copied().unwrap_or("intake");
                prop_assert_eq!(out.counted_flags[&ItemId::new(1)], last != "intake");
                prop_assert!(out.valid_dispenses.len() <= 1);
            }

            #[test]
            fn dispense_and_reversal_cancel(statuses in proptest::collection::vec(arb_status(), 0..20)) {
                let mut base = statuses.clone();
                base.push("intake");
                let before = run(seeds(&[(1, None)]), chain(&base));

                let mut extended = base.clone();
                extended.extend(["dispensed", "intake"]);
                let after = run(seeds(&[(1, None)]), chain(&extended));

                prop_assert_eq!(before.valid_dispenses.len(), after.valid_dispenses.len());
                prop_assert_eq!(before.counted_flags, after.counted_flags);
            }

            #[test]
            fn forced_redispense_never_counts(counted in any::<bool>()) {
                let prior = if counted { "submitted" } else { "intake" };
                let out = run(
                    seeds(&[(1, Some(prior))]),
                    vec![ev(1, 1, 0, "submitted", "dispensed")],
                );
                prop_assert!(out.valid_dispenses.is_empty());
                prop_assert_eq!(out.counted_flags[&ItemId::new(1)], counted);
            }
        }
    }
}
