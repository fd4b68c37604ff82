//! Query boundary: date ranges and size filters in, report structures out.
//!
//! Every report goes through the same pipeline:
//!
//! ```text
//! ReportRequest (civil dates, size label)
//!   ↓
//! 1. Validate and convert to a half-open UTC window
//!   ↓
//! 2. Seed each candidate item at the window start
//!   ↓
//! 3. Replay the window through the reconciliation machine
//!   ↓
//! 4. Group / count into the requested shape
//! ```
//!
//! The service holds no state between calls; each call reads the stores
//! afresh and discards its intermediates.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;
use thiserror::Error;

use fixtrack_containers::{ContainerSize, ItemStatus};
use fixtrack_core::{DomainError, ItemId};
use fixtrack_events::{ProjectionError, ProjectionRunner};

use crate::config::TrackerConfig;
use crate::projections::{ItemSnapshotProjection, SnapshotAudit};
use crate::reconciliation::{
    seed_items, HistoryReader, ReconcileError, Reconciliation, ReconciliationEngine,
};
use crate::store::{EventFilter, HistoryStore, ItemFilter, ItemStore, StoreError, UpperBound};
use crate::window::{CivilCalendar, TimeWindow};

use super::export::{self, LedgerRow, OutboundSummary};
use super::point_in_time::{self, CountCriteria, PlaceCriterion, PointInTimeCount};
use super::summary::{summarize_sizes, SizeSummary, SummaryInputs};
use super::surgical::{returned_items, SurgicalDayReport};

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("invalid request: {0}")]
    Invalid(#[from] DomainError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Projection(ProjectionError),
}

impl From<ReconcileError> for ReportError {
    fn from(value: ReconcileError) -> Self {
        match value {
            ReconcileError::Store(e) => ReportError::Store(e),
            ReconcileError::Projection(e) => ReportError::Projection(e),
        }
    }
}

impl From<ProjectionError> for ReportError {
    fn from(value: ProjectionError) -> Self {
        ReportError::Projection(value)
    }
}

/// A validated report request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReportRequest {
    pub first_date: NaiveDate,
    pub last_date: NaiveDate,
    pub window: TimeWindow,
    pub size: Option<ContainerSize>,
}

const DATE_FORMAT: &str = "%Y-%m-%d";

fn parse_date(field: &str, raw: &str) -> Result<NaiveDate, DomainError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(DomainError::validation(format!("{field} is required")));
    }
    NaiveDate::parse_from_str(raw, DATE_FORMAT)
        .map_err(|_| DomainError::validation(format!("{field} must be YYYY-MM-DD, got {raw:?}")))
}

impl ReportRequest {
    /// Parse an inclusive civil date range and an optional size label.
    pub fn parse(
        start_date: &str,
        end_date: &str,
        size: Option<&str>,
        calendar: &CivilCalendar,
    ) -> Result<Self, DomainError> {
        let first_date = parse_date("start date", start_date)?;
        let last_date = parse_date("end date", end_date)?;
        let window = calendar.dates(first_date, last_date)?;
        let size = size
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::parse::<ContainerSize>)
            .transpose()?;
        Ok(Self {
            first_date,
            last_date,
            window,
            size,
        })
    }
}

/// Report entry point over a history store and an item store.
#[derive(Debug)]
pub struct ReportService<H, I> {
    history: H,
    items: I,
    config: TrackerConfig,
}

impl<H, I> ReportService<H, I>
where
    H: HistoryStore,
    I: ItemStore,
{
    pub fn new(history: H, items: I, config: TrackerConfig) -> Self {
        Self { history, items, config }
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn calendar(&self) -> &CivilCalendar {
        &self.config.calendar
    }

    pub fn request(&self, start_date: &str, end_date: &str, size: Option<&str>) -> Result<ReportRequest, ReportError> {
        Ok(ReportRequest::parse(start_date, end_date, size, &self.config.calendar)?)
    }

    fn engine(&self) -> ReconciliationEngine<'_, H, I> {
        ReconciliationEngine::new(
            &self.history,
            &self.items,
            self.config.page_size,
            self.config.parallel_threshold,
        )
    }

    pub fn reconcile(&self, window: TimeWindow, size: Option<ContainerSize>) -> Result<Reconciliation, ReportError> {
        Ok(self.engine().reconcile(window, size)?)
    }

    fn summaries(
        &self,
        window: TimeWindow,
        size: Option<ContainerSize>,
    ) -> Result<BTreeMap<ContainerSize, SizeSummary>, ReportError> {
        let rec = self.reconcile(window, size)?;
        let ids: Vec<ItemId> = rec.items.keys().copied().collect();
        let end_seeds = seed_items(&self.history, &ids, window.end(), self.config.parallel_threshold)?;
        let submitted = self.items.list_items(
            &ItemFilter::of_size(size)
                .with_status(ItemStatus::Submitted)
                .transitioned_within(window),
        )?;

        let sizes = match size {
            Some(size) => vec![size],
            None => ContainerSize::ALL.to_vec(),
        };
        Ok(summarize_sizes(
            &sizes,
            SummaryInputs {
                reconciliation: &rec,
                end_seeds: &end_seeds,
                submitted: &submitted,
                calendar: &self.config.calendar,
            },
        ))
    }

    pub fn summarize(&self, window: TimeWindow, size: ContainerSize) -> Result<SizeSummary, ReportError> {
        self.summaries(window, Some(size))?
            .remove(&size)
            .ok_or_else(|| ReportError::Invalid(DomainError::validation(format!("no summary for size {size}"))))
    }

    /// All sizes from one reconciliation pass.
    pub fn summarize_all(&self, window: TimeWindow) -> Result<BTreeMap<ContainerSize, SizeSummary>, ReportError> {
        self.summaries(window, None)
    }

    pub fn count_as_of(
        &self,
        criteria: CountCriteria,
        at: UpperBound,
        lookback_from: Option<chrono::DateTime<chrono::Utc>>,
    ) -> Result<PointInTimeCount, ReportError> {
        Ok(point_in_time::count_as_of(
            &self.history,
            &self.items,
            criteria,
            at,
            lookback_from,
            self.config.parallel_threshold,
        )?)
    }

    pub fn outbound_ledger(&self, window: TimeWindow) -> Result<BTreeMap<ContainerSize, Vec<LedgerRow>>, ReportError> {
        let rec = self.reconcile(window, None)?;
        Ok(export::outbound_ledger(&rec, &self.config.calendar))
    }

    pub fn outbound_summary(
        &self,
        window: TimeWindow,
    ) -> Result<BTreeMap<ContainerSize, OutboundSummary>, ReportError> {
        let rec = self.reconcile(window, None)?;
        Ok(export::outbound_summary(&rec, &self.config.calendar))
    }

    /// Surgical-theatre figures for one civil day.
    ///
    /// Each count carries its own lookback, measured back from its instant.
    pub fn surgical_day(&self, date: NaiveDate, size: ContainerSize) -> Result<SurgicalDayReport, ReportError> {
        let calendar = &self.config.calendar;
        let window = calendar.day(date)?;
        let months = self.config.surgical_lookback_months;
        let start_lookback = calendar.months_before(window.start(), months)?;
        let end_lookback = calendar.months_before(window.end(), months)?;
        let criteria = CountCriteria {
            size,
            status: Some(ItemStatus::Dispensed),
            place: PlaceCriterion::Surgical,
        };

        let at_day_start = self.count_as_of(criteria.clone(), UpperBound::Inclusive(window.start()), Some(start_lookback))?;
        let at_day_end = self.count_as_of(criteria, UpperBound::Exclusive(window.end()), Some(end_lookback))?;
        let touched = self
            .items
            .list_items(&ItemFilter::of_size(Some(size)).transitioned_within(window))?;

        Ok(SurgicalDayReport {
            date,
            size,
            window,
            at_day_start,
            at_day_end,
            returned: returned_items(&touched),
        })
    }

    /// Replay each item's full history and compare with its stored snapshot.
    pub fn audit_snapshots(&self, size: Option<ContainerSize>) -> Result<SnapshotAudit, ReportError> {
        let items = self.items.list_items(&ItemFilter::of_size(size))?;
        let filter = EventFilter::default().for_items(items.iter().map(|item| item.id));
        let events = HistoryReader::new(&self.history, self.config.page_size).read_all(&filter)?;

        let mut runner = ProjectionRunner::new(ItemSnapshotProjection::new());
        runner.run(events.iter())?;
        let audit = SnapshotAudit::compare(&items, runner.projection());

        tracing::info!(
            items = audit.items_checked,
            drifts = audit.drifts.len(),
            unreplayable = audit.unreplayable.len(),
            "snapshot audit complete"
        );
        Ok(audit)
    }
}
