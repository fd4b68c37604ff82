//! Report building on top of reconciliation output.

pub mod aggregate;
pub mod collate;
pub mod export;
pub mod point_in_time;
pub mod service;
pub mod summary;
pub mod surgical;

pub use aggregate::{dispense_rows, lot_counts, DispenseRow, LotCount};
pub use export::{outbound_ledger, outbound_summary, LedgerRow, LotBreakdown, OutboundSummary};
pub use point_in_time::{count_as_of, CountCriteria, PlaceCriterion, PointInTimeCount};
pub use service::{ReportError, ReportRequest, ReportService};
pub use summary::{summarize_sizes, SizeSummary, SummaryInputs};
pub use surgical::{returned_items, ReturnedItem, SurgicalDayReport};
