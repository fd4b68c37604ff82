//! fixtrack-report: read-only reports over the container history.
//!
//! Connects to the database named by `DATABASE_URL`, runs one report and
//! prints it to stdout as JSON.

use std::sync::Arc;

use anyhow::Context;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use serde::Serialize;

use fixtrack_containers::ContainerSize;
use fixtrack_infra::store::PostgresTracker;
use fixtrack_infra::{ReportService, TrackerConfig};

#[derive(Parser, Debug)]
#[command(name = "fixtrack-report")]
#[command(about = "Reconciled inventory reports for fixation containers")]
struct Args {
    /// Pretty-print the JSON output
    #[arg(long)]
    pretty: bool,

    #[command(subcommand)]
    report: Report,
}

#[derive(Subcommand, Debug)]
enum Report {
    /// Per-size in/out/stock/submission figures for a date range
    Summary {
        start: String,
        end: String,
        /// Restrict to one size (e.g. 30ml)
        size: Option<String>,
    },
    /// Raw reconciliation output: valid dispenses, flags, integrity findings
    Reconcile {
        start: String,
        end: String,
        size: Option<String>,
    },
    /// One row per valid dispense, per size
    Ledger { start: String, end: String },
    /// Grouped dispense rows and per-lot breakdown, per size
    OutboundSummary { start: String, end: String },
    /// Surgical-theatre figures for one day
    Surgical { date: NaiveDate, size: String },
    /// Compare stored snapshots with replayed history
    Audit { size: Option<String> },
}

fn print<T: Serialize>(value: &T, pretty: bool) -> anyhow::Result<()> {
    let out = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{out}");
    Ok(())
}

fn parse_size(raw: Option<&str>) -> anyhow::Result<Option<ContainerSize>> {
    raw.map(|s| s.parse::<ContainerSize>().with_context(|| format!("unknown size {s:?}")))
        .transpose()
}

fn main() -> anyhow::Result<()> {
    fixtrack_observability::init();
    let args = Args::parse();

    let config = TrackerConfig::from_env().context("invalid configuration")?;
    let tracker = Arc::new(PostgresTracker::connect(&config.postgres()?).context("database connection failed")?);
    let service = ReportService::new(tracker.clone(), tracker, config);

    match args.report {
        Report::Summary { start, end, size } => {
            let request = service.request(&start, &end, size.as_deref())?;
            match request.size {
                Some(size) => print(&service.summarize(request.window, size)?, args.pretty),
                None => print(&service.summarize_all(request.window)?, args.pretty),
            }
        }
        Report::Reconcile { start, end, size } => {
            let request = service.request(&start, &end, size.as_deref())?;
            let rec = service.reconcile(request.window, request.size)?;
            if !rec.integrity.is_clean() {
                tracing::warn!(anomalies = rec.integrity.anomaly_count(), "reconciliation found data anomalies");
            }
            print(&rec, args.pretty)
        }
        Report::Ledger { start, end } => {
            let request = service.request(&start, &end, None)?;
            print(&service.outbound_ledger(request.window)?, args.pretty)
        }
        Report::OutboundSummary { start, end } => {
            let request = service.request(&start, &end, None)?;
            print(&service.outbound_summary(request.window)?, args.pretty)
        }
        Report::Surgical { date, size } => {
            let size = parse_size(Some(&size))?.context("size is required")?;
            print(&service.surgical_day(date, size)?, args.pretty)
        }
        Report::Audit { size } => {
            let audit = service.audit_snapshots(parse_size(size.as_deref())?)?;
            print(&audit, args.pretty)
        }
    }
}
