//! Postgres-backed read adapter for `containers` / `container_history`.
//!
//! Read-only: schema management and writes belong to the intake/dispense
//! screens. The store traits are synchronous, so the adapter owns a small
//! multi-thread Tokio runtime and blocks on it; callers (including rayon
//! workers) never need an async context.
//!
//! ## Error Mapping
//!
//! | SQLx Error | StoreError |
//! |------------|------------|
//! | PoolClosed, PoolTimedOut, Io, Tls | `Unavailable` |
//! | ColumnDecode, ColumnNotFound, Decode | `Decode` |
//! | anything else | `Query` |
//!
//! Logical layout:
//!
//! ```text
//! containers(id bigint pk, serial text, size text, lot_number text, box_number text,
//!            product_code text, expires_on date null, status text, place text,
//!            return_by text null, updated_at timestamptz)
//! container_history(id bigint pk, container_id bigint null, actor text,
//!                   occurred_at timestamptz, old_status text, new_status text,
//!                   old_place text, new_place text)
//! index container_history(container_id, occurred_at), container_history(occurred_at)
//! ```

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use tokio::runtime::Runtime;
use tracing::instrument;

use fixtrack_containers::{
    Classification, ContainerSize, HistoryEvent, Item, ItemState, ItemStatus, Place, StatusValue, Transition,
};
use fixtrack_core::{ActorId, HistoryId, ItemId};

use super::query::{EventFilter, EventPage, ItemFilter, Pagination, UpperBound};
use super::r#trait::{HistoryStore, ItemStore, StoreError};

const HISTORY_COLUMNS: &str =
    "id, container_id, actor, occurred_at, old_status, new_status, old_place, new_place";
const ITEM_COLUMNS: &str = "id, serial, size, lot_number, box_number, product_code, expires_on, \
     status, place, return_by, updated_at";

/// Connection settings for [`PostgresTracker::connect`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostgresSettings {
    pub url: String,
    pub max_connections: u32,
}

/// Read adapter over the production tables.
#[derive(Debug)]
pub struct PostgresTracker {
    pool: PgPool,
    runtime: Runtime,
}

impl PostgresTracker {
    pub fn connect(settings: &PostgresSettings) -> Result<Self, StoreError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("fixtrack-pg")
            .enable_all()
            .build()
            .map_err(|e| StoreError::Unavailable(format!("failed to start runtime: {e}")))?;

        let pool = runtime
            .block_on(
                PgPoolOptions::new()
                    .max_connections(settings.max_connections.max(1))
                    .connect(&settings.url),
            )
            .map_err(|e| map_sqlx_error("connect", e))?;

        tracing::info!(max_connections = settings.max_connections, "connected to postgres");
        Ok(Self { pool, runtime })
    }

    #[instrument(skip(self, filter), fields(limit = pagination.limit, offset = pagination.offset), err)]
    async fn fetch_events(&self, filter: &EventFilter, pagination: Pagination) -> Result<EventPage, StoreError> {
        let ids: Option<Vec<i64>> = filter
            .item_ids
            .as_ref()
            .map(|ids| ids.iter().map(|id| id.get()).collect());
        let (before, until) = match filter.to {
            Some(UpperBound::Exclusive(t)) => (Some(t), None),
            Some(UpperBound::Inclusive(t)) => (None, Some(t)),
            None => (None, None),
        };

        const WHERE: &str = r#"
            WHERE ((container_id IS NULL AND $2::boolean)
                    OR (container_id IS NOT NULL AND ($1::bigint[] IS NULL OR container_id = ANY($1))))
                AND ($3::timestamptz IS NULL OR occurred_at >= $3)
                AND ($4::timestamptz IS NULL OR occurred_at < $4)
                AND ($5::timestamptz IS NULL OR occurred_at <= $5)
        "#;

        let count_row = sqlx::query(&format!("SELECT COUNT(*) AS total FROM container_history {WHERE}"))
            .bind(ids.clone())
            .bind(filter.include_orphans)
            .bind(filter.from)
            .bind(before)
            .bind(until)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("count_events", e))?;
        let total: i64 = count_row
            .try_get("total")
            .map_err(|e| map_sqlx_error("count_events", e))?;

        let rows = sqlx::query(&format!(
            "SELECT {HISTORY_COLUMNS} FROM container_history {WHERE} \
             ORDER BY container_id NULLS FIRST, occurred_at ASC, id ASC \
             LIMIT $6 OFFSET $7"
        ))
        .bind(ids)
        .bind(filter.include_orphans)
        .bind(filter.from)
        .bind(before)
        .bind(until)
        .bind(i64::from(pagination.limit))
        .bind(i64::from(pagination.offset))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("query_events", e))?;

        let events = rows.iter().map(history_from_row).collect::<Result<Vec<_>, _>>()?;
        let total = u64::try_from(total).unwrap_or(0);
        let has_more = u64::from(pagination.offset) + (events.len() as u64) < total;
        tracing::debug!(returned = events.len(), total, "history page read");

        Ok(EventPage {
            events,
            total,
            pagination,
            has_more,
        })
    }

    #[instrument(skip(self), fields(item_id = %item_id), err)]
    async fn fetch_latest_at(&self, item_id: ItemId, at: UpperBound) -> Result<Option<HistoryEvent>, StoreError> {
        let (op, cutoff) = match at {
            UpperBound::Exclusive(t) => ("<", t),
            UpperBound::Inclusive(t) => ("<=", t),
        };
        let row = sqlx::query(&format!(
            "SELECT {HISTORY_COLUMNS} FROM container_history \
             WHERE container_id = $1 AND occurred_at {op} $2 \
             ORDER BY occurred_at DESC, id DESC LIMIT 1"
        ))
        .bind(item_id.get())
        .bind(cutoff)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("latest_event_at", e))?;

        row.as_ref().map(history_from_row).transpose()
    }

    #[instrument(skip(self, filter), err)]
    async fn fetch_items(&self, filter: &ItemFilter) -> Result<Vec<Item>, StoreError> {
        let sizes: Option<Vec<String>> = filter
            .size
            .map(|s| s.aliases().iter().map(|a| a.to_string()).collect());
        let statuses: Option<Vec<String>> = filter
            .status
            .map(|s| vec![s.label().to_string(), s.legacy_label().to_string()]);
        let (from, to) = match filter.transitioned_within {
            Some(w) => (Some(w.start()), Some(w.end())),
            None => (None, None),
        };

        let rows = sqlx::query(&format!(
            "SELECT {ITEM_COLUMNS} FROM containers \
             WHERE ($1::text[] IS NULL OR size = ANY($1)) \
                AND ($2::text[] IS NULL OR status = ANY($2)) \
                AND ($3::timestamptz IS NULL OR updated_at >= $3) \
                AND ($4::timestamptz IS NULL OR updated_at < $4) \
             ORDER BY id ASC"
        ))
        .bind(sizes)
        .bind(statuses)
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_items", e))?;

        let mut items = Vec::with_capacity(rows.len());
        for row in &rows {
            match item_from_row(row) {
                Ok(item) => items.push(item),
                // A row with an unknown size/status cannot be classified; it
                // is reported and left out rather than failing the listing.
                Err(e) => tracing::warn!(error = %e, "skipping unreadable container row"),
            }
        }
        Ok(items)
    }

    #[instrument(skip(self), fields(item_id = %id), err)]
    async fn fetch_item(&self, id: ItemId) -> Result<Option<Item>, StoreError> {
        let row = sqlx::query(&format!("SELECT {ITEM_COLUMNS} FROM containers WHERE id = $1"))
            .bind(id.get())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_item", e))?;
        row.as_ref().map(item_from_row).transpose()
    }
}

impl HistoryStore for PostgresTracker {
    fn query_events(&self, filter: &EventFilter, pagination: Pagination) -> Result<EventPage, StoreError> {
        self.runtime.block_on(self.fetch_events(filter, pagination))
    }

    fn latest_event_at(&self, item_id: ItemId, at: UpperBound) -> Result<Option<HistoryEvent>, StoreError> {
        self.runtime.block_on(self.fetch_latest_at(item_id, at))
    }
}

impl ItemStore for PostgresTracker {
    fn list_items(&self, filter: &ItemFilter) -> Result<Vec<Item>, StoreError> {
        self.runtime.block_on(self.fetch_items(filter))
    }

    fn get_item(&self, id: ItemId) -> Result<Option<Item>, StoreError> {
        self.runtime.block_on(self.fetch_item(id))
    }
}

fn history_from_row(row: &PgRow) -> Result<HistoryEvent, StoreError> {
    let decode = |e| map_sqlx_error("decode_history", e);
    let id: i64 = row.try_get("id").map_err(decode)?;
    let history_id = u64::try_from(id)
        .map(HistoryId::new)
        .map_err(|_| StoreError::Decode(format!("negative history id {id}")))?;
    let container_id: Option<i64> = row.try_get("container_id").map_err(decode)?;
    let actor: String = row.try_get("actor").map_err(decode)?;
    let occurred_at: DateTime<Utc> = row.try_get("occurred_at").map_err(decode)?;
    let old_status: String = row.try_get("old_status").map_err(decode)?;
    let new_status: String = row.try_get("new_status").map_err(decode)?;
    let old_place: String = row.try_get("old_place").map_err(decode)?;
    let new_place: String = row.try_get("new_place").map_err(decode)?;

    Ok(HistoryEvent::new(
        history_id,
        container_id.map(ItemId::new),
        Transition {
            actor: ActorId::new(actor),
            occurred_at,
            old_status: StatusValue::parse(&old_status),
            new_status: StatusValue::parse(&new_status),
            old_place: Place::parse(&old_place),
            new_place: Place::parse(&new_place),
        },
    ))
}

fn item_from_row(row: &PgRow) -> Result<Item, StoreError> {
    let decode = |e| map_sqlx_error("decode_container", e);
    let id: i64 = row.try_get("id").map_err(decode)?;
    let size: String = row.try_get("size").map_err(decode)?;
    let status: String = row.try_get("status").map_err(decode)?;
    let place: String = row.try_get("place").map_err(decode)?;
    let expires_on: Option<NaiveDate> = row.try_get("expires_on").map_err(decode)?;

    let size = size
        .parse::<ContainerSize>()
        .map_err(|e| StoreError::Decode(format!("container {id}: {e}")))?;
    let status = status
        .parse::<ItemStatus>()
        .map_err(|e| StoreError::Decode(format!("container {id}: {e}")))?;

    Ok(Item {
        id: ItemId::new(id),
        classification: Classification {
            serial: row.try_get("serial").map_err(decode)?,
            size,
            lot_number: row.try_get("lot_number").map_err(decode)?,
            box_number: row.try_get("box_number").map_err(decode)?,
            product_code: row.try_get("product_code").map_err(decode)?,
            expires_on,
        },
        state: ItemState {
            status,
            place: Place::parse(&place),
            return_by: row
                .try_get::<Option<String>, _>("return_by")
                .map_err(decode)?
                .filter(|s| !s.trim().is_empty()),
            last_transition_at: row.try_get("updated_at").map_err(decode)?,
        },
    })
}

/// Map SQLx errors to store errors.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::PoolClosed | sqlx::Error::PoolTimedOut => {
            StoreError::Unavailable(format!("connection pool unavailable in {operation}"))
        }
        sqlx::Error::Io(e) => StoreError::Unavailable(format!("io error in {operation}: {e}")),
        sqlx::Error::Tls(e) => StoreError::Unavailable(format!("tls error in {operation}: {e}")),
        sqlx::Error::ColumnDecode { index, source } => {
            StoreError::Decode(format!("column {index} in {operation}: {source}"))
        }
        sqlx::Error::ColumnNotFound(column) => {
            StoreError::Decode(format!("missing column {column} in {operation}"))
        }
        sqlx::Error::Decode(e) => StoreError::Decode(format!("{operation}: {e}")),
        sqlx::Error::Database(db_err) => StoreError::Query {
            operation: operation.to_string(),
            message: db_err.message().to_string(),
        },
        other => StoreError::Query {
            operation: operation.to_string(),
            message: other.to_string(),
        },
    }
}
