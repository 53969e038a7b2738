//! Interface contracts for the external collaborators: the record ledger,
//! the alert store, the trigger ledger and the notification dispatcher.
//! The engine only ever talks to these traits; `sqlite` is the reference
//! adapter and `memory` an in-process adapter used for embedding and tests.

pub mod memory;
pub mod models;
pub mod sqlite;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use futures_util::stream::BoxStream;
use futures_util::TryStreamExt;
use tracing::info;

use crate::error::Result;
use crate::types::{Alert, AlertNotification, Record, RecordKind, TriggerEntry};

pub use memory::{MemoryNotifier, MemoryStore};
pub use sqlite::SqliteStore;

/// Query against the append-only record ledger.
#[derive(Debug, Clone)]
pub struct RecordQuery {
    pub kind: RecordKind,
    /// Inclusive lower bound on the event date. Watermarks are instants
    /// while event dates are calendar days, so scans query from the
    /// watermark's day inclusively and rely on the trigger ledger to keep
    /// rescans idempotent.
    pub since: Option<NaiveDate>,
}

impl RecordQuery {
    pub fn all(kind: RecordKind) -> Self {
        Self { kind, since: None }
    }

    pub fn since(kind: RecordKind, since: NaiveDate) -> Self {
        Self {
            kind,
            since: Some(since),
        }
    }
}

/// Read-only view of the transaction/rental ledger.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Lazy, finite, restartable stream of records matching the query,
    /// ordered by (event date, record id) ascending. A failed item aborts
    /// the stream; restarting the same query yields the same sequence.
    fn stream_records(&self, query: RecordQuery) -> BoxStream<'_, Result<Record>>;

    /// Convenience: drain the stream into a vector.
    async fn fetch_records(&self, query: RecordQuery) -> Result<Vec<Record>> {
        self.stream_records(query).try_collect().await
    }
}

/// Alert definitions and their watermarks. The scanner is the single
/// writer of a given alert's watermark.
#[async_trait]
pub trait AlertStore: Send + Sync {
    async fn list_active(&self) -> Result<Vec<Alert>>;

    /// Forward-only: implementations must ignore a timestamp at or before
    /// the currently stored watermark.
    async fn advance_watermark(&self, alert_id: i64, to: DateTime<Utc>) -> Result<()>;
}

/// Append-only (alert, record) pair ledger.
#[async_trait]
pub trait TriggerLedger: Send + Sync {
    async fn exists(&self, alert_id: i64, record_id: i64) -> Result<bool>;

    async fn append(&self, entry: TriggerEntry) -> Result<()>;

    /// Most recent entries for an alert, newest first.
    async fn history(&self, alert_id: i64, limit: u32) -> Result<Vec<TriggerEntry>>;
}

/// Outbound notification dispatch. Best-effort: the caller logs failures
/// and never retries.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, subscriber_id: i64, notification: &AlertNotification) -> Result<()>;
}

/// Default dispatcher: logs the payload. Stands in until a real delivery
/// channel is wired up by the host application.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, subscriber_id: i64, notification: &AlertNotification) -> Result<()> {
        let payload = serde_json::to_string(notification)?;
        info!(
            subscriber_id,
            alert_id = notification.alert_id,
            record_id = notification.record_id,
            "ALERT | {payload}"
        );
        Ok(())
    }
}
