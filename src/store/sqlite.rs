use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use sqlx::SqlitePool;
use tracing::warn;

use crate::error::{AppError, Result};
use crate::store::models::{AlertRow, RecordRow, TriggerRow};
use crate::store::{AlertStore, RecordQuery, RecordStore, TriggerLedger};
use crate::types::{Alert, Record, TriggerEntry};

const SELECT_RECORDS: &str = "\
    SELECT id, kind, event_date, area, building, property_type, \
           property_sub_type, bedrooms, project, size_sqm, amount, unit_price \
    FROM records \
    WHERE kind = ?1 AND (?2 IS NULL OR event_date >= ?2) \
    ORDER BY event_date ASC, id ASC";

const SELECT_ACTIVE_ALERTS: &str = "\
    SELECT id, subscriber_id, area, building, property_type, kind, \
           threshold, is_active, last_scanned_at \
    FROM alerts \
    WHERE is_active = 1 \
    ORDER BY id ASC";

/// Reference adapter: all four store interfaces backed by one sqlite pool.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl RecordStore for SqliteStore {
    fn stream_records(&self, query: RecordQuery) -> BoxStream<'_, Result<Record>> {
        sqlx::query_as::<_, RecordRow>(SELECT_RECORDS)
            .bind(query.kind.as_str())
            .bind(query.since)
            .fetch(&self.pool)
            .map(|row| row.map_err(AppError::from).and_then(RecordRow::into_record))
            .boxed()
    }
}

#[async_trait]
impl AlertStore for SqliteStore {
    async fn list_active(&self) -> Result<Vec<Alert>> {
        let rows = sqlx::query_as::<_, AlertRow>(SELECT_ACTIVE_ALERTS)
            .fetch_all(&self.pool)
            .await?;

        // A malformed row is scoped to that alert, never the whole listing.
        let mut alerts = Vec::with_capacity(rows.len());
        for row in rows {
            match row.into_alert() {
                Ok(alert) => alerts.push(alert),
                Err(e) => warn!("skipping malformed alert row: {e}"),
            }
        }
        Ok(alerts)
    }

    async fn advance_watermark(&self, alert_id: i64, to: DateTime<Utc>) -> Result<()> {
        // Forward-only: a stale timestamp never rewinds the watermark.
        sqlx::query(
            "UPDATE alerts SET last_scanned_at = ?1 \
             WHERE id = ?2 AND (last_scanned_at IS NULL OR last_scanned_at < ?1)",
        )
        .bind(to)
        .bind(alert_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl TriggerLedger for SqliteStore {
    async fn exists(&self, alert_id: i64, record_id: i64) -> Result<bool> {
        let found = sqlx::query_scalar::<_, i64>(
            "SELECT EXISTS(SELECT 1 FROM alert_triggers WHERE alert_id = ?1 AND record_id = ?2)",
        )
        .bind(alert_id)
        .bind(record_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(found != 0)
    }

    async fn append(&self, entry: TriggerEntry) -> Result<()> {
        // The unique index on (alert_id, record_id) backs the at-most-one
        // invariant; a racing duplicate append is ignored, not an error.
        sqlx::query(
            "INSERT OR IGNORE INTO alert_triggers (alert_id, record_id, triggered_at) \
             VALUES (?1, ?2, ?3)",
        )
        .bind(entry.alert_id)
        .bind(entry.record_id)
        .bind(entry.triggered_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn history(&self, alert_id: i64, limit: u32) -> Result<Vec<TriggerEntry>> {
        let rows = sqlx::query_as::<_, TriggerRow>(
            "SELECT alert_id, record_id, triggered_at \
             FROM alert_triggers \
             WHERE alert_id = ?1 \
             ORDER BY triggered_at DESC, id DESC \
             LIMIT ?2",
        )
        .bind(alert_id)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| TriggerEntry {
                alert_id: row.alert_id,
                record_id: row.record_id,
                triggered_at: row.triggered_at,
            })
            .collect())
    }
}
