use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use futures_util::stream::{self, BoxStream};
use futures_util::StreamExt;

use crate::error::{AppError, Result};
use crate::store::{AlertStore, Notifier, RecordQuery, RecordStore, TriggerLedger};
use crate::types::{Alert, AlertNotification, Record, TriggerEntry};

/// In-process adapter implementing all four store interfaces. Used for
/// embedding the engine without a database and as the test fixture.
/// Ledger appends across alerts may run concurrently, hence the dashmaps.
#[derive(Default)]
pub struct MemoryStore {
    records: DashMap<i64, Record>,
    alerts: DashMap<i64, Alert>,
    triggers: DashMap<(i64, i64), TriggerEntry>,
    /// Fault injection: when set, record queries fail (store unreachable).
    fail_queries: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_record(&self, record: Record) {
        self.records.insert(record.id, record);
    }

    pub fn add_records(&self, records: impl IntoIterator<Item = Record>) {
        for record in records {
            self.add_record(record);
        }
    }

    pub fn add_alert(&self, alert: Alert) {
        self.alerts.insert(alert.id, alert);
    }

    pub fn set_fail_queries(&self, fail: bool) {
        self.fail_queries.store(fail, Ordering::SeqCst);
    }

    pub fn trigger_count(&self) -> usize {
        self.triggers.len()
    }

    pub fn watermark_of(&self, alert_id: i64) -> Option<DateTime<Utc>> {
        self.alerts.get(&alert_id).and_then(|a| a.last_scanned_at)
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    fn stream_records(&self, query: RecordQuery) -> BoxStream<'_, Result<Record>> {
        if self.fail_queries.load(Ordering::SeqCst) {
            return stream::iter([Err(AppError::Store("record store unreachable".to_string()))])
                .boxed();
        }

        let mut matched: Vec<Record> = self
            .records
            .iter()
            .filter(|entry| {
                let r = entry.value();
                r.kind == query.kind && query.since.is_none_or(|since| r.event_date >= since)
            })
            .map(|entry| entry.value().clone())
            .collect();
        matched.sort_by_key(|r| (r.event_date, r.id));

        stream::iter(matched.into_iter().map(Ok)).boxed()
    }
}

#[async_trait]
impl AlertStore for MemoryStore {
    async fn list_active(&self) -> Result<Vec<Alert>> {
        let mut active: Vec<Alert> = self
            .alerts
            .iter()
            .filter(|entry| entry.value().is_active)
            .map(|entry| entry.value().clone())
            .collect();
        active.sort_by_key(|a| a.id);
        Ok(active)
    }

    async fn advance_watermark(&self, alert_id: i64, to: DateTime<Utc>) -> Result<()> {
        let mut alert = self
            .alerts
            .get_mut(&alert_id)
            .ok_or_else(|| AppError::Store(format!("unknown alert {alert_id}")))?;
        // Forward-only.
        if alert.last_scanned_at.is_none_or(|current| current < to) {
            alert.last_scanned_at = Some(to);
        }
        Ok(())
    }
}

#[async_trait]
impl TriggerLedger for MemoryStore {
    async fn exists(&self, alert_id: i64, record_id: i64) -> Result<bool> {
        Ok(self.triggers.contains_key(&(alert_id, record_id)))
    }

    async fn append(&self, entry: TriggerEntry) -> Result<()> {
        self.triggers
            .entry((entry.alert_id, entry.record_id))
            .or_insert(entry);
        Ok(())
    }

    async fn history(&self, alert_id: i64, limit: u32) -> Result<Vec<TriggerEntry>> {
        let mut entries: Vec<TriggerEntry> = self
            .triggers
            .iter()
            .filter(|entry| entry.key().0 == alert_id)
            .map(|entry| entry.value().clone())
            .collect();
        entries.sort_by_key(|e| (std::cmp::Reverse(e.triggered_at), std::cmp::Reverse(e.record_id)));
        entries.truncate(limit as usize);
        Ok(entries)
    }
}

/// Test notifier: records every dispatch, optionally failing them all.
#[derive(Default)]
pub struct MemoryNotifier {
    sent: Mutex<Vec<(i64, AlertNotification)>>,
    fail: AtomicBool,
}

impl MemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<(i64, AlertNotification)> {
        self.sent.lock().expect("notifier lock poisoned").clone()
    }
}

#[async_trait]
impl Notifier for MemoryNotifier {
    async fn notify(&self, subscriber_id: i64, notification: &AlertNotification) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(AppError::Notify("dispatch channel down".to_string()));
        }
        self.sent
            .lock()
            .expect("notifier lock poisoned")
            .push((subscriber_id, notification.clone()));
        Ok(())
    }
}
