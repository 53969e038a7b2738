use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::StreamExt;
use tracing::{debug, error, info, warn};

use crate::config::FIRST_SCAN_LOOKBACK_HOURS;
use crate::error::Result;
use crate::matcher;
use crate::store::{AlertStore, Notifier, RecordQuery, RecordStore, TriggerLedger};
use crate::types::{
    Alert, AlertNotification, AlertScanOutcome, RecordKind, ScanSummary, TriggerEntry,
};

/// Scans records newer than each alert's watermark, appends trigger-ledger
/// entries for new matches and advances the watermark once per successful
/// scan.
///
/// The watermark is written last, after the record stream has been fully
/// consumed, so dropping a scan mid-flight never leaves it advanced past
/// unconsumed records; cancel-then-retry from a given watermark is
/// idempotent. Each alert's watermark has this scanner as its single
/// writer; scans of different alerts share no mutable state and may run
/// concurrently.
pub struct AlertScanner {
    records: Arc<dyn RecordStore>,
    alerts: Arc<dyn AlertStore>,
    ledger: Arc<dyn TriggerLedger>,
    notifier: Arc<dyn Notifier>,
}

impl AlertScanner {
    pub fn new(
        records: Arc<dyn RecordStore>,
        alerts: Arc<dyn AlertStore>,
        ledger: Arc<dyn TriggerLedger>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            records,
            alerts,
            ledger,
            notifier,
        }
    }

    /// Periodic batch loop: one pass immediately, then every `interval_secs`.
    pub async fn run(self, interval_secs: u64) {
        let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));
        loop {
            interval.tick().await;
            let summary = self.scan_all(Utc::now()).await;
            info!("Scan pass complete | {summary}");
        }
    }

    /// One pass over all active alerts. A failed alert is counted and
    /// skipped; it never aborts the pass.
    pub async fn scan_all(&self, now: DateTime<Utc>) -> ScanSummary {
        let mut summary = ScanSummary::default();

        let alerts = match self.alerts.list_active().await {
            Ok(alerts) => alerts,
            Err(e) => {
                error!("alert listing failed: {e}");
                return summary;
            }
        };

        for alert in &alerts {
            match self.scan_alert(alert, now).await {
                Ok(outcome) => {
                    debug!(
                        alert_id = alert.id,
                        records_seen = outcome.records_seen,
                        matched = outcome.matched,
                        duplicates = outcome.duplicates,
                        "alert scanned"
                    );
                    summary.absorb(&outcome);
                }
                Err(e) => {
                    summary.alerts_failed += 1;
                    error!(alert_id = alert.id, "alert scan failed: {e}");
                }
            }
        }

        summary
    }

    /// Scans one alert. Returns Err only on query failure, in which case
    /// the watermark is left untouched so no record range is silently
    /// skipped. Record-level failures are counted and do not block the
    /// watermark advance.
    async fn scan_alert(&self, alert: &Alert, now: DateTime<Utc>) -> Result<AlertScanOutcome> {
        let watermark = alert
            .last_scanned_at
            .unwrap_or(now - chrono::Duration::hours(FIRST_SCAN_LOOKBACK_HOURS));

        // Event dates are calendar days; query from the watermark's day
        // inclusively and let the ledger dedup anything already triggered.
        let query = RecordQuery::since(RecordKind::Transaction, watermark.date_naive());
        let mut stream = self.records.stream_records(query);

        let mut outcome = AlertScanOutcome::default();
        while let Some(next) = stream.next().await {
            let record = next?;
            outcome.records_seen += 1;

            if !matcher::alert_matches(alert, &record) {
                continue;
            }

            match self.ledger.exists(alert.id, record.id).await {
                Ok(true) => {
                    outcome.duplicates += 1;
                    continue;
                }
                Ok(false) => {}
                Err(e) => {
                    outcome.record_errors += 1;
                    warn!(
                        alert_id = alert.id,
                        record_id = record.id,
                        "ledger lookup failed: {e}"
                    );
                    continue;
                }
            }

            if let Err(e) = self
                .ledger
                .append(TriggerEntry {
                    alert_id: alert.id,
                    record_id: record.id,
                    triggered_at: now,
                })
                .await
            {
                outcome.record_errors += 1;
                warn!(
                    alert_id = alert.id,
                    record_id = record.id,
                    "ledger append failed: {e}"
                );
                continue;
            }
            outcome.matched += 1;

            // Fire-and-forget: the match, not the delivery, is the durable
            // fact. Delivery failure never rolls back the ledger write.
            let notification = AlertNotification::from_match(alert, &record);
            if let Err(e) = self.notifier.notify(alert.subscriber_id, &notification).await {
                outcome.notify_failures += 1;
                warn!(
                    alert_id = alert.id,
                    record_id = record.id,
                    "notification dispatch failed: {e}"
                );
            }
        }
        drop(stream);

        self.alerts.advance_watermark(alert.id, now).await?;
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryNotifier, MemoryStore};
    use crate::types::{AlertKind, CriteriaFilter, Record};
    use chrono::{NaiveDate, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 15, 12, 0, 0).unwrap()
    }

    fn tx(id: i64, date: NaiveDate, area: &str, amount: f64) -> Record {
        Record {
            id,
            kind: RecordKind::Transaction,
            event_date: date,
            area: Some(area.to_string()),
            building: Some("Tower A".to_string()),
            property_type: Some("Unit".to_string()),
            property_sub_type: None,
            bedrooms: Some("1 B/R".to_string()),
            project: None,
            size_sqm: Some(80.0),
            amount: Some(amount),
            unit_price: Some(amount / 80.0),
        }
    }

    fn alert(id: i64, kind: AlertKind, threshold: Option<f64>, area: Option<&str>) -> Alert {
        Alert {
            id,
            subscriber_id: 100 + id,
            filter: CriteriaFilter {
                area: area.map(str::to_string),
                building: None,
                property_type: None,
            },
            kind,
            threshold,
            is_active: true,
            last_scanned_at: None,
        }
    }

    fn scanner(store: Arc<MemoryStore>, notifier: Arc<MemoryNotifier>) -> AlertScanner {
        AlertScanner::new(store.clone(), store.clone(), store, notifier)
    }

    #[tokio::test]
    async fn rescanning_is_idempotent() {
        let store = Arc::new(MemoryStore::new());
        let notifier = Arc::new(MemoryNotifier::new());
        let today = now().date_naive();

        store.add_records([tx(1, today, "Marina", 1_000_000.0), tx(2, today, "Marina", 2_000_000.0)]);
        store.add_alert(alert(1, AlertKind::NewMatch, None, None));

        let scanner = scanner(store.clone(), notifier.clone());

        let first = scanner.scan_all(now()).await;
        assert_eq!(first.matched, 2);
        assert_eq!(store.trigger_count(), 2);
        assert_eq!(notifier.sent().len(), 2);

        // Second pass with no new records: zero new entries.
        let later = now() + chrono::Duration::hours(1);
        let second = scanner.scan_all(later).await;
        assert_eq!(second.matched, 0);
        assert_eq!(second.duplicates, 2);
        assert_eq!(store.trigger_count(), 2);
        assert_eq!(notifier.sent().len(), 2);
    }

    #[tokio::test]
    async fn watermark_advances_and_never_moves_backward() {
        let store = Arc::new(MemoryStore::new());
        store.add_alert(alert(1, AlertKind::NewMatch, None, None));
        let scanner = scanner(store.clone(), Arc::new(MemoryNotifier::new()));

        scanner.scan_all(now()).await;
        assert_eq!(store.watermark_of(1), Some(now()));

        // A pass stamped earlier must not rewind the watermark.
        let earlier = now() - chrono::Duration::hours(2);
        scanner.scan_all(earlier).await;
        assert_eq!(store.watermark_of(1), Some(now()));
    }

    #[tokio::test]
    async fn query_failure_leaves_watermark_untouched() {
        let store = Arc::new(MemoryStore::new());
        store.add_alert(alert(1, AlertKind::NewMatch, None, None));
        store.set_fail_queries(true);
        let scanner = scanner(store.clone(), Arc::new(MemoryNotifier::new()));

        let summary = scanner.scan_all(now()).await;
        assert_eq!(summary.alerts_failed, 1);
        assert_eq!(summary.alerts_scanned, 0);
        assert_eq!(store.watermark_of(1), None);

        // Once the store recovers, the full range is still scannable.
        store.set_fail_queries(false);
        store.add_record(tx(1, now().date_naive(), "Marina", 1_000_000.0));
        let summary = scanner.scan_all(now()).await;
        assert_eq!(summary.matched, 1);
        assert_eq!(store.watermark_of(1), Some(now()));
    }

    #[tokio::test]
    async fn threshold_equality_never_triggers() {
        let store = Arc::new(MemoryStore::new());
        let today = now().date_naive();
        store.add_record(tx(1, today, "Marina", 1_000_000.0));
        store.add_alert(alert(1, AlertKind::PriceBelow, Some(1_000_000.0), None));
        store.add_alert(alert(2, AlertKind::PriceAbove, Some(1_000_000.0), None));

        let scanner = scanner(store.clone(), Arc::new(MemoryNotifier::new()));
        let summary = scanner.scan_all(now()).await;
        assert_eq!(summary.matched, 0);
        assert_eq!(store.trigger_count(), 0);
    }

    #[tokio::test]
    async fn first_scan_is_bounded_by_the_lookback() {
        let store = Arc::new(MemoryStore::new());
        let today = now().date_naive();
        store.add_record(tx(1, today - chrono::Duration::days(10), "Marina", 1_000_000.0));
        store.add_record(tx(2, today, "Marina", 1_000_000.0));
        store.add_alert(alert(1, AlertKind::NewMatch, None, None));

        let scanner = scanner(store.clone(), Arc::new(MemoryNotifier::new()));
        let summary = scanner.scan_all(now()).await;
        assert_eq!(summary.records_seen, 1);
        assert_eq!(summary.matched, 1);
    }

    #[tokio::test]
    async fn notify_failure_does_not_roll_back_the_ledger_write() {
        let store = Arc::new(MemoryStore::new());
        let notifier = Arc::new(MemoryNotifier::new());
        notifier.set_fail(true);
        store.add_record(tx(1, now().date_naive(), "Marina", 1_000_000.0));
        store.add_alert(alert(1, AlertKind::NewMatch, None, None));

        let scanner = scanner(store.clone(), notifier.clone());
        let summary = scanner.scan_all(now()).await;
        assert_eq!(summary.matched, 1);
        assert_eq!(summary.notify_failures, 1);
        assert_eq!(store.trigger_count(), 1);
    }

    #[tokio::test]
    async fn filter_scopes_matches_to_the_alerted_area() {
        let store = Arc::new(MemoryStore::new());
        let notifier = Arc::new(MemoryNotifier::new());
        let today = now().date_naive();
        store.add_record(tx(1, today, "Dubai Marina", 3_000_000.0));
        store.add_record(tx(2, today, "Business Bay", 3_000_000.0));
        store.add_alert(alert(1, AlertKind::PriceAbove, Some(2_000_000.0), Some("marina")));

        let scanner = scanner(store.clone(), notifier.clone());
        let summary = scanner.scan_all(now()).await;
        assert_eq!(summary.matched, 1);
        let sent = notifier.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].1.record_id, 1);
    }
}
