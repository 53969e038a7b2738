use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Record — one transaction or rental-contract event in the ledger
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    Transaction,
    Rental,
}

impl RecordKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::Transaction => "transaction",
            RecordKind::Rental => "rental",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "transaction" => Some(RecordKind::Transaction),
            "rental" => Some(RecordKind::Rental),
            _ => None,
        }
    }
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Immutable ledger entry. Records never update in place; corrections appear
/// as new records. `amount` is the sale worth for transactions and the
/// annual rent for rental contracts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Record {
    pub id: i64,
    pub kind: RecordKind,
    pub event_date: NaiveDate,
    pub area: Option<String>,
    pub building: Option<String>,
    pub property_type: Option<String>,
    pub property_sub_type: Option<String>,
    pub bedrooms: Option<String>,
    pub project: Option<String>,
    pub size_sqm: Option<f64>,
    pub amount: Option<f64>,
    pub unit_price: Option<f64>,
}

impl Record {
    /// Stored unit price, or amount / size when the stored value is absent.
    /// None when neither is derivable.
    pub fn effective_unit_price(&self) -> Option<f64> {
        if let Some(p) = self.unit_price {
            if p > 0.0 {
                return Some(p);
            }
        }
        match (self.amount, self.size_sqm) {
            (Some(amount), Some(size)) if amount > 0.0 && size > 0.0 => Some(amount / size),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Alerts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    /// Absolute amount strictly below the threshold.
    PriceBelow,
    /// Absolute amount strictly above the threshold.
    PriceAbove,
    /// Unit price (per m²) strictly below the threshold.
    UnitPriceBelow,
    /// Unit price (per m²) strictly above the threshold.
    UnitPriceAbove,
    /// Every record passing the field filter matches; no threshold.
    NewMatch,
}

impl AlertKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertKind::PriceBelow => "price_below",
            AlertKind::PriceAbove => "price_above",
            AlertKind::UnitPriceBelow => "unit_price_below",
            AlertKind::UnitPriceAbove => "unit_price_above",
            AlertKind::NewMatch => "new_match",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "price_below" => Some(AlertKind::PriceBelow),
            "price_above" => Some(AlertKind::PriceAbove),
            "unit_price_below" => Some(AlertKind::UnitPriceBelow),
            "unit_price_above" => Some(AlertKind::UnitPriceAbove),
            "new_match" => Some(AlertKind::NewMatch),
            _ => None,
        }
    }

    pub fn requires_threshold(&self) -> bool {
        !matches!(self, AlertKind::NewMatch)
    }
}

impl std::fmt::Display for AlertKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Structured field filter. Every field is an explicit optional; an absent
/// field always matches on that dimension.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CriteriaFilter {
    /// Case-insensitive substring match against the record area.
    pub area: Option<String>,
    /// Case-insensitive substring match against the record building.
    pub building: Option<String>,
    /// Case-insensitive exact match against the record property type.
    pub property_type: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub id: i64,
    pub subscriber_id: i64,
    pub filter: CriteriaFilter,
    pub kind: AlertKind,
    /// Required unless kind is `new_match`; enforced at alert creation by
    /// the external collaborator, so the engine treats it as a precondition.
    pub threshold: Option<f64>,
    pub is_active: bool,
    /// Watermark: instant up to which records have already been scanned.
    /// None means the alert has never been scanned.
    pub last_scanned_at: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// Trigger ledger
// ---------------------------------------------------------------------------

/// Immutable (alert, matched record) pair. At most one per pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerEntry {
    pub alert_id: i64,
    pub record_id: i64,
    pub triggered_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Notification payload
// ---------------------------------------------------------------------------

/// Sent once per newly confirmed match. Delivery is best-effort; the match
/// itself, not the delivery, is the durable fact.
#[derive(Debug, Clone, Serialize)]
pub struct AlertNotification {
    pub alert_id: i64,
    pub alert_kind: AlertKind,
    pub record_id: i64,
    pub event_date: NaiveDate,
    pub area: Option<String>,
    pub building: Option<String>,
    pub amount: Option<f64>,
    pub unit_price: Option<f64>,
}

impl AlertNotification {
    pub fn from_match(alert: &Alert, record: &Record) -> Self {
        Self {
            alert_id: alert.id,
            alert_kind: alert.kind,
            record_id: record.id,
            event_date: record.event_date,
            area: record.area.clone(),
            building: record.building.clone(),
            amount: record.amount,
            unit_price: record.effective_unit_price(),
        }
    }
}

// ---------------------------------------------------------------------------
// Scan summaries — partial-result reporting, never thrown
// ---------------------------------------------------------------------------

/// Outcome of scanning a single alert.
#[derive(Debug, Clone, Default)]
pub struct AlertScanOutcome {
    pub records_seen: u64,
    pub matched: u64,
    pub duplicates: u64,
    pub notify_failures: u64,
    pub record_errors: u64,
}

/// Outcome of a full pass over all active alerts.
#[derive(Debug, Clone, Default)]
pub struct ScanSummary {
    pub alerts_scanned: u64,
    pub alerts_failed: u64,
    pub records_seen: u64,
    pub matched: u64,
    pub duplicates: u64,
    pub notify_failures: u64,
    pub record_errors: u64,
}

impl ScanSummary {
    pub fn absorb(&mut self, outcome: &AlertScanOutcome) {
        self.alerts_scanned += 1;
        self.records_seen += outcome.records_seen;
        self.matched += outcome.matched;
        self.duplicates += outcome.duplicates;
        self.notify_failures += outcome.notify_failures;
        self.record_errors += outcome.record_errors;
    }
}

impl std::fmt::Display for ScanSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "alerts={} failed={} records={} matched={} duplicates={} notify_failures={} record_errors={}",
            self.alerts_scanned,
            self.alerts_failed,
            self.records_seen,
            self.matched,
            self.duplicates,
            self.notify_failures,
            self.record_errors,
        )
    }
}
