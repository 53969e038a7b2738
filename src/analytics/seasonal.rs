use chrono::{DateTime, Datelike, Utc};
use serde::Serialize;

use crate::analytics::aggregate::{aggregate_by, round2, years_back};
use crate::types::{Record, RecordKind};

/// One calendar month's activity relative to the multi-year monthly
/// average, base 100.
#[derive(Debug, Clone, Serialize)]
pub struct MonthIndex {
    /// Calendar month, 1–12.
    pub month: u32,
    pub contracts: u64,
    pub avg_amount: Option<f64>,
    /// 100 = an average month; rounded to the nearest integer.
    pub index: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SeasonalProfile {
    /// Ascending by calendar month; months with no activity are absent.
    pub months: Vec<MonthIndex>,
    pub peak_month: u32,
    pub low_month: u32,
}

/// Seasonal activity profile for the given record kind over the trailing
/// `window_years` ([`crate::config::SEASONAL_WINDOW_YEARS`] is the default
/// callers use). The baseline is total volume divided across all twelve
/// calendar months, so a uniform market indexes every month at 100.
/// None when the window holds no records.
pub fn seasonal_index(
    records: &[Record],
    kind: RecordKind,
    now: DateTime<Utc>,
    window_years: u32,
) -> Option<SeasonalProfile> {
    let cutoff = years_back(now, window_years);
    let buckets = aggregate_by(
        records,
        |r| (r.kind == kind && r.event_date >= cutoff).then(|| r.event_date.month()),
        |r| r.amount,
    );

    let total: u64 = buckets.values().map(|b| b.count()).sum();
    if total == 0 {
        return None;
    }
    let monthly_average = total as f64 / 12.0;

    let mut months: Vec<MonthIndex> = buckets
        .into_iter()
        .map(|(month, bucket)| MonthIndex {
            month,
            contracts: bucket.count(),
            avg_amount: bucket.mean().map(round2),
            index: (bucket.count() as f64 / monthly_average * 100.0).round() as i64,
        })
        .collect();
    months.sort_by_key(|m| m.month);

    let peak_month = months.iter().max_by_key(|m| (m.index, std::cmp::Reverse(m.month)))?.month;
    let low_month = months.iter().min_by_key(|m| (m.index, m.month))?.month;

    Some(SeasonalProfile {
        months,
        peak_month,
        low_month,
    })
}
