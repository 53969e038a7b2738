use chrono::{DateTime, Datelike, Utc};
use serde::Serialize;

use crate::analytics::aggregate::{aggregate_by, pct_change, round2, years_back, Bucket, MonthKey};
use crate::types::{Record, RecordKind};

/// One month of market activity within the trailing trend window.
#[derive(Debug, Clone, Serialize)]
pub struct MonthlyTrendPoint {
    pub month: MonthKey,
    pub transactions: u64,
    pub avg_unit_price: Option<f64>,
    pub total_value: Option<f64>,
}

/// Sale volume, average unit price and total value per month over the
/// trailing `window_years` ([`crate::config::TREND_WINDOW_YEARS`] is the
/// default callers use), ascending by month.
pub fn monthly_trend(
    records: &[Record],
    now: DateTime<Utc>,
    window_years: u32,
) -> Vec<MonthlyTrendPoint> {
    let cutoff = years_back(now, window_years);
    let month_of = |r: &Record| {
        (r.kind == RecordKind::Transaction && r.event_date >= cutoff)
            .then(|| MonthKey::of(r.event_date))
    };

    let unit_prices = aggregate_by(records, month_of, |r| r.effective_unit_price());
    let values = aggregate_by(records, month_of, |r| r.amount);

    let mut points: Vec<MonthlyTrendPoint> = values
        .into_iter()
        .map(|(month, bucket)| MonthlyTrendPoint {
            month,
            transactions: bucket.count(),
            avg_unit_price: unit_prices.get(&month).and_then(Bucket::mean).map(round2),
            total_value: bucket.sum().map(round2),
        })
        .collect();
    points.sort_by_key(|p| p.month);
    points
}

/// One year of activity with its change against the preceding bucket.
#[derive(Debug, Clone, Serialize)]
pub struct YearlyTrendPoint {
    pub year: i32,
    pub contracts: u64,
    pub avg_amount: Option<f64>,
    pub avg_unit_price: Option<f64>,
    /// None for the earliest bucket (no predecessor) and whenever the
    /// preceding average is undefined or zero.
    pub yoy_amount_change_pct: Option<f64>,
    pub yoy_volume_change_pct: Option<f64>,
}

/// Annual buckets over the trailing `window_years` for the given record
/// kind, ascending, each with year-over-year change against the bucket
/// before it.
pub fn yearly_trend(
    records: &[Record],
    kind: RecordKind,
    now: DateTime<Utc>,
    window_years: u32,
) -> Vec<YearlyTrendPoint> {
    let cutoff = years_back(now, window_years);
    let year_of = |r: &Record| (r.kind == kind && r.event_date >= cutoff).then(|| r.event_date.year());

    let amounts = aggregate_by(records, year_of, |r| r.amount);
    let unit_prices = aggregate_by(records, year_of, |r| r.effective_unit_price());

    let mut years: Vec<i32> = amounts.keys().copied().collect();
    years.sort_unstable();

    let mut points = Vec::with_capacity(years.len());
    for (i, &year) in years.iter().enumerate() {
        let bucket = &amounts[&year];
        let avg_amount = bucket.mean();
        let prev = if i == 0 { None } else { Some(&amounts[&years[i - 1]]) };

        let yoy_amount_change_pct = match (avg_amount, prev.and_then(|p| p.mean())) {
            (Some(curr), Some(prior)) => pct_change(curr, prior),
            _ => None,
        };
        let yoy_volume_change_pct =
            prev.and_then(|p| pct_change(bucket.count() as f64, p.count() as f64));

        points.push(YearlyTrendPoint {
            year,
            contracts: bucket.count(),
            avg_amount: avg_amount.map(round2),
            avg_unit_price: unit_prices.get(&year).and_then(Bucket::mean).map(round2),
            yoy_amount_change_pct,
            yoy_volume_change_pct,
        });
    }
    points
}
