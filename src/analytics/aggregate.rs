use std::collections::HashMap;
use std::hash::Hash;

use chrono::{DateTime, Datelike, Months, NaiveDate, Utc};
use serde::Serialize;

use crate::types::Record;

// ---------------------------------------------------------------------------
// Numeric helpers
// ---------------------------------------------------------------------------

pub fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Percent change of `current` against `prior`, rounded to 2 dp.
/// A zero prior is undefined — None, never infinity or a silent zero.
pub fn pct_change(current: f64, prior: f64) -> Option<f64> {
    if prior == 0.0 {
        return None;
    }
    Some(round2((current - prior) / prior * 100.0))
}

/// Continuous percentile over unsorted values (linear interpolation
/// between ranks, the PERCENTILE_CONT behavior). `p` in [0, 1].
pub fn percentile(values: &[f64], p: f64) -> Option<f64> {
    if values.is_empty() || !(0.0..=1.0).contains(&p) {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let rank = p * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    if lo == hi {
        Some(sorted[lo])
    } else {
        Some(sorted[lo] + (rank - lo as f64) * (sorted[hi] - sorted[lo]))
    }
}

// ---------------------------------------------------------------------------
// Buckets
// ---------------------------------------------------------------------------

/// One (group, window) cell. `count` counts every record routed to the
/// bucket; `sum/mean/min/max` cover only records whose metric was present,
/// so a malformed record is excluded from the affected metric and nothing
/// else. Ephemeral — recomputed per query, never persisted.
#[derive(Debug, Clone, Default)]
pub struct Bucket {
    count: u64,
    samples: u64,
    sum: f64,
    min: f64,
    max: f64,
}

impl Bucket {
    pub fn add(&mut self, metric: Option<f64>) {
        self.count += 1;
        if let Some(v) = metric {
            if self.samples == 0 {
                self.min = v;
                self.max = v;
            } else {
                self.min = self.min.min(v);
                self.max = self.max.max(v);
            }
            self.samples += 1;
            self.sum += v;
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn samples(&self) -> u64 {
        self.samples
    }

    pub fn sum(&self) -> Option<f64> {
        (self.samples > 0).then_some(self.sum)
    }

    pub fn mean(&self) -> Option<f64> {
        (self.samples > 0).then(|| self.sum / self.samples as f64)
    }

    pub fn min(&self) -> Option<f64> {
        (self.samples > 0).then_some(self.min)
    }

    pub fn max(&self) -> Option<f64> {
        (self.samples > 0).then_some(self.max)
    }
}

/// Generic grouped aggregation: routes each record through `key_fn`
/// (None ⇒ the record is outside the grouping and skipped) and folds
/// `metric_fn` into that group's bucket.
pub fn aggregate_by<K, KF, MF>(records: &[Record], key_fn: KF, metric_fn: MF) -> HashMap<K, Bucket>
where
    K: Eq + Hash,
    KF: Fn(&Record) -> Option<K>,
    MF: Fn(&Record) -> Option<f64>,
{
    let mut buckets: HashMap<K, Bucket> = HashMap::new();
    for record in records {
        if let Some(key) = key_fn(record) {
            buckets.entry(key).or_default().add(metric_fn(record));
        }
    }
    buckets
}

// ---------------------------------------------------------------------------
// Time bucketing
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct MonthKey {
    pub year: i32,
    pub month: u32,
}

impl MonthKey {
    pub fn of(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }
}

impl std::fmt::Display for MonthKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct QuarterKey {
    pub year: i32,
    pub quarter: u32,
}

impl QuarterKey {
    pub fn of(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            quarter: (date.month() - 1) / 3 + 1,
        }
    }
}

impl std::fmt::Display for QuarterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-Q{}", self.year, self.quarter)
    }
}

/// Rolling cutoff `months` calendar months before `now`.
pub fn months_back(now: DateTime<Utc>, months: u32) -> NaiveDate {
    now.date_naive()
        .checked_sub_months(Months::new(months))
        .unwrap_or(NaiveDate::MIN)
}

/// Rolling cutoff `years` calendar years before `now`.
pub fn years_back(now: DateTime<Utc>, years: u32) -> NaiveDate {
    months_back(now, years * 12)
}
