use std::collections::HashMap;

use chrono::NaiveDate;
use serde::Serialize;

use crate::analytics::aggregate::{percentile, round2};
use crate::config::{FLIP_MAX_HOLD_DAYS, FLIP_MIN_PARTITION_SALES};
use crate::identity::{resolve_unit_key, UnitKey};
use crate::types::{Record, RecordKind};

/// Acceptance policy for flip candidates.
#[derive(Debug, Clone)]
pub struct FlipPolicy {
    /// Pairs held longer than this many days are not flips.
    pub max_hold_days: i64,
    /// Partitions with fewer total sales are ignored entirely.
    pub min_partition_sales: usize,
}

impl Default for FlipPolicy {
    fn default() -> Self {
        Self {
            max_hold_days: FLIP_MAX_HOLD_DAYS,
            min_partition_sales: FLIP_MIN_PARTITION_SALES,
        }
    }
}

/// One accepted resale pair: consecutive sales of the same logical unit.
#[derive(Debug, Clone, Serialize)]
pub struct FlipCandidate {
    pub unit: UnitKey,
    pub area: Option<String>,
    pub buy_record_id: i64,
    pub sell_record_id: i64,
    pub buy_date: NaiveDate,
    pub sell_date: NaiveDate,
    pub buy_price: f64,
    pub sell_price: f64,
    pub hold_days: i64,
    pub profit: f64,
    pub profit_pct: f64,
}

/// Partitions sale records by (unit identity, area), orders each partition
/// by (event date, record id) and pairs adjacent ranks. Only adjacent ranks
/// pair — a unit sold three times yields exactly two candidates. A pair is
/// accepted when the sell date is strictly after the buy date, the hold is
/// within the policy ceiling and the buy price is present and positive;
/// anything else drops the candidate, never errors.
pub fn detect_flips(records: &[Record], policy: &FlipPolicy) -> Vec<FlipCandidate> {
    let mut partitions: HashMap<(UnitKey, Option<String>), Vec<&Record>> = HashMap::new();
    for record in records {
        if record.kind != RecordKind::Transaction {
            continue;
        }
        let Some(unit) = resolve_unit_key(record) else {
            continue;
        };
        partitions
            .entry((unit, record.area.clone()))
            .or_default()
            .push(record);
    }

    let mut candidates = Vec::new();
    for ((unit, area), mut sales) in partitions {
        if sales.len() < policy.min_partition_sales {
            continue;
        }
        sales.sort_by_key(|r| (r.event_date, r.id));

        for pair in sales.windows(2) {
            let (buy, sell) = (pair[0], pair[1]);
            // Same-day duplicates are ledger noise, not a flip.
            if sell.event_date <= buy.event_date {
                continue;
            }
            let hold_days = (sell.event_date - buy.event_date).num_days();
            if hold_days > policy.max_hold_days {
                continue;
            }
            let Some(buy_price) = buy.amount.filter(|v| *v > 0.0) else {
                continue;
            };
            let Some(sell_price) = sell.amount else {
                continue;
            };

            let profit = sell_price - buy_price;
            candidates.push(FlipCandidate {
                unit: unit.clone(),
                area: area.clone(),
                buy_record_id: buy.id,
                sell_record_id: sell.id,
                buy_date: buy.event_date,
                sell_date: sell.event_date,
                buy_price,
                sell_price,
                hold_days,
                profit,
                profit_pct: round2(profit / buy_price * 100.0),
            });
        }
    }

    candidates.sort_by(|a, b| {
        b.profit_pct
            .total_cmp(&a.profit_pct)
            .then_with(|| (a.buy_date, a.buy_record_id).cmp(&(b.buy_date, b.buy_record_id)))
    });
    candidates
}

// ---------------------------------------------------------------------------
// Aggregates over the accepted candidate set
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct FlipAggregate {
    pub total_flips: u64,
    pub avg_profit: f64,
    pub avg_profit_pct: f64,
    pub median_profit_pct: f64,
    pub avg_hold_days: f64,
    pub worst_profit_pct: f64,
    pub best_profit_pct: f64,
    pub profitable_flips: u64,
    pub success_rate_pct: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct AreaFlipStats {
    pub area: String,
    pub stats: FlipAggregate,
}

#[derive(Debug, Clone, Serialize)]
pub struct BuildingFlipStats {
    pub building: String,
    pub area: Option<String>,
    pub stats: FlipAggregate,
}

fn aggregate(flips: &[&FlipCandidate]) -> FlipAggregate {
    let n = flips.len() as f64;
    let profit_pcts: Vec<f64> = flips.iter().map(|f| f.profit_pct).collect();
    let profitable = flips.iter().filter(|f| f.profit > 0.0).count() as u64;

    FlipAggregate {
        total_flips: flips.len() as u64,
        avg_profit: round2(flips.iter().map(|f| f.profit).sum::<f64>() / n),
        avg_profit_pct: round2(profit_pcts.iter().sum::<f64>() / n),
        median_profit_pct: round2(percentile(&profit_pcts, 0.5).unwrap_or(0.0)),
        avg_hold_days: (flips.iter().map(|f| f.hold_days).sum::<i64>() as f64 / n).round(),
        worst_profit_pct: profit_pcts.iter().copied().fold(f64::INFINITY, f64::min),
        best_profit_pct: profit_pcts.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        profitable_flips: profitable,
        success_rate_pct: (profitable as f64 / n * 1000.0).round() / 10.0,
    }
}

/// Per-area flip statistics over accepted candidates, descending by average
/// profit percent. Candidates without an area are not attributable.
pub fn flip_stats_by_area(flips: &[FlipCandidate], min_flips: usize) -> Vec<AreaFlipStats> {
    let mut groups: HashMap<&str, Vec<&FlipCandidate>> = HashMap::new();
    for flip in flips {
        if let Some(area) = flip.area.as_deref() {
            groups.entry(area).or_default().push(flip);
        }
    }

    let mut rows: Vec<AreaFlipStats> = groups
        .into_iter()
        .filter(|(_, group)| group.len() >= min_flips)
        .map(|(area, group)| AreaFlipStats {
            area: area.to_string(),
            stats: aggregate(&group),
        })
        .collect();
    rows.sort_by(|a, b| {
        b.stats
            .avg_profit_pct
            .total_cmp(&a.stats.avg_profit_pct)
            .then_with(|| a.area.cmp(&b.area))
    });
    rows
}

/// Per-building flip statistics, descending by average profit percent.
pub fn flip_stats_by_building(flips: &[FlipCandidate], min_flips: usize) -> Vec<BuildingFlipStats> {
    let mut groups: HashMap<(&str, Option<&str>), Vec<&FlipCandidate>> = HashMap::new();
    for flip in flips {
        groups
            .entry((flip.unit.building.as_str(), flip.area.as_deref()))
            .or_default()
            .push(flip);
    }

    let mut rows: Vec<BuildingFlipStats> = groups
        .into_iter()
        .filter(|(_, group)| group.len() >= min_flips)
        .map(|((building, area), group)| BuildingFlipStats {
            building: building.to_string(),
            area: area.map(str::to_string),
            stats: aggregate(&group),
        })
        .collect();
    rows.sort_by(|a, b| {
        b.stats
            .avg_profit_pct
            .total_cmp(&a.stats.avg_profit_pct)
            .then_with(|| a.building.cmp(&b.building))
    });
    rows
}
