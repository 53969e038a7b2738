use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use crate::analytics::aggregate::{
    aggregate_by, months_back, pct_change, round2, years_back, Bucket,
};
use crate::config::vacancy_thresholds;
use crate::types::{Record, RecordKind};

fn clean_area(record: &Record) -> Option<String> {
    record
        .area
        .as_deref()
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .map(str::to_string)
}

// ---------------------------------------------------------------------------
// Vacancy / demand signal
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketSignal {
    HighVacancyRisk,
    ModerateVacancyRisk,
    HighDemand,
    Stable,
    InsufficientData,
}

impl std::fmt::Display for MarketSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            MarketSignal::HighVacancyRisk => "high_vacancy_risk",
            MarketSignal::ModerateVacancyRisk => "moderate_vacancy_risk",
            MarketSignal::HighDemand => "high_demand",
            MarketSignal::Stable => "stable",
            MarketSignal::InsufficientData => "insufficient_data",
        };
        write!(f, "{s}")
    }
}

/// Classifies the change between two adjacent windows. An undefined volume
/// change (zero prior volume) is insufficient data, never a crash or a
/// phantom signal.
pub fn classify_demand(
    volume_change_pct: Option<f64>,
    amount_change_pct: Option<f64>,
) -> MarketSignal {
    let Some(volume) = volume_change_pct else {
        return MarketSignal::InsufficientData;
    };

    if volume < vacancy_thresholds::HIGH_VOLUME_DROP_PCT
        && amount_change_pct.is_some_and(|a| a < vacancy_thresholds::HIGH_RENT_DROP_PCT)
    {
        MarketSignal::HighVacancyRisk
    } else if volume < vacancy_thresholds::MODERATE_VOLUME_DROP_PCT {
        MarketSignal::ModerateVacancyRisk
    } else if volume > vacancy_thresholds::HIGH_DEMAND_RISE_PCT {
        MarketSignal::HighDemand
    } else {
        MarketSignal::Stable
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct VacancySignal {
    pub area: String,
    pub recent_contracts: u64,
    pub prev_contracts: u64,
    pub volume_change_pct: Option<f64>,
    pub recent_avg_rent: Option<f64>,
    pub prev_avg_rent: Option<f64>,
    pub rent_change_pct: Option<f64>,
    pub signal: MarketSignal,
}

/// Compares each area's recent 6-month rental window against the prior
/// 6-month window. Areas below `min_prior_contracts`
/// ([`crate::config::VACANCY_MIN_PRIOR_CONTRACTS`] by default) in the
/// prior window are skipped; areas with no recent activity at all still
/// report (their volume collapse is the signal's whole point). Ascending
/// by volume change, worst first.
pub fn vacancy_signals(
    records: &[Record],
    now: DateTime<Utc>,
    min_prior_contracts: usize,
) -> Vec<VacancySignal> {
    let recent_cutoff = months_back(now, 6);
    let prior_cutoff = months_back(now, 12);

    let recent = aggregate_by(
        records,
        |r| (r.kind == RecordKind::Rental && r.event_date >= recent_cutoff)
            .then(|| clean_area(r))
            .flatten(),
        |r| r.amount,
    );
    let prior = aggregate_by(
        records,
        |r| (r.kind == RecordKind::Rental
            && r.event_date >= prior_cutoff
            && r.event_date < recent_cutoff)
            .then(|| clean_area(r))
            .flatten(),
        |r| r.amount,
    );

    let mut rows: Vec<VacancySignal> = prior
        .into_iter()
        .filter(|(_, bucket)| bucket.count() as usize >= min_prior_contracts)
        .map(|(area, prior_bucket)| {
            let recent_bucket = recent.get(&area);
            let recent_contracts = recent_bucket.map_or(0, Bucket::count);
            let recent_avg = recent_bucket.and_then(Bucket::mean);
            let prior_avg = prior_bucket.mean();

            let volume_change_pct =
                pct_change(recent_contracts as f64, prior_bucket.count() as f64);
            let rent_change_pct = match (recent_avg, prior_avg) {
                (Some(recent), Some(prior)) => pct_change(recent, prior),
                _ => None,
            };

            VacancySignal {
                signal: classify_demand(volume_change_pct, rent_change_pct),
                area,
                recent_contracts,
                prev_contracts: prior_bucket.count(),
                volume_change_pct,
                recent_avg_rent: recent_avg.map(round2),
                prev_avg_rent: prior_avg.map(round2),
                rent_change_pct,
            }
        })
        .collect();

    rows.sort_by(|a, b| match (a.volume_change_pct, b.volume_change_pct) {
        (Some(x), Some(y)) => x.total_cmp(&y),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });
    rows
}

// ---------------------------------------------------------------------------
// Gross yield
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct YieldRow {
    pub area: String,
    pub avg_purchase_price: f64,
    pub avg_annual_rent: f64,
    pub gross_yield_pct: f64,
    pub sale_count: u64,
    pub rent_count: u64,
}

/// Average annual rent as a percentage of average purchase price per area
/// over the trailing `window_years` (defaults:
/// [`crate::config::YIELD_WINDOW_YEARS`],
/// [`crate::config::YIELD_MIN_SAMPLES`]). Areas where either side is below
/// `min_samples` are omitted, not zero-filled. Descending by yield.
pub fn gross_yields(
    records: &[Record],
    now: DateTime<Utc>,
    window_years: u32,
    min_samples: usize,
) -> Vec<YieldRow> {
    let cutoff = years_back(now, window_years);
    // Join areas case-insensitively but report the ledger's spelling.
    let mut display_names: HashMap<String, String> = HashMap::new();
    let mut keyed = |record: &Record| -> Option<String> {
        let area = clean_area(record)?;
        let key = area.to_lowercase();
        display_names.entry(key.clone()).or_insert(area);
        Some(key)
    };

    let mut sale_keys = HashMap::new();
    let mut rent_keys = HashMap::new();
    for record in records {
        if record.event_date < cutoff || !record.amount.is_some_and(|a| a > 0.0) {
            continue;
        }
        let Some(key) = keyed(record) else { continue };
        let bucket = match record.kind {
            RecordKind::Transaction => sale_keys.entry(key).or_insert_with(Bucket::default),
            RecordKind::Rental => rent_keys.entry(key).or_insert_with(Bucket::default),
        };
        bucket.add(record.amount);
    }

    let mut rows: Vec<YieldRow> = sale_keys
        .into_iter()
        .filter_map(|(key, sales)| {
            let rents = rent_keys.get(&key)?;
            if (sales.count() as usize) < min_samples || (rents.count() as usize) < min_samples {
                return None;
            }
            let avg_price = sales.mean()?;
            let avg_rent = rents.mean()?;
            let yield_pct = pct_of(avg_rent, avg_price)?;
            Some(YieldRow {
                area: display_names.get(&key).cloned().unwrap_or(key),
                avg_purchase_price: round2(avg_price),
                avg_annual_rent: round2(avg_rent),
                gross_yield_pct: yield_pct,
                sale_count: sales.count(),
                rent_count: rents.count(),
            })
        })
        .collect();
    rows.sort_by(|a, b| {
        b.gross_yield_pct
            .total_cmp(&a.gross_yield_pct)
            .then_with(|| a.area.cmp(&b.area))
    });
    rows
}

/// `numerator / denominator × 100`, 2 dp; None on a zero denominator.
fn pct_of(numerator: f64, denominator: f64) -> Option<f64> {
    if denominator == 0.0 {
        return None;
    }
    Some(round2(numerator / denominator * 100.0))
}

// ---------------------------------------------------------------------------
// Price change from launch
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct LaunchPriceChange {
    pub project: String,
    pub total_sales: u64,
    pub launch_price_sqm: f64,
    pub current_price_sqm: f64,
    pub price_change_pct: Option<f64>,
    pub first_sale: NaiveDate,
    pub latest_sale: NaiveDate,
}

/// Per project: average unit price of the first `sample` chronological
/// sales ([`crate::config::LAUNCH_SAMPLE_SALES`] by default) against the
/// average of the latest `sample`. Projects with fewer than `min_sales`
/// priced sales are skipped. Descending by change.
pub fn launch_price_changes(
    records: &[Record],
    sample: usize,
    min_sales: usize,
) -> Vec<LaunchPriceChange> {
    let mut projects: HashMap<&str, Vec<(&Record, f64)>> = HashMap::new();
    for record in records {
        if record.kind != RecordKind::Transaction {
            continue;
        }
        let Some(project) = record.project.as_deref().map(str::trim).filter(|p| !p.is_empty())
        else {
            continue;
        };
        let Some(unit_price) = record.effective_unit_price() else {
            continue;
        };
        projects.entry(project).or_default().push((record, unit_price));
    }

    let sample = sample.max(1);
    let mut rows: Vec<LaunchPriceChange> = projects
        .into_iter()
        .filter(|(_, sales)| sales.len() >= min_sales.max(2))
        .map(|(project, mut sales)| {
            sales.sort_by_key(|(r, _)| (r.event_date, r.id));
            let launch: f64 = mean_of(sales.iter().take(sample).map(|(_, p)| *p));
            let current: f64 =
                mean_of(sales.iter().rev().take(sample).map(|(_, p)| *p));

            LaunchPriceChange {
                project: project.to_string(),
                total_sales: sales.len() as u64,
                launch_price_sqm: round2(launch),
                current_price_sqm: round2(current),
                price_change_pct: pct_change(current, launch),
                first_sale: sales[0].0.event_date,
                latest_sale: sales[sales.len() - 1].0.event_date,
            }
        })
        .collect();

    rows.sort_by(|a, b| match (a.price_change_pct, b.price_change_pct) {
        (Some(x), Some(y)) => y.total_cmp(&x),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });
    rows
}

fn mean_of(values: impl Iterator<Item = f64>) -> f64 {
    let mut sum = 0.0;
    let mut n = 0u32;
    for v in values {
        sum += v;
        n += 1;
    }
    if n == 0 {
        0.0
    } else {
        sum / f64::from(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 7, 1, 0, 0, 0).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn rental(id: i64, event_date: NaiveDate, area: &str, amount: f64) -> Record {
        Record {
            id,
            kind: RecordKind::Rental,
            event_date,
            area: Some(area.to_string()),
            building: None,
            property_type: None,
            property_sub_type: None,
            bedrooms: None,
            project: None,
            size_sqm: None,
            amount: Some(amount),
            unit_price: None,
        }
    }

    fn tx(id: i64, event_date: NaiveDate, area: &str, amount: f64) -> Record {
        Record {
            kind: RecordKind::Transaction,
            ..rental(id, event_date, area, amount)
        }
    }

    fn project_sale(id: i64, event_date: NaiveDate, project: &str, unit_price: f64) -> Record {
        Record {
            id,
            kind: RecordKind::Transaction,
            event_date,
            area: Some("Marina".to_string()),
            building: Some("Tower A".to_string()),
            property_type: None,
            property_sub_type: None,
            bedrooms: None,
            project: Some(project.to_string()),
            size_sqm: Some(100.0),
            amount: Some(unit_price * 100.0),
            unit_price: Some(unit_price),
        }
    }

    #[test]
    fn classification_thresholds() {
        use MarketSignal::*;
        assert_eq!(classify_demand(Some(-25.0), Some(-6.0)), HighVacancyRisk);
        // Deep volume drop without the rent drop is only moderate.
        assert_eq!(classify_demand(Some(-25.0), Some(-2.0)), ModerateVacancyRisk);
        assert_eq!(classify_demand(Some(-15.0), None), ModerateVacancyRisk);
        assert_eq!(classify_demand(Some(25.0), Some(3.0)), HighDemand);
        assert_eq!(classify_demand(Some(5.0), Some(1.0)), Stable);
        // Boundary values are not beyond the thresholds.
        assert_eq!(classify_demand(Some(-20.0), Some(-6.0)), ModerateVacancyRisk);
        assert_eq!(classify_demand(Some(20.0), None), Stable);
        assert_eq!(classify_demand(None, Some(-50.0)), InsufficientData);
    }

    #[test]
    fn vacancy_signal_compares_adjacent_windows() {
        let mut records = Vec::new();
        let mut id = 0;
        // Prior window (2024-07-01 .. 2025-01-01): 10 contracts at 100k.
        for i in 0..10 {
            id += 1;
            records.push(rental(id, date(2024, 8, 1 + i), "Marina", 100_000.0));
        }
        // Recent window: 6 contracts at 90k — volume -40%, rent -10%.
        for i in 0..6 {
            id += 1;
            records.push(rental(id, date(2025, 2, 1 + i), "Marina", 90_000.0));
        }

        let rows = vacancy_signals(&records, now(), 1);
        assert_eq!(rows.len(), 1);
        let marina = &rows[0];
        assert_eq!(marina.prev_contracts, 10);
        assert_eq!(marina.recent_contracts, 6);
        assert_eq!(marina.volume_change_pct, Some(-40.0));
        assert_eq!(marina.rent_change_pct, Some(-10.0));
        assert_eq!(marina.signal, MarketSignal::HighVacancyRisk);
    }

    #[test]
    fn area_that_went_silent_still_signals() {
        let records: Vec<Record> = (0..5)
            .map(|i| rental(i, date(2024, 9, 1), "Quiet", 80_000.0))
            .collect();

        let rows = vacancy_signals(&records, now(), 1);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].recent_contracts, 0);
        assert_eq!(rows[0].volume_change_pct, Some(-100.0));
        // No recent rent average exists, so the rent condition for high
        // risk is undefined and the drop classifies as moderate.
        assert_eq!(rows[0].rent_change_pct, None);
        assert_eq!(rows[0].signal, MarketSignal::ModerateVacancyRisk);
    }

    #[test]
    fn prior_window_below_minimum_is_skipped() {
        let records = vec![
            rental(1, date(2024, 9, 1), "Thin", 80_000.0),
            rental(2, date(2025, 3, 1), "Thin", 80_000.0),
        ];
        assert!(vacancy_signals(&records, now(), 5).is_empty());
    }

    #[test]
    fn yields_require_both_sides_to_meet_the_sample_floor() {
        let mut records = Vec::new();
        let mut id = 0;
        for _ in 0..3 {
            id += 1;
            records.push(tx(id, date(2025, 3, 1), "Marina", 2_000_000.0));
            id += 1;
            records.push(rental(id, date(2025, 3, 1), "marina", 120_000.0));
        }
        // Downtown has sales but a single rental — omitted at min_samples=2.
        id += 1;
        records.push(tx(id, date(2025, 3, 1), "Downtown", 1_000_000.0));
        id += 1;
        records.push(tx(id, date(2025, 3, 2), "Downtown", 1_000_000.0));
        id += 1;
        records.push(rental(id, date(2025, 3, 1), "Downtown", 60_000.0));

        let rows = gross_yields(&records, now(), 2, 2);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].area, "Marina");
        assert_eq!(rows[0].gross_yield_pct, 6.0);
        assert_eq!(rows[0].sale_count, 3);
        assert_eq!(rows[0].rent_count, 3);
    }

    #[test]
    fn yield_window_excludes_stale_records() {
        let mut records = Vec::new();
        for id in 0..4 {
            records.push(tx(id, date(2019, 1, 1), "Marina", 2_000_000.0));
            records.push(rental(10 + id, date(2019, 1, 2), "Marina", 120_000.0));
        }
        assert!(gross_yields(&records, now(), 2, 2).is_empty());
    }

    #[test]
    fn launch_price_change_compares_first_and_latest_samples() {
        let records = vec![
            project_sale(1, date(2023, 1, 1), "Harbor Views", 10_000.0),
            project_sale(2, date(2023, 1, 20), "Harbor Views", 10_000.0),
            project_sale(3, date(2024, 2, 1), "Harbor Views", 12_000.0),
            project_sale(4, date(2025, 3, 1), "Harbor Views", 14_000.0),
        ];
        let rows = launch_price_changes(&records, 2, 4);
        assert_eq!(rows.len(), 1);
        let harbor = &rows[0];
        assert_eq!(harbor.total_sales, 4);
        assert_eq!(harbor.launch_price_sqm, 10_000.0);
        assert_eq!(harbor.current_price_sqm, 13_000.0);
        assert_eq!(harbor.price_change_pct, Some(30.0));
        assert_eq!(harbor.first_sale, date(2023, 1, 1));
        assert_eq!(harbor.latest_sale, date(2025, 3, 1));
    }

    #[test]
    fn projects_below_the_sale_minimum_are_skipped() {
        let records = vec![
            project_sale(1, date(2023, 1, 1), "Tiny", 10_000.0),
            project_sale(2, date(2023, 6, 1), "Tiny", 11_000.0),
        ];
        assert!(launch_price_changes(&records, 5, 10).is_empty());
        assert_eq!(launch_price_changes(&records, 5, 2).len(), 1);
    }

    #[test]
    fn unpriced_sales_never_enter_the_launch_window() {
        let mut records = vec![
            project_sale(1, date(2023, 1, 1), "Harbor Views", 10_000.0),
            project_sale(2, date(2024, 1, 1), "Harbor Views", 12_000.0),
        ];
        let mut unpriced = project_sale(3, date(2022, 1, 1), "Harbor Views", 0.0);
        unpriced.unit_price = None;
        unpriced.amount = None;
        records.push(unpriced);

        let rows = launch_price_changes(&records, 1, 2);
        assert_eq!(rows[0].total_sales, 2);
        assert_eq!(rows[0].launch_price_sqm, 10_000.0);
        assert_eq!(rows[0].price_change_pct, Some(20.0));
    }
}
