use serde::Serialize;

use crate::analytics::aggregate::{aggregate_by, round2, Bucket};
use crate::types::{Record, RecordKind};

/// Per-area sales overview: volume plus average prices.
#[derive(Debug, Clone, Serialize)]
pub struct AreaStats {
    pub area: String,
    pub transactions: u64,
    pub avg_amount: Option<f64>,
    pub avg_unit_price: Option<f64>,
}

/// Groups sale records by area, descending by volume. Records with a
/// missing or empty area are not attributable and are skipped.
pub fn stats_by_area(records: &[Record]) -> Vec<AreaStats> {
    let area_of = |r: &Record| -> Option<String> {
        if r.kind != RecordKind::Transaction {
            return None;
        }
        r.area
            .as_deref()
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .map(str::to_string)
    };

    let amounts = aggregate_by(records, area_of, |r| r.amount);
    let unit_prices = aggregate_by(records, area_of, |r| r.effective_unit_price());

    let mut rows: Vec<AreaStats> = amounts
        .into_iter()
        .map(|(area, bucket)| {
            let avg_unit_price = unit_prices.get(&area).and_then(Bucket::mean);
            AreaStats {
                transactions: bucket.count(),
                avg_amount: bucket.mean().map(round2),
                avg_unit_price: avg_unit_price.map(round2),
                area,
            }
        })
        .collect();
    rows.sort_by(|a, b| {
        b.transactions
            .cmp(&a.transactions)
            .then_with(|| a.area.cmp(&b.area))
    });
    rows
}

/// Rental-market overview for a pre-filtered record slice.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RentalStats {
    pub contracts: u64,
    pub avg_annual_rent: Option<f64>,
    pub avg_rent_sqm: Option<f64>,
    pub min_rent: Option<f64>,
    pub max_rent: Option<f64>,
}

pub fn rental_stats(records: &[Record]) -> RentalStats {
    let mut rent = Bucket::default();
    let mut rent_sqm = Bucket::default();
    for record in records {
        if record.kind != RecordKind::Rental {
            continue;
        }
        rent.add(record.amount);
        rent_sqm.add(record.effective_unit_price());
    }

    RentalStats {
        contracts: rent.count(),
        avg_annual_rent: rent.mean().map(round2),
        avg_rent_sqm: rent_sqm.mean().map(round2),
        min_rent: rent.min(),
        max_rent: rent.max(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn record(id: i64, kind: RecordKind, area: Option<&str>, amount: Option<f64>, size: Option<f64>) -> Record {
        Record {
            id,
            kind,
            event_date: NaiveDate::from_ymd_opt(2024, 4, 1).unwrap(),
            area: area.map(str::to_string),
            building: None,
            property_type: None,
            property_sub_type: None,
            bedrooms: None,
            project: None,
            size_sqm: size,
            amount,
            unit_price: None,
        }
    }

    #[test]
    fn areas_rank_by_volume_and_skip_unattributable_records() {
        let records = vec![
            record(1, RecordKind::Transaction, Some("Marina"), Some(100.0), None),
            record(2, RecordKind::Transaction, Some("Marina"), Some(300.0), None),
            record(3, RecordKind::Transaction, Some("Downtown"), Some(50.0), None),
            record(4, RecordKind::Transaction, Some("  "), Some(999.0), None),
            record(5, RecordKind::Transaction, None, Some(999.0), None),
            record(6, RecordKind::Rental, Some("Marina"), Some(80.0), None),
        ];
        let rows = stats_by_area(&records);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].area, "Marina");
        assert_eq!(rows[0].transactions, 2);
        assert_eq!(rows[0].avg_amount, Some(200.0));
        assert_eq!(rows[1].area, "Downtown");
    }

    #[test]
    fn rental_stats_cover_present_metrics_only() {
        let records = vec![
            record(1, RecordKind::Rental, Some("Marina"), Some(60_000.0), Some(60.0)),
            record(2, RecordKind::Rental, Some("Marina"), Some(100_000.0), None),
            record(3, RecordKind::Rental, Some("Marina"), None, Some(50.0)),
        ];
        let stats = rental_stats(&records);
        assert_eq!(stats.contracts, 3);
        assert_eq!(stats.avg_annual_rent, Some(80_000.0));
        assert_eq!(stats.avg_rent_sqm, Some(1_000.0));
        assert_eq!(stats.min_rent, Some(60_000.0));
        assert_eq!(stats.max_rent, Some(100_000.0));
    }

    #[test]
    fn empty_input_yields_empty_stats() {
        let stats = rental_stats(&[]);
        assert_eq!(stats.contracts, 0);
        assert_eq!(stats.avg_annual_rent, None);
    }
}
