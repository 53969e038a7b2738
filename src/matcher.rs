use crate::types::{Alert, AlertKind, CriteriaFilter, Record};

/// Pure, total criteria predicate. An absent filter field always matches on
/// that dimension; a record with a null value on a filtered field never
/// matches that filter (missing data must not produce false positives).
pub fn matches(record: &Record, filter: &CriteriaFilter) -> bool {
    contains_ci(record.area.as_deref(), filter.area.as_deref())
        && contains_ci(record.building.as_deref(), filter.building.as_deref())
        && equals_ci(record.property_type.as_deref(), filter.property_type.as_deref())
}

/// Kind-specific threshold comparison. Comparisons are strict inequality:
/// a record exactly equal to the threshold never matches. A record missing
/// the compared value never matches.
pub fn kind_matches(record: &Record, kind: AlertKind, threshold: Option<f64>) -> bool {
    let Some(threshold) = threshold else {
        // new_match needs no threshold; threshold kinds without one are an
        // invalid configuration rejected upstream — match nothing.
        return kind == AlertKind::NewMatch;
    };

    match kind {
        AlertKind::NewMatch => true,
        AlertKind::PriceBelow => record.amount.is_some_and(|v| v < threshold),
        AlertKind::PriceAbove => record.amount.is_some_and(|v| v > threshold),
        AlertKind::UnitPriceBelow => record.effective_unit_price().is_some_and(|v| v < threshold),
        AlertKind::UnitPriceAbove => record.effective_unit_price().is_some_and(|v| v > threshold),
    }
}

/// Full alert predicate: field filter and kind threshold.
pub fn alert_matches(alert: &Alert, record: &Record) -> bool {
    matches(record, &alert.filter) && kind_matches(record, alert.kind, alert.threshold)
}

fn contains_ci(value: Option<&str>, wanted: Option<&str>) -> bool {
    match wanted {
        None => true,
        Some(wanted) => match value {
            Some(value) => value.to_lowercase().contains(&wanted.to_lowercase()),
            None => false,
        },
    }
}

fn equals_ci(value: Option<&str>, wanted: Option<&str>) -> bool {
    match wanted {
        None => true,
        Some(wanted) => match value {
            Some(value) => value.eq_ignore_ascii_case(wanted),
            None => false,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RecordKind;
    use chrono::NaiveDate;

    fn record() -> Record {
        Record {
            id: 7,
            kind: RecordKind::Transaction,
            event_date: NaiveDate::from_ymd_opt(2024, 3, 10).unwrap(),
            area: Some("Dubai Marina".to_string()),
            building: Some("Marina Heights".to_string()),
            property_type: Some("Unit".to_string()),
            property_sub_type: Some("Flat".to_string()),
            bedrooms: Some("2 B/R".to_string()),
            project: None,
            size_sqm: Some(120.0),
            amount: Some(2_400_000.0),
            unit_price: Some(20_000.0),
        }
    }

    fn filter(area: Option<&str>, building: Option<&str>, property_type: Option<&str>) -> CriteriaFilter {
        CriteriaFilter {
            area: area.map(str::to_string),
            building: building.map(str::to_string),
            property_type: property_type.map(str::to_string),
        }
    }

    #[test]
    fn empty_filter_matches_everything() {
        assert!(matches(&record(), &CriteriaFilter::default()));
    }

    #[test]
    fn area_and_building_match_by_substring_case_insensitive() {
        assert!(matches(&record(), &filter(Some("marina"), None, None)));
        assert!(matches(&record(), &filter(None, Some("HEIGHTS"), None)));
        assert!(!matches(&record(), &filter(Some("Downtown"), None, None)));
    }

    #[test]
    fn property_type_matches_exactly_case_insensitive() {
        assert!(matches(&record(), &filter(None, None, Some("unit"))));
        // substring is not enough for the type dimension
        assert!(!matches(&record(), &filter(None, None, Some("uni"))));
    }

    #[test]
    fn null_record_field_never_matches_an_active_filter() {
        let mut r = record();
        r.area = None;
        assert!(!matches(&r, &filter(Some("marina"), None, None)));
        // but still matches when the dimension is unfiltered
        assert!(matches(&r, &filter(None, Some("Heights"), None)));
    }

    #[test]
    fn thresholds_are_strict() {
        let r = record();
        assert!(kind_matches(&r, AlertKind::PriceBelow, Some(2_400_001.0)));
        assert!(!kind_matches(&r, AlertKind::PriceBelow, Some(2_400_000.0)));
        assert!(!kind_matches(&r, AlertKind::PriceAbove, Some(2_400_000.0)));
        assert!(kind_matches(&r, AlertKind::UnitPriceAbove, Some(19_999.0)));
        assert!(!kind_matches(&r, AlertKind::UnitPriceAbove, Some(20_000.0)));
    }

    #[test]
    fn missing_amount_never_crosses_a_threshold() {
        let mut r = record();
        r.amount = None;
        r.unit_price = None;
        r.size_sqm = None;
        assert!(!kind_matches(&r, AlertKind::PriceBelow, Some(f64::MAX)));
        assert!(!kind_matches(&r, AlertKind::UnitPriceBelow, Some(f64::MAX)));
    }

    #[test]
    fn new_match_ignores_thresholds() {
        let r = record();
        assert!(kind_matches(&r, AlertKind::NewMatch, None));
        assert!(kind_matches(&r, AlertKind::NewMatch, Some(1.0)));
    }

    #[test]
    fn threshold_kind_without_threshold_matches_nothing() {
        assert!(!kind_matches(&record(), AlertKind::PriceBelow, None));
    }
}
