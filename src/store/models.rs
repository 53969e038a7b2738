//! Database row types for the sqlite reference adapter.
//! Used by sqlx for typed queries; converted into domain types on read.

use chrono::{DateTime, NaiveDate, Utc};

use crate::error::{AppError, Result};
use crate::types::{Alert, AlertKind, CriteriaFilter, Record, RecordKind};

#[derive(Debug, sqlx::FromRow)]
pub struct RecordRow {
    pub id: i64,
    pub kind: String,
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

impl RecordRow {
    pub fn into_record(self) -> Result<Record> {
        let kind = RecordKind::parse(&self.kind)
            .ok_or_else(|| AppError::Store(format!("unknown record kind: {}", self.kind)))?;
        Ok(Record {
            id: self.id,
            kind,
            event_date: self.event_date,
            area: self.area,
            building: self.building,
            property_type: self.property_type,
            property_sub_type: self.property_sub_type,
            bedrooms: self.bedrooms,
            project: self.project,
            size_sqm: self.size_sqm,
            amount: self.amount,
            unit_price: self.unit_price,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub struct AlertRow {
    pub id: i64,
    pub subscriber_id: i64,
    pub area: Option<String>,
    pub building: Option<String>,
    pub property_type: Option<String>,
    pub kind: String,
    pub threshold: Option<f64>,
    pub is_active: bool,
    pub last_scanned_at: Option<DateTime<Utc>>,
}

impl AlertRow {
    pub fn into_alert(self) -> Result<Alert> {
        let kind = AlertKind::parse(&self.kind)
            .ok_or_else(|| AppError::Store(format!("unknown alert kind: {}", self.kind)))?;
        Ok(Alert {
            id: self.id,
            subscriber_id: self.subscriber_id,
            filter: CriteriaFilter {
                area: self.area,
                building: self.building,
                property_type: self.property_type,
            },
            kind,
            threshold: self.threshold,
            is_active: self.is_active,
            last_scanned_at: self.last_scanned_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub struct TriggerRow {
    pub alert_id: i64,
    pub record_id: i64,
    pub triggered_at: DateTime<Utc>,
}
