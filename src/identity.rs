use serde::{Deserialize, Serialize};

use crate::config::SIZE_ROUNDING_SQM;
use crate::types::Record;

/// Heuristic identity for a physical unit: the ledger has no real unit key,
/// so two sales are considered the same unit when they share a building,
/// a rounded size and a bedroom category. Rounding granularity is
/// [`SIZE_ROUNDING_SQM`]. Different units with the same rounded size merge
/// falsely; renovated or remeasured units split falsely. Both are accepted
/// limitations of the heuristic.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UnitKey {
    pub building: String,
    /// Size in rounding-granularity steps (whole m² at the default).
    pub size_key: i64,
    /// Bedroom label as recorded; empty when the ledger has none.
    pub bedrooms: String,
}

impl std::fmt::Display for UnitKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}sqm/{}", self.building, self.size_key, self.bedrooms)
    }
}

/// Derives the unit identity for a record, or None when the record cannot
/// carry one (missing/empty building, missing/non-positive size). Such
/// records are excluded from flip analysis entirely.
pub fn resolve_unit_key(record: &Record) -> Option<UnitKey> {
    let building = record.building.as_deref()?.trim();
    if building.is_empty() {
        return None;
    }
    let size = record.size_sqm?;
    if size <= 0.0 {
        return None;
    }

    Some(UnitKey {
        building: building.to_string(),
        size_key: (size / SIZE_ROUNDING_SQM).round() as i64,
        bedrooms: record
            .bedrooms
            .as_deref()
            .map(str::trim)
            .unwrap_or("")
            .to_string(),
    })
}
