use crate::error::{AppError, Result};

/// Unit-size rounding granularity (m²) used by the identity resolver.
/// Two sales of the same building whose sizes round to the same whole m²
/// (and share a bedroom category) are treated as the same physical unit.
/// Coarser values merge more aggressively; finer values split renovated or
/// remeasured units. False merges and false splits are a known limitation
/// of the heuristic, not a bug.
pub const SIZE_ROUNDING_SQM: f64 = 1.0;

/// Maximum hold duration (days) for a resale pair to count as a flip.
pub const FLIP_MAX_HOLD_DAYS: i64 = 3 * 365;

/// Minimum total sales a unit partition needs before its pairs are eligible.
pub const FLIP_MIN_PARTITION_SALES: usize = 2;

/// Number of earliest/latest sales averaged when comparing a project's
/// launch price to its current price.
pub const LAUNCH_SAMPLE_SALES: usize = 5;

/// Watermark default for an alert that has never been scanned: look back
/// this many hours from the scan instant. Bounds first-run cost.
pub const FIRST_SCAN_LOOKBACK_HOURS: i64 = 24;

/// Alert scan pass interval (seconds).
pub const SCAN_INTERVAL_SECS: u64 = 300;

/// Trailing window (years) for the monthly market trend.
pub const TREND_WINDOW_YEARS: u32 = 5;

/// Trailing window (years) for the seasonal rental index.
pub const SEASONAL_WINDOW_YEARS: u32 = 3;

/// Trailing window (years) for gross-yield computation.
pub const YIELD_WINDOW_YEARS: u32 = 2;

/// Minimum sale and rental samples an area needs to appear in yield output.
pub const YIELD_MIN_SAMPLES: usize = 30;

/// Minimum prior-period contracts an area needs for a vacancy signal.
pub const VACANCY_MIN_PRIOR_CONTRACTS: usize = 100;

/// Vacancy/demand classification thresholds, in percent change between the
/// recent 6-month window and the prior 6-month window.
pub mod vacancy_thresholds {
    /// Volume drop beyond this (together with the rent drop) ⇒ high risk.
    pub const HIGH_VOLUME_DROP_PCT: f64 = -20.0;
    /// Average-rent drop required alongside the volume drop for high risk.
    pub const HIGH_RENT_DROP_PCT: f64 = -5.0;
    /// Volume drop beyond this alone ⇒ moderate risk.
    pub const MODERATE_VOLUME_DROP_PCT: f64 = -10.0;
    /// Volume rise beyond this ⇒ high demand.
    pub const HIGH_DEMAND_RISE_PCT: f64 = 20.0;
}

#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub db_path: String,
    /// Seconds between alert scan passes (SCAN_INTERVAL_SECS)
    pub scan_interval_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            db_path: std::env::var("DB_PATH").unwrap_or_else(|_| "propsignal.db".to_string()),
            scan_interval_secs: std::env::var("SCAN_INTERVAL_SECS")
                .unwrap_or_else(|_| SCAN_INTERVAL_SECS.to_string())
                .parse::<u64>()
                .map_err(|_| {
                    AppError::Config("SCAN_INTERVAL_SECS must be a number of seconds".to_string())
                })?,
        })
    }
}
