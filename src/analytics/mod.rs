//! Read-only, windowed analytics over a record set. Every entry point
//! takes an explicit `now` where a trailing window applies — windows are
//! rolling from the invocation instant, never read from the wall clock.

pub mod aggregate;
pub mod seasonal;
pub mod signals;
pub mod stats;
pub mod trends;

pub use aggregate::{aggregate_by, pct_change, percentile, round2, Bucket, MonthKey, QuarterKey};
pub use seasonal::{seasonal_index, MonthIndex, SeasonalProfile};
pub use signals::{
    gross_yields, launch_price_changes, vacancy_signals, LaunchPriceChange, MarketSignal,
    VacancySignal, YieldRow,
};
pub use stats::{rental_stats, stats_by_area, AreaStats, RentalStats};
pub use trends::{monthly_trend, yearly_trend, MonthlyTrendPoint, YearlyTrendPoint};
