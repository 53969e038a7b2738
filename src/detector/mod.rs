mod flips;

pub use flips::{
    detect_flips, flip_stats_by_area, flip_stats_by_building, AreaFlipStats, BuildingFlipStats,
    FlipAggregate, FlipCandidate, FlipPolicy,
};
