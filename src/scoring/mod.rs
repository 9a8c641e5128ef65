pub mod aggregator;
pub mod weights;

pub use aggregator::{
    compute_leaderboard, TrackerAggregates, UserScoreProfile, UserTrackerFacts,
};
pub use weights::{ScoringWeights, WeightRow};
