// Core algorithm exports
pub mod distance;
pub mod filters;
pub mod occupancy;
pub mod ranking;

pub use distance::{haversine_distance, haversine_distance_miles, DistanceUnit};
pub use filters::{matches_age_range, matches_criteria, matches_eligibility, matches_search_text};
pub use ranking::{RankingPipeline, RankingResult, RankingSummary};
