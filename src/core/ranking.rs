use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::core::{distance::DistanceUnit, filters::matches_criteria};
use crate::models::{FilterCriteria, GeoPoint, RankedShelter, Shelter};

/// Totals over a ranked directory
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankingSummary {
    pub total_shelters: usize,
    pub matching_shelters: usize,
    /// Open beds summed over matching shelters only
    pub open_beds_in_matches: i64,
}

/// Result of the ranking process
#[derive(Debug, Clone)]
pub struct RankingResult {
    pub results: Vec<RankedShelter>,
    pub summary: RankingSummary,
}

/// Orders a shelter directory for a searcher
///
/// # Pipeline Stages
/// 1. Match evaluation (every shelter is kept and annotated)
/// 2. Distance annotation, when the searcher's location is known
/// 3. Stable ordering: matches first, then nearest first
#[derive(Debug, Clone, Copy, Default)]
pub struct RankingPipeline {
    unit: DistanceUnit,
}

impl RankingPipeline {
    pub fn new(unit: DistanceUnit) -> Self {
        Self { unit }
    }

    pub fn unit(&self) -> DistanceUnit {
        self.unit
    }

    /// Rank shelters for a searcher
    ///
    /// No shelter is ever dropped. Without a location, shelters with the same
    /// match status keep their input order.
    ///
    /// # Arguments
    /// * `shelters` - Snapshot of the directory, in caller order
    /// * `criteria` - The searcher's filter criteria
    /// * `location` - Optional searcher location
    pub fn rank(
        &self,
        shelters: Vec<Shelter>,
        criteria: &FilterCriteria,
        location: Option<GeoPoint>,
    ) -> RankingResult {
        let mut summary = RankingSummary {
            total_shelters: shelters.len(),
            ..RankingSummary::default()
        };

        let mut ranked: Vec<RankedShelter> = shelters
            .into_iter()
            .map(|shelter| {
                let is_match = matches_criteria(&shelter, criteria);
                if is_match {
                    summary.matching_shelters += 1;
                    summary.open_beds_in_matches += i64::from(shelter.open_beds.max(0));
                }

                let distance = location.map(|from| self.unit.distance_between(from, shelter.location()));

                RankedShelter {
                    shelter,
                    is_match,
                    distance,
                }
            })
            .collect();

        // `sort_by` is stable, which keeps input order for ties
        ranked.sort_by(|a, b| {
            b.is_match
                .cmp(&a.is_match)
                .then_with(|| compare_distance(a.distance, b.distance))
        });

        RankingResult {
            results: ranked,
            summary,
        }
    }
}

/// Ascending distance with non-finite values last
fn compare_distance(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => match (x.is_nan(), y.is_nan()) {
            (false, false) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            (true, true) => Ordering::Equal,
        },
        _ => Ordering::Equal,
    }
}
