use serde::{Deserialize, Serialize};

use crate::core::ranking::RankingSummary;
use crate::models::domain::{BedAssignment, Person, RankedShelter};

/// Response for the search endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    pub results: Vec<RankedShelter>,
    pub summary: RankingSummary,
    /// Unit of every `distance` in `results`, absent without a location
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance_unit: Option<String>,
}

/// Active occupants of a shelter
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OccupantsResponse {
    pub shelter_id: uuid::Uuid,
    pub occupants: Vec<Person>,
    pub count: usize,
}

/// Active ledger rows of a shelter
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentsResponse {
    pub shelter_id: uuid::Uuid,
    pub assignments: Vec<BedAssignment>,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub storage: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Error response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub status_code: u16,
}
