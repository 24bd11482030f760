//! Shelter Match - shelter search and bed-occupancy service
//!
//! Ranks a shelter directory against a searcher's needs and location, and
//! admits or discharges people while keeping every shelter's open-bed count
//! equal to its capacity minus its active bed assignments.

pub mod config;
pub mod core;
pub mod error;
pub mod models;
pub mod routes;
pub mod services;

// Re-export commonly used types
pub use core::{haversine_distance, DistanceUnit, RankingPipeline};
pub use error::OccupancyError;
pub use models::{BedAssignment, FilterCriteria, GeoPoint, Person, RankedShelter, Shelter};
pub use services::{AssignmentService, InMemoryOccupancyStore, OccupancyStore, ShelterDirectory};
