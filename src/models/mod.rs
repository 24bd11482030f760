// Model exports
pub mod commands;
pub mod domain;
pub mod patch;
pub mod requests;
pub mod responses;

pub use commands::{AdmitCommand, AdmitTarget, DischargeTarget};
pub use domain::{AssignmentStatus, BedAssignment, Eligibility, FilterCriteria, GeoPoint, Person, RankedShelter, Shelter};
pub use patch::Patch;
pub use requests::{AdmitRequest, DischargeRequest, NewPerson, NewShelter, PersonQuery, SearchRequest, ShelterPatch};
pub use responses::{AssignmentsResponse, ErrorResponse, HealthResponse, OccupantsResponse, SearchResponse};
