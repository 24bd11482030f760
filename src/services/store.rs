use async_trait::async_trait;
use uuid::Uuid;

use crate::error::OccupancyError;
use crate::models::{AdmitCommand, BedAssignment, DischargeTarget, NewPerson, NewShelter, Person, Shelter, ShelterPatch};

/// Durable owner of shelters, persons and the bed-assignment ledger.
///
/// Every mutating method is one atomic unit: either all of its writes persist
/// or none do. Implementations must keep, after every call,
/// `open_beds == total_beds - active assignments` for each shelter and at most
/// one active assignment per person.
#[async_trait]
pub trait OccupancyStore: Send + Sync {
    /// Short backend name for health output
    fn backend(&self) -> &'static str;

    async fn health_check(&self) -> Result<bool, OccupancyError>;

    async fn create_shelter(&self, fields: NewShelter) -> Result<Shelter, OccupancyError> {
        self.upsert_shelter(Uuid::new_v4(), fields).await
    }

    /// Create the shelter with this id, or replace all of its operator fields
    async fn upsert_shelter(&self, id: Uuid, fields: NewShelter) -> Result<Shelter, OccupancyError>;

    async fn update_shelter(&self, id: Uuid, patch: ShelterPatch) -> Result<Shelter, OccupancyError>;

    /// Recompute open beds from the active assignments
    async fn reconcile_shelter(&self, id: Uuid) -> Result<Shelter, OccupancyError>;

    async fn get_shelter(&self, id: Uuid) -> Result<Option<Shelter>, OccupancyError>;

    /// All shelters, ordered by title then id
    async fn list_shelters(&self) -> Result<Vec<Shelter>, OccupancyError>;

    /// Return the matching person or create one. Never creates a duplicate
    /// for the same name and contact pair.
    async fn find_or_create_person(&self, person: NewPerson) -> Result<Person, OccupancyError>;

    async fn get_person(&self, id: Uuid) -> Result<Option<Person>, OccupancyError>;

    /// Case-insensitive substring match on full name, ordered by name
    async fn search_persons(&self, query: &str, limit: usize) -> Result<Vec<Person>, OccupancyError>;

    async fn find_active_assignment(&self, person_id: Uuid) -> Result<Option<BedAssignment>, OccupancyError>;

    /// Active ledger rows at a shelter, most recent admission first
    async fn list_active_assignments(&self, shelter_id: Uuid) -> Result<Vec<BedAssignment>, OccupancyError>;

    /// Persons currently holding a bed at a shelter, most recent admission first
    async fn list_active_occupants(&self, shelter_id: Uuid) -> Result<Vec<Person>, OccupancyError>;

    /// Insert an active assignment and take one bed, atomically
    async fn admit(&self, shelter_id: Uuid, command: AdmitCommand) -> Result<BedAssignment, OccupancyError>;

    /// Release the targeted active assignment and return its bed, atomically
    async fn discharge(&self, shelter_id: Uuid, target: DischargeTarget) -> Result<BedAssignment, OccupancyError>;
}
