use std::sync::Arc;

use uuid::Uuid;
use validator::Validate;

use crate::error::OccupancyError;
use crate::models::{AdmitCommand, AdmitTarget, BedAssignment, DischargeTarget, NewPerson, Person};
use crate::services::cache::DirectoryCache;
use crate::services::store::OccupancyStore;

/// Default page size for person lookups
pub const DEFAULT_PERSON_LIMIT: usize = 25;
const MAX_PERSON_LIMIT: usize = 200;

/// Admits and discharges people, one atomic store operation each.
///
/// Per (shelter, person) the lifecycle is Unassigned -> Active -> Released.
/// Released is terminal; re-admission creates a new assignment.
#[derive(Clone)]
pub struct AssignmentService {
    store: Arc<dyn OccupancyStore>,
    cache: Option<Arc<DirectoryCache>>,
}

impl AssignmentService {
    pub fn new(store: Arc<dyn OccupancyStore>, cache: Option<Arc<DirectoryCache>>) -> Self {
        Self { store, cache }
    }

    /// Admit a person, creating them first when only a name is known
    pub async fn admit(
        &self,
        shelter_id: Uuid,
        target: AdmitTarget,
        bed_number: Option<String>,
        notes: Option<String>,
    ) -> Result<BedAssignment, OccupancyError> {
        let person_id = match target {
            AdmitTarget::PersonId(id) => id,
            AdmitTarget::Person(person) => self.find_or_create_person(person).await?.id,
        };

        let command = AdmitCommand {
            person_id,
            bed_number: trimmed(bed_number),
            notes: trimmed(notes),
        };

        match self.store.admit(shelter_id, command).await {
            Ok(assignment) => {
                self.invalidate(shelter_id).await;
                tracing::info!(
                    "Admitted person {} to shelter {} (assignment {})",
                    person_id,
                    shelter_id,
                    assignment.id
                );
                Ok(assignment)
            }
            Err(e) => {
                tracing::warn!("Admission of person {} to shelter {} rejected: {}", person_id, shelter_id, e);
                Err(e)
            }
        }
    }

    /// Release the targeted active assignment at a shelter
    pub async fn discharge(&self, shelter_id: Uuid, target: DischargeTarget) -> Result<BedAssignment, OccupancyError> {
        if let DischargeTarget::PersonName(name) = &target {
            if name.trim().is_empty() {
                return Err(OccupancyError::Validation("personName is required".to_string()));
            }
        }

        let target = match target {
            DischargeTarget::PersonName(name) => DischargeTarget::PersonName(name.trim().to_string()),
            other => other,
        };

        match self.store.discharge(shelter_id, target).await {
            Ok(released) => {
                self.invalidate(shelter_id).await;
                tracing::info!(
                    "Discharged person {} from shelter {} (assignment {})",
                    released.person_id,
                    shelter_id,
                    released.id
                );
                Ok(released)
            }
            Err(e) => {
                tracing::warn!("Discharge at shelter {} rejected: {}", shelter_id, e);
                Err(e)
            }
        }
    }

    /// Persons holding a bed at a shelter, most recent admission first
    pub async fn list_occupants(&self, shelter_id: Uuid) -> Result<Vec<Person>, OccupancyError> {
        self.store.list_active_occupants(shelter_id).await
    }

    pub async fn list_assignments(&self, shelter_id: Uuid) -> Result<Vec<BedAssignment>, OccupancyError> {
        self.store.list_active_assignments(shelter_id).await
    }

    pub async fn find_or_create_person(&self, person: NewPerson) -> Result<Person, OccupancyError> {
        let person = person.normalized();
        person.validate()?;

        let found = self.store.find_or_create_person(person).await?;
        tracing::debug!("Resolved person {} ({})", found.id, found.full_name);
        Ok(found)
    }

    pub async fn get_person(&self, id: Uuid) -> Result<Person, OccupancyError> {
        self.store
            .get_person(id)
            .await?
            .ok_or_else(|| OccupancyError::person_not_found(id))
    }

    /// Case-insensitive name search, capped at a maximum page size
    pub async fn search_persons(&self, query: &str, limit: Option<usize>) -> Result<Vec<Person>, OccupancyError> {
        let limit = limit.unwrap_or(DEFAULT_PERSON_LIMIT).clamp(1, MAX_PERSON_LIMIT);
        self.store.search_persons(query, limit).await
    }

    async fn invalidate(&self, shelter_id: Uuid) {
        if let Some(cache) = &self.cache {
            if let Err(e) = cache.invalidate_shelter(shelter_id).await {
                tracing::warn!("Failed to invalidate cache for shelter {}: {}", shelter_id, e);
            }
        }
    }
}

fn trimmed(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
