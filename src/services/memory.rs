use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::core::occupancy;
use crate::error::OccupancyError;
use crate::models::{AdmitCommand, BedAssignment, DischargeTarget, NewPerson, NewShelter, Person, Shelter, ShelterPatch};
use crate::services::store::OccupancyStore;

#[derive(Debug, Default)]
struct MemoryState {
    shelters: HashMap<Uuid, Shelter>,
    persons: HashMap<Uuid, Person>,
    /// Append-only ledger
    assignments: Vec<BedAssignment>,
}

impl MemoryState {
    fn shelter(&self, id: Uuid) -> Result<&Shelter, OccupancyError> {
        self.shelters
            .get(&id)
            .ok_or_else(|| OccupancyError::shelter_not_found(id))
    }

    fn active_count(&self, shelter_id: Uuid) -> i64 {
        self.assignments
            .iter()
            .filter(|a| a.shelter_id == shelter_id && a.is_active())
            .count() as i64
    }

    fn active_for_person(&self, person_id: Uuid) -> Option<&BedAssignment> {
        self.assignments
            .iter()
            .find(|a| a.person_id == person_id && a.is_active())
    }

    /// Newest first
    fn active_at(&self, shelter_id: Uuid) -> impl Iterator<Item = &BedAssignment> {
        self.assignments
            .iter()
            .rev()
            .filter(move |a| a.shelter_id == shelter_id && a.is_active())
    }

    fn locate_active(&self, shelter_id: Uuid, target: &DischargeTarget) -> Option<usize> {
        let at_shelter = |a: &BedAssignment| a.shelter_id == shelter_id && a.is_active();

        match target {
            DischargeTarget::AssignmentId(id) => self
                .assignments
                .iter()
                .position(|a| a.id == *id && at_shelter(a)),
            DischargeTarget::PersonId(person_id) => self
                .assignments
                .iter()
                .position(|a| a.person_id == *person_id && at_shelter(a)),
            DischargeTarget::PersonName(name) => self.assignments.iter().position(|a| {
                at_shelter(a)
                    && self
                        .persons
                        .get(&a.person_id)
                        .is_some_and(|p| p.full_name == *name)
            }),
        }
    }
}

/// Occupancy store held in process memory.
///
/// A single lock guards all tables, so each mutation's checks and writes are
/// one atomic step. State is lost on restart.
#[derive(Debug, Default)]
pub struct InMemoryOccupancyStore {
    state: RwLock<MemoryState>,
}

impl InMemoryOccupancyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed shelters as-is, bypassing validation. Used to load fixtures and
    /// to reproduce drifted counters.
    pub async fn with_shelters(shelters: Vec<Shelter>) -> Self {
        let store = Self::new();
        {
            let mut state = store.state.write().await;
            for shelter in shelters {
                state.shelters.insert(shelter.id, shelter);
            }
        }
        store
    }
}

#[async_trait]
impl OccupancyStore for InMemoryOccupancyStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn health_check(&self) -> Result<bool, OccupancyError> {
        Ok(true)
    }

    async fn upsert_shelter(&self, id: Uuid, fields: NewShelter) -> Result<Shelter, OccupancyError> {
        let mut state = self.state.write().await;
        let active = state.active_count(id);
        let shelter = occupancy::build_shelter(id, &fields, active, state.shelters.get(&id), Utc::now())?;

        state.shelters.insert(id, shelter.clone());
        tracing::debug!("Upserted shelter {} ({} beds)", id, shelter.total_beds);
        Ok(shelter)
    }

    async fn update_shelter(&self, id: Uuid, patch: ShelterPatch) -> Result<Shelter, OccupancyError> {
        let mut state = self.state.write().await;
        let active = state.active_count(id);
        let updated = occupancy::apply_patch(state.shelter(id)?, &patch, active, Utc::now())?;

        state.shelters.insert(id, updated.clone());
        Ok(updated)
    }

    async fn reconcile_shelter(&self, id: Uuid) -> Result<Shelter, OccupancyError> {
        let mut state = self.state.write().await;
        let active = state.active_count(id);
        let reconciled = occupancy::reconcile(state.shelter(id)?, active);

        state.shelters.insert(id, reconciled.clone());
        Ok(reconciled)
    }

    async fn get_shelter(&self, id: Uuid) -> Result<Option<Shelter>, OccupancyError> {
        Ok(self.state.read().await.shelters.get(&id).cloned())
    }

    async fn list_shelters(&self) -> Result<Vec<Shelter>, OccupancyError> {
        let state = self.state.read().await;
        let mut shelters: Vec<Shelter> = state.shelters.values().cloned().collect();
        shelters.sort_by(|a, b| a.title.cmp(&b.title).then_with(|| a.id.cmp(&b.id)));
        Ok(shelters)
    }

    async fn find_or_create_person(&self, person: NewPerson) -> Result<Person, OccupancyError> {
        let person = person.normalized();
        if person.full_name.is_empty() {
            return Err(OccupancyError::Validation("fullName is required".to_string()));
        }

        let mut state = self.state.write().await;

        let existing = state
            .persons
            .values()
            .filter(|p| occupancy::person_matches(p, &person))
            .min_by_key(|p| (p.created_at, p.id));
        if let Some(found) = existing {
            return Ok(found.clone());
        }

        let created = Person {
            id: Uuid::new_v4(),
            full_name: person.full_name,
            phone: person.phone,
            email: person.email,
            date_of_birth: person.date_of_birth,
            created_at: Some(Utc::now()),
        };
        state.persons.insert(created.id, created.clone());
        Ok(created)
    }

    async fn get_person(&self, id: Uuid) -> Result<Option<Person>, OccupancyError> {
        Ok(self.state.read().await.persons.get(&id).cloned())
    }

    async fn search_persons(&self, query: &str, limit: usize) -> Result<Vec<Person>, OccupancyError> {
        let needle = query.trim().to_lowercase();
        let state = self.state.read().await;

        let mut persons: Vec<Person> = state
            .persons
            .values()
            .filter(|p| needle.is_empty() || p.full_name.to_lowercase().contains(&needle))
            .cloned()
            .collect();
        persons.sort_by(|a, b| a.full_name.cmp(&b.full_name).then_with(|| a.id.cmp(&b.id)));
        persons.truncate(limit);
        Ok(persons)
    }

    async fn find_active_assignment(&self, person_id: Uuid) -> Result<Option<BedAssignment>, OccupancyError> {
        Ok(self.state.read().await.active_for_person(person_id).cloned())
    }

    async fn list_active_assignments(&self, shelter_id: Uuid) -> Result<Vec<BedAssignment>, OccupancyError> {
        let state = self.state.read().await;
        state.shelter(shelter_id)?;
        Ok(state.active_at(shelter_id).cloned().collect())
    }

    async fn list_active_occupants(&self, shelter_id: Uuid) -> Result<Vec<Person>, OccupancyError> {
        let state = self.state.read().await;
        state.shelter(shelter_id)?;
        Ok(state
            .active_at(shelter_id)
            .filter_map(|a| state.persons.get(&a.person_id).cloned())
            .collect())
    }

    async fn admit(&self, shelter_id: Uuid, command: AdmitCommand) -> Result<BedAssignment, OccupancyError> {
        let mut state = self.state.write().await;

        let shelter = state.shelter(shelter_id)?;
        if !state.persons.contains_key(&command.person_id) {
            return Err(OccupancyError::person_not_found(command.person_id));
        }

        let active = state.active_count(shelter_id);
        occupancy::check_admission(shelter, active, state.active_for_person(command.person_id))?;

        let open_beds = occupancy::open_beds_for(shelter.total_beds, active + 1);
        let assignment = occupancy::new_assignment(shelter_id, &command, Utc::now());

        state.assignments.push(assignment.clone());
        if let Some(shelter) = state.shelters.get_mut(&shelter_id) {
            shelter.open_beds = open_beds;
            shelter.updated_at = Some(assignment.assigned_at);
        }

        Ok(assignment)
    }

    async fn discharge(&self, shelter_id: Uuid, target: DischargeTarget) -> Result<BedAssignment, OccupancyError> {
        let mut state = self.state.write().await;

        let total_beds = state.shelter(shelter_id)?.total_beds;
        let index = state
            .locate_active(shelter_id, &target)
            .ok_or_else(|| OccupancyError::NotFound(format!("active assignment at shelter {}", shelter_id)))?;

        let released = occupancy::release(&state.assignments[index], Utc::now())?;
        let active = state.active_count(shelter_id);

        state.assignments[index] = released.clone();
        if let Some(shelter) = state.shelters.get_mut(&shelter_id) {
            shelter.open_beds = occupancy::open_beds_for(total_beds, active - 1);
            shelter.updated_at = released.released_at;
        }

        Ok(released)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Eligibility;

    fn new_shelter(title: &str, beds: i32) -> NewShelter {
        NewShelter {
            title: title.to_string(),
            description: String::new(),
            address: String::new(),
            phone: None,
            website: None,
            latitude: 45.5,
            longitude: -122.6,
            total_beds: beds,
            open_beds: None,
            eligibility: Eligibility::default(),
            age_min: None,
            age_max: None,
        }
    }

    fn admit_command(person_id: Uuid) -> AdmitCommand {
        AdmitCommand {
            person_id,
            bed_number: Some("B-1".to_string()),
            notes: None,
        }
    }

    #[tokio::test]
    async fn test_admit_takes_a_bed() {
        let store = InMemoryOccupancyStore::new();
        let shelter = store.create_shelter(new_shelter("North", 2)).await.unwrap();
        let person = store.find_or_create_person(NewPerson::named("Ana")).await.unwrap();

        let assignment = store.admit(shelter.id, admit_command(person.id)).await.unwrap();

        assert!(assignment.is_active());
        let shelter = store.get_shelter(shelter.id).await.unwrap().unwrap();
        assert_eq!(shelter.open_beds, 1);
    }

    #[tokio::test]
    async fn test_admit_unknown_person() {
        let store = InMemoryOccupancyStore::new();
        let shelter = store.create_shelter(new_shelter("North", 2)).await.unwrap();

        let err = store.admit(shelter.id, admit_command(Uuid::new_v4())).await.unwrap_err();
        assert!(matches!(err, OccupancyError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_discharge_wrong_shelter_is_not_found() {
        let store = InMemoryOccupancyStore::new();
        let north = store.create_shelter(new_shelter("North", 2)).await.unwrap();
        let south = store.create_shelter(new_shelter("South", 2)).await.unwrap();
        let person = store.find_or_create_person(NewPerson::named("Ana")).await.unwrap();
        let assignment = store.admit(north.id, admit_command(person.id)).await.unwrap();

        let err = store
            .discharge(south.id, DischargeTarget::AssignmentId(assignment.id))
            .await
            .unwrap_err();
        assert!(matches!(err, OccupancyError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_discharge_by_name() {
        let store = InMemoryOccupancyStore::new();
        let shelter = store.create_shelter(new_shelter("North", 1)).await.unwrap();
        let person = store.find_or_create_person(NewPerson::named("Ana")).await.unwrap();
        store.admit(shelter.id, admit_command(person.id)).await.unwrap();

        let released = store
            .discharge(shelter.id, DischargeTarget::PersonName("Ana".to_string()))
            .await
            .unwrap();

        assert!(!released.is_active());
        assert_eq!(store.get_shelter(shelter.id).await.unwrap().unwrap().open_beds, 1);
        assert!(store.find_active_assignment(person.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_search_persons() {
        let store = InMemoryOccupancyStore::new();
        for name in ["Mary Jones", "Jon Smith", "Ana Lopez"] {
            store.find_or_create_person(NewPerson::named(name)).await.unwrap();
        }

        let found = store.search_persons("JON", 25).await.unwrap();
        let names: Vec<&str> = found.iter().map(|p| p.full_name.as_str()).collect();
        assert_eq!(names, vec!["Jon Smith", "Mary Jones"]);

        assert_eq!(store.search_persons("", 2).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_list_shelters_ordered_by_title() {
        let store = InMemoryOccupancyStore::new();
        store.create_shelter(new_shelter("Zephyr", 1)).await.unwrap();
        store.create_shelter(new_shelter("Aurora", 1)).await.unwrap();

        let titles: Vec<String> = store
            .list_shelters()
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.title)
            .collect();
        assert_eq!(titles, vec!["Aurora", "Zephyr"]);
    }
}
