//! Occupancy rules shared by every store backend.
//!
//! Stores load the current rows inside their transaction, call into these
//! functions to decide, then write the result in the same transaction.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::OccupancyError;
use crate::models::{
    AdmitCommand, AssignmentStatus, BedAssignment, Eligibility, NewPerson, NewShelter, Patch, Person, Shelter,
    ShelterPatch,
};

/// Open beds implied by the ledger, clamped to `0..=total_beds`
#[inline]
pub fn open_beds_for(total_beds: i32, active_count: i64) -> i32 {
    let total = i64::from(total_beds.max(0));
    (total - active_count).clamp(0, total) as i32
}

/// Decide whether a person may take a bed at a shelter.
///
/// The single-occupancy check runs before the capacity check.
pub fn check_admission(
    shelter: &Shelter,
    active_count: i64,
    existing: Option<&BedAssignment>,
) -> Result<(), OccupancyError> {
    if let Some(active) = existing {
        return Err(OccupancyError::already_assigned(active.person_id, active.shelter_id));
    }

    if open_beds_for(shelter.total_beds, active_count) <= 0 {
        return Err(OccupancyError::Capacity {
            shelter_id: shelter.id,
        });
    }

    Ok(())
}

/// New active ledger row for an admission
pub fn new_assignment(shelter_id: Uuid, command: &AdmitCommand, now: DateTime<Utc>) -> BedAssignment {
    BedAssignment {
        id: Uuid::new_v4(),
        shelter_id,
        person_id: command.person_id,
        bed_number: command.bed_number.clone(),
        notes: command.notes.clone(),
        status: AssignmentStatus::Active,
        assigned_at: now,
        released_at: None,
    }
}

/// Active -> Released. A released row is never reopened.
pub fn release(assignment: &BedAssignment, now: DateTime<Utc>) -> Result<BedAssignment, OccupancyError> {
    if !assignment.is_active() {
        return Err(OccupancyError::NotFound(format!(
            "active assignment {}",
            assignment.id
        )));
    }

    Ok(BedAssignment {
        status: AssignmentStatus::Released,
        released_at: Some(now),
        ..assignment.clone()
    })
}

/// Whether a stored person is the same individual as a find-or-create request.
///
/// Full names must be equal. When the request carries a phone or an email, at
/// least one provided contact field must also be equal.
pub fn person_matches(person: &Person, candidate: &NewPerson) -> bool {
    if person.full_name != candidate.full_name {
        return false;
    }

    if candidate.phone.is_none() && candidate.email.is_none() {
        return true;
    }

    let phone_matches = candidate.phone.is_some() && person.phone == candidate.phone;
    let email_matches = candidate.email.is_some() && person.email == candidate.email;
    phone_matches || email_matches
}

/// Build a shelter from operator fields, deriving open beds from the ledger.
///
/// `existing` carries the current row when replacing a shelter in place.
pub fn build_shelter(
    id: Uuid,
    fields: &NewShelter,
    active_count: i64,
    existing: Option<&Shelter>,
    now: DateTime<Utc>,
) -> Result<Shelter, OccupancyError> {
    let requested_open = fields.open_beds.map_or(Patch::Missing, Patch::Value);
    let total_beds = resolve_total_beds(
        fields.total_beds,
        active_count,
        &Patch::Value(fields.total_beds),
        &requested_open,
    )?;

    let shelter = Shelter {
        id,
        title: fields.title.trim().to_string(),
        description: fields.description.clone(),
        address: fields.address.clone(),
        phone: fields.phone.clone(),
        website: fields.website.clone(),
        latitude: fields.latitude,
        longitude: fields.longitude,
        total_beds,
        open_beds: open_beds_for(total_beds, active_count),
        eligibility: fields.eligibility,
        age_min: fields.age_min,
        age_max: fields.age_max,
        created_at: existing.and_then(|s| s.created_at).or(Some(now)),
        updated_at: Some(now),
    };

    validate_shelter(&shelter)?;
    Ok(shelter)
}

/// Apply a partial update.
///
/// Open beds are never written directly: a requested `openBeds` becomes
/// `totalBeds = openBeds + active_count`.
pub fn apply_patch(
    current: &Shelter,
    patch: &ShelterPatch,
    active_count: i64,
    now: DateTime<Utc>,
) -> Result<Shelter, OccupancyError> {
    let total_beds = resolve_total_beds(current.total_beds, active_count, &patch.total_beds, &patch.open_beds)?;

    let eligibility = Eligibility {
        families: flag(&patch.families, current.eligibility.families),
        single_women: flag(&patch.single_women, current.eligibility.single_women),
        single_men: flag(&patch.single_men, current.eligibility.single_men),
        domestic_violence: flag(&patch.domestic_violence, current.eligibility.domestic_violence),
        pet_friendly: flag(&patch.pet_friendly, current.eligibility.pet_friendly),
        wheelchair_accessible: flag(&patch.wheelchair_accessible, current.eligibility.wheelchair_accessible),
    };

    let shelter = Shelter {
        id: current.id,
        title: required(&patch.title, &current.title, "title")?.trim().to_string(),
        description: patch
            .description
            .apply_to(Some(current.description.clone()))
            .unwrap_or_default(),
        address: patch.address.apply_to(Some(current.address.clone())).unwrap_or_default(),
        phone: patch.phone.apply_to(current.phone.clone()),
        website: patch.website.apply_to(current.website.clone()),
        latitude: required(&patch.latitude, &current.latitude, "latitude")?,
        longitude: required(&patch.longitude, &current.longitude, "longitude")?,
        total_beds,
        open_beds: open_beds_for(total_beds, active_count),
        eligibility,
        age_min: patch.age_min.apply_to(current.age_min),
        age_max: patch.age_max.apply_to(current.age_max),
        created_at: current.created_at,
        updated_at: Some(now),
    };

    validate_shelter(&shelter)?;
    Ok(shelter)
}

/// Recompute the stored counter from the ledger
pub fn reconcile(shelter: &Shelter, active_count: i64) -> Shelter {
    Shelter {
        open_beds: open_beds_for(shelter.total_beds, active_count),
        ..shelter.clone()
    }
}

/// Field-level checks that hold for every stored shelter
pub fn validate_shelter(shelter: &Shelter) -> Result<(), OccupancyError> {
    if shelter.title.trim().is_empty() {
        return Err(OccupancyError::Validation("title is required".to_string()));
    }
    if !shelter.latitude.is_finite() || !(-90.0..=90.0).contains(&shelter.latitude) {
        return Err(OccupancyError::Validation(format!(
            "latitude {} out of range",
            shelter.latitude
        )));
    }
    if !shelter.longitude.is_finite() || !(-180.0..=180.0).contains(&shelter.longitude) {
        return Err(OccupancyError::Validation(format!(
            "longitude {} out of range",
            shelter.longitude
        )));
    }
    if shelter.total_beds < 0 {
        return Err(OccupancyError::Validation("totalBeds must be >= 0".to_string()));
    }
    if shelter.open_beds < 0 || shelter.open_beds > shelter.total_beds {
        return Err(OccupancyError::Validation(format!(
            "openBeds {} outside 0..={}",
            shelter.open_beds, shelter.total_beds
        )));
    }
    if shelter.age_min.is_some_and(|a| a < 0) || shelter.age_max.is_some_and(|a| a < 0) {
        return Err(OccupancyError::Validation("ages must be >= 0".to_string()));
    }
    if let (Some(min), Some(max)) = (shelter.age_min, shelter.age_max) {
        if min > max {
            return Err(OccupancyError::Validation(format!(
                "ageMin {} is greater than ageMax {}",
                min, max
            )));
        }
    }
    Ok(())
}

fn resolve_total_beds(
    current_total: i32,
    active_count: i64,
    total: &Patch<i32>,
    open: &Patch<i32>,
) -> Result<i32, OccupancyError> {
    if matches!(total, Patch::Null) || matches!(open, Patch::Null) {
        return Err(OccupancyError::Validation("bed counts cannot be cleared".to_string()));
    }

    let from_open = match open.value() {
        Some(&open) if open < 0 => {
            return Err(OccupancyError::Validation("openBeds must be >= 0".to_string()));
        }
        Some(&open) => Some(i64::from(open) + active_count),
        None => None,
    };

    let resolved = match (total.value().map(|&t| i64::from(t)), from_open) {
        (Some(total), Some(derived)) if total != derived => {
            return Err(OccupancyError::Validation(format!(
                "totalBeds {} disagrees with openBeds plus {} active assignments",
                total, active_count
            )));
        }
        (Some(total), _) => total,
        (None, Some(derived)) => derived,
        (None, None) => i64::from(current_total),
    };

    let resolved = i32::try_from(resolved)
        .map_err(|_| OccupancyError::Validation("totalBeds out of range".to_string()))?;
    if resolved < 0 {
        return Err(OccupancyError::Validation("totalBeds must be >= 0".to_string()));
    }
    ensure_capacity_covers_ledger(resolved, active_count)?;
    Ok(resolved)
}

fn ensure_capacity_covers_ledger(total_beds: i32, active_count: i64) -> Result<(), OccupancyError> {
    if i64::from(total_beds) < active_count {
        return Err(OccupancyError::Conflict(format!(
            "totalBeds {} is below {} active assignments",
            total_beds, active_count
        )));
    }
    Ok(())
}

fn required<T: Clone>(patch: &Patch<T>, current: &T, field: &str) -> Result<T, OccupancyError> {
    match patch {
        Patch::Missing => Ok(current.clone()),
        Patch::Null => Err(OccupancyError::Validation(format!("{} cannot be cleared", field))),
        Patch::Value(v) => Ok(v.clone()),
    }
}

/// A cleared flag means "not offered"
fn flag(patch: &Patch<bool>, current: bool) -> bool {
    patch.apply_to(Some(current)).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shelter(total: i32, open: i32) -> Shelter {
        Shelter {
            id: Uuid::new_v4(),
            title: "Riverside".to_string(),
            description: String::new(),
            address: "12 River Rd".to_string(),
            phone: Some("555-0100".to_string()),
            website: None,
            latitude: 45.0,
            longitude: -122.0,
            total_beds: total,
            open_beds: open,
            eligibility: Eligibility::default(),
            age_min: None,
            age_max: None,
            created_at: None,
            updated_at: None,
        }
    }

    fn active(person_id: Uuid, shelter_id: Uuid) -> BedAssignment {
        let command = AdmitCommand {
            person_id,
            bed_number: None,
            notes: None,
        };
        new_assignment(shelter_id, &command, Utc::now())
    }

    #[test]
    fn test_open_beds_for_clamps() {
        assert_eq!(open_beds_for(10, 3), 7);
        assert_eq!(open_beds_for(2, 5), 0);
        assert_eq!(open_beds_for(4, -1), 4);
        assert_eq!(open_beds_for(-3, 0), 0);
    }

    #[test]
    fn test_conflict_checked_before_capacity() {
        let full = shelter(1, 0);
        let existing = active(Uuid::new_v4(), Uuid::new_v4());

        let err = check_admission(&full, 1, Some(&existing)).unwrap_err();
        assert!(matches!(err, OccupancyError::Conflict(_)));
    }

    #[test]
    fn test_capacity_uses_ledger_not_stored_counter() {
        // Stored counter drifted to 1, but the ledger says the shelter is full
        let drifted = shelter(2, 1);
        let err = check_admission(&drifted, 2, None).unwrap_err();
        assert!(matches!(err, OccupancyError::Capacity { .. }));

        assert!(check_admission(&drifted, 1, None).is_ok());
    }

    #[test]
    fn test_release_is_terminal() {
        let assignment = active(Uuid::new_v4(), Uuid::new_v4());
        let released = release(&assignment, Utc::now()).unwrap();

        assert_eq!(released.status, AssignmentStatus::Released);
        assert!(released.released_at.is_some());
        assert!(matches!(release(&released, Utc::now()), Err(OccupancyError::NotFound(_))));
    }

    #[test]
    fn test_person_matches_contact_rule() {
        let person = Person {
            id: Uuid::new_v4(),
            full_name: "Jane Doe".to_string(),
            phone: Some("555-0100".to_string()),
            email: Some("jane@example.org".to_string()),
            date_of_birth: None,
            created_at: None,
        };

        assert!(person_matches(&person, &NewPerson::named("Jane Doe")));
        assert!(!person_matches(&person, &NewPerson::named("Jane Roe")));

        let same_email = NewPerson {
            email: Some("jane@example.org".to_string()),
            ..NewPerson::named("Jane Doe")
        };
        assert!(person_matches(&person, &same_email));

        let other_contact = NewPerson {
            phone: Some("555-0199".to_string()),
            email: Some("other@example.org".to_string()),
            ..NewPerson::named("Jane Doe")
        };
        assert!(!person_matches(&person, &other_contact));
    }

    #[test]
    fn test_patch_open_beds_sets_total() {
        let current = shelter(10, 7);
        let patch = ShelterPatch {
            open_beds: Patch::Value(5),
            ..ShelterPatch::default()
        };

        let updated = apply_patch(&current, &patch, 3, Utc::now()).unwrap();
        assert_eq!(updated.total_beds, 8);
        assert_eq!(updated.open_beds, 5);
    }

    #[test]
    fn test_patch_total_below_ledger_conflicts() {
        let current = shelter(10, 7);
        let patch = ShelterPatch {
            total_beds: Patch::Value(2),
            ..ShelterPatch::default()
        };

        let err = apply_patch(&current, &patch, 3, Utc::now()).unwrap_err();
        assert!(matches!(err, OccupancyError::Conflict(_)));
    }

    #[test]
    fn test_patch_disagreeing_counts_rejected() {
        let current = shelter(10, 10);
        let patch = ShelterPatch {
            total_beds: Patch::Value(10),
            open_beds: Patch::Value(4),
            ..ShelterPatch::default()
        };
        assert!(matches!(
            apply_patch(&current, &patch, 0, Utc::now()),
            Err(OccupancyError::Validation(_))
        ));
    }

    fn fields(total: i32, open: Option<i32>) -> NewShelter {
        NewShelter {
            title: " Riverside ".to_string(),
            description: String::new(),
            address: String::new(),
            phone: None,
            website: None,
            latitude: 45.0,
            longitude: -122.0,
            total_beds: total,
            open_beds: open,
            eligibility: Eligibility::default(),
            age_min: None,
            age_max: None,
        }
    }

    #[test]
    fn test_replace_checks_supplied_open_beds() {
        let id = Uuid::new_v4();

        let built = build_shelter(id, &fields(10, None), 3, None, Utc::now()).unwrap();
        assert_eq!(built.title, "Riverside");
        assert_eq!(built.open_beds, 7);

        let built = build_shelter(id, &fields(10, Some(7)), 3, None, Utc::now()).unwrap();
        assert_eq!((built.total_beds, built.open_beds), (10, 7));

        let err = build_shelter(id, &fields(10, Some(10)), 3, None, Utc::now()).unwrap_err();
        assert!(matches!(err, OccupancyError::Validation(_)), "{:?}", err);

        let err = build_shelter(id, &fields(2, None), 3, None, Utc::now()).unwrap_err();
        assert!(matches!(err, OccupancyError::Conflict(_)), "{:?}", err);
    }

    #[test]
    fn test_patch_omitted_vs_cleared() {
        let current = shelter(10, 10);
        let patch = ShelterPatch {
            phone: Patch::Null,
            address: Patch::Missing,
            ..ShelterPatch::default()
        };

        let updated = apply_patch(&current, &patch, 0, Utc::now()).unwrap();
        assert_eq!(updated.phone, None);
        assert_eq!(updated.address, "12 River Rd");

        let clear_title = ShelterPatch {
            title: Patch::Null,
            ..ShelterPatch::default()
        };
        assert!(matches!(
            apply_patch(&current, &clear_title, 0, Utc::now()),
            Err(OccupancyError::Validation(_))
        ));
    }

    #[test]
    fn test_patch_rejects_inverted_age_range() {
        let current = shelter(10, 10);
        let patch = ShelterPatch {
            age_min: Patch::Value(30),
            age_max: Patch::Value(20),
            ..ShelterPatch::default()
        };
        assert!(apply_patch(&current, &patch, 0, Utc::now()).is_err());
    }

    #[test]
    fn test_reconcile_repairs_counter() {
        let drifted = shelter(10, 9);
        assert_eq!(reconcile(&drifted, 4).open_beds, 6);
    }
}
