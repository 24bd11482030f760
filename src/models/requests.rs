use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::error::OccupancyError;
use crate::models::commands::{AdmitTarget, DischargeTarget};
use crate::models::domain::{Eligibility, FilterCriteria, GeoPoint, Shelter};
use crate::models::patch::Patch;

/// Shelter fields supplied by an operator when creating or replacing a shelter.
///
/// Open beds are derived from the ledger. A supplied `openBeds` must agree
/// with `totalBeds` minus the active assignments, or the request is rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = "validate_new_shelter_ages"))]
pub struct NewShelter {
    #[validate(length(min = 1))]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
    #[validate(range(min = -90.0, max = 90.0))]
    pub latitude: f64,
    #[validate(range(min = -180.0, max = 180.0))]
    pub longitude: f64,
    #[validate(range(min = 0))]
    pub total_beds: i32,
    #[serde(default)]
    #[validate(range(min = 0))]
    pub open_beds: Option<i32>,
    #[serde(flatten)]
    pub eligibility: Eligibility,
    #[serde(default)]
    #[validate(range(min = 0))]
    pub age_min: Option<i32>,
    #[serde(default)]
    #[validate(range(min = 0))]
    pub age_max: Option<i32>,
}

fn validate_new_shelter_ages(shelter: &NewShelter) -> Result<(), ValidationError> {
    match (shelter.age_min, shelter.age_max) {
        (Some(min), Some(max)) if min > max => Err(ValidationError::new("age_range")),
        _ => Ok(()),
    }
}

/// Partial update of a shelter.
///
/// Every field distinguishes "omitted" from "cleared". `openBeds` is accepted
/// for compatibility with manual corrections and is applied as a change to
/// total beds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ShelterPatch {
    #[serde(skip_serializing_if = "Patch::is_missing")]
    pub title: Patch<String>,
    #[serde(skip_serializing_if = "Patch::is_missing")]
    pub description: Patch<String>,
    #[serde(skip_serializing_if = "Patch::is_missing")]
    pub address: Patch<String>,
    #[serde(skip_serializing_if = "Patch::is_missing")]
    pub phone: Patch<String>,
    #[serde(skip_serializing_if = "Patch::is_missing")]
    pub website: Patch<String>,
    #[serde(skip_serializing_if = "Patch::is_missing")]
    pub latitude: Patch<f64>,
    #[serde(skip_serializing_if = "Patch::is_missing")]
    pub longitude: Patch<f64>,
    #[serde(skip_serializing_if = "Patch::is_missing")]
    pub total_beds: Patch<i32>,
    #[serde(skip_serializing_if = "Patch::is_missing")]
    pub open_beds: Patch<i32>,
    #[serde(skip_serializing_if = "Patch::is_missing")]
    pub families: Patch<bool>,
    #[serde(skip_serializing_if = "Patch::is_missing")]
    pub single_women: Patch<bool>,
    #[serde(skip_serializing_if = "Patch::is_missing")]
    pub single_men: Patch<bool>,
    #[serde(skip_serializing_if = "Patch::is_missing")]
    pub domestic_violence: Patch<bool>,
    #[serde(skip_serializing_if = "Patch::is_missing")]
    pub pet_friendly: Patch<bool>,
    #[serde(skip_serializing_if = "Patch::is_missing")]
    pub wheelchair_accessible: Patch<bool>,
    #[serde(skip_serializing_if = "Patch::is_missing")]
    pub age_min: Patch<i32>,
    #[serde(skip_serializing_if = "Patch::is_missing")]
    pub age_max: Patch<i32>,
}

/// Identity and contact details used to find or create a person
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NewPerson {
    #[validate(length(min = 1))]
    #[serde(alias = "full_name")]
    pub full_name: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    #[validate(email)]
    pub email: Option<String>,
    #[serde(default, alias = "date_of_birth")]
    pub date_of_birth: Option<NaiveDate>,
}

impl NewPerson {
    pub fn named(full_name: impl Into<String>) -> Self {
        Self {
            full_name: full_name.into(),
            ..Self::default()
        }
    }

    /// Trim every text field, turning blank contact fields into `None`
    pub fn normalized(mut self) -> Self {
        self.full_name = self.full_name.trim().to_string();
        self.phone = non_blank(self.phone);
        self.email = non_blank(self.email);
        self
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Request to search the shelter directory
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    #[serde(default)]
    pub criteria: FilterCriteria,
    #[serde(default)]
    pub location: Option<GeoPoint>,
    /// Caller-supplied snapshot; the stored directory is used when absent
    #[serde(default)]
    pub shelters: Option<Vec<Shelter>>,
}

/// Request to admit a person to a shelter
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmitRequest {
    #[serde(default, alias = "person_id")]
    pub person_id: Option<Uuid>,
    #[serde(default, alias = "person_name")]
    pub person_name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default, alias = "date_of_birth")]
    pub date_of_birth: Option<NaiveDate>,
    #[serde(default, alias = "bed_number")]
    pub bed_number: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl AdmitRequest {
    /// An explicit person id wins over a name
    pub fn target(&self) -> Result<AdmitTarget, OccupancyError> {
        if let Some(id) = self.person_id {
            return Ok(AdmitTarget::PersonId(id));
        }

        let name = self.person_name.as_deref().map(str::trim).unwrap_or_default();
        if name.is_empty() {
            return Err(OccupancyError::Validation(
                "personId or personName is required".to_string(),
            ));
        }

        Ok(AdmitTarget::Person(NewPerson {
            full_name: name.to_string(),
            phone: self.phone.clone(),
            email: self.email.clone(),
            date_of_birth: self.date_of_birth,
        }))
    }
}

/// Request to discharge a person from a shelter
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DischargeRequest {
    #[serde(default, alias = "assignment_id")]
    pub assignment_id: Option<Uuid>,
    #[serde(default, alias = "person_id")]
    pub person_id: Option<Uuid>,
    #[serde(default, alias = "person_name")]
    pub person_name: Option<String>,
}

impl DischargeRequest {
    pub fn target(&self) -> Result<DischargeTarget, OccupancyError> {
        if let Some(id) = self.assignment_id {
            return Ok(DischargeTarget::AssignmentId(id));
        }
        if let Some(id) = self.person_id {
            return Ok(DischargeTarget::PersonId(id));
        }
        match self.person_name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => Ok(DischargeTarget::PersonName(name.to_string())),
            _ => Err(OccupancyError::Validation(
                "assignmentId, personId or personName is required".to_string(),
            )),
        }
    }
}

/// Query string for person lookups
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PersonQuery {
    #[serde(default)]
    pub q: Option<String>,
    #[serde(default)]
    pub limit: Option<usize>,
}
