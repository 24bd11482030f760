use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Service eligibility flags carried by a shelter.
///
/// The same shape is reused by [`FilterCriteria`], where a `true` flag means
/// "the shelter must offer this" and `false` means "no requirement".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Eligibility {
    pub families: bool,
    #[serde(rename = "singleWomen", alias = "single_women")]
    pub single_women: bool,
    #[serde(rename = "singleMen", alias = "single_men")]
    pub single_men: bool,
    #[serde(rename = "domesticViolence", alias = "domestic_violence")]
    pub domestic_violence: bool,
    #[serde(rename = "petFriendly", alias = "pet_friendly")]
    pub pet_friendly: bool,
    #[serde(rename = "wheelchairAccessible", alias = "wheelchair_accessible")]
    pub wheelchair_accessible: bool,
}

impl Eligibility {
    /// Pairs of (requested, offered) for every flag, in declaration order
    pub fn pairs(&self, offered: &Eligibility) -> [(bool, bool); 6] {
        [
            (self.families, offered.families),
            (self.single_women, offered.single_women),
            (self.single_men, offered.single_men),
            (self.domestic_violence, offered.domestic_violence),
            (self.pet_friendly, offered.pet_friendly),
            (self.wheelchair_accessible, offered.wheelchair_accessible),
        ]
    }
}

/// A facility with bounded bed capacity and eligibility attributes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Shelter {
    pub id: Uuid,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub total_beds: i32,
    pub open_beds: i32,
    #[serde(flatten)]
    pub eligibility: Eligibility,
    #[serde(default)]
    pub age_min: Option<i32>,
    #[serde(default)]
    pub age_max: Option<i32>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Shelter {
    pub fn location(&self) -> GeoPoint {
        GeoPoint {
            lat: self.latitude,
            lng: self.longitude,
        }
    }

    pub fn has_open_beds(&self) -> bool {
        self.open_beds > 0
    }
}

/// A person who may be admitted to a shelter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Person {
    pub id: Uuid,
    pub full_name: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub date_of_birth: Option<NaiveDate>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Lifecycle of a bed assignment. `Released` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssignmentStatus {
    Active,
    Released,
}

/// One row of the occupancy ledger. Never deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BedAssignment {
    pub id: Uuid,
    pub shelter_id: Uuid,
    pub person_id: Uuid,
    #[serde(default)]
    pub bed_number: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    pub status: AssignmentStatus,
    pub assigned_at: DateTime<Utc>,
    #[serde(default)]
    pub released_at: Option<DateTime<Utc>>,
}

impl BedAssignment {
    pub fn is_active(&self) -> bool {
        self.status == AssignmentStatus::Active
    }
}

/// Searcher location in decimal degrees (WGS84)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

/// Ephemeral search filter. Absent values impose no constraint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FilterCriteria {
    #[serde(alias = "search_text")]
    pub search_text: Option<String>,
    #[serde(flatten)]
    pub required: Eligibility,
    #[serde(alias = "age_min")]
    pub age_min: Option<i32>,
    #[serde(alias = "age_max")]
    pub age_max: Option<i32>,
    #[serde(alias = "beds_available_only")]
    pub beds_available_only: bool,
}

/// A shelter annotated with its match status and optional distance
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedShelter {
    pub shelter: Shelter,
    pub is_match: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance: Option<f64>,
}
