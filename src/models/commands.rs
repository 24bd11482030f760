use uuid::Uuid;

use super::requests::NewPerson;

/// Who to admit: an existing person, or someone identified by name and
/// optional contact details (found or created on the fly).
#[derive(Debug, Clone, PartialEq)]
pub enum AdmitTarget {
    PersonId(Uuid),
    Person(NewPerson),
}

/// A fully resolved admission, as handed to the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdmitCommand {
    pub person_id: Uuid,
    pub bed_number: Option<String>,
    pub notes: Option<String>,
}

/// Which active assignment to release at a shelter.
///
/// Resolution order when a request carries several identifiers is
/// assignment id, then person id, then person name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DischargeTarget {
    AssignmentId(Uuid),
    PersonId(Uuid),
    PersonName(String),
}
