use thiserror::Error;
use uuid::Uuid;

/// Errors raised by occupancy operations.
///
/// Everything except `Storage` is a decision conflict and must not be retried
/// automatically. A `Storage` error means the transaction was rolled back.
#[derive(Debug, Error)]
pub enum OccupancyError {
    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("No beds available at shelter {shelter_id}")]
    Capacity { shelter_id: Uuid },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl OccupancyError {
    pub fn already_assigned(person_id: Uuid, shelter_id: Uuid) -> Self {
        OccupancyError::Conflict(format!(
            "person {} already assigned at shelter {}",
            person_id, shelter_id
        ))
    }

    pub fn shelter_not_found(shelter_id: Uuid) -> Self {
        OccupancyError::NotFound(format!("shelter {}", shelter_id))
    }

    pub fn person_not_found(person_id: Uuid) -> Self {
        OccupancyError::NotFound(format!("person {}", person_id))
    }

    /// Stable machine-readable code for API responses
    pub fn code(&self) -> &'static str {
        match self {
            OccupancyError::Validation(_) => "validation_failed",
            OccupancyError::Conflict(_) => "already_assigned",
            OccupancyError::Capacity { .. } => "no_beds_available",
            OccupancyError::NotFound(_) => "not_found",
            OccupancyError::Storage(_) => "storage_error",
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, OccupancyError::Storage(_))
    }
}

impl From<sqlx::Error> for OccupancyError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.constraint() == Some(ACTIVE_ASSIGNMENT_INDEX) {
                return OccupancyError::Conflict("person already has an active assignment".to_string());
            }
        }
        OccupancyError::Storage(err.to_string())
    }
}

impl From<sqlx::migrate::MigrateError> for OccupancyError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        OccupancyError::Storage(err.to_string())
    }
}

impl From<validator::ValidationErrors> for OccupancyError {
    fn from(errors: validator::ValidationErrors) -> Self {
        OccupancyError::Validation(errors.to_string())
    }
}

/// Partial unique index backing the single-occupancy invariant
pub const ACTIVE_ASSIGNMENT_INDEX: &str = "bed_assignments_one_active_per_person";
