// Route exports
pub mod assignments;
pub mod health;
pub mod persons;
pub mod shelters;

use actix_web::{error, http::StatusCode, web, HttpRequest, HttpResponse};
use std::sync::Arc;

use crate::core::ranking::RankingPipeline;
use crate::error::OccupancyError;
use crate::models::ErrorResponse;
use crate::services::{AssignmentService, DirectoryCache, OccupancyStore, ShelterDirectory};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn OccupancyStore>,
    pub directory: ShelterDirectory,
    pub assignments: AssignmentService,
    /// When set, mutating routes and person reads require `Authorization: Bearer <key>`
    pub operator_key: Option<String>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn OccupancyStore>,
        cache: Option<Arc<DirectoryCache>>,
        pipeline: RankingPipeline,
        operator_key: Option<String>,
    ) -> Self {
        Self {
            directory: ShelterDirectory::new(store.clone(), cache.clone(), pipeline),
            assignments: AssignmentService::new(store.clone(), cache),
            store,
            operator_key: operator_key.filter(|k| !k.is_empty()),
        }
    }
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .configure(health::configure)
            .configure(shelters::configure)
            .configure(assignments::configure)
            .configure(persons::configure),
    );
}

/// JSON error response for payload and query errors
#[derive(Debug, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JsonError {
    pub error: String,
    pub message: String,
    pub status_code: u16,
}

impl std::fmt::Display for JsonError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.error, self.message)
    }
}

impl std::error::Error for JsonError {}

impl error::ResponseError for JsonError {
    fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::BAD_REQUEST)
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(self)
    }
}

/// Handle JSON payload errors
pub fn handle_json_payload_error(err: error::JsonPayloadError, req: &HttpRequest) -> actix_web::Error {
    tracing::info!("JSON payload error on {}: {}", req.path(), err);
    JsonError {
        error: "invalid_json".to_string(),
        message: format!("Invalid JSON: {}", err),
        status_code: 400,
    }
    .into()
}

/// Handle query payload errors
pub fn handle_query_payload_error(err: error::QueryPayloadError, req: &HttpRequest) -> actix_web::Error {
    tracing::info!("Query error on {}: {}", req.path(), err);
    JsonError {
        error: "invalid_query".to_string(),
        message: format!("Invalid query: {}", err),
        status_code: 400,
    }
    .into()
}

/// Handle malformed path segments such as a non-UUID shelter id
pub fn handle_path_error(err: error::PathError, req: &HttpRequest) -> actix_web::Error {
    tracing::info!("Path error on {}: {}", req.path(), err);
    JsonError {
        error: "validation_failed".to_string(),
        message: format!("Invalid path: {}", err),
        status_code: 400,
    }
    .into()
}

/// Map an occupancy error to its HTTP response
pub fn error_response(err: &OccupancyError) -> HttpResponse {
    let status = match err {
        OccupancyError::Validation(_) => StatusCode::BAD_REQUEST,
        OccupancyError::Conflict(_) | OccupancyError::Capacity { .. } => StatusCode::CONFLICT,
        OccupancyError::NotFound(_) => StatusCode::NOT_FOUND,
        OccupancyError::Storage(_) => StatusCode::SERVICE_UNAVAILABLE,
    };

    if err.is_retryable() {
        tracing::error!("Storage failure: {}", err);
    }

    HttpResponse::build(status).json(ErrorResponse {
        error: err.code().to_string(),
        message: err.to_string(),
        status_code: status.as_u16(),
    })
}

/// Reject the request unless it carries the operator key, when one is configured
pub(crate) fn authorize(state: &AppState, req: &HttpRequest) -> Result<(), HttpResponse> {
    let Some(key) = state.operator_key.as_deref() else {
        return Ok(());
    };

    let presented = req
        .headers()
        .get(actix_web::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim);

    if presented == Some(key) {
        return Ok(());
    }

    tracing::warn!("Rejected unauthenticated {} {}", req.method(), req.path());
    Err(HttpResponse::Unauthorized().json(ErrorResponse {
        error: "unauthorized".to_string(),
        message: "Operator key required".to_string(),
        status_code: 401,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_error_statuses() {
        let cases = [
            (OccupancyError::Validation("x".into()), 400),
            (OccupancyError::already_assigned(Uuid::nil(), Uuid::nil()), 409),
            (OccupancyError::Capacity { shelter_id: Uuid::nil() }, 409),
            (OccupancyError::NotFound("x".into()), 404),
            (OccupancyError::Storage("x".into()), 503),
        ];

        for (err, expected) in cases {
            assert_eq!(error_response(&err).status().as_u16(), expected, "{:?}", err);
        }
    }
}
