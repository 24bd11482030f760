use actix_web::{web, HttpRequest, HttpResponse, Responder};
use uuid::Uuid;

use crate::models::{AdmitRequest, AssignmentsResponse, DischargeRequest, OccupantsResponse};
use crate::routes::{authorize, error_response, AppState};

/// Configure admission and occupancy routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/shelters/{id}/admit", web::post().to(admit))
        .route("/shelters/{id}/discharge", web::post().to(discharge))
        .route("/shelters/{id}/occupants", web::get().to(list_occupants))
        .route("/shelters/{id}/assignments", web::get().to(list_assignments));
}

/// Admit endpoint
///
/// POST /api/v1/shelters/{id}/admit
///
/// Request body (`personId` wins over `personName`):
/// ```json
/// {
///   "personName": "Jane Doe",
///   "phone": "555-0100",
///   "bedNumber": "B-12",
///   "notes": "arrived with a service dog"
/// }
/// ```
async fn admit(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    req: web::Json<AdmitRequest>,
    http_req: HttpRequest,
) -> impl Responder {
    if let Err(denied) = authorize(&state, &http_req) {
        return denied;
    }

    let shelter_id = path.into_inner();
    let req = req.into_inner();

    let target = match req.target() {
        Ok(target) => target,
        Err(e) => return error_response(&e),
    };

    match state.assignments.admit(shelter_id, target, req.bed_number, req.notes).await {
        Ok(assignment) => HttpResponse::Created().json(assignment),
        Err(e) => error_response(&e),
    }
}

/// Discharge endpoint
///
/// POST /api/v1/shelters/{id}/discharge
///
/// Exactly one identifier is used: `assignmentId`, else `personId`, else
/// `personName`.
async fn discharge(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    req: web::Json<DischargeRequest>,
    http_req: HttpRequest,
) -> impl Responder {
    if let Err(denied) = authorize(&state, &http_req) {
        return denied;
    }

    let target = match req.target() {
        Ok(target) => target,
        Err(e) => return error_response(&e),
    };

    match state.assignments.discharge(path.into_inner(), target).await {
        Ok(released) => HttpResponse::Ok().json(released),
        Err(e) => error_response(&e),
    }
}

/// Occupant lists identify people, so they sit behind the operator key too
async fn list_occupants(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    http_req: HttpRequest,
) -> impl Responder {
    if let Err(denied) = authorize(&state, &http_req) {
        return denied;
    }

    let shelter_id = path.into_inner();

    match state.assignments.list_occupants(shelter_id).await {
        Ok(occupants) => HttpResponse::Ok().json(OccupantsResponse {
            shelter_id,
            count: occupants.len(),
            occupants,
        }),
        Err(e) => error_response(&e),
    }
}

async fn list_assignments(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    http_req: HttpRequest,
) -> impl Responder {
    if let Err(denied) = authorize(&state, &http_req) {
        return denied;
    }

    let shelter_id = path.into_inner();

    match state.assignments.list_assignments(shelter_id).await {
        Ok(assignments) => HttpResponse::Ok().json(AssignmentsResponse {
            shelter_id,
            assignments,
        }),
        Err(e) => error_response(&e),
    }
}
