use actix_web::{web, HttpRequest, HttpResponse, Responder};
use uuid::Uuid;

use crate::models::{NewShelter, SearchRequest, SearchResponse, ShelterPatch};
use crate::routes::{authorize, error_response, AppState};

/// Configure shelter directory routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/shelters/search", web::post().to(search_shelters))
        .route("/shelters", web::get().to(list_shelters))
        .route("/shelters", web::post().to(create_shelter))
        .route("/shelters/{id}", web::get().to(get_shelter))
        .route("/shelters/{id}", web::put().to(upsert_shelter))
        .route("/shelters/{id}", web::patch().to(update_shelter))
        .route("/shelters/{id}/reconcile", web::post().to(reconcile_shelter));
}

/// Search endpoint
///
/// POST /api/v1/shelters/search
///
/// Request body:
/// ```json
/// {
///   "criteria": { "searchText": "downtown", "families": true, "ageMin": 25, "bedsAvailableOnly": true },
///   "location": { "lat": 45.52, "lng": -122.68 },
///   "shelters": null
/// }
/// ```
async fn search_shelters(state: web::Data<AppState>, req: web::Json<SearchRequest>) -> impl Responder {
    let SearchRequest {
        criteria,
        location,
        shelters,
    } = req.into_inner();

    match state.directory.search(&criteria, location, shelters).await {
        Ok(ranked) => {
            tracing::info!(
                "Search returned {} shelters ({} matches)",
                ranked.summary.total_shelters,
                ranked.summary.matching_shelters
            );
            HttpResponse::Ok().json(SearchResponse {
                results: ranked.results,
                summary: ranked.summary,
                distance_unit: location.map(|_| state.directory.pipeline().unit().label().to_string()),
            })
        }
        Err(e) => error_response(&e),
    }
}

async fn list_shelters(state: web::Data<AppState>) -> impl Responder {
    match state.directory.list().await {
        Ok(shelters) => HttpResponse::Ok().json(shelters),
        Err(e) => error_response(&e),
    }
}

async fn get_shelter(state: web::Data<AppState>, path: web::Path<Uuid>) -> impl Responder {
    match state.directory.get(path.into_inner()).await {
        Ok(shelter) => HttpResponse::Ok().json(shelter),
        Err(e) => error_response(&e),
    }
}

async fn create_shelter(
    state: web::Data<AppState>,
    req: web::Json<NewShelter>,
    http_req: HttpRequest,
) -> impl Responder {
    if let Err(denied) = authorize(&state, &http_req) {
        return denied;
    }

    match state.directory.create_shelter(req.into_inner()).await {
        Ok(shelter) => HttpResponse::Created().json(shelter),
        Err(e) => error_response(&e),
    }
}

/// Full replace, or create with a caller-chosen id
async fn upsert_shelter(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    req: web::Json<NewShelter>,
    http_req: HttpRequest,
) -> impl Responder {
    if let Err(denied) = authorize(&state, &http_req) {
        return denied;
    }

    match state.directory.upsert_shelter(path.into_inner(), req.into_inner()).await {
        Ok(shelter) => HttpResponse::Ok().json(shelter),
        Err(e) => error_response(&e),
    }
}

/// Partial update. Omitted fields are unchanged, `null` clears.
async fn update_shelter(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    req: web::Json<ShelterPatch>,
    http_req: HttpRequest,
) -> impl Responder {
    if let Err(denied) = authorize(&state, &http_req) {
        return denied;
    }

    match state.directory.update_shelter(path.into_inner(), req.into_inner()).await {
        Ok(shelter) => HttpResponse::Ok().json(shelter),
        Err(e) => error_response(&e),
    }
}

async fn reconcile_shelter(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    http_req: HttpRequest,
) -> impl Responder {
    if let Err(denied) = authorize(&state, &http_req) {
        return denied;
    }

    match state.directory.reconcile(path.into_inner()).await {
        Ok(shelter) => HttpResponse::Ok().json(shelter),
        Err(e) => error_response(&e),
    }
}
