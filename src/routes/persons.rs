use actix_web::{web, HttpRequest, HttpResponse, Responder};

use crate::models::{NewPerson, PersonQuery};
use crate::routes::{authorize, error_response, AppState};

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/persons", web::get().to(search_persons))
        .route("/persons", web::post().to(find_or_create_person));
}

/// GET /api/v1/persons?q=jane&limit=25
async fn search_persons(
    state: web::Data<AppState>,
    query: web::Query<PersonQuery>,
    http_req: HttpRequest,
) -> impl Responder {
    if let Err(denied) = authorize(&state, &http_req) {
        return denied;
    }

    let q = query.q.as_deref().unwrap_or_default();

    match state.assignments.search_persons(q, query.limit).await {
        Ok(persons) => HttpResponse::Ok().json(persons),
        Err(e) => error_response(&e),
    }
}

/// Returns the existing person when name and contact details match
async fn find_or_create_person(
    state: web::Data<AppState>,
    req: web::Json<NewPerson>,
    http_req: HttpRequest,
) -> impl Responder {
    if let Err(denied) = authorize(&state, &http_req) {
        return denied;
    }

    match state.assignments.find_or_create_person(req.into_inner()).await {
        Ok(person) => HttpResponse::Ok().json(person),
        Err(e) => error_response(&e),
    }
}
