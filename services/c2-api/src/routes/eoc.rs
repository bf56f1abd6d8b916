use actix_web::{get, post, web, HttpResponse};
use c2_core::{EocStatusUpdate, NewAgency, RoomPriority};
use serde::Deserialize;

use crate::routes::common::{created, parse_agency_id, respond};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ActivatePayload {
    pub name: String,
    pub activation_level: u8,
}

#[derive(Debug, Deserialize)]
pub struct JoinPayload {
    pub agency_id: String,
    pub liaison_officer: String,
}

#[derive(Debug, Deserialize)]
pub struct ResourceRequestPayload {
    pub requesting_agency: String,
    pub resource_type: String,
    pub quantity: u64,
    pub priority: RoomPriority,
}

#[get("/v1/eoc")]
pub async fn eoc_status(state: web::Data<AppState>) -> HttpResponse {
    respond(state.manager.eoc_status())
}

#[post("/v1/eoc/activate")]
pub async fn activate_eoc(
    state: web::Data<AppState>,
    payload: web::Json<ActivatePayload>,
) -> HttpResponse {
    respond(
        state
            .manager
            .activate_eoc(&payload.name, payload.activation_level),
    )
}

#[post("/v1/eoc/deactivate")]
pub async fn deactivate_eoc(state: web::Data<AppState>) -> HttpResponse {
    respond(state.manager.deactivate_eoc())
}

#[post("/v1/eoc/status")]
pub async fn update_eoc_status(
    state: web::Data<AppState>,
    payload: web::Json<EocStatusUpdate>,
) -> HttpResponse {
    respond(state.manager.update_eoc_status(payload.into_inner()))
}

#[post("/v1/eoc/join")]
pub async fn join_eoc(state: web::Data<AppState>, payload: web::Json<JoinPayload>) -> HttpResponse {
    let agency_id = match parse_agency_id(&payload.agency_id) {
        Ok(value) => value,
        Err(response) => return response,
    };
    respond(state.manager.join_eoc(agency_id, &payload.liaison_officer))
}

#[get("/v1/agencies")]
pub async fn list_agencies(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(state.manager.agencies())
}

#[post("/v1/agencies")]
pub async fn register_agency(
    state: web::Data<AppState>,
    payload: web::Json<NewAgency>,
) -> HttpResponse {
    created(state.manager.register_agency(payload.into_inner()))
}

#[get("/v1/agencies/{id}")]
pub async fn get_agency(state: web::Data<AppState>, id: web::Path<String>) -> HttpResponse {
    let agency_id = match parse_agency_id(&id) {
        Ok(value) => value,
        Err(response) => return response,
    };
    respond(state.manager.agency(agency_id))
}

#[get("/v1/resource-requests")]
pub async fn list_resource_requests(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(state.manager.resource_requests())
}

#[post("/v1/resource-requests")]
pub async fn request_resources(
    state: web::Data<AppState>,
    payload: web::Json<ResourceRequestPayload>,
) -> HttpResponse {
    let body = payload.into_inner();
    created(state.manager.request_resources(
        &body.requesting_agency,
        &body.resource_type,
        body.quantity,
        body.priority,
    ))
}
