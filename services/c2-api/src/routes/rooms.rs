use actix_web::{get, post, web, HttpResponse};
use c2_core::{BriefType, NewRoom, RoomStatus, StatusUpdate};
use serde::Deserialize;

use crate::routes::common::{created, error_response, parse_room_id, parse_tag, respond};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AgencyPayload {
    pub agency: String,
}

#[derive(Debug, Deserialize)]
pub struct ClosePayload {
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BriefQuery {
    #[serde(rename = "type")]
    pub brief_type: Option<String>,
}

#[get("/v1/rooms")]
pub async fn list_rooms(state: web::Data<AppState>, query: web::Query<ListQuery>) -> HttpResponse {
    let status = match parse_tag::<RoomStatus>(query.status.as_deref()) {
        Ok(value) => value,
        Err(response) => return response,
    };
    HttpResponse::Ok().json(state.manager.list_rooms(status).await)
}

#[post("/v1/rooms")]
pub async fn create_room(state: web::Data<AppState>, payload: web::Json<NewRoom>) -> HttpResponse {
    created(state.manager.create_room(payload.into_inner()).await)
}

#[get("/v1/rooms/{id}")]
pub async fn get_room(state: web::Data<AppState>, id: web::Path<String>) -> HttpResponse {
    let room_id = match parse_room_id(&id) {
        Ok(value) => value,
        Err(response) => return response,
    };
    respond(state.manager.get_room(room_id).await)
}

#[post("/v1/rooms/{id}/status")]
pub async fn update_status(
    state: web::Data<AppState>,
    id: web::Path<String>,
    payload: web::Json<StatusUpdate>,
) -> HttpResponse {
    let room_id = match parse_room_id(&id) {
        Ok(value) => value,
        Err(response) => return response,
    };
    respond(
        state
            .manager
            .update_status(room_id, payload.into_inner())
            .await,
    )
}

#[post("/v1/rooms/{id}/agencies")]
pub async fn add_agency(
    state: web::Data<AppState>,
    id: web::Path<String>,
    payload: web::Json<AgencyPayload>,
) -> HttpResponse {
    let room_id = match parse_room_id(&id) {
        Ok(value) => value,
        Err(response) => return response,
    };
    respond(state.manager.add_agency(room_id, &payload.agency).await)
}

#[post("/v1/rooms/{id}/close")]
pub async fn close_room(
    state: web::Data<AppState>,
    id: web::Path<String>,
    payload: Option<web::Json<ClosePayload>>,
) -> HttpResponse {
    let room_id = match parse_room_id(&id) {
        Ok(value) => value,
        Err(response) => return response,
    };
    let reason = payload.and_then(|body| body.into_inner().reason);
    respond(state.manager.close_room(room_id, reason).await)
}

#[get("/v1/rooms/{id}/brief")]
pub async fn generate_brief(
    state: web::Data<AppState>,
    id: web::Path<String>,
    query: web::Query<BriefQuery>,
) -> HttpResponse {
    let room_id = match parse_room_id(&id) {
        Ok(value) => value,
        Err(response) => return response,
    };
    let brief_type = match parse_tag::<BriefType>(query.brief_type.as_deref()) {
        Ok(value) => value.unwrap_or(BriefType::Situation),
        Err(response) => return response,
    };
    match state.manager.generate_brief(room_id, brief_type).await {
        Ok(brief) => HttpResponse::Ok().json(brief),
        Err(err) => error_response(&err),
    }
}
