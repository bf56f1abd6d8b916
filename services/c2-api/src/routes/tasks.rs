use actix_web::{get, post, web, HttpResponse};
use c2_core::{AvailableResource, NewTask, TaskStatus};
use serde::Deserialize;

use crate::routes::common::{created, parse_room_id, parse_tag, parse_task_id, respond};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AssignPayload {
    pub person: String,
    pub agency: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct NotesPayload {
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BlockPayload {
    pub reason: String,
}

#[derive(Debug, Deserialize)]
pub struct AutoAssignPayload {
    pub resources: Vec<AvailableResource>,
}

#[get("/v1/rooms/{id}/tasks")]
pub async fn list_tasks(
    state: web::Data<AppState>,
    id: web::Path<String>,
    query: web::Query<ListQuery>,
) -> HttpResponse {
    let room_id = match parse_room_id(&id) {
        Ok(value) => value,
        Err(response) => return response,
    };
    let status = match parse_tag::<TaskStatus>(query.status.as_deref()) {
        Ok(value) => value,
        Err(response) => return response,
    };
    respond(state.manager.tasks_for_room(room_id, status).await)
}

#[post("/v1/rooms/{id}/tasks")]
pub async fn create_task(
    state: web::Data<AppState>,
    id: web::Path<String>,
    payload: web::Json<NewTask>,
) -> HttpResponse {
    let room_id = match parse_room_id(&id) {
        Ok(value) => value,
        Err(response) => return response,
    };
    created(state.manager.create_task(room_id, payload.into_inner()).await)
}

#[get("/v1/rooms/{id}/tasks/pending")]
pub async fn pending_tasks(state: web::Data<AppState>, id: web::Path<String>) -> HttpResponse {
    let room_id = match parse_room_id(&id) {
        Ok(value) => value,
        Err(response) => return response,
    };
    respond(state.manager.pending_tasks(room_id).await)
}

#[get("/v1/rooms/{id}/tasks/overdue")]
pub async fn overdue_tasks(state: web::Data<AppState>, id: web::Path<String>) -> HttpResponse {
    let room_id = match parse_room_id(&id) {
        Ok(value) => value,
        Err(response) => return response,
    };
    respond(state.manager.overdue_tasks(room_id).await)
}

#[post("/v1/rooms/{id}/tasks/auto-assign")]
pub async fn auto_assign(
    state: web::Data<AppState>,
    id: web::Path<String>,
    payload: web::Json<AutoAssignPayload>,
) -> HttpResponse {
    let room_id = match parse_room_id(&id) {
        Ok(value) => value,
        Err(response) => return response,
    };
    respond(state.manager.auto_assign(room_id, &payload.resources).await)
}

#[get("/v1/tasks/{id}")]
pub async fn get_task(state: web::Data<AppState>, id: web::Path<String>) -> HttpResponse {
    let task_id = match parse_task_id(&id) {
        Ok(value) => value,
        Err(response) => return response,
    };
    respond(state.manager.get_task(task_id).await)
}

#[post("/v1/tasks/{id}/assign")]
pub async fn assign_task(
    state: web::Data<AppState>,
    id: web::Path<String>,
    payload: web::Json<AssignPayload>,
) -> HttpResponse {
    let task_id = match parse_task_id(&id) {
        Ok(value) => value,
        Err(response) => return response,
    };
    respond(
        state
            .manager
            .assign_task(task_id, &payload.person, payload.agency.as_deref())
            .await,
    )
}

#[post("/v1/tasks/{id}/start")]
pub async fn start_task(state: web::Data<AppState>, id: web::Path<String>) -> HttpResponse {
    let task_id = match parse_task_id(&id) {
        Ok(value) => value,
        Err(response) => return response,
    };
    respond(state.manager.start_task(task_id).await)
}

#[post("/v1/tasks/{id}/complete")]
pub async fn complete_task(
    state: web::Data<AppState>,
    id: web::Path<String>,
    payload: Option<web::Json<NotesPayload>>,
) -> HttpResponse {
    let task_id = match parse_task_id(&id) {
        Ok(value) => value,
        Err(response) => return response,
    };
    let notes = payload.and_then(|body| body.into_inner().notes);
    respond(state.manager.complete_task(task_id, notes).await)
}

#[post("/v1/tasks/{id}/block")]
pub async fn block_task(
    state: web::Data<AppState>,
    id: web::Path<String>,
    payload: web::Json<BlockPayload>,
) -> HttpResponse {
    let task_id = match parse_task_id(&id) {
        Ok(value) => value,
        Err(response) => return response,
    };
    respond(state.manager.block_task(task_id, &payload.reason).await)
}

#[post("/v1/tasks/{id}/cancel")]
pub async fn cancel_task(
    state: web::Data<AppState>,
    id: web::Path<String>,
    payload: Option<web::Json<NotesPayload>>,
) -> HttpResponse {
    let task_id = match parse_task_id(&id) {
        Ok(value) => value,
        Err(response) => return response,
    };
    let reason = payload.and_then(|body| body.into_inner().notes);
    respond(state.manager.cancel_task(task_id, reason).await)
}
