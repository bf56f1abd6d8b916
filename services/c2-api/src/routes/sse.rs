use actix_web::rt::time::interval;
use actix_web::web::Bytes;
use actix_web::{get, web, HttpResponse};
use futures_util::stream::unfold;
use std::time::Duration;

use crate::routes::common::{error_response, parse_room_id};
use crate::state::AppState;

/// Streams a room's timeline as server-sent events, polling every two
/// seconds from the last delivered sequence. A room that disappears ends
/// the stream.
#[get("/v1/rooms/{id}/timeline/stream")]
pub async fn timeline_stream(state: web::Data<AppState>, id: web::Path<String>) -> HttpResponse {
    let room_id = match parse_room_id(&id) {
        Ok(value) => value,
        Err(response) => return response,
    };
    if let Err(err) = state.manager.get_room(room_id).await {
        return error_response(&err);
    }

    let interval = interval(Duration::from_secs(2));
    let stream = unfold(
        (interval, 0u64, state),
        move |(mut interval, next_sequence, state)| async move {
            interval.tick().await;
            let events = state.manager.events_from(room_id, next_sequence).await.ok()?;
            let next = events
                .last()
                .map_or(next_sequence, |event| event.sequence + 1);
            let mut payload = String::new();
            for event in &events {
                let data = serde_json::to_string(event).ok()?;
                payload.push_str(&format!(
                    "id: {}\nevent: {}\ndata: {}\n\n",
                    event.sequence, event.event_type, data
                ));
            }
            if payload.is_empty() {
                payload.push_str(": heartbeat\n\n");
            }
            let bytes = Bytes::from(payload);
            Some((Ok::<Bytes, actix_web::Error>(bytes), (interval, next, state)))
        },
    );

    HttpResponse::Ok()
        .insert_header(("Content-Type", "text/event-stream"))
        .insert_header(("Cache-Control", "no-cache"))
        .insert_header(("Connection", "keep-alive"))
        .streaming(stream)
}
