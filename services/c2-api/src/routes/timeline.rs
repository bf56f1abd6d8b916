use actix_web::{get, post, web, HttpResponse};
use c2_coordination::EventFilter;
use c2_core::{C2Error, EventSource, NewEvent, TimelineEventType};
use serde::Deserialize;

use crate::routes::common::{created, error_response, parse_room_id, parse_tag, respond};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct TimelineQuery {
    pub limit: Option<usize>,
    #[serde(rename = "type")]
    pub event_type: Option<String>,
    pub since_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct AppendPayload {
    pub event_type: TimelineEventType,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub payload: serde_json::Value,
    pub source: Option<String>,
}

/// `type` or `since_ms` switches from the newest-N view to a filtered one.
#[get("/v1/rooms/{id}/timeline")]
pub async fn timeline(
    state: web::Data<AppState>,
    id: web::Path<String>,
    query: web::Query<TimelineQuery>,
) -> HttpResponse {
    let room_id = match parse_room_id(&id) {
        Ok(value) => value,
        Err(response) => return response,
    };
    let event_type = match parse_tag::<TimelineEventType>(query.event_type.as_deref()) {
        Ok(value) => value,
        Err(response) => return response,
    };

    if event_type.is_none() && query.since_ms.is_none() {
        return respond(state.manager.recent_events(room_id, query.limit).await);
    }
    let filter = EventFilter {
        event_type,
        since_ms: query.since_ms,
    };
    let result = state
        .manager
        .filter_events(room_id, &filter)
        .await
        .map(|mut events| {
            if let Some(limit) = query.limit {
                events.truncate(limit);
            }
            events
        });
    respond(result)
}

#[post("/v1/rooms/{id}/timeline")]
pub async fn append_event(
    state: web::Data<AppState>,
    id: web::Path<String>,
    payload: web::Json<AppendPayload>,
) -> HttpResponse {
    let room_id = match parse_room_id(&id) {
        Ok(value) => value,
        Err(response) => return response,
    };
    let event = match external_event(payload.into_inner()) {
        Ok(value) => value,
        Err(err) => return error_response(&err),
    };
    created(state.manager.append_event(room_id, event).await)
}

/// Lifecycle types are refused here; only the operations behind them write those.
fn external_event(body: AppendPayload) -> Result<NewEvent, C2Error> {
    if !body.event_type.is_external() {
        return Err(C2Error::invalid_argument(
            "timeline event type",
            body.event_type.as_str(),
        ));
    }
    let source = body
        .source
        .filter(|value| !value.trim().is_empty())
        .map_or(EventSource::System, EventSource::actor);
    Ok(NewEvent::system(body.event_type, body.title)
        .with_description(body.description)
        .with_payload(body.payload)
        .from_source(source))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(event_type: TimelineEventType) -> AppendPayload {
        AppendPayload {
            event_type,
            title: "Evacuate zones A and B".to_string(),
            description: String::new(),
            payload: serde_json::Value::Null,
            source: Some("Sheriff Dawson".to_string()),
        }
    }

    #[test]
    fn narrative_events_are_accepted() {
        let event = external_event(body(TimelineEventType::EvacuationOrder)).unwrap();
        assert_eq!(event.event_type, TimelineEventType::EvacuationOrder);
        assert_eq!(event.source, EventSource::actor("Sheriff Dawson"));
    }

    #[test]
    fn lifecycle_events_are_refused() {
        for event_type in [
            TimelineEventType::StatusChange,
            TimelineEventType::TaskCompleted,
            TimelineEventType::IncidentCreated,
        ] {
            assert_eq!(
                external_event(body(event_type)).unwrap_err(),
                C2Error::invalid_argument("timeline event type", event_type.as_str())
            );
        }
    }

    #[test]
    fn upper_case_event_type_parses_from_json() {
        let body: AppendPayload =
            serde_json::from_str(r#"{"event_type":"CORRECTION","title":"Shelter count was 40"}"#)
                .unwrap();
        assert_eq!(body.event_type, TimelineEventType::Correction);
    }
}
