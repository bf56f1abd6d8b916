use actix_web::error::{InternalError, JsonPayloadError};
use actix_web::{HttpRequest, HttpResponse};
use c2_core::{AgencyId, C2Error, ErrorCode, RoomId, TaskId};
use serde::Serialize;
use std::str::FromStr;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

pub fn error_response(err: &C2Error) -> HttpResponse {
    let code = err.code();
    let body = ErrorResponse {
        error: err.to_string(),
        code: code.to_string(),
    };
    tracing::warn!(code = %code, error = %err, "Coordination operation rejected");
    match code {
        ErrorCode::InvalidInput => HttpResponse::BadRequest().json(body),
        ErrorCode::NotFound => HttpResponse::NotFound().json(body),
        ErrorCode::Conflict => HttpResponse::Conflict().json(body),
        ErrorCode::Unavailable => HttpResponse::ServiceUnavailable().json(body),
    }
}

/// Malformed bodies, unknown tags included, answer with the same error shape
/// as rejected operations.
pub fn json_error(err: JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    let body = ErrorResponse {
        error: err.to_string(),
        code: ErrorCode::InvalidInput.to_string(),
    };
    tracing::warn!(error = %err, "Request body rejected");
    InternalError::from_response(err, HttpResponse::BadRequest().json(body)).into()
}

pub fn respond<T: Serialize>(result: Result<T, C2Error>) -> HttpResponse {
    match result {
        Ok(value) => HttpResponse::Ok().json(value),
        Err(err) => error_response(&err),
    }
}

pub fn created<T: Serialize>(result: Result<T, C2Error>) -> HttpResponse {
    match result {
        Ok(value) => HttpResponse::Created().json(value),
        Err(err) => error_response(&err),
    }
}

pub fn parse_room_id(value: &str) -> Result<RoomId, HttpResponse> {
    value.parse().map_err(|err| error_response(&err))
}

pub fn parse_task_id(value: &str) -> Result<TaskId, HttpResponse> {
    value.parse().map_err(|err| error_response(&err))
}

pub fn parse_agency_id(value: &str) -> Result<AgencyId, HttpResponse> {
    value.parse().map_err(|err| error_response(&err))
}

/// Parses an optional query tag strictly; an unknown value is a 400.
pub fn parse_tag<T>(value: Option<&str>) -> Result<Option<T>, HttpResponse>
where
    T: FromStr<Err = C2Error>,
{
    value
        .map(|raw| raw.parse::<T>().map_err(|err| error_response(&err)))
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::http::StatusCode;

    #[test]
    fn error_codes_pick_http_status() {
        let cases = [
            (C2Error::RoomNotFound(RoomId::new()), StatusCode::NOT_FOUND),
            (
                C2Error::DependenciesIncomplete {
                    task_id: TaskId::new(),
                    pending: vec![TaskId::new()],
                },
                StatusCode::CONFLICT,
            ),
            (C2Error::EocNotActivated, StatusCode::SERVICE_UNAVAILABLE),
            (
                C2Error::invalid_argument("quantity", "0"),
                StatusCode::BAD_REQUEST,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(error_response(&err).status(), status);
        }
    }

    #[test]
    fn rejected_bodies_are_bad_requests() {
        let req = actix_web::test::TestRequest::default().to_http_request();
        let err = json_error(JsonPayloadError::ContentType, &req);
        assert_eq!(err.as_response_error().status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn malformed_ids_are_bad_requests() {
        let response = parse_agency_id("fire-dept").unwrap_err();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(parse_tag::<c2_core::BriefType>(Some("EXECUTIVE")).is_ok());
    }
}
