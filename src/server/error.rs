use axum::http::{ header, HeaderValue, StatusCode };
use axum::response::{ IntoResponse, Response };
use axum::Json;
use std::time::Duration;
use thiserror::Error;

use crate::llm::LlmError;
use crate::models::chat::ChatResponse;

pub const GENERIC_FAILURE: &str = "Failed to process chat request";

/// Client-facing failures of the proxy. Display text is exactly what the client sees,
/// except for `Upstream`, whose source is kept for the logs only.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Method not allowed")]
    MethodNotAllowed,
    #[error("Too many requests. Slow down, chief.")]
    RateLimited {
        retry_after: Duration,
    },
    #[error("{0}")]
    BadRequest(String),
    #[error("Failed to process chat request")]
    Upstream(#[source] LlmError),
    #[error("Failed to process chat request")]
    Internal,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Upstream(_) | ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn body(&self) -> ChatResponse {
        match self {
            ApiError::Upstream(_) | ApiError::Internal => ChatResponse::failed(GENERIC_FAILURE),
            other => ChatResponse::rejected(other.to_string()),
        }
    }

    pub fn into_response_with(self, origin: HeaderValue) -> Response {
        let mut response = json_response(self.status(), origin, self.body());
        if let ApiError::RateLimited { retry_after } = self {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(retry_after.as_secs()));
        }
        response
    }
}

/// A JSON response carrying the resolved CORS origin.
pub fn json_response(status: StatusCode, origin: HeaderValue, body: ChatResponse) -> Response {
    let mut response = (status, Json(body)).into_response();
    let headers = response.headers_mut();
    headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin);
    headers.insert(header::VARY, HeaderValue::from_static("Origin"));
    response
}
