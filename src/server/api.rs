use std::any::Any;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::{ to_bytes, Body },
    extract::{ ConnectInfo, Request, State },
    http::{ header, request::Parts, HeaderName, HeaderValue, Method, StatusCode },
    response::{ IntoResponse, Response },
    routing::any,
    Router,
};
use log::{ debug, error, info, warn };
use serde_json::Value;
use tower_http::catch_panic::CatchPanicLayer;
use uuid::Uuid;

use super::cors::{ CorsPolicy, ALLOWED_HEADERS, ALLOWED_METHODS, PREFLIGHT_MAX_AGE_SECS };
use super::error::{ json_response, ApiError };
use super::rate_limit::{ RateDecision, RateLimiter };
use crate::config::{ ConfigError, ProxySettings };
use crate::llm::chat::{ ChatClient, CompletionRequest };
use crate::models::chat::{ ChatResponse, HistoryEntry, Role };

pub const MAX_BODY_BYTES: usize = 64 * 1024;
const UNKNOWN_CLIENT: &str = "unknown";

#[derive(Clone)]
pub struct AppState {
    pub chat: Arc<dyn ChatClient>,
    pub limiter: Arc<RateLimiter>,
    pub cors: Arc<CorsPolicy>,
    pub settings: Arc<ProxySettings>,
    pub system_prompt: Arc<str>,
}

impl AppState {
    pub fn new(
        chat: Arc<dyn ChatClient>,
        settings: ProxySettings,
        system_prompt: Arc<str>
    ) -> Result<Self, ConfigError> {
        let cors = CorsPolicy::new(settings.allowed_origins.clone())?;
        Ok(Self {
            chat,
            limiter: Arc::new(RateLimiter::new(settings.rate_limit)),
            cors: Arc::new(cors),
            settings: Arc::new(settings),
            system_prompt,
        })
    }
}

/// Every path and method lands in [`chat_handler`]; it does its own method dispatch so
/// that even a 405 carries the CORS origin.
pub fn build_router(state: AppState) -> Router {
    let fallback_origin = state.cors.fallback().clone();
    Router::new()
        .route("/", any(chat_handler))
        .fallback(chat_handler)
        .layer(
            CatchPanicLayer::custom(move |panic: Box<dyn Any + Send + 'static>| {
                let detail = panic
                    .downcast_ref::<String>()
                    .map(String::as_str)
                    .or_else(|| panic.downcast_ref::<&str>().copied())
                    .unwrap_or("unknown panic");
                error!("Chat handler panicked: {}", detail);
                ApiError::Internal.into_response_with(fallback_origin.clone())
            })
        )
        .with_state(state)
}

pub async fn chat_handler(State(state): State<AppState>, req: Request) -> Response {
    let (parts, body) = req.into_parts();
    let origin = state.cors.resolve(&parts.headers);

    match parts.method {
        Method::OPTIONS => {
            return preflight(origin);
        }
        Method::POST => {}
        ref other => {
            debug!("Rejecting {} {}", other, parts.uri.path());
            return ApiError::MethodNotAllowed.into_response_with(origin);
        }
    }

    let request_id = Uuid::new_v4();
    let client = client_key(&parts, state.settings.client_ip_header.as_ref());

    if let RateDecision::Limited { retry_after } = state.limiter.check(&client) {
        warn!("[{}] Rate limit exceeded for {}", request_id, client);
        return (ApiError::RateLimited { retry_after }).into_response_with(origin);
    }

    match process_chat(&state, body, request_id).await {
        Ok(reply) => json_response(StatusCode::OK, origin, reply),
        Err(e) => {
            match &e {
                ApiError::Upstream(source) => {
                    error!("[{}] Upstream call for {} failed: {}", request_id, client, source);
                }
                other => {
                    info!("[{}] Rejected request from {}: {}", request_id, client, other);
                }
            }
            e.into_response_with(origin)
        }
    }
}

fn preflight(origin: HeaderValue) -> Response {
    let mut response = StatusCode::NO_CONTENT.into_response();
    let headers = response.headers_mut();
    headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin);
    headers.insert(header::ACCESS_CONTROL_ALLOW_METHODS, HeaderValue::from_static(ALLOWED_METHODS));
    headers.insert(header::ACCESS_CONTROL_ALLOW_HEADERS, HeaderValue::from_static(ALLOWED_HEADERS));
    headers.insert(header::ACCESS_CONTROL_MAX_AGE, HeaderValue::from(PREFLIGHT_MAX_AGE_SECS));
    headers.insert(header::VARY, HeaderValue::from_static("Origin"));
    response
}

/// The edge-reported address when a header is configured and present, else the peer IP.
fn client_key(parts: &Parts, ip_header: Option<&HeaderName>) -> String {
    let from_header = ip_header
        .and_then(|name| parts.headers.get(name))
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty());
    if let Some(ip) = from_header {
        return ip.to_string();
    }

    parts.extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
}

async fn process_chat(
    state: &AppState,
    body: Body,
    request_id: Uuid
) -> Result<ChatResponse, ApiError> {
    let bytes = to_bytes(body, MAX_BODY_BYTES).await.map_err(|_|
        ApiError::BadRequest("Request body too large".to_string())
    )?;
    let (message, history) = parse_chat_body(&bytes, state.settings.max_message_chars)?;

    let request = CompletionRequest {
        system: state.system_prompt.clone(),
        messages: build_upstream_messages(history, message, state.settings.history_limit),
        max_tokens: state.settings.max_output_tokens,
    };
    debug!(
        "[{}] Forwarding {} turns to {}",
        request_id,
        request.messages.len(),
        state.chat.get_model()
    );

    let completion = state.chat.complete(&request).await.map_err(ApiError::Upstream)?;
    info!(
        "[{}] Reply ready (in={} out={})",
        request_id,
        completion.usage.input_tokens,
        completion.usage.output_tokens
    );
    Ok(ChatResponse::reply(completion.text, completion.usage))
}

/// Validates `{ message, conversationHistory }` and returns the message with its history.
pub fn parse_chat_body(
    bytes: &[u8],
    max_message_chars: usize
) -> Result<(String, Vec<HistoryEntry>), ApiError> {
    let mut value: Value = serde_json
        ::from_slice(bytes)
        .map_err(|_| ApiError::BadRequest("Invalid JSON body".to_string()))?;

    let message = match value.get_mut("message").map(Value::take) {
        Some(Value::String(message)) if !message.trim().is_empty() => message,
        _ => {
            return Err(ApiError::BadRequest("Invalid message format".to_string()));
        }
    };

    if message.chars().count() > max_message_chars {
        return Err(
            ApiError::BadRequest(
                format!("Message too long (max {} characters)", max_message_chars)
            )
        );
    }

    let history = match value.get_mut("conversationHistory").map(Value::take) {
        None | Some(Value::Null) => Vec::new(),
        Some(raw) =>
            serde_json
                ::from_value::<Vec<HistoryEntry>>(raw)
                .map_err(|_| ApiError::BadRequest("Invalid conversation history".to_string()))?,
    };

    Ok((message, history))
}

/// The most recent `limit` history entries followed by the new user turn.
pub fn build_upstream_messages(
    mut history: Vec<HistoryEntry>,
    message: String,
    limit: usize
) -> Vec<HistoryEntry> {
    let skip = history.len().saturating_sub(limit);
    history.drain(..skip);
    history.push(HistoryEntry { role: Role::User, content: message });
    history
}
