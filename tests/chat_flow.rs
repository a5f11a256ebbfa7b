use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use httpmock::Method::POST;
use httpmock::MockServer;
use merica_chat::client::{ ChatSession, HttpTransport, GENERIC_NOTICE, GREETING };
use merica_chat::client::transport::ChatTransport;
use merica_chat::config::{ ProxySettings, RateLimitSettings };
use merica_chat::llm::chat::anthropic::AnthropicChatClient;
use merica_chat::models::chat::{ ChatRequest, HistoryEntry, Role };
use merica_chat::server::api::{ build_router, AppState };
use serde_json::{ json, Value };

const SYSTEM: &str = "You are Merica.";

/// Starts the proxy on an ephemeral port in front of `upstream` and returns its URL.
async fn spawn_proxy(upstream: &MockServer, settings: ProxySettings) -> String {
    let chat = AnthropicChatClient::new(
        "test-key".to_string(),
        None,
        Some(upstream.base_url()),
        Duration::from_secs(5)
    ).unwrap();
    let state = AppState::new(Arc::new(chat), settings, Arc::from(SYSTEM)).unwrap();
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await.unwrap();
    });
    format!("http://{}", addr)
}

fn anthropic_reply(text: &str) -> Value {
    json!({
        "id": "msg_01",
        "type": "message",
        "role": "assistant",
        "content": [{ "type": "text", "text": text }],
        "usage": { "input_tokens": 412, "output_tokens": 11 }
    })
}

fn session_for(endpoint: &str) -> ChatSession<HttpTransport> {
    ChatSession::new(HttpTransport::new(endpoint, Duration::from_secs(10)).unwrap())
}

#[tokio::test]
async fn hoodie_question_round_trips_through_proxy() {
    let upstream = MockServer::start_async().await;
    let mock = upstream.mock_async(|when, then| {
        when.method(POST)
            .path("/v1/messages")
            .header("x-api-key", "test-key")
            .json_body(json!({
                "model": "claude-haiku-4-5-20251001",
                "max_tokens": 200,
                "system": SYSTEM,
                "messages": [{ "role": "user", "content": "need a hoodie" }]
            }));
        then.status(200).json_body(anthropic_reply("Tees, not hoodies—yet. What design?"));
    }).await;

    let endpoint = spawn_proxy(&upstream, ProxySettings::default()).await;
    let session = session_for(&endpoint);
    session.open();

    assert!(session.submit("need a hoodie").await);
    mock.assert_async().await;

    let (messages, loading) = session
        .with(|conv| (conv.messages().iter().cloned().collect::<Vec<_>>(), conv.is_loading()))
        .unwrap();
    assert!(!loading);
    assert_eq!(messages.len(), 3);
    assert_eq!(messages[0].content, GREETING);
    assert_eq!(messages[1].role, Role::User);
    assert_eq!(messages[2].role, Role::Assistant);
    assert_eq!(messages[2].content, "Tees, not hoodies—yet. What design?");
    assert!(!messages[2].is_error);
}

#[tokio::test]
async fn oversized_history_is_cut_to_most_recent_turns() {
    let history: Vec<HistoryEntry> = (0..14)
        .map(|i| HistoryEntry {
            role: if i % 2 == 0 { Role::User } else { Role::Assistant },
            content: format!("h{}", i),
        })
        .collect();

    let mut expected: Vec<Value> = history[4..]
        .iter()
        .map(|h| json!({ "role": h.role.as_str(), "content": h.content }))
        .collect();
    expected.push(json!({ "role": "user", "content": "latest" }));

    let upstream = MockServer::start_async().await;
    let mock = upstream.mock_async(|when, then| {
        when.method(POST)
            .path("/v1/messages")
            .json_body(json!({
                "model": "claude-haiku-4-5-20251001",
                "max_tokens": 200,
                "system": SYSTEM,
                "messages": expected
            }));
        then.status(200).json_body(anthropic_reply("ok"));
    }).await;

    let endpoint = spawn_proxy(&upstream, ProxySettings::default()).await;
    let transport = HttpTransport::new(endpoint, Duration::from_secs(10)).unwrap();
    let reply = transport
        .send(&ChatRequest { message: "latest".into(), conversation_history: history }).await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(reply, merica_chat::client::ProxyReply::Success { message: "ok".into() });
}

#[tokio::test]
async fn rate_limited_client_sees_generic_notice() {
    let upstream = MockServer::start_async().await;
    let mock = upstream.mock_async(|when, then| {
        when.method(POST).path("/v1/messages");
        then.status(200).json_body(anthropic_reply("first one's free"));
    }).await;

    let settings = ProxySettings {
        rate_limit: RateLimitSettings { max_requests: 1, ..RateLimitSettings::default() },
        ..ProxySettings::default()
    };
    let endpoint = spawn_proxy(&upstream, settings).await;
    let session = session_for(&endpoint);
    session.open();

    assert!(session.submit("one").await);
    assert!(session.submit("two").await);
    mock.assert_hits_async(1).await;

    let last = session.with(|conv| conv.messages().back().cloned()).flatten().unwrap();
    assert_eq!(last.content, GENERIC_NOTICE);
    assert!(last.is_error);
}

#[tokio::test]
async fn upstream_outage_surfaces_as_single_error_message() {
    let upstream = MockServer::start_async().await;
    upstream.mock_async(|when, then| {
        when.method(POST).path("/v1/messages");
        then.status(529).body("{\"type\":\"error\"}");
    }).await;

    let endpoint = spawn_proxy(&upstream, ProxySettings::default()).await;

    let raw = reqwest::Client::new()
        .post(&endpoint)
        .json(&json!({ "message": "hi", "conversationHistory": [] }))
        .send().await
        .unwrap();
    assert_eq!(raw.status().as_u16(), 500);
    let body: Value = raw.json().await.unwrap();
    assert_eq!(body, json!({ "success": false, "error": "Failed to process chat request" }));

    let session = session_for(&endpoint);
    session.open();
    assert!(session.submit("hi").await);
    let count = session.with(|conv| conv.messages().len()).unwrap();
    assert_eq!(count, 3);
}
