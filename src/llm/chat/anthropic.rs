use async_trait::async_trait;
use log::debug;
use reqwest::{ Client as HttpClient, header::{ HeaderMap, HeaderValue, CONTENT_TYPE } };
use serde::{ Deserialize, Serialize };
use std::time::Duration;

use super::{ status_error, ChatClient, Completion, CompletionRequest };
use crate::llm::{ LlmConfig, LlmError };
use crate::models::chat::{ HistoryEntry, Role, TokenUsage };

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const DEFAULT_MODEL: &str = "claude-haiku-4-5-20251001";
const MESSAGES_PATH: &str = "/v1/messages";
const ANTHROPIC_API_VERSION: &str = "2023-06-01";

pub struct AnthropicChatClient {
    http: HttpClient,
    model: String,
    base_url: String,
}

#[derive(Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: &'a [HistoryEntry],
}

#[derive(Deserialize)]
struct AnthropicResponse {
    content: Vec<ContentBlock>,
    usage: AnthropicUsage,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
struct AnthropicUsage {
    input_tokens: u32,
    output_tokens: u32,
}

impl AnthropicChatClient {
    pub fn new(
        api_key: String,
        model: Option<String>,
        base_url: Option<String>,
        timeout: Duration
    ) -> Result<Self, LlmError> {
        let chat_model = model.unwrap_or_else(|| DEFAULT_MODEL.to_string());
        let api_url = base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert("anthropic-version", HeaderValue::from_static(ANTHROPIC_API_VERSION));
        let mut key = HeaderValue::from_str(&api_key).map_err(|e|
            LlmError::Config(format!("Invalid API key format: {}", e))
        )?;
        key.set_sensitive(true);
        headers.insert("x-api-key", key);

        let http = HttpClient::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| LlmError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            model: chat_model,
            base_url: api_url,
        })
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        let api_key = config.api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| LlmError::Config("Anthropic API key is required".to_string()))?;

        Self::new(
            api_key,
            config.completion_model.clone(),
            config.base_url.clone(),
            config.timeout,
        )
    }

    fn messages_url(&self) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), MESSAGES_PATH)
    }
}

/// The Messages API wants the conversation to open with a user turn, so a leading
/// greeting from the assistant is dropped.
fn leading_user_turns(messages: &[HistoryEntry]) -> &[HistoryEntry] {
    let start = messages
        .iter()
        .position(|m| m.role == Role::User)
        .unwrap_or(messages.len());
    &messages[start..]
}

#[async_trait]
impl ChatClient for AnthropicChatClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, LlmError> {
        let messages = leading_user_turns(&request.messages);
        if messages.is_empty() {
            return Err(LlmError::Config("conversation has no user turn".to_string()));
        }

        let body = AnthropicRequest {
            model: &self.model,
            max_tokens: request.max_tokens,
            system: &request.system,
            messages,
        };
        debug!("Anthropic request: model={} turns={}", self.model, messages.len());

        let resp = self.http.post(self.messages_url()).json(&body).send().await?;
        if !resp.status().is_success() {
            return Err(status_error(resp).await);
        }

        let parsed: AnthropicResponse = resp.json().await?;
        let text = parsed.content
            .into_iter()
            .filter(|block| block.block_type == "text")
            .find_map(|block| block.text)
            .ok_or_else(|| LlmError::Malformed("response has no text content block".to_string()))?;

        Ok(Completion {
            text,
            usage: TokenUsage {
                input_tokens: parsed.usage.input_tokens,
                output_tokens: parsed.usage.output_tokens,
            },
        })
    }

    fn get_model(&self) -> String {
        self.model.clone()
    }

    fn get_base_url(&self) -> String {
        self.base_url.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::Method::POST;
    use httpmock::MockServer;
    use serde_json::json;
    use std::sync::Arc;

    fn client(server: &MockServer) -> AnthropicChatClient {
        AnthropicChatClient::new(
            "test-key".into(),
            None,
            Some(server.base_url()),
            Duration::from_secs(5)
        ).unwrap()
    }

    fn request(messages: Vec<HistoryEntry>) -> CompletionRequest {
        CompletionRequest {
            system: Arc::from("be a dog"),
            messages,
            max_tokens: 200,
        }
    }

    fn turn(role: Role, content: &str) -> HistoryEntry {
        HistoryEntry { role, content: content.to_string() }
    }

    #[tokio::test]
    async fn complete_posts_to_messages_endpoint() {
        let server = MockServer::start_async().await;
        let mock = server.mock_async(|when, then| {
            when.method(POST)
                .path("/v1/messages")
                .header("x-api-key", "test-key")
                .header("anthropic-version", "2023-06-01")
                .json_body(json!({
                    "model": DEFAULT_MODEL,
                    "max_tokens": 200,
                    "system": "be a dog",
                    "messages": [{ "role": "user", "content": "need a hoodie" }]
                }));
            then.status(200).json_body(json!({
                "id": "msg_1",
                "type": "message",
                "content": [{ "type": "text", "text": "Tees only." }],
                "usage": { "input_tokens": 12, "output_tokens": 4 }
            }));
        }).await;

        let completion = client(&server)
            .complete(&request(vec![turn(Role::User, "need a hoodie")])).await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(completion.text, "Tees only.");
        assert_eq!(completion.usage, TokenUsage { input_tokens: 12, output_tokens: 4 });
    }

    #[tokio::test]
    async fn non_success_status_keeps_body_for_logs() {
        let server = MockServer::start_async().await;
        server.mock_async(|when, then| {
            when.method(POST).path("/v1/messages");
            then.status(401).body("invalid x-api-key");
        }).await;

        let err = client(&server)
            .complete(&request(vec![turn(Role::User, "hi")])).await
            .unwrap_err();

        match err {
            LlmError::Status { status, body } => {
                assert_eq!(status, 401);
                assert!(body.contains("invalid x-api-key"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn response_without_text_is_malformed() {
        let server = MockServer::start_async().await;
        server.mock_async(|when, then| {
            when.method(POST).path("/v1/messages");
            then.status(200).json_body(json!({
                "content": [],
                "usage": { "input_tokens": 1, "output_tokens": 0 }
            }));
        }).await;

        let err = client(&server)
            .complete(&request(vec![turn(Role::User, "hi")])).await
            .unwrap_err();
        assert!(matches!(err, LlmError::Malformed(_)));
    }

    #[test]
    fn leading_assistant_turns_are_dropped() {
        let messages = vec![
            turn(Role::Assistant, "Yo."),
            turn(Role::User, "hats?"),
            turn(Role::Assistant, "Yep.")
        ];
        let trimmed = leading_user_turns(&messages);
        assert_eq!(trimmed.len(), 2);
        assert_eq!(trimmed[0].role, Role::User);
    }
}
