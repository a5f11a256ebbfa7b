pub mod anthropic;
pub mod openai;

use async_trait::async_trait;
use std::sync::Arc;
use super::{ LlmConfig, LlmError, LlmType };
use self::anthropic::AnthropicChatClient;
use self::openai::OpenAIChatClient;
use crate::models::chat::{ HistoryEntry, TokenUsage };

/// One upstream call: a fixed system instruction, the trimmed conversation ending in the
/// new user turn, and an output ceiling.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub system: Arc<str>,
    pub messages: Vec<HistoryEntry>,
    pub max_tokens: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub text: String,
    pub usage: TokenUsage,
}

#[async_trait]
pub trait ChatClient: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, LlmError>;

    fn get_model(&self) -> String;
    fn get_base_url(&self) -> String;
}

pub fn new_client(config: &LlmConfig) -> Result<Arc<dyn ChatClient>, LlmError> {
    let client: Arc<dyn ChatClient> = match config.llm_type {
        LlmType::Anthropic => {
            let specific_client = AnthropicChatClient::from_config(config)?;
            Arc::new(specific_client)
        }
        LlmType::OpenAI => {
            let specific_client = OpenAIChatClient::from_config(config)?;
            Arc::new(specific_client)
        }
    };
    Ok(client)
}

/// Reads a non-2xx upstream response into an error, keeping the body for the logs.
pub(crate) async fn status_error(resp: reqwest::Response) -> LlmError {
    let status = resp.status().as_u16();
    let body = resp.text().await.unwrap_or_default();
    LlmError::Status { status, body }
}
