use async_trait::async_trait;
use log::debug;
use reqwest::{ Client as HttpClient, StatusCode };
use std::fmt;
use std::time::Duration;
use thiserror::Error;

use crate::models::chat::{ ChatRequest, ChatResponse };

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The request never completed: DNS, refused connection, dropped socket.
    Unreachable,
    Timeout,
    MalformedResponse,
    Generic,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FailureKind::Unreachable => "unreachable",
            FailureKind::Timeout => "timeout",
            FailureKind::MalformedResponse => "malformed response",
            FailureKind::Generic => "failed",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
#[error("{kind}: {detail}")]
pub struct TransportError {
    pub kind: FailureKind,
    pub detail: String,
}

impl TransportError {
    pub fn new(kind: FailureKind, detail: impl Into<String>) -> Self {
        Self { kind, detail: detail.into() }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            FailureKind::Timeout
        } else if err.is_decode() || err.is_body() {
            FailureKind::MalformedResponse
        } else {
            FailureKind::Unreachable
        };
        Self::new(kind, err.to_string())
    }
}

/// A well-formed proxy answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProxyReply {
    Success {
        message: String,
    },
    /// The proxy understood the request but could not answer it.
    Failure {
        error: Option<String>,
    },
}

impl TryFrom<ChatResponse> for ProxyReply {
    type Error = TransportError;

    fn try_from(body: ChatResponse) -> Result<Self, Self::Error> {
        match body {
            ChatResponse { success: Some(true), message: Some(message), .. } => {
                Ok(ProxyReply::Success { message })
            }
            ChatResponse { success: Some(false), error, .. } => Ok(ProxyReply::Failure { error }),
            ChatResponse { success: Some(true), .. } => {
                Err(TransportError::new(FailureKind::MalformedResponse, "success without message"))
            }
            ChatResponse { success: None, .. } => {
                Err(TransportError::new(FailureKind::MalformedResponse, "missing success flag"))
            }
        }
    }
}

#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn send(&self, request: &ChatRequest) -> Result<ProxyReply, TransportError>;
}

pub struct HttpTransport {
    http: HttpClient,
    endpoint: String,
}

impl HttpTransport {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = HttpClient::builder().timeout(timeout).build()?;
        Ok(Self { http, endpoint: endpoint.into() })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

fn status_failure(status: StatusCode) -> TransportError {
    let kind = match status {
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => FailureKind::Timeout,
        _ => FailureKind::Generic,
    };
    TransportError::new(kind, format!("proxy returned {}", status))
}

#[async_trait]
impl ChatTransport for HttpTransport {
    async fn send(&self, request: &ChatRequest) -> Result<ProxyReply, TransportError> {
        let resp = self.http.post(&self.endpoint).json(request).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(status_failure(status));
        }

        let bytes = resp.bytes().await?;
        let body: ChatResponse = serde_json
            ::from_slice(&bytes)
            .map_err(|e| TransportError::new(FailureKind::MalformedResponse, e.to_string()))?;
        debug!("Proxy answered {} ({} bytes)", status, bytes.len());
        ProxyReply::try_from(body)
    }
}
