pub mod prompt;

use crate::cli::ServeArgs;
use axum::http::HeaderName;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be greater than zero")]
    Zero(&'static str),
    #[error("at least one allowed origin is required")]
    NoOrigins,
    #[error("invalid client IP header '{0}'")]
    InvalidHeader(String),
    #[error("invalid allowed origin '{0}'")]
    InvalidOrigin(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitSettings {
    pub window: Duration,
    pub max_requests: u32,
    pub sweep_interval: Duration,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            window: Duration::from_secs(60),
            max_requests: 10,
            sweep_interval: Duration::from_secs(60),
        }
    }
}

/// Immutable limits the proxy enforces on every request.
#[derive(Debug, Clone)]
pub struct ProxySettings {
    pub max_message_chars: usize,
    pub history_limit: usize,
    pub max_output_tokens: u32,
    pub rate_limit: RateLimitSettings,
    pub allowed_origins: Vec<String>,
    pub client_ip_header: Option<HeaderName>,
}

impl Default for ProxySettings {
    fn default() -> Self {
        Self {
            max_message_chars: 2000,
            history_limit: 10,
            max_output_tokens: 200,
            rate_limit: RateLimitSettings::default(),
            allowed_origins: vec![
                "https://boneyardtees.com".to_string(),
                "https://www.boneyardtees.com".to_string(),
                "https://boneyard-tees-site.pages.dev".to_string()
            ],
            client_ip_header: None,
        }
    }
}

impl ProxySettings {
    pub fn from_args(args: &ServeArgs) -> Result<Self, ConfigError> {
        if args.max_message_chars == 0 {
            return Err(ConfigError::Zero("max_message_chars"));
        }
        if args.max_output_tokens == 0 {
            return Err(ConfigError::Zero("max_output_tokens"));
        }
        if args.upstream_timeout_secs == 0 {
            return Err(ConfigError::Zero("upstream_timeout_secs"));
        }
        if args.rate_limit_window_secs == 0 {
            return Err(ConfigError::Zero("rate_limit_window_secs"));
        }
        if args.rate_limit_max_requests == 0 {
            return Err(ConfigError::Zero("rate_limit_max_requests"));
        }
        if args.rate_limit_sweep_secs == 0 {
            return Err(ConfigError::Zero("rate_limit_sweep_secs"));
        }

        let allowed_origins: Vec<String> = args.allowed_origins
            .iter()
            .map(|o| o.trim().trim_end_matches('/').to_string())
            .filter(|o| !o.is_empty())
            .collect();
        if allowed_origins.is_empty() {
            return Err(ConfigError::NoOrigins);
        }

        let client_ip_header = match args.client_ip_header.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => {
                Some(
                    HeaderName::from_bytes(name.as_bytes()).map_err(|_|
                        ConfigError::InvalidHeader(name.to_string())
                    )?
                )
            }
            _ => None,
        };

        Ok(Self {
            max_message_chars: args.max_message_chars,
            history_limit: args.history_limit,
            max_output_tokens: args.max_output_tokens,
            rate_limit: RateLimitSettings {
                window: Duration::from_secs(args.rate_limit_window_secs),
                max_requests: args.rate_limit_max_requests,
                sweep_interval: Duration::from_secs(args.rate_limit_sweep_secs),
            },
            allowed_origins,
            client_ip_header,
        })
    }
}
