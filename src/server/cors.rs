use axum::http::{ header, HeaderMap, HeaderValue };
use url::{ Host, Url };

use crate::config::ConfigError;

pub const ALLOWED_METHODS: &str = "POST, OPTIONS";
pub const ALLOWED_HEADERS: &str = "Content-Type";
pub const PREFLIGHT_MAX_AGE_SECS: u64 = 86_400;

/// Decides which origin goes into `Access-Control-Allow-Origin`.
///
/// A request origin is echoed back only when it exactly matches an allow-listed
/// production origin or points at a loopback host. Anything else, including a missing
/// header, resolves to the first allow-listed origin, which the browser then rejects.
#[derive(Debug, Clone)]
pub struct CorsPolicy {
    allowed: Vec<String>,
    fallback: HeaderValue,
}

impl CorsPolicy {
    pub fn new(allowed: Vec<String>) -> Result<Self, ConfigError> {
        let first = allowed.first().ok_or(ConfigError::NoOrigins)?;
        let fallback = HeaderValue::from_str(first).map_err(|_|
            ConfigError::InvalidOrigin(first.clone())
        )?;
        Ok(Self { allowed, fallback })
    }

    pub fn fallback(&self) -> &HeaderValue {
        &self.fallback
    }

    pub fn resolve(&self, headers: &HeaderMap) -> HeaderValue {
        let Some(value) = headers.get(header::ORIGIN) else {
            return self.fallback.clone();
        };
        match value.to_str() {
            Ok(origin) if self.allows(origin) => value.clone(),
            _ => self.fallback.clone(),
        }
    }

    pub fn allows(&self, origin: &str) -> bool {
        self.allowed.iter().any(|o| o == origin) || is_loopback(origin)
    }
}

fn is_loopback(origin: &str) -> bool {
    let Ok(url) = Url::parse(origin) else {
        return false;
    };
    if !matches!(url.scheme(), "http" | "https") {
        return false;
    }
    match url.host() {
        Some(Host::Domain(domain)) => domain.eq_ignore_ascii_case("localhost"),
        Some(Host::Ipv4(ip)) => ip.is_loopback(),
        Some(Host::Ipv6(ip)) => ip.is_loopback(),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> CorsPolicy {
        CorsPolicy::new(
            vec!["https://boneyardtees.com".into(), "https://www.boneyardtees.com".into()]
        ).unwrap()
    }

    fn with_origin(origin: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::ORIGIN, HeaderValue::from_str(origin).unwrap());
        headers
    }

    #[test]
    fn echoes_allow_listed_origin() {
        let resolved = policy().resolve(&with_origin("https://www.boneyardtees.com"));
        assert_eq!(resolved, "https://www.boneyardtees.com");
    }

    #[test]
    fn echoes_loopback_origins_on_any_port() {
        for origin in ["http://localhost:5173", "http://127.0.0.1:8080", "http://[::1]:3000"] {
            assert_eq!(policy().resolve(&with_origin(origin)), origin);
        }
    }

    #[test]
    fn lookalike_hosts_fall_back() {
        for origin in [
            "http://localhost.evil.example",
            "https://boneyardtees.com.evil.example",
            "https://BONEYARDTEES.com",
            "null",
        ] {
            assert_eq!(policy().resolve(&with_origin(origin)), "https://boneyardtees.com");
        }
    }

    #[test]
    fn missing_origin_falls_back_to_first_entry() {
        assert_eq!(policy().resolve(&HeaderMap::new()), "https://boneyardtees.com");
    }

    #[test]
    fn empty_allow_list_is_rejected() {
        assert!(matches!(CorsPolicy::new(vec![]), Err(ConfigError::NoOrigins)));
    }
}
