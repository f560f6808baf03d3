//! Security configuration and rate limiting for the HTTP API.

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{HeaderValue, Method, Request},
    middleware::Next,
    response::Response,
};
use std::{
    collections::HashMap,
    net::{IpAddr, Ipv4Addr, SocketAddr},
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use super::error::ApiError;

const DEFAULT_SESSION_TTL_DAYS: i64 = 30;
const DEFAULT_AUTH_RATE_LIMIT: u32 = 20;

/// Security configuration loaded from environment variables.
#[derive(Clone, Debug)]
pub struct SecurityConfig {
    /// Allowed CORS origins (from NOTEKEEP_CORS_ORIGINS, comma-separated).
    /// `None` means any origin.
    pub cors_origins: Option<Vec<String>>,
    /// Limiter applied to register and login.
    pub auth_rate_limiter: Option<RateLimiter>,
    /// Lifetime of a login token (from NOTEKEEP_SESSION_TTL_DAYS).
    pub session_ttl: chrono::Duration,
    /// Take the client IP from `X-Forwarded-For`/`X-Real-IP` (from
    /// NOTEKEEP_TRUST_PROXY). Only safe behind a proxy that overwrites them.
    pub trust_proxy: bool,
}

impl SecurityConfig {
    /// Load security configuration from environment variables.
    pub fn from_env() -> Self {
        let cors_origins = std::env::var("NOTEKEEP_CORS_ORIGINS").ok().map(|s| {
            s.split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        });

        let rate_limit = std::env::var("NOTEKEEP_AUTH_RATE_LIMIT")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(DEFAULT_AUTH_RATE_LIMIT);

        let ttl_days = std::env::var("NOTEKEEP_SESSION_TTL_DAYS")
            .ok()
            .and_then(|s| s.parse::<i64>().ok())
            .filter(|days| *days > 0)
            .unwrap_or(DEFAULT_SESSION_TTL_DAYS);

        let trust_proxy = std::env::var("NOTEKEEP_TRUST_PROXY")
            .map(|s| matches!(s.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        Self {
            cors_origins,
            trust_proxy,
            // Zero disables the limiter.
            auth_rate_limiter: (rate_limit > 0)
                .then(|| RateLimiter::new(rate_limit, Duration::from_secs(60))),
            session_ttl: chrono::Duration::days(ttl_days),
        }
    }

    /// No rate limiting and permissive CORS (for local development/testing).
    pub fn disabled() -> Self {
        Self {
            cors_origins: None,
            auth_rate_limiter: None,
            session_ttl: chrono::Duration::days(DEFAULT_SESSION_TTL_DAYS),
            trust_proxy: false,
        }
    }

    /// Create a config with auth rate limiting enabled.
    pub fn with_auth_rate_limit(max_requests: u32) -> Self {
        Self {
            auth_rate_limiter: Some(RateLimiter::new(max_requests, Duration::from_secs(60))),
            ..Self::disabled()
        }
    }

    /// Key the rate limiter on forwarding headers instead of the socket peer.
    pub fn trusting_proxy(mut self) -> Self {
        self.trust_proxy = true;
        self
    }

    /// Create a config with specific CORS origins.
    pub fn with_cors_origins(origins: Vec<String>) -> Self {
        Self {
            cors_origins: Some(origins),
            ..Self::disabled()
        }
    }

    pub fn cors_layer(&self) -> CorsLayer {
        let Some(origins) = &self.cors_origins else {
            return CorsLayer::permissive();
        };

        let origins: Vec<HeaderValue> = origins
            .iter()
            .filter_map(|o| match HeaderValue::from_str(o) {
                Ok(v) => Some(v),
                Err(_) => {
                    tracing::warn!("Ignoring invalid CORS origin: {}", o);
                    None
                }
            })
            .collect();

        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PATCH,
                Method::DELETE,
            ])
            .allow_headers(Any)
    }
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

/// Simple in-memory rate limiter using a sliding window.
#[derive(Clone, Debug)]
pub struct RateLimiter {
    max_requests: u32,
    window: Duration,
    requests: Arc<Mutex<HashMap<IpAddr, Vec<Instant>>>>,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            requests: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Record a request from `ip`. Returns false if it is over the limit.
    pub fn check(&self, ip: IpAddr) -> bool {
        let now = Instant::now();

        let mut requests = self.requests.lock().expect("rate limiter lock poisoned");
        let entry = requests.entry(ip).or_default();

        entry.retain(|&t| now.duration_since(t) < self.window);

        if entry.len() < self.max_requests as usize {
            entry.push(now);
            true
        } else {
            false
        }
    }

    /// Forget clients with no requests inside the window.
    pub fn cleanup(&self) {
        let now = Instant::now();
        let mut requests = self.requests.lock().expect("rate limiter lock poisoned");

        requests.retain(|_, timestamps| {
            timestamps.retain(|&t| now.duration_since(t) < self.window);
            !timestamps.is_empty()
        });
    }

    pub fn tracked_clients(&self) -> usize {
        self.requests
            .lock()
            .expect("rate limiter lock poisoned")
            .len()
    }
}

/// Rate limiting middleware for the auth routes. Installed only when the
/// config carries a limiter.
pub async fn rate_limit_middleware(
    State(config): State<SecurityConfig>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(rate_limiter) = &config.auth_rate_limiter else {
        return Ok(next.run(request).await);
    };
    let ip = extract_client_ip(&request, config.trust_proxy);

    if rate_limiter.check(ip) {
        Ok(next.run(request).await)
    } else {
        tracing::warn!("Rate limit exceeded for IP: {}", ip);
        Err(ApiError::RateLimited)
    }
}

/// Client IP for rate limiting: the socket peer, or the first forwarding
/// header when `trust_proxy` is set. Falls back to localhost when the server
/// was started without connect info.
fn extract_client_ip(request: &Request<Body>, trust_proxy: bool) -> IpAddr {
    let header_ip = |name: &str| {
        request
            .headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .and_then(|v| v.trim().parse::<IpAddr>().ok())
    };
    let peer_ip = || {
        request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip())
    };

    let forwarded = if trust_proxy {
        header_ip("X-Forwarded-For").or_else(|| header_ip("X-Real-IP"))
    } else {
        None
    };

    forwarded
        .or_else(peer_ip)
        .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST))
}
