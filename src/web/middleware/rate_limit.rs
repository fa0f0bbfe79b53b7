//! Per-client rate limiting for credential and download endpoints.

use axum::{
    body::Body,
    extract::ConnectInfo,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{
    clock::DefaultClock, state::keyed::DefaultKeyedStateStore, Quota, RateLimiter,
};
use std::{net::SocketAddr, num::NonZeroU32, sync::Arc, time::Duration};

use crate::web::error::ApiError;

/// Rate limiter keyed by client address.
pub type ClientRateLimiter = RateLimiter<String, DefaultKeyedStateStore<String>, DefaultClock>;

fn per_minute(requests: u32) -> ClientRateLimiter {
    let quota = Quota::per_minute(NonZeroU32::new(requests).unwrap_or(NonZeroU32::MIN));
    RateLimiter::keyed(quota)
}

/// Limiters for the two throttled route groups.
pub struct RateLimitState {
    auth: ClientRateLimiter,
    download: ClientRateLimiter,
    auth_rate_limit: u32,
    download_rate_limit: u32,
}

impl RateLimitState {
    /// Create limiters allowing the given requests per minute per client.
    pub fn new(auth_rate_limit: u32, download_rate_limit: u32) -> Self {
        Self {
            auth: per_minute(auth_rate_limit),
            download: per_minute(download_rate_limit),
            auth_rate_limit,
            download_rate_limit,
        }
    }

    /// Whether a credential request from `client` may proceed.
    pub fn check_auth(&self, client: &str) -> bool {
        self.auth.check_key(&client.to_string()).is_ok()
    }

    /// Whether a share download from `client` may proceed.
    pub fn check_download(&self, client: &str) -> bool {
        self.download.check_key(&client.to_string()).is_ok()
    }

    /// Drop state for clients whose quota has fully replenished.
    pub fn cleanup(&self) {
        self.auth.retain_recent();
        self.download.retain_recent();
    }

    /// Start a background task to periodically clean up old entries.
    pub fn start_cleanup_task(self: Arc<Self>) {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(300));
            interval.tick().await;
            loop {
                interval.tick().await;
                self.cleanup();
            }
        });
    }
}

impl std::fmt::Debug for RateLimitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimitState")
            .field("auth_rate_limit", &self.auth_rate_limit)
            .field("download_rate_limit", &self.download_rate_limit)
            .finish_non_exhaustive()
    }
}

/// Extract client IP from request.
fn client_ip(req: &Request<Body>) -> String {
    // First hop of X-Forwarded-For when behind a reverse proxy
    if let Some(forwarded) = req
        .headers()
        .get("X-Forwarded-For")
        .and_then(|v| v.to_str().ok())
    {
        if let Some(ip) = forwarded.split(',').next() {
            let ip = ip.trim();
            if !ip.is_empty() {
                return ip.to_string();
            }
        }
    }

    if let Some(real_ip) = req
        .headers()
        .get("X-Real-IP")
        .and_then(|v| v.to_str().ok())
    {
        return real_ip.trim().to_string();
    }

    if let Some(ConnectInfo(addr)) = req.extensions().get::<ConnectInfo<SocketAddr>>() {
        return addr.ip().to_string();
    }

    "unknown".to_string()
}

/// Rate limiting middleware for auth endpoints.
pub async fn auth_rate_limit(
    state: Arc<RateLimitState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let ip = client_ip(&req);

    if !state.check_auth(&ip) {
        tracing::warn!(ip = %ip, "Auth rate limit exceeded");
        return ApiError::too_many_requests("Too many attempts. Please try again later.")
            .into_response();
    }

    next.run(req).await
}

/// Rate limiting middleware for public share downloads.
pub async fn download_rate_limit(
    state: Arc<RateLimitState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let ip = client_ip(&req);

    if !state.check_download(&ip) {
        tracing::warn!(ip = %ip, "Download rate limit exceeded");
        return ApiError::too_many_requests("Too many downloads. Please try again later.")
            .into_response();
    }

    next.run(req).await
}
