//! Rate limiting for the login endpoint.
//!
//! Uses a token bucket algorithm with per-IP tracking to slow down password guessing.

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{Quota, RateLimiter, clock::DefaultClock, state::keyed::DefaultKeyedStateStore};
use std::{num::NonZeroU32, sync::Arc};
use tracing::warn;

use crate::auth::{ClientIpHeader, extract_client_ip};

/// Per-IP rate limiter.
pub type IpLimiter = RateLimiter<String, DefaultKeyedStateStore<String>, DefaultClock>;

const LOGIN_PER_SEC: NonZeroU32 = NonZeroU32::MIN;
const LOGIN_BURST: NonZeroU32 = NonZeroU32::new(5).unwrap();

/// Rate limiting configuration for the login endpoint.
pub struct RateLimitConfig {
    /// Per-IP limiter for login attempts (5 requests, then 1 per second)
    pub login: IpLimiter,
    /// Where to read the client address from
    pub ip_header: Option<ClientIpHeader>,
}

impl RateLimitConfig {
    pub fn new(ip_header: Option<ClientIpHeader>) -> Self {
        Self::with_quota(
            Quota::per_second(LOGIN_PER_SEC).allow_burst(LOGIN_BURST),
            ip_header,
        )
    }

    pub fn with_quota(quota: Quota, ip_header: Option<ClientIpHeader>) -> Self {
        Self {
            login: RateLimiter::keyed(quota),
            ip_header,
        }
    }
}

/// Middleware for rate limiting login attempts.
pub async fn rate_limit_login(
    State(config): State<Arc<RateLimitConfig>>,
    request: Request,
    next: Next,
) -> Response {
    let ip = match extract_client_ip(&request, config.ip_header.as_ref()) {
        Ok(ip) => ip,
        Err(e) => {
            warn!(error = e, "Unable to determine client IP");
            return (StatusCode::FORBIDDEN, "Unable to determine client IP.").into_response();
        }
    };

    match config.login.check_key(&ip) {
        Ok(_) => next.run(request).await,
        Err(_) => {
            warn!(ip = %ip, "Login rate limit exceeded");
            (
                StatusCode::TOO_MANY_REQUESTS,
                "Too many login attempts. Please wait before trying again.",
            )
                .into_response()
        }
    }
}
