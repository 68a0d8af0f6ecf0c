//! Shared state for the session middleware.

use std::sync::Arc;

use axum::http::{HeaderName, header};

use super::cookie::CookieAttributes;
use super::routes::RoutePolicy;
use crate::backend::IdentityBackend;
use crate::token::DEFAULT_EXPIRY_BUFFER_SECS;

/// Response headers passed through from downstream handlers by default.
pub const DEFAULT_FORWARDED_HEADERS: [HeaderName; 5] = [
    header::CONTENT_TYPE,
    header::CONTENT_LENGTH,
    header::LOCATION,
    header::SET_COOKIE,
    header::CACHE_CONTROL,
];

/// Paths and knobs used when resolving and enforcing sessions.
#[derive(Debug, Clone)]
pub struct AuthSettings {
    pub cookies: CookieAttributes,
    /// Login entry point; anonymous page requests are sent here.
    pub login_path: String,
    /// Neutral page for authenticated users lacking a role.
    pub landing_path: String,
    /// Page where accounts without a password must go first.
    pub setup_path: String,
    /// Seconds before `exp` at which a token already counts as dead.
    pub expiry_buffer_secs: i64,
    /// Allow-list of downstream response headers.
    pub forwarded_headers: Vec<HeaderName>,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            cookies: CookieAttributes::default(),
            login_path: "/account/login".into(),
            landing_path: "/".into(),
            setup_path: "/account/setup-password".into(),
            expiry_buffer_secs: DEFAULT_EXPIRY_BUFFER_SECS,
            forwarded_headers: DEFAULT_FORWARDED_HEADERS.to_vec(),
        }
    }
}

/// State handed to the session middleware and the account handlers.
pub struct AuthState<B> {
    pub backend: Arc<B>,
    pub policy: Arc<RoutePolicy>,
    pub settings: Arc<AuthSettings>,
}

impl<B: IdentityBackend> AuthState<B> {
    pub fn new(backend: B, policy: RoutePolicy, settings: AuthSettings) -> Self {
        Self {
            backend: Arc::new(backend),
            policy: Arc::new(policy),
            settings: Arc::new(settings),
        }
    }
}

// Manual impl: `B` itself need not be `Clone`.
impl<B> Clone for AuthState<B> {
    fn clone(&self) -> Self {
        Self {
            backend: self.backend.clone(),
            policy: self.policy.clone(),
            settings: self.settings.clone(),
        }
    }
}
