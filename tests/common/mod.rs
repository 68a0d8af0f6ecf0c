#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::{
    Json, Router,
    body::Body,
    http::{HeaderValue, Request, Response, StatusCode},
    response::IntoResponse,
    routing::get,
};
use chrono::Utc;
use jsonwebtoken::{EncodingKey, Header, encode};
use ticketgate::auth::{
    AuthSettings, ClientIpHeader, CurrentUser, Identity, MaybeUser, RoutePolicy, TokenPair,
};
use ticketgate::backend::{
    AuthContext, BackendConfig, BackendError, BackendResponse, IdentityBackend, LoginCredentials,
    RefreshGrant,
};
use ticketgate::{GatewayConfig, create_app};
use url::Url;

/// Mint an unsigned-by-the-gateway token expiring `exp_offset` seconds from now.
pub fn jwt(sub: &str, exp_offset: i64) -> String {
    let exp = Utc::now().timestamp() + exp_offset;
    encode(
        &Header::default(),
        &serde_json::json!({ "sub": sub, "exp": exp }),
        &EncodingKey::from_secret(b"backend-secret"),
    )
    .unwrap()
}

pub fn identity(username: &str, roles: &[&str]) -> Identity {
    Identity {
        id: format!("id-{}", username),
        username: username.to_string(),
        first_name: "Test".into(),
        last_name: "User".into(),
        roles: roles.iter().map(|r| r.to_string()).collect(),
        email: Some(format!("{}@example.com", username)),
        password_setup: None,
    }
}

/// Call counters shared between a test and the backend it handed to the app.
#[derive(Clone, Default)]
pub struct Calls {
    identity: Arc<AtomicUsize>,
    refresh: Arc<AtomicUsize>,
    revoke: Arc<AtomicUsize>,
    login: Arc<AtomicUsize>,
    last_bearer: Arc<Mutex<Option<String>>>,
    revoked: Arc<Mutex<Vec<String>>>,
}

impl Calls {
    pub fn identity(&self) -> usize {
        self.identity.load(Ordering::SeqCst)
    }

    pub fn refresh(&self) -> usize {
        self.refresh.load(Ordering::SeqCst)
    }

    pub fn revoke(&self) -> usize {
        self.revoke.load(Ordering::SeqCst)
    }

    pub fn login(&self) -> usize {
        self.login.load(Ordering::SeqCst)
    }

    pub fn last_bearer(&self) -> Option<String> {
        self.last_bearer.lock().unwrap().clone()
    }

    /// Refresh tokens passed to `revoke`, in call order.
    pub fn revoked_tokens(&self) -> Vec<String> {
        self.revoked.lock().unwrap().clone()
    }
}

#[derive(Clone)]
pub enum RefreshBehavior {
    Grant(RefreshGrant),
    Status(StatusCode),
    Unreachable,
}

/// Scripted identity backend.
///
/// Access tokens in `users` resolve to that identity; anything else is 401.
/// With `identity_error` set, every identity fetch fails with that decode error.
pub struct FakeBackend {
    pub users: HashMap<String, Identity>,
    pub identity_error: Option<String>,
    pub refresh: RefreshBehavior,
    pub login: Option<TokenPair>,
    pub calls: Calls,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self {
            users: HashMap::new(),
            identity_error: None,
            refresh: RefreshBehavior::Status(StatusCode::UNAUTHORIZED),
            login: None,
            calls: Calls::default(),
        }
    }

    pub fn with_user(mut self, access_token: &str, identity: Identity) -> Self {
        self.users.insert(access_token.to_string(), identity);
        self
    }

    pub fn with_identity_error(mut self, error: &str) -> Self {
        self.identity_error = Some(error.to_string());
        self
    }

    pub fn with_refresh(mut self, refresh: RefreshBehavior) -> Self {
        self.refresh = refresh;
        self
    }

    pub fn with_login(mut self, pair: TokenPair) -> Self {
        self.login = Some(pair);
        self
    }
}

impl IdentityBackend for FakeBackend {
    async fn fetch_current_identity(
        &self,
        auth: &AuthContext,
    ) -> Result<BackendResponse<Identity>, BackendError> {
        self.calls.identity.fetch_add(1, Ordering::SeqCst);
        *self.calls.last_bearer.lock().unwrap() = auth.token().map(str::to_string);
        if let Some(error) = &self.identity_error {
            return Err(BackendError::Decode(error.clone()));
        }
        match auth.token().and_then(|t| self.users.get(t)) {
            Some(identity) => Ok(BackendResponse::ok(identity.clone())),
            None => Ok(BackendResponse::status(StatusCode::UNAUTHORIZED)),
        }
    }

    async fn refresh(
        &self,
        _refresh_token: &str,
    ) -> Result<BackendResponse<RefreshGrant>, BackendError> {
        self.calls.refresh.fetch_add(1, Ordering::SeqCst);
        match &self.refresh {
            RefreshBehavior::Grant(grant) => Ok(BackendResponse::ok(grant.clone())),
            RefreshBehavior::Status(status) => Ok(BackendResponse::status(*status)),
            RefreshBehavior::Unreachable => Err(BackendError::Decode("connection reset".into())),
        }
    }

    async fn revoke(
        &self,
        _auth: &AuthContext,
        refresh_token: &str,
    ) -> Result<StatusCode, BackendError> {
        self.calls.revoke.fetch_add(1, Ordering::SeqCst);
        self.calls
            .revoked
            .lock()
            .unwrap()
            .push(refresh_token.to_string());
        Ok(StatusCode::NO_CONTENT)
    }

    async fn login(
        &self,
        credentials: &LoginCredentials,
    ) -> Result<BackendResponse<TokenPair>, BackendError> {
        self.calls.login.fetch_add(1, Ordering::SeqCst);
        match &self.login {
            Some(pair) if credentials.password == "correct horse" => {
                Ok(BackendResponse::ok(pair.clone()))
            }
            _ => Ok(BackendResponse::status(StatusCode::UNAUTHORIZED)),
        }
    }
}

/// Header the rate limiter reads the client address from.
pub const CLIENT_IP_HEADER: &str = "x-forwarded-for";

pub fn test_config() -> GatewayConfig {
    GatewayConfig {
        backend: BackendConfig::new(Url::parse("http://backend.invalid").unwrap()),
        settings: AuthSettings::default(),
        policy: RoutePolicy::platform(),
        ip_header: Some(ClientIpHeader::parse(CLIENT_IP_HEADER).unwrap()),
    }
}

async fn profile(CurrentUser(user): CurrentUser) -> String {
    format!("profile:{}", user.username)
}

async fn who(MaybeUser(user): MaybeUser) -> String {
    match user {
        Some(user) => format!("hello:{}", user.username),
        None => "hello:anonymous".to_string(),
    }
}

async fn orders(CurrentUser(user): CurrentUser) -> Json<serde_json::Value> {
    Json(serde_json::json!({ "owner": user.username, "orders": [] }))
}

async fn boom() -> &'static str {
    panic!("database password is hunter2");
}

async fn leaky() -> impl IntoResponse {
    let mut response = "leaky".into_response();
    response
        .headers_mut()
        .insert("x-upstream-server", HeaderValue::from_static("internal-7"));
    response
}

/// Downstream pages used by the integration tests.
pub fn pages() -> Router {
    Router::new()
        .route("/", get(who))
        .route("/events/{id}", get(who))
        .route("/events/{id}/ticket", get(profile))
        .route("/menu/profile", get(profile))
        .route("/menu/leaky", get(leaky))
        .route("/admin", get(who))
        .route("/admin/events", get(who))
        .route("/api/(protected)/orders", get(orders))
        .route("/manager/{org}/owner/view-events", get(who))
        .route("/manager/{org}/staff/view-events", get(who))
        .route("/account/setup-password", get(who))
        .route("/boom", get(boom))
}

/// Full app around `backend`, with the returned counters observing it.
pub fn test_app(backend: FakeBackend) -> (Router, Calls) {
    let calls = backend.calls.clone();
    (create_app(backend, pages(), &test_config()), calls)
}

pub fn get_with_cookies(uri: &str, cookies: &[(&str, &str)]) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if !cookies.is_empty() {
        let header = cookies
            .iter()
            .map(|(name, value)| format!("{}={}", name, value))
            .collect::<Vec<_>>()
            .join("; ");
        builder = builder.header("cookie", header);
    }
    builder.body(Body::empty()).unwrap()
}

pub fn extract_set_cookies(response: &Response<Body>) -> Vec<String> {
    response
        .headers()
        .get_all("set-cookie")
        .iter()
        .filter_map(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .collect()
}

/// Check if cookies contain a token being cleared (Max-Age=0)
pub fn has_cleared_cookie(cookies: &[String], cookie_name: &str) -> bool {
    cookies
        .iter()
        .any(|c| c.starts_with(&format!("{}=;", cookie_name)) && c.contains("Max-Age=0"))
}

pub fn location(response: &Response<Body>) -> Option<&str> {
    response
        .headers()
        .get("location")
        .and_then(|v| v.to_str().ok())
}

pub async fn body_string(response: Response<Body>) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}
