//! Account endpoints.
//!
//! - POST `{login_path}` - Exchange username/password for a token pair
//! - GET `/account/logout` - Revoke the refresh token and clear cookies

use axum::{
    Form, Router,
    extract::{Query, State},
    middleware,
    response::Response,
    routing::{get, post},
};
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::auth::{AuthSettings, AuthState, CredentialStore, CurrentRefreshToken};
use crate::backend::{AuthContext, IdentityBackend, LoginCredentials};
use crate::pipeline::found;
use crate::rate_limit::{RateLimitConfig, rate_limit_login};

pub const LOGOUT_PATH: &str = "/account/logout";

pub fn router<B: IdentityBackend>(state: AuthState<B>, limits: Arc<RateLimitConfig>) -> Router {
    let login_path = state.settings.login_path.clone();
    let login = Router::new()
        .route(&login_path, post(login::<B>))
        .route_layer(middleware::from_fn_with_state(limits, rate_limit_login));

    Router::new()
        .route(LOGOUT_PATH, get(logout::<B>))
        .merge(login)
        .with_state(state)
}

#[derive(Deserialize)]
struct LoginForm {
    username: String,
    password: String,
}

#[derive(Deserialize, Default)]
struct ReturnTo {
    redirect: Option<String>,
}

/// Only same-site absolute paths are followed after login.
///
/// Browsers drop tabs and newlines from URLs, so `/\t/host` would turn into
/// `//host`; any whitespace or control character rejects the target.
fn safe_return_target<'a>(raw: Option<&'a str>, landing: &'a str) -> &'a str {
    match raw {
        Some(target)
            if target.starts_with('/')
                && !target.starts_with("//")
                && !target.contains('\\')
                && !target.chars().any(|c| c.is_control() || c.is_whitespace()) =>
        {
            target
        }
        _ => landing,
    }
}

fn login_failed(settings: &AuthSettings, code: &str, redirect: Option<&str>) -> Response {
    let mut target = format!("{}?error={}", settings.login_path, code);
    if let Some(redirect) = redirect {
        target.push_str("&redirect=");
        target.push_str(&urlencoding::encode(redirect));
    }
    found(&target)
}

async fn login<B: IdentityBackend>(
    State(state): State<AuthState<B>>,
    Query(query): Query<ReturnTo>,
    Form(form): Form<LoginForm>,
) -> Response {
    let settings = state.settings.as_ref();
    let redirect = query.redirect.as_deref();
    let credentials = LoginCredentials {
        username: form.username,
        password: form.password,
    };

    let pair = match state.backend.login(&credentials).await {
        Ok(response) => {
            let status = response.status;
            match response.into_success() {
                Some(pair) => pair,
                None => {
                    debug!(username = %credentials.username, status = %status, "Login rejected");
                    return login_failed(settings, "invalid_credentials", redirect);
                }
            }
        }
        Err(e) => {
            error!(error = %e, "Login request to backend failed");
            return login_failed(settings, "unavailable", redirect);
        }
    };

    info!(username = %credentials.username, "User logged in");

    let mut store = CredentialStore::empty(settings.cookies);
    store.store_pair(&pair, Utc::now());
    let mut response = found(safe_return_target(redirect, &settings.landing_path));
    store.apply(&mut response);
    response
}

/// Revokes the refresh token the session middleware ended up with, which is
/// the rotated one if the middleware just refreshed.
async fn logout<B: IdentityBackend>(
    State(state): State<AuthState<B>>,
    auth: AuthContext,
    CurrentRefreshToken(refresh_token): CurrentRefreshToken,
) -> Response {
    if let Some(refresh_token) = refresh_token.as_deref() {
        match state.backend.revoke(&auth, refresh_token).await {
            Ok(status) if status.is_success() => debug!("Refresh token revoked"),
            Ok(status) => debug!(status = %status, "Backend refused token revocation"),
            Err(e) => warn!(error = %e, "Failed to revoke refresh token"),
        }
    }

    let mut store = CredentialStore::empty(state.settings.cookies);
    store.clear();
    let mut response = found(&state.settings.login_path);
    store.apply(&mut response);
    response
}
