//! Session middleware wrapped around every route.
//!
//! Per request: classify the route, resolve the session from cookies, decide,
//! then either answer directly (redirect / JSON error) or run the handler with
//! the identity attached. Queued cookie writes are applied to whatever
//! response goes out.

use std::panic::AssertUnwindSafe;

use axum::{
    Json, Router,
    extract::{MatchedPath, Request, State},
    http::{HeaderMap, StatusCode, header},
    middleware::{self, Next},
    response::{IntoResponse, Response},
};
use futures::FutureExt;
use serde::Serialize;
use tracing::{debug, error};

use crate::auth::{
    AuthState, CredentialStore, CurrentIdentity, CurrentRefreshToken, Decision, SessionResolver,
    decide,
};
use crate::backend::IdentityBackend;

#[derive(Serialize)]
struct ErrorResponse {
    error: &'static str,
}

/// Generic failure for anything the downstream handler did not handle.
pub fn internal_error() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse {
            error: "Internal server error",
        }),
    )
        .into_response()
}

/// 302 to `target`.
pub fn found(target: &str) -> Response {
    match header::HeaderValue::from_str(target) {
        Ok(location) => (StatusCode::FOUND, [(header::LOCATION, location)]).into_response(),
        Err(e) => {
            error!(target = %target, error = %e, "Invalid redirect target");
            internal_error()
        }
    }
}

/// Wrap every route of `router` in the session middleware.
///
/// Must be called after all routes are added.
pub fn protect<B: IdentityBackend>(router: Router, state: AuthState<B>) -> Router {
    router.layer(middleware::from_fn_with_state(
        state,
        session_middleware::<B>,
    ))
}

/// The session middleware itself.
pub async fn session_middleware<B: IdentityBackend>(
    State(state): State<AuthState<B>>,
    mut request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    let route_id = request
        .extensions()
        .get::<MatchedPath>()
        .map(|m| m.as_str().to_string());

    let classification = state.policy.classify(&path, route_id.as_deref());
    let mut store = CredentialStore::from_headers(request.headers(), state.settings.cookies);
    let mut resolver = SessionResolver::new(state.backend.as_ref(), state.settings.as_ref());
    let outcome = resolver
        .resolve(&mut store, classification.requires_auth)
        .await;

    let mut response = match decide(&classification, &outcome, &path, &state.settings) {
        Decision::Allow => {
            let extensions = request.extensions_mut();
            extensions.insert(CurrentIdentity(outcome.identity().cloned()));
            extensions.insert(resolver.auth_context());
            extensions.insert(CurrentRefreshToken(
                store.refresh_token().map(str::to_string),
            ));

            match AssertUnwindSafe(next.run(request)).catch_unwind().await {
                Ok(mut response) => {
                    filter_headers(response.headers_mut(), &state.settings.forwarded_headers);
                    response
                }
                Err(panic) => {
                    let cause = panic
                        .downcast_ref::<&str>()
                        .map(|s| s.to_string())
                        .or_else(|| panic.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| "unknown panic".to_string());
                    error!(path = %path, cause = %cause, "Handler panicked");
                    internal_error()
                }
            }
        }
        Decision::Redirect(target) => {
            debug!(path = %path, target = %target, "Redirecting");
            found(&target)
        }
        Decision::Reject(err) => {
            debug!(path = %path, error = %err, "Rejecting API request");
            err.into_response()
        }
    };

    store.apply(&mut response);
    response
}

/// Drop every header not in `allowed`.
fn filter_headers(headers: &mut HeaderMap, allowed: &[header::HeaderName]) {
    let dropped: Vec<header::HeaderName> = headers
        .keys()
        .filter(|name| !allowed.contains(name))
        .cloned()
        .collect();
    for name in dropped {
        headers.remove(&name);
    }
}
