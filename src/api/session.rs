//! GET `/api/session` - the current identity, or `null`.

use axum::{Json, Router, routing::get};

use crate::auth::{Identity, MaybeUser};

pub const SESSION_PATH: &str = "/api/session";

pub fn router() -> Router {
    Router::new().route(SESSION_PATH, get(current_session))
}

async fn current_session(MaybeUser(identity): MaybeUser) -> Json<Option<Identity>> {
    Json(identity)
}
