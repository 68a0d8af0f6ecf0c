mod account;
mod session;

use axum::Router;
use std::sync::Arc;

use crate::auth::AuthState;
use crate::backend::IdentityBackend;
use crate::rate_limit::RateLimitConfig;

pub use account::LOGOUT_PATH;
pub use session::SESSION_PATH;

/// Routes served by the gateway itself: login, logout and the session probe.
pub fn create_api_router<B: IdentityBackend>(
    state: AuthState<B>,
    limits: Arc<RateLimitConfig>,
) -> Router {
    Router::new()
        .merge(account::router(state, limits))
        .merge(session::router())
}
