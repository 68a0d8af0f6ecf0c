pub mod api;
pub mod auth;
pub mod backend;
pub mod cli;
pub mod pipeline;
pub mod rate_limit;
pub mod token;

use api::create_api_router;
use auth::{AuthSettings, AuthState, ClientIpHeader, RoutePolicy};
use axum::Router;
use backend::{BackendConfig, HttpIdentityBackend, IdentityBackend};
use pipeline::protect;
use rate_limit::RateLimitConfig;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

/// Everything the gateway needs at startup.
///
/// Downstream pages are not part of it: the bundled binary serves only the
/// account and session endpoints, so allowed requests for any other path
/// end in 404. Embedders pass their pages to [`create_app`].
pub struct GatewayConfig {
    /// Identity backend location and timeout
    pub backend: BackendConfig,
    /// Cookie attributes, login/landing paths, expiry buffer
    pub settings: AuthSettings,
    /// Route classification table
    pub policy: RoutePolicy,
    /// IP extraction strategy (requires running behind a proxy)
    pub ip_header: Option<ClientIpHeader>,
}

/// Create the application router.
///
/// `pages` holds the downstream routes; every route, including the gateway's
/// own account endpoints, runs behind the session middleware.
pub fn create_app<B: IdentityBackend>(backend: B, pages: Router, config: &GatewayConfig) -> Router {
    let state = AuthState::new(backend, config.policy.clone(), config.settings.clone());
    let limits = Arc::new(RateLimitConfig::new(config.ip_header.clone()));

    let router = pages.merge(create_api_router(state.clone(), limits));
    protect(router, state)
}

/// Run the server on the given listener. This function blocks until the server exits.
///
/// Mounts no downstream pages; only the account and session endpoints answer.
pub async fn run_server(config: GatewayConfig, listener: TcpListener) -> Result<(), std::io::Error> {
    let backend = HttpIdentityBackend::new(config.backend.clone()).map_err(std::io::Error::other)?;
    let app = create_app(backend, Router::new(), &config);
    let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
    axum::serve(listener, make_service).await
}

/// Start the server on the given port in a background task. Use port 0 to let the OS choose a random port.
/// Returns the actual address the server is listening on.
/// Note: For production use, prefer `run_server` directly in main.
pub async fn start_server(
    config: GatewayConfig,
    port: u16,
) -> Result<(tokio::task::JoinHandle<()>, SocketAddr), std::io::Error> {
    let listener = TcpListener::bind(("127.0.0.1", port)).await?;
    let local_addr = listener.local_addr()?;

    let handle = tokio::spawn(async move {
        if let Err(e) = run_server(config, listener).await {
            tracing::error!(error = %e, "Server error");
        }
    });

    Ok((handle, local_addr))
}
