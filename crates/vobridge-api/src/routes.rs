//! Router setup with all API routes and middleware.

use std::future::Future;
use std::net::SocketAddr;

use axum::http::Method;
use axum::routing::get;
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use vobridge_core::config::BRIDGE_PORT;
use vobridge_core::error::BridgeError;

use crate::handlers;
use crate::state::AppState;

/// Create the axum Router with all routes and middleware.
pub fn create_router(state: AppState) -> Router {
    // Remote clients may be browser pages served from anywhere.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET]);

    Router::new()
        .route("/phrase", get(handlers::phrase))
        .route("/move", get(handlers::move_missing))
        .route("/move/", get(handlers::move_missing))
        .route("/move/{direction}", get(handlers::move_cursor))
        .route("/select", get(handlers::select))
        .route("/status", get(handlers::status))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Serve the router on an already bound listener until `shutdown` resolves.
pub async fn serve(
    listener: tokio::net::TcpListener,
    state: AppState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(), BridgeError> {
    let router = create_router(state);
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| BridgeError::Server(format!("Server error: {}", e)))
}

/// Bind the fixed bridge port on all interfaces and serve until `shutdown`
/// resolves.
pub async fn start_server(
    state: AppState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(), BridgeError> {
    let addr = SocketAddr::from(([0, 0, 0, 0], BRIDGE_PORT));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| BridgeError::Server(format!("Failed to bind {}: {}", addr, e)))?;

    tracing::info!(%addr, "Listening on port {}", BRIDGE_PORT);

    serve(listener, state, shutdown).await
}
