//! HTTP surface: the WebSocket endpoint, a health check, and the blob
//! directory mounted under `/blobs` so stored media URLs resolve.

use std::path::Path;

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::State;
use axum::response::Response;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::session;
use crate::state::SharedState;

/// Build the router. `blob_dir` is the directory served under `/blobs`;
/// tests that fake the blob store pass `None`.
pub fn build_router(state: SharedState, blob_dir: Option<&Path>) -> Router {
    let mut router = Router::new()
        .route("/health", get(health_handler))
        .route("/ws", get(ws_handler));

    if let Some(dir) = blob_dir {
        router = router.nest_service("/blobs", ServeDir::new(dir));
    }

    router.with_state(state).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(
                CorsLayer::new()
                    .allow_methods(Any)
                    .allow_headers(Any)
                    .allow_origin(Any),
            ),
    )
}

/// Accept connections until the listener fails.
pub async fn serve(
    listener: tokio::net::TcpListener,
    state: SharedState,
    blob_dir: Option<&Path>,
) -> std::io::Result<()> {
    let app = build_router(state, blob_dir);
    axum::serve(listener, app).await
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<SharedState>) -> Response {
    info!("websocket connection accepted");
    ws.on_upgrade(move |socket| session::run(socket, state))
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    uptime_seconds: u64,
    online: usize,
}

async fn health_handler(State(state): State<SharedState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds: state.uptime(),
        online: state.registry.len().await,
    })
}
