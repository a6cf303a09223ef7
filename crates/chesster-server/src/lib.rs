//! Chesster server library.
//!
//! Exposes one shared [`EngineAdapter`] over a small JSON API and a
//! WebSocket endpoint:
//!
//! - `GET /api/health` - liveness and engine readiness
//! - `POST /api/move` - best move for a game history
//! - `GET /ws` - the same request/response over a WebSocket

pub mod api;
pub mod middleware;
pub mod ws;

use axum::routing::{get, post};
use axum::Router;
use engine_adapter::{EngineAdapter, Readiness};
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};

/// The engine handle shared by every connection.
///
/// The async mutex serializes callers, so the adapter only ever sees one
/// request at a time.
pub type SharedEngine = Arc<Mutex<EngineAdapter>>;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub engine: SharedEngine,
    /// Readable while a search holds the engine lock.
    pub readiness: Readiness,
}

impl AppState {
    pub fn new(engine: EngineAdapter) -> Self {
        Self {
            readiness: engine.readiness(),
            engine: Arc::new(Mutex::new(engine)),
        }
    }
}

/// Builds the full application router.
pub fn router(state: AppState) -> Router {
    // CORS layer for cross-origin requests
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/health", get(api::health::health))
        .route("/api/move", post(api::moves::post_move))
        .route("/ws", get(ws::ws_handler))
        .with_state(state)
        .layer(axum::middleware::from_fn(middleware::timing_layer))
        .layer(cors)
}
