//! Health endpoint.

use axum::{extract::State, Json};
use serde::Serialize;

use crate::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    /// Whether the engine has completed its handshake and is still alive.
    pub engine: bool,
}

/// GET /api/health
///
/// Always answers 200; `engine` tells whether moves can be served. Never
/// waits on the engine lock, so it stays responsive during a search.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let engine = state.readiness.is_ready();
    Json(HealthResponse {
        status: "ok",
        engine,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_response_serialize() {
        let json = serde_json::to_string(&HealthResponse {
            status: "ok",
            engine: true,
        })
        .unwrap();
        assert_eq!(json, r#"{"status":"ok","engine":true}"#);
    }
}
