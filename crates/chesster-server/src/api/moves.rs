//! Move suggestion endpoint.

use axum::{extract::State, Json};
use engine_adapter::{EngineError, Suggestion};
use serde::{Deserialize, Serialize};

use super::ApiError;
use crate::{AppState, SharedEngine};

/// A request for the engine's move after `moves`.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MoveRequest {
    /// Game history in algebraic notation (e.g. `["e4", "e5"]`).
    #[serde(default)]
    pub moves: Vec<String>,
    /// Search depth (default: 10).
    #[serde(default = "default_depth")]
    pub depth: u32,
    /// Search time in milliseconds (default: 2000).
    #[serde(default = "default_time_limit")]
    pub time_limit: u64,
}

fn default_depth() -> u32 {
    10
}

fn default_time_limit() -> u64 {
    2000
}

/// The engine's answer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MoveResponse {
    /// Best move in compact notation (e.g. `e2e4`).
    #[serde(rename = "move")]
    pub best_move: String,
    /// Centipawns for the side to move; +/-10000 for a forced mate.
    pub score: i32,
    pub depth: u32,
    /// When the best move was received, in Unix milliseconds.
    pub time: i64,
    /// The move in algebraic notation.
    pub algebraic: String,
}

impl From<Suggestion> for MoveResponse {
    fn from(suggestion: Suggestion) -> Self {
        Self {
            best_move: suggestion.engine_move.compact_move,
            score: suggestion.engine_move.score,
            depth: suggestion.engine_move.depth,
            time: suggestion.engine_move.observed_at_ms,
            algebraic: suggestion.algebraic,
        }
    }
}

/// Runs one request against the shared engine.
///
/// An engine that died since startup is respawned first; if that fails the
/// request is answered with [`EngineError::NotReady`].
pub async fn compute_move(
    engine: &SharedEngine,
    request: &MoveRequest,
) -> Result<MoveResponse, EngineError> {
    let mut engine = engine.lock().await;
    if !engine.is_ready() {
        tracing::warn!("Engine not ready, restarting");
        if let Err(e) = engine.initialize().await {
            tracing::error!("Failed to restart engine: {}", e);
            return Err(EngineError::NotReady);
        }
    }

    let suggestion = engine
        .suggest_move(&request.moves, request.depth, request.time_limit)
        .await?;
    tracing::debug!(
        plies = request.moves.len(),
        mv = %suggestion.engine_move.compact_move,
        san = %suggestion.algebraic,
        "move computed"
    );
    Ok(suggestion.into())
}

/// POST /api/move
///
/// # Errors
/// * 503 Service Unavailable - engine not ready
/// * 500 Internal Server Error - timeout or engine failure
pub async fn post_move(
    State(state): State<AppState>,
    Json(request): Json<MoveRequest>,
) -> Result<Json<MoveResponse>, ApiError> {
    let response = compute_move(&state.engine, &request).await?;
    Ok(Json(response))
}

#[cfg(test)]
mod tests {
    use super::*;
    use engine_adapter::EngineMove;

    #[test]
    fn test_move_request_defaults() {
        let request: MoveRequest = serde_json::from_str("{}").unwrap();
        assert!(request.moves.is_empty());
        assert_eq!(request.depth, 10);
        assert_eq!(request.time_limit, 2000);
    }

    #[test]
    fn test_move_request_camel_case() {
        let json = r#"{"moves": ["e4", "e5"], "depth": 12, "timeLimit": 500}"#;
        let request: MoveRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.moves, vec!["e4", "e5"]);
        assert_eq!(request.depth, 12);
        assert_eq!(request.time_limit, 500);
    }

    #[test]
    fn test_move_response_from_suggestion() {
        let suggestion = Suggestion {
            engine_move: EngineMove {
                compact_move: "g1f3".to_string(),
                score: -15,
                depth: 9,
                observed_at_ms: 1_700_000_000_000,
                ponder: None,
            },
            algebraic: "Nf3".to_string(),
            white_score: -15,
        };
        let response = MoveResponse::from(suggestion);
        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("\"move\":\"g1f3\""));
        assert!(json.contains("\"score\":-15"));
        assert!(json.contains("\"depth\":9"));
        assert!(json.contains("\"time\":1700000000000"));
        assert!(json.contains("\"algebraic\":\"Nf3\""));
    }
}
