//! WebSocket handler for move requests.
//!
//! Clients send `{"type": "getMove", "moves": [...], "depth": 10,
//! "timeLimit": 2000}` and receive either a `moveResult` carrying the same
//! fields as `POST /api/move`, or a `moveError`. Requests on one socket are
//! answered in order.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};

use crate::api::moves::{compute_move, MoveRequest, MoveResponse};
use crate::{AppState, SharedEngine};

/// Messages sent by the client.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientMessage {
    GetMove(MoveRequest),
}

/// Messages sent to the client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerMessage {
    MoveResult(MoveResponse),
    MoveError { error: String },
}

/// Axum handler for WebSocket upgrade requests.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(|socket| handle_socket(socket, state.engine))
}

async fn handle_socket(socket: WebSocket, engine: SharedEngine) {
    let (mut sender, mut receiver) = socket.split();
    tracing::info!("Client connected");

    while let Some(Ok(msg)) = receiver.next().await {
        let text = match msg {
            Message::Text(text) => text,
            Message::Close(_) => break,
            _ => continue,
        };

        let reply = match serde_json::from_str::<ClientMessage>(&text) {
            Ok(ClientMessage::GetMove(request)) => match compute_move(&engine, &request).await {
                Ok(response) => ServerMessage::MoveResult(response),
                Err(e) => ServerMessage::MoveError {
                    error: e.to_string(),
                },
            },
            Err(e) => ServerMessage::MoveError {
                error: format!("Invalid message: {}", e),
            },
        };

        let json = match serde_json::to_string(&reply) {
            Ok(json) => json,
            Err(e) => {
                tracing::error!("Failed to encode reply: {}", e);
                continue;
            }
        };
        if sender.send(Message::Text(json)).await.is_err() {
            break;
        }
    }

    tracing::info!("Client disconnected");
}
