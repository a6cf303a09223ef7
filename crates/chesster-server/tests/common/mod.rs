//! Scripted stand-in engine shared by the server tests.

#![allow(dead_code)]

use chesster_server::AppState;
use engine_adapter::{EngineAdapter, EngineConfig};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

/// Every command the fake engine received, in order.
pub type CommandLog = Arc<Mutex<Vec<String>>>;

/// Short timings; the path points nowhere so a respawn attempt fails fast.
pub fn fast_config() -> EngineConfig {
    EngineConfig {
        uci_delay_ms: 0,
        isready_delay_ms: 0,
        handshake_timeout_ms: 2_000,
        move_grace_ms: 200,
        ..EngineConfig::with_path("/nonexistent/engine")
    }
}

/// Connects an adapter to a fake engine that answers each `go` with the
/// next line of `replies`, and stays silent once they run out.
pub async fn scripted_engine(replies: Vec<&'static str>) -> (EngineAdapter, CommandLog) {
    let (adapter_in, engine_in) = tokio::io::duplex(4096);
    let (mut engine_out, adapter_out) = tokio::io::duplex(4096);
    let log = CommandLog::default();
    let seen = log.clone();

    tokio::spawn(async move {
        let mut replies = replies.into_iter();
        let mut lines = BufReader::new(engine_in).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            seen.lock().unwrap().push(line.clone());
            let out = match line.as_str() {
                "uci" => Some("id name FakeFish\nuciok\n".to_string()),
                "isready" => Some("readyok\n".to_string()),
                "quit" => break,
                go if go.starts_with("go ") => replies.next().map(|r| format!("{}\n", r)),
                _ => None,
            };
            if let Some(out) = out {
                if engine_out.write_all(out.as_bytes()).await.is_err() {
                    break;
                }
            }
        }
    });

    let mut adapter = EngineAdapter::new(fast_config());
    adapter.connect(adapter_in, adapter_out).await.unwrap();
    (adapter, log)
}

pub async fn scripted_state(replies: Vec<&'static str>) -> (AppState, CommandLog) {
    let (adapter, log) = scripted_engine(replies).await;
    (AppState::new(adapter), log)
}

pub fn commands(log: &CommandLog) -> Vec<String> {
    log.lock().unwrap().clone()
}
