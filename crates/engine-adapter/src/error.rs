//! Error types for the engine adapter.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur when driving a UCI engine.
#[derive(Error, Debug)]
pub enum EngineError {
    /// The engine executable could not be started (missing binary,
    /// permission denied, ...).
    #[error("Failed to spawn engine at {}: {source}", .path.display())]
    Spawn {
        /// Path that was passed to the OS.
        path: PathBuf,
        /// Underlying OS error.
        #[source]
        source: std::io::Error,
    },
    /// The engine did not answer `isready` with `readyok` in time.
    #[error("Engine initialization timeout after {0:?}")]
    HandshakeTimeout(Duration),
    /// A move was requested before the handshake completed.
    #[error("Engine not ready")]
    NotReady,
    /// No `bestmove` line arrived within the time budget.
    #[error("Engine move timeout after {0:?}")]
    MoveTimeout(Duration),
    /// A move was requested while another request is still pending.
    #[error("A move request is already in flight")]
    RequestInFlight,
    /// The engine process went away.
    #[error("Engine process exited (code {})", display_code(.code))]
    ProcessExited {
        /// Exit code, when the platform reports one.
        code: Option<i32>,
    },
    /// I/O failure on the engine's pipes.
    #[error("Engine I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn display_code(code: &Option<i32>) -> String {
    match code {
        Some(code) => code.to_string(),
        None => "unknown".to_string(),
    }
}

/// A move rejected by the rules oracle.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("illegal move: {notation}")]
pub struct IllegalMove {
    /// The notation exactly as it was supplied.
    pub notation: String,
}

impl IllegalMove {
    pub fn new(notation: impl Into<String>) -> Self {
        Self {
            notation: notation.into(),
        }
    }
}

/// Errors that can occur when loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),
    /// Failed to parse the configuration file as valid TOML.
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_error_display() {
        let spawn = EngineError::Spawn {
            path: PathBuf::from("/opt/stockfish"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "file not found"),
        };
        let msg = spawn.to_string();
        assert!(msg.contains("Failed to spawn engine"));
        assert!(msg.contains("/opt/stockfish"));

        assert_eq!(EngineError::NotReady.to_string(), "Engine not ready");
        assert_eq!(
            EngineError::RequestInFlight.to_string(),
            "A move request is already in flight"
        );
        assert!(EngineError::MoveTimeout(Duration::from_millis(2500))
            .to_string()
            .contains("timeout"));
    }

    #[test]
    fn test_process_exited_display() {
        let with_code = EngineError::ProcessExited { code: Some(3) };
        assert_eq!(with_code.to_string(), "Engine process exited (code 3)");

        let without = EngineError::ProcessExited { code: None };
        assert_eq!(without.to_string(), "Engine process exited (code unknown)");
    }

    #[test]
    fn test_engine_error_from_io_error() {
        let io_error = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe closed");
        let err: EngineError = io_error.into();
        match err {
            EngineError::Io(e) => assert_eq!(e.kind(), std::io::ErrorKind::BrokenPipe),
            _ => panic!("Expected Io variant"),
        }
    }

    #[test]
    fn test_illegal_move_display() {
        let err = IllegalMove::new("Ke9");
        assert_eq!(err.to_string(), "illegal move: Ke9");
    }
}
