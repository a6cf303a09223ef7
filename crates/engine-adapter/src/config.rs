//! Engine adapter configuration.
//!
//! Every caller (CLI, HTTP endpoint, WebSocket handler) drives the same
//! [`EngineAdapter`](crate::EngineAdapter) type and differs only in the
//! `EngineConfig` it hands over. The struct is usually embedded as the
//! `[engine]` table of a larger TOML file.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Configuration for a single engine process.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct EngineConfig {
    /// Path to the engine executable. Defaults to `stockfish` (looked up in PATH).
    #[serde(default = "default_engine_path")]
    pub path: PathBuf,
    /// Upper bound applied to every requested search depth.
    #[serde(default)]
    pub max_depth: Option<u32>,
    /// Upper bound applied to every requested search time, in milliseconds.
    #[serde(default)]
    pub max_movetime_ms: Option<u64>,
    /// Ceiling for the whole `uci` / `isready` handshake.
    #[serde(default = "default_handshake_timeout_ms")]
    pub handshake_timeout_ms: u64,
    /// Delay before `uci` is sent after spawning.
    #[serde(default = "default_uci_delay_ms")]
    pub uci_delay_ms: u64,
    /// Delay between `uci` and `isready`.
    #[serde(default = "default_isready_delay_ms")]
    pub isready_delay_ms: u64,
    /// Extra time granted beyond the requested movetime before a move
    /// request is abandoned.
    #[serde(default = "default_move_grace_ms")]
    pub move_grace_ms: u64,
    /// How long `quit` waits for a clean exit before killing the process.
    #[serde(default = "default_quit_grace_ms")]
    pub quit_grace_ms: u64,
}

fn default_engine_path() -> PathBuf {
    PathBuf::from("stockfish")
}

fn default_handshake_timeout_ms() -> u64 {
    15_000
}

fn default_uci_delay_ms() -> u64 {
    100
}

fn default_isready_delay_ms() -> u64 {
    400
}

fn default_move_grace_ms() -> u64 {
    2_000
}

fn default_quit_grace_ms() -> u64 {
    100
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            path: default_engine_path(),
            max_depth: None,
            max_movetime_ms: None,
            handshake_timeout_ms: default_handshake_timeout_ms(),
            uci_delay_ms: default_uci_delay_ms(),
            isready_delay_ms: default_isready_delay_ms(),
            move_grace_ms: default_move_grace_ms(),
            quit_grace_ms: default_quit_grace_ms(),
        }
    }
}

impl EngineConfig {
    /// Creates a default configuration pointing at `path`.
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    /// Applies the depth cap, if any.
    pub fn clamp_depth(&self, depth: u32) -> u32 {
        match self.max_depth {
            Some(max) => depth.min(max),
            None => depth,
        }
    }

    /// Applies the movetime cap, if any.
    pub fn clamp_movetime(&self, movetime_ms: u64) -> u64 {
        match self.max_movetime_ms {
            Some(max) => movetime_ms.min(max),
            None => movetime_ms,
        }
    }

    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }

    pub fn uci_delay(&self) -> Duration {
        Duration::from_millis(self.uci_delay_ms)
    }

    pub fn isready_delay(&self) -> Duration {
        Duration::from_millis(self.isready_delay_ms)
    }

    pub fn quit_grace(&self) -> Duration {
        Duration::from_millis(self.quit_grace_ms)
    }

    /// Total time a move request may stay pending for a given movetime.
    pub fn move_deadline(&self, movetime_ms: u64) -> Duration {
        Duration::from_millis(movetime_ms.saturating_add(self.move_grace_ms))
    }
}

/// HTTP / WebSocket front end settings.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ServerConfig {
    /// Port to listen on. Defaults to 5000.
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_port() -> u16 {
    5000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
        }
    }
}

/// Search caps for the command-line caller.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct CliConfig {
    #[serde(default = "default_cli_max_depth")]
    pub max_depth: u32,
    #[serde(default = "default_cli_max_movetime_ms")]
    pub max_movetime_ms: u64,
}

fn default_cli_max_depth() -> u32 {
    10
}

fn default_cli_max_movetime_ms() -> u64 {
    3_000
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            max_depth: default_cli_max_depth(),
            max_movetime_ms: default_cli_max_movetime_ms(),
        }
    }
}

/// Contents of `chesster.toml`.
///
/// ```toml
/// [engine]
/// path = "/usr/games/stockfish"
///
/// [server]
/// port = 5000
///
/// [cli]
/// max_depth = 10
/// max_movetime_ms = 3000
/// ```
#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
pub struct ChessterConfig {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub cli: CliConfig,
}

impl ChessterConfig {
    /// Loads [`Self::config_path()`], or defaults if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ReadError`] if the file exists but cannot be read,
    /// or [`ConfigError::ParseError`] if the file contains invalid TOML.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path())
    }

    /// Loads a specific file, or defaults if it does not exist.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            Ok(toml::from_str(&content)?)
        } else {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            Ok(Self::default())
        }
    }

    /// `chesster.toml` in the current working directory.
    pub fn config_path() -> PathBuf {
        PathBuf::from("chesster.toml")
    }

    /// Engine settings with the CLI caps applied.
    pub fn cli_engine(&self) -> EngineConfig {
        EngineConfig {
            max_depth: Some(self.cli.max_depth),
            max_movetime_ms: Some(self.cli.max_movetime_ms),
            ..self.engine.clone()
        }
    }
}
