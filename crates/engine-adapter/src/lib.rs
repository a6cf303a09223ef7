//! Async adapter for UCI chess engines such as Stockfish.
//!
//! The adapter spawns an engine executable, performs the `uci` / `isready`
//! handshake, sets up positions from game histories in algebraic notation
//! and turns `go` / `bestmove` exchanges into awaitable requests.
//!
//! # Overview
//!
//! - [`EngineAdapter`] - Owns the engine process and the pending request
//! - [`EngineConfig`] - Executable path, search caps and timing knobs
//! - [`EngineMove`] - A parsed best move with score and depth
//! - [`OutputParser`] - Line framing and parsing of engine output
//! - [`NotationTranslator`] - SAN to compact notation and back
//! - [`MoveValidator`] - Rules oracle seam, [`StandardRules`] by default
//!
//! # Example
//!
//! ```ignore
//! use engine_adapter::{EngineAdapter, EngineConfig};
//!
//! let mut engine = EngineAdapter::new(EngineConfig::with_path("stockfish"));
//! engine.initialize().await?;
//! let suggestion = engine.suggest_move(&["e4", "e5"], 10, 1000).await?;
//! println!("{} ({})", suggestion.algebraic, suggestion.engine_move.score);
//! engine.quit().await;
//! ```

pub mod adapter;
pub mod channel;
pub mod config;
pub mod correlator;
pub mod error;
pub mod notation;
pub mod parser;
pub mod rules;
pub mod supervisor;

pub use adapter::{EngineAdapter, Readiness, Suggestion};
pub use channel::CommandChannel;
pub use config::{ChessterConfig, CliConfig, EngineConfig, ServerConfig};
pub use correlator::Correlator;
pub use error::{ConfigError, EngineError, IllegalMove};
pub use notation::{fallback_algebraic, NotationTranslator};
pub use parser::{EngineEvent, EngineMove, OutputParser, MATE_SCORE};
pub use rules::{AppliedMove, MoveValidator, StandardRules};
