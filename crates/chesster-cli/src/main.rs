//! Chesster command-line client.
//!
//! `chesster suggest` asks the configured engine for a move; `chesster
//! translate` converts notation offline without starting an engine.

use anyhow::Context;
use clap::{Parser, Subcommand};
use engine_adapter::{ChessterConfig, EngineAdapter, EngineMove, NotationTranslator, Suggestion};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "chesster")]
#[command(about = "Ask a UCI chess engine for moves")]
struct Cli {
    /// Path to the configuration file
    #[arg(long, global = true, default_value = "chesster.toml")]
    config: PathBuf,

    /// Engine executable (overrides the config file)
    #[arg(long, global = true, env = "CHESSTER_ENGINE")]
    engine: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the engine's best move after a game history
    Suggest {
        /// Moves played so far in algebraic notation, e.g. "e4 e5 Nf3"
        #[arg(short, long, default_value = "")]
        moves: String,
        /// Search depth (capped by [cli] max_depth)
        #[arg(short, long, default_value = "10")]
        depth: u32,
        /// Search time in milliseconds (capped by [cli] max_movetime_ms)
        #[arg(short, long, default_value = "3000")]
        time: u64,
        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Convert a game history to compact notation without an engine
    Translate {
        /// Moves in algebraic notation, e.g. "e4 e5 Nf3"
        #[arg(short, long)]
        moves: String,
        /// Also print the algebraic form of this compact move, played after the history
        #[arg(short, long)]
        engine_move: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Suggest {
            moves,
            depth,
            time,
            json,
        } => {
            let mut config = ChessterConfig::load_from(&cli.config)
                .with_context(|| format!("loading {}", cli.config.display()))?;
            if let Some(engine) = cli.engine {
                config.engine.path = engine;
            }
            let history = split_moves(&moves);
            let suggestion = suggest(&config, &history, depth, time).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&suggestion)?);
            } else {
                println!("{}", format_suggestion(&suggestion));
            }
        }
        Commands::Translate { moves, engine_move } => {
            let history = split_moves(&moves);
            for line in translate(&history, engine_move.as_deref()) {
                println!("{}", line);
            }
        }
    }

    Ok(())
}

/// Runs one search with the CLI caps applied, then shuts the engine down.
async fn suggest(
    config: &ChessterConfig,
    history: &[String],
    depth: u32,
    time: u64,
) -> anyhow::Result<Suggestion> {
    let mut engine = EngineAdapter::new(config.cli_engine());
    engine
        .initialize()
        .await
        .with_context(|| format!("starting engine {}", config.engine.path.display()))?;

    let result = engine.suggest_move(history, depth, time).await;
    engine.quit().await;
    Ok(result?)
}

/// Splits a move list on whitespace, dropping move numbers like `1.` or `12...`.
fn split_moves(moves: &str) -> Vec<String> {
    moves
        .split_whitespace()
        .filter_map(|token| {
            let mv = token.trim_start_matches(|c: char| c.is_ascii_digit() || c == '.');
            (!mv.is_empty()).then(|| mv.to_string())
        })
        .collect()
}

fn format_score(mv: &EngineMove) -> String {
    if mv.is_mate() {
        if mv.score > 0 {
            "mate for the side to move".to_string()
        } else {
            "mated".to_string()
        }
    } else {
        format!("{:+.2}", mv.score as f64 / 100.0)
    }
}

fn format_suggestion(suggestion: &Suggestion) -> String {
    let mv = &suggestion.engine_move;
    format!(
        "Best move: {} ({})\nScore: {} (depth {})",
        suggestion.algebraic,
        mv.compact_move,
        format_score(mv),
        mv.depth
    )
}

/// Compact form of `history`, then the SAN of `engine_move` if given.
fn translate(history: &[String], engine_move: Option<&str>) -> Vec<String> {
    let mut translator = NotationTranslator::new();
    let compact = translator.to_compact(history);
    if compact.len() < history.len() {
        eprintln!(
            "Skipped {} illegal move(s)",
            history.len() - compact.len()
        );
    }

    let mut lines = vec![compact.join(" ")];
    if let Some(mv) = engine_move {
        lines.push(translator.to_algebraic(mv, history));
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    fn suggestion(compact: &str, algebraic: &str, score: i32, depth: u32) -> Suggestion {
        Suggestion {
            engine_move: EngineMove {
                compact_move: compact.to_string(),
                score,
                depth,
                observed_at_ms: 0,
                ponder: None,
            },
            algebraic: algebraic.to_string(),
            white_score: score,
        }
    }

    #[test]
    fn test_cli_parses_suggest_with_defaults() {
        let cli = Cli::try_parse_from(["chesster", "suggest"]).unwrap();
        assert_eq!(cli.config, PathBuf::from("chesster.toml"));
        match cli.command {
            Commands::Suggest {
                moves,
                depth,
                time,
                json,
            } => {
                assert_eq!(moves, "");
                assert_eq!(depth, 10);
                assert_eq!(time, 3000);
                assert!(!json);
            }
            _ => panic!("Expected Suggest command"),
        }
    }

    #[test]
    fn test_cli_parses_suggest_overrides() {
        let cli = Cli::try_parse_from([
            "chesster",
            "suggest",
            "--moves",
            "e4 e5",
            "-d",
            "6",
            "-t",
            "500",
            "--json",
            "--engine",
            "/opt/sf",
        ])
        .unwrap();
        assert_eq!(cli.engine, Some(PathBuf::from("/opt/sf")));
        match cli.command {
            Commands::Suggest {
                moves,
                depth,
                time,
                json,
            } => {
                assert_eq!(moves, "e4 e5");
                assert_eq!(depth, 6);
                assert_eq!(time, 500);
                assert!(json);
            }
            _ => panic!("Expected Suggest command"),
        }
    }

    #[test]
    fn test_cli_parses_translate() {
        let cli = Cli::try_parse_from([
            "chesster",
            "translate",
            "-m",
            "e4 e5",
            "--engine-move",
            "g1f3",
        ])
        .unwrap();
        match cli.command {
            Commands::Translate { moves, engine_move } => {
                assert_eq!(moves, "e4 e5");
                assert_eq!(engine_move.as_deref(), Some("g1f3"));
            }
            _ => panic!("Expected Translate command"),
        }
    }

    #[test]
    fn test_cli_translate_requires_moves() {
        assert!(Cli::try_parse_from(["chesster", "translate"]).is_err());
    }

    #[test]
    fn test_split_moves_drops_move_numbers() {
        assert_eq!(split_moves("1. e4 e5 2. Nf3"), vec!["e4", "e5", "Nf3"]);
        assert_eq!(split_moves("1.e4 1...e5"), vec!["e4", "e5"]);
        assert!(split_moves("   ").is_empty());
    }

    #[test]
    fn test_format_suggestion_centipawns() {
        let text = format_suggestion(&suggestion("g1f3", "Nf3", 30, 8));
        assert_eq!(text, "Best move: Nf3 (g1f3)\nScore: +0.30 (depth 8)");

        let text = format_suggestion(&suggestion("a2a3", "a3", -125, 5));
        assert!(text.contains("Score: -1.25"));
    }

    #[test]
    fn test_format_suggestion_mate() {
        let text = format_suggestion(&suggestion("b7a8q", "bxa8=Q", 10_000, 12));
        assert!(text.contains("Score: mate for the side to move"));

        let text = format_suggestion(&suggestion("e1e2", "Ke2", -10_000, 12));
        assert!(text.contains("Score: mated"));
    }

    #[test]
    fn test_translate_history_and_engine_move() {
        let history = split_moves("e4 e5 Nf3 Nc6 Bc4 Bc5");
        let lines = translate(&history, Some("e1g1"));
        assert_eq!(lines[0], "e2e4 e7e5 g1f3 b8c6 f1c4 f8c5");
        assert_eq!(lines[1], "O-O");
    }

    #[test]
    fn test_translate_skips_illegal_moves() {
        let history = split_moves("e4 Ke5 e5");
        let lines = translate(&history, None);
        assert_eq!(lines, vec!["e2e4 e7e5".to_string()]);
    }
}
