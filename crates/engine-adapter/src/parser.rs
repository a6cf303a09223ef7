//! Engine output parsing.
//!
//! The engine's stdout arrives as arbitrary byte chunks whose boundaries have
//! nothing to do with line boundaries. [`OutputParser`] buffers the bytes,
//! splits them on `\n` and classifies each complete line into an
//! [`EngineEvent`]. Only three kinds of lines matter to the adapter:
//!
//! - `readyok` acknowledges the handshake
//! - `id name <name>` reports the engine's name
//! - `bestmove <move> ...` ends a search
//!
//! Everything else (the flood of `info` lines in particular) is ignored.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Score reported for a forced mate, regardless of the mate distance.
pub const MATE_SCORE: i32 = 10_000;

static SCORE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"score (cp|mate) (-?\d+)").expect("valid score regex"));
static DEPTH_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\bdepth (\d+)").expect("valid depth regex"));

/// The engine's answer to a search command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineMove {
    /// Move in compact notation (e.g. `e2e4`, `e7e8q`).
    pub compact_move: String,
    /// Centipawns from the side to move's point of view, or
    /// ±[`MATE_SCORE`] for a forced mate. Zero when the line carried no score.
    pub score: i32,
    /// Search depth, zero when the line carried none.
    pub depth: u32,
    /// Wall-clock time the line was parsed, in Unix milliseconds.
    pub observed_at_ms: i64,
    /// Expected reply, when the engine announced one with `ponder`.
    pub ponder: Option<String>,
}

impl EngineMove {
    /// Returns the score from White's point of view.
    ///
    /// Engine scores are relative to the side to move; `white_to_move`
    /// tells which side that was when the search started.
    pub fn white_relative(&self, white_to_move: bool) -> i32 {
        if white_to_move {
            self.score
        } else {
            -self.score
        }
    }

    /// Returns true if the score denotes a forced mate.
    pub fn is_mate(&self) -> bool {
        self.score.abs() == MATE_SCORE
    }
}

/// A protocol line the adapter acts on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// `readyok`
    Ready,
    /// `id name <name>`
    Identified(String),
    /// `bestmove <move> ...`
    BestMove(EngineMove),
}

/// Classifies a single line of engine output.
///
/// Returns `None` for lines the adapter has no use for.
pub fn parse_line(line: &str) -> Option<EngineEvent> {
    if line.starts_with("readyok") {
        return Some(EngineEvent::Ready);
    }
    if let Some(name) = line.strip_prefix("id name ") {
        return Some(EngineEvent::Identified(name.trim().to_string()));
    }
    if line.starts_with("bestmove") {
        return parse_best_move(line).map(EngineEvent::BestMove);
    }
    None
}

/// Parses a `bestmove` line.
///
/// The move is the second whitespace-delimited token. Score and depth are
/// located by independent pattern matches, so they may appear anywhere
/// after the move.
fn parse_best_move(line: &str) -> Option<EngineMove> {
    let mut tokens = line.split_whitespace();
    tokens.next()?;
    let compact_move = tokens.next()?.to_string();

    let mut ponder = None;
    while let Some(token) = tokens.next() {
        if token == "ponder" {
            ponder = tokens.next().map(str::to_string);
            break;
        }
    }

    Some(EngineMove {
        compact_move,
        score: extract_score(line).unwrap_or(0),
        depth: extract_depth(line).unwrap_or(0),
        observed_at_ms: chrono::Utc::now().timestamp_millis(),
        ponder,
    })
}

/// Extracts `score cp N` or `score mate K` from a line.
///
/// Mate scores collapse to ±[`MATE_SCORE`]; the distance is discarded.
/// Values beyond `i32` saturate to ±`i32::MAX` (symmetric, so a score can
/// always be negated) instead of being dropped.
pub fn extract_score(line: &str) -> Option<i32> {
    let caps = SCORE_RE.captures(line)?;
    let digits = &caps[2];
    let value = match digits.parse::<i32>() {
        Ok(value) => value,
        Err(_) => {
            let saturated = if digits.starts_with('-') {
                -i32::MAX
            } else {
                i32::MAX
            };
            tracing::debug!(score = digits, saturated, "score out of range, saturating");
            saturated
        }
    };
    match &caps[1] {
        "mate" if value > 0 => Some(MATE_SCORE),
        "mate" => Some(-MATE_SCORE),
        _ => Some(value),
    }
}

/// Extracts `depth N` from a line.
///
/// The word-boundary anchor is intentional and stricter than a bare
/// `depth (\d+)` match: `seldepth 30` never counts as the search depth, so a
/// line carrying only `seldepth` reports no depth at all.
pub fn extract_depth(line: &str) -> Option<u32> {
    DEPTH_RE.captures(line)?[1].parse().ok()
}

/// Incremental line splitter over the engine's raw stdout.
#[derive(Debug, Default)]
pub struct OutputParser {
    pending: Vec<u8>,
}

impl OutputParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consumes a chunk and returns the events of every line it completed.
    ///
    /// Bytes after the last newline are kept until a later chunk ends
    /// the line.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<EngineEvent> {
        self.pending.extend_from_slice(chunk);

        let mut events = Vec::new();
        while let Some(newline) = self.pending.iter().position(|&b| b == b'\n') {
            let raw: Vec<u8> = self.pending.drain(..=newline).collect();
            if let Some(event) = Self::classify(&raw[..raw.len() - 1]) {
                events.push(event);
            }
        }
        events
    }

    /// Flushes a trailing line that was never newline-terminated.
    ///
    /// Called once the stream has reached EOF.
    pub fn finish(&mut self) -> Option<EngineEvent> {
        if self.pending.is_empty() {
            return None;
        }
        let raw = std::mem::take(&mut self.pending);
        Self::classify(&raw)
    }

    /// Number of buffered bytes not yet terminated by a newline.
    pub fn buffered(&self) -> usize {
        self.pending.len()
    }

    fn classify(raw: &[u8]) -> Option<EngineEvent> {
        let text = String::from_utf8_lossy(raw);
        parse_line(text.trim_end_matches('\r'))
    }
}
