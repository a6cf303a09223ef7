//! Translation between algebraic notation and the engine's compact notation.
//!
//! Both directions replay the game from the starting position on a private
//! rules oracle. That oracle is scratch state for notation only and never
//! stands in for the caller's own game.

use crate::rules::{AppliedMove, MoveValidator, StandardRules};

/// Converts move histories between SAN and compact (UCI) notation.
#[derive(Debug, Clone, Default)]
pub struct NotationTranslator<V = StandardRules> {
    rules: V,
}

impl NotationTranslator<StandardRules> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<V: MoveValidator> NotationTranslator<V> {
    /// Uses `rules` as the oracle.
    pub fn with_rules(rules: V) -> Self {
        Self { rules }
    }

    /// Converts a game history to compact notation.
    ///
    /// Moves the oracle rejects are logged and skipped; the rest of the
    /// history is still translated.
    pub fn to_compact<S: AsRef<str>>(&mut self, history: &[S]) -> Vec<String> {
        self.replay(history)
            .iter()
            .map(AppliedMove::compact)
            .collect()
    }

    /// Returns the SAN of `compact`, played after `history`.
    ///
    /// If the oracle refuses the move, the adapter and the caller disagree
    /// about the position. That is logged as an error and the lossy
    /// [`fallback_algebraic`] reconstruction is returned instead.
    pub fn to_algebraic<S: AsRef<str>>(&mut self, compact: &str, history: &[S]) -> String {
        self.replay(history);
        match self.rules.apply_move(compact) {
            Ok(applied) => applied.algebraic,
            Err(e) => {
                tracing::error!(
                    mv = compact,
                    plies = history.len(),
                    error = %e,
                    "engine move rejected by rules oracle, position out of sync"
                );
                fallback_algebraic(compact)
            }
        }
    }

    /// True if the side to move after `history` is White.
    ///
    /// Illegal moves are skipped, as in the other replays.
    pub fn white_to_move_after<S: AsRef<str>>(&mut self, history: &[S]) -> bool {
        self.replay(history).len() % 2 == 0
    }

    fn replay<S: AsRef<str>>(&mut self, history: &[S]) -> Vec<AppliedMove> {
        self.rules.new_game();
        let mut applied = Vec::with_capacity(history.len());
        for (ply, mv) in history.iter().enumerate() {
            match self.rules.apply_move(mv.as_ref()) {
                Ok(m) => applied.push(m),
                Err(e) => tracing::warn!(ply, error = %e, "skipping illegal move in history"),
            }
        }
        applied
    }
}

/// Best-effort SAN for a compact move, without a position.
///
/// Castling is recognised by its exact king squares and promotion by the
/// move's length. Everything else degrades to the destination square.
pub fn fallback_algebraic(compact: &str) -> String {
    match compact {
        "e1g1" | "e8g8" => return "O-O".to_string(),
        "e1c1" | "e8c8" => return "O-O-O".to_string(),
        _ => {}
    }

    let Some(destination) = compact.get(2..4) else {
        return compact.to_string();
    };
    match compact.get(4..5) {
        Some(promotion) if compact.len() == 5 => {
            format!("{}={}", destination, promotion.to_uppercase())
        }
        _ => destination.to_string(),
    }
}
