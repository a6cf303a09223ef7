//! Rules oracle used for notation translation.
//!
//! The adapter never decides chess legality itself. It asks a
//! [`MoveValidator`] to replay moves and report each one's squares and SAN.
//! [`StandardRules`] is the stock implementation over `shakmaty`.

use crate::error::IllegalMove;
use shakmaty::san::SanPlus;
use shakmaty::uci::UciMove;
use shakmaty::{CastlingMode, Chess, Move, Position};

/// A move accepted by the oracle, in both notations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedMove {
    /// Origin square, e.g. `e2`. For castling this is the king's square.
    pub origin: String,
    /// Destination square, e.g. `e4`. For castling this is the king's
    /// destination (`g1`, `c8`, ...).
    pub destination: String,
    /// Promotion piece as a lowercase letter.
    pub promotion: Option<char>,
    /// Standard algebraic notation including any check suffix.
    pub algebraic: String,
}

impl AppliedMove {
    /// Compact (UCI) form: origin + destination + promotion letter.
    pub fn compact(&self) -> String {
        let mut compact = format!("{}{}", self.origin, self.destination);
        if let Some(promotion) = self.promotion {
            compact.push(promotion);
        }
        compact
    }
}

/// Chess rules capability consumed by the notation translator.
pub trait MoveValidator {
    /// Resets to the standard starting position.
    fn new_game(&mut self);

    /// Applies a move given in SAN (`Nf3`, `exd5`, `O-O`) or compact
    /// (`g1f3`) notation.
    fn apply_move(&mut self, notation: &str) -> Result<AppliedMove, IllegalMove>;

    /// Legal moves in the current position, in SAN.
    fn current_moves(&self) -> Vec<String>;

    fn is_game_over(&self) -> bool;
}

/// Standard chess rules backed by `shakmaty`.
#[derive(Debug, Clone, Default)]
pub struct StandardRules {
    position: Chess,
}

impl StandardRules {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when White is to move.
    pub fn white_to_move(&self) -> bool {
        self.position.turn().is_white()
    }

    fn resolve(&self, notation: &str) -> Option<Move> {
        if let Ok(san) = notation.parse::<SanPlus>() {
            if let Ok(m) = san.san.to_move(&self.position) {
                return Some(m);
            }
        }
        let uci = notation.parse::<UciMove>().ok()?;
        uci.to_move(&self.position).ok()
    }
}

impl MoveValidator for StandardRules {
    fn new_game(&mut self) {
        self.position = Chess::default();
    }

    fn apply_move(&mut self, notation: &str) -> Result<AppliedMove, IllegalMove> {
        let trimmed = notation.trim();
        let m = self
            .resolve(trimmed)
            .ok_or_else(|| IllegalMove::new(notation))?;

        let (origin, destination, promotion) = match m.to_uci(CastlingMode::Standard) {
            UciMove::Normal {
                from,
                to,
                promotion,
            } => (from.to_string(), to.to_string(), promotion.map(|r| r.char())),
            _ => return Err(IllegalMove::new(notation)),
        };

        let algebraic = SanPlus::from_move_and_play_unchecked(&mut self.position, &m).to_string();

        Ok(AppliedMove {
            origin,
            destination,
            promotion,
            algebraic,
        })
    }

    fn current_moves(&self) -> Vec<String> {
        self.position
            .legal_moves()
            .iter()
            .map(|m| SanPlus::from_move(self.position.clone(), m).to_string())
            .collect()
    }

    fn is_game_over(&self) -> bool {
        self.position.is_game_over()
    }
}
