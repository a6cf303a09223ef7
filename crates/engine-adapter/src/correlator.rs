//! Matching `bestmove` lines to the single outstanding move request.
//!
//! The correlator is a plain state machine; it owns no timers and does no
//! I/O. The adapter drives it from two sides: the caller (begin / expire)
//! and the stdout reader (fulfil / fail).
//!
//! ```text
//!            begin                       fulfil
//!   Idle ─────────────▶ AwaitingMove ─────────────▶ Idle   (Ok(move))
//!                            │  expire
//!                            └──────────────────▶ Idle     (MoveTimeout, search orphaned)
//! ```
//!
//! Each `go` produces exactly one `bestmove`, including searches that were
//! abandoned on timeout. The correlator counts those orphaned searches and
//! discards that many best-move lines before it resolves anything again,
//! so a late answer can never be attributed to a newer request.

use crate::error::EngineError;
use crate::parser::EngineMove;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::Instant;

// Roughly 30 years; stands in for budgets too large for an `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Reply slot handed to the waiting caller.
pub type MoveReply = oneshot::Sender<Result<EngineMove, EngineError>>;

/// State of the pending-request slot.
#[derive(Debug, Default)]
pub enum RequestState {
    #[default]
    Idle,
    AwaitingMove {
        id: u64,
        reply: MoveReply,
        issued_at: Instant,
        deadline: Instant,
    },
}

/// Handle returned to the caller when a request is registered.
#[derive(Debug)]
pub struct PendingMove {
    pub id: u64,
    pub reply: oneshot::Receiver<Result<EngineMove, EngineError>>,
    pub deadline: Instant,
    /// True if registering this request reaped an earlier one whose caller
    /// had already gone away. That search is still running in the engine.
    pub reaped_abandoned: bool,
}

/// What happened to a best-move line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Handed to the pending request.
    Delivered,
    /// Belonged to a search that had been abandoned; discarded.
    Orphaned,
    /// No request was pending; discarded.
    Unsolicited,
}

#[derive(Debug, Default)]
pub struct Correlator {
    state: RequestState,
    next_id: u64,
    orphaned: u32,
}

impl Correlator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_awaiting(&self) -> bool {
        matches!(self.state, RequestState::AwaitingMove { .. })
    }

    /// Number of abandoned searches whose `bestmove` has not arrived yet.
    pub fn orphaned(&self) -> u32 {
        self.orphaned
    }

    /// Registers a new request that may stay pending for `budget`.
    ///
    /// Fails with [`EngineError::RequestInFlight`] while another caller is
    /// still waiting. A pending request whose receiver was dropped does not
    /// block: it is reaped and its search counted as orphaned.
    pub fn begin(&mut self, budget: Duration) -> Result<PendingMove, EngineError> {
        let mut reaped_abandoned = false;
        if let RequestState::AwaitingMove { reply, id, .. } = &self.state {
            if !reply.is_closed() {
                return Err(EngineError::RequestInFlight);
            }
            tracing::debug!(request = id, "reaping request whose caller went away");
            self.orphaned += 1;
            reaped_abandoned = true;
        }

        self.next_id += 1;
        let id = self.next_id;
        let (tx, rx) = oneshot::channel();
        let issued_at = Instant::now();
        let deadline = issued_at
            .checked_add(budget)
            .unwrap_or_else(|| issued_at + FAR_FUTURE);
        self.state = RequestState::AwaitingMove {
            id,
            reply: tx,
            issued_at,
            deadline,
        };

        Ok(PendingMove {
            id,
            reply: rx,
            deadline,
            reaped_abandoned,
        })
    }

    /// Routes a parsed best move.
    pub fn fulfil(&mut self, mv: EngineMove) -> Delivery {
        if self.orphaned > 0 {
            self.orphaned -= 1;
            tracing::debug!(mv = %mv.compact_move, "discarding best move of abandoned search");
            return Delivery::Orphaned;
        }

        match std::mem::take(&mut self.state) {
            RequestState::AwaitingMove {
                id,
                reply,
                issued_at,
                ..
            } => {
                tracing::debug!(
                    request = id,
                    mv = %mv.compact_move,
                    elapsed_ms = issued_at.elapsed().as_millis() as u64,
                    "best move received"
                );
                if reply.send(Ok(mv)).is_err() {
                    tracing::debug!(request = id, "caller went away before the best move");
                }
                Delivery::Delivered
            }
            RequestState::Idle => {
                tracing::debug!(mv = %mv.compact_move, "best move with no pending request dropped");
                Delivery::Unsolicited
            }
        }
    }

    /// Abandons request `id` after its deadline.
    ///
    /// Returns false if that request is no longer pending (it was fulfilled
    /// or failed first), in which case nothing changes.
    pub fn expire(&mut self, id: u64) -> bool {
        match &self.state {
            RequestState::AwaitingMove { id: pending, .. } if *pending == id => {
                self.state = RequestState::Idle;
                self.orphaned += 1;
                true
            }
            _ => false,
        }
    }

    /// Fails the pending request, if any, and forgets orphaned searches.
    ///
    /// Used when the engine process is gone.
    pub fn fail(&mut self, error: EngineError) -> bool {
        self.orphaned = 0;
        match std::mem::take(&mut self.state) {
            RequestState::AwaitingMove { reply, .. } => {
                let _ = reply.send(Err(error));
                true
            }
            RequestState::Idle => false,
        }
    }

    /// Deadline of the pending request, if any.
    pub fn deadline(&self) -> Option<Instant> {
        match &self.state {
            RequestState::AwaitingMove { deadline, .. } => Some(*deadline),
            RequestState::Idle => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine_move(mv: &str) -> EngineMove {
        EngineMove {
            compact_move: mv.to_string(),
            score: 0,
            depth: 1,
            observed_at_ms: 0,
            ponder: None,
        }
    }

    #[tokio::test]
    async fn test_begin_then_fulfil_resolves_once() {
        let mut correlator = Correlator::new();
        let pending = correlator.begin(Duration::from_secs(2)).unwrap();
        assert!(correlator.is_awaiting());
        assert!(!pending.reaped_abandoned);

        assert_eq!(correlator.fulfil(engine_move("e2e4")), Delivery::Delivered);
        assert!(!correlator.is_awaiting());

        let result = pending.reply.await.unwrap().unwrap();
        assert_eq!(result.compact_move, "e2e4");

        // second line has nobody to go to
        assert_eq!(correlator.fulfil(engine_move("d2d4")), Delivery::Unsolicited);
    }

    #[tokio::test]
    async fn test_second_request_is_rejected_while_pending() {
        let mut correlator = Correlator::new();
        let _first = correlator.begin(Duration::from_secs(2)).unwrap();

        let second = correlator.begin(Duration::from_secs(2));
        assert!(matches!(second, Err(EngineError::RequestInFlight)));
        assert!(correlator.is_awaiting());
    }

    #[tokio::test]
    async fn test_expired_request_orphans_next_best_move() {
        let mut correlator = Correlator::new();
        let first = correlator.begin(Duration::from_millis(10)).unwrap();
        assert!(correlator.expire(first.id));
        assert!(!correlator.is_awaiting());
        assert_eq!(correlator.orphaned(), 1);

        let second = correlator.begin(Duration::from_secs(2)).unwrap();

        // late answer to the first search
        assert_eq!(correlator.fulfil(engine_move("a2a3")), Delivery::Orphaned);
        assert!(correlator.is_awaiting());

        assert_eq!(correlator.fulfil(engine_move("g1f3")), Delivery::Delivered);
        let result = second.reply.await.unwrap().unwrap();
        assert_eq!(result.compact_move, "g1f3");
    }

    #[tokio::test]
    async fn test_expire_after_fulfil_is_noop() {
        let mut correlator = Correlator::new();
        let pending = correlator.begin(Duration::from_secs(1)).unwrap();
        correlator.fulfil(engine_move("e2e4"));

        assert!(!correlator.expire(pending.id));
        assert_eq!(correlator.orphaned(), 0);
    }

    #[tokio::test]
    async fn test_expire_stale_id_is_noop() {
        let mut correlator = Correlator::new();
        let first = correlator.begin(Duration::from_secs(1)).unwrap();
        correlator.fulfil(engine_move("e2e4"));
        let _second = correlator.begin(Duration::from_secs(1)).unwrap();

        assert!(!correlator.expire(first.id));
        assert!(correlator.is_awaiting());
    }

    #[tokio::test]
    async fn test_fail_rejects_pending_request() {
        let mut correlator = Correlator::new();
        let pending = correlator.begin(Duration::from_secs(1)).unwrap();

        assert!(correlator.fail(EngineError::ProcessExited { code: Some(1) }));
        assert!(!correlator.is_awaiting());

        let result = pending.reply.await.unwrap();
        assert!(matches!(
            result,
            Err(EngineError::ProcessExited { code: Some(1) })
        ));
        assert!(!correlator.fail(EngineError::ProcessExited { code: None }));
    }

    #[tokio::test]
    async fn test_fail_clears_orphan_count() {
        let mut correlator = Correlator::new();
        let pending = correlator.begin(Duration::from_secs(1)).unwrap();
        correlator.expire(pending.id);
        assert_eq!(correlator.orphaned(), 1);

        correlator.fail(EngineError::ProcessExited { code: None });
        assert_eq!(correlator.orphaned(), 0);
    }

    #[tokio::test]
    async fn test_dropped_caller_is_reaped_by_next_request() {
        let mut correlator = Correlator::new();
        let first = correlator.begin(Duration::from_secs(1)).unwrap();
        drop(first);

        let second = correlator.begin(Duration::from_secs(1)).unwrap();
        assert!(second.reaped_abandoned);
        assert_eq!(correlator.orphaned(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_reflects_budget() {
        let mut correlator = Correlator::new();
        assert!(correlator.deadline().is_none());

        let pending = correlator.begin(Duration::from_millis(2500)).unwrap();
        assert_eq!(correlator.deadline(), Some(pending.deadline));
        assert_eq!(
            pending.deadline - Instant::now(),
            Duration::from_millis(2500)
        );
    }
}
