//! The engine adapter: one engine process, one request at a time.

use crate::channel::CommandChannel;
use crate::config::EngineConfig;
use crate::correlator::{Correlator, PendingMove};
use crate::error::EngineError;
use crate::notation::NotationTranslator;
use crate::parser::{EngineEvent, EngineMove, OutputParser};
use crate::rules::{MoveValidator, StandardRules};
use crate::supervisor::{self, Supervisor};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};
use tokio::process::Child;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

type HandshakeReply = oneshot::Sender<Result<(), EngineError>>;

/// Read-only view of the adapter's readiness.
///
/// Clones share one flag that every engine session of the adapter updates,
/// so it stays valid across respawns and can be read without touching the
/// adapter itself (for example while a search holds it).
#[derive(Debug, Clone, Default)]
pub struct Readiness(Arc<AtomicBool>);

impl Readiness {
    pub fn is_ready(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    fn set(&self, ready: bool) {
        self.0.store(ready, Ordering::Release);
    }
}

/// State shared between the caller and the stdout reader for one engine
/// process. A respawn gets a fresh session, so stragglers from a previous
/// process can never touch the current one.
#[derive(Debug)]
struct Session {
    ready: bool,
    alive: bool,
    closing: bool,
    engine_name: Option<String>,
    handshake: Option<HandshakeReply>,
    correlator: Correlator,
    readiness: Readiness,
}

impl Session {
    fn new(handshake: HandshakeReply, readiness: Readiness) -> Self {
        readiness.set(false);
        Self {
            readiness,
            ready: false,
            alive: true,
            closing: false,
            engine_name: None,
            handshake: Some(handshake),
            correlator: Correlator::new(),
        }
    }

    fn dispatch(&mut self, event: EngineEvent) {
        match event {
            EngineEvent::Ready => {
                if self.ready {
                    return;
                }
                self.ready = true;
                self.readiness.set(true);
                if let Some(handshake) = self.handshake.take() {
                    let _ = handshake.send(Ok(()));
                }
            }
            EngineEvent::Identified(name) => {
                tracing::debug!(name = %name, "engine identified");
                self.engine_name = Some(name);
            }
            EngineEvent::BestMove(mv) => {
                self.correlator.fulfil(mv);
            }
        }
    }

    fn exited(&mut self, code: Option<i32>) {
        let was_ready = self.ready;
        self.alive = false;
        self.ready = false;
        self.readiness.set(false);

        if let Some(handshake) = self.handshake.take() {
            let _ = handshake.send(Err(EngineError::ProcessExited { code }));
        }
        let failed_request = self
            .correlator
            .fail(EngineError::ProcessExited { code });

        if self.closing {
            tracing::debug!(?code, "engine exited");
        } else if was_ready {
            tracing::error!(?code, failed_request, "engine exited unexpectedly");
        } else {
            tracing::warn!(?code, "engine exited during initialization");
        }
    }
}

type SharedSession = Arc<Mutex<Session>>;

fn lock(session: &SharedSession) -> MutexGuard<'_, Session> {
    session.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Everything tied to one running engine.
struct EngineLink {
    session: SharedSession,
    commands: CommandChannel,
    supervisor: Supervisor,
}

/// A best move together with its algebraic form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Suggestion {
    #[serde(flatten)]
    pub engine_move: EngineMove,
    /// SAN of the move in the position it was searched from.
    pub algebraic: String,
    /// The score from White's point of view.
    pub white_score: i32,
}

/// Drives a UCI engine process.
///
/// The adapter owns the process and the single pending-request slot.
/// Callers that share an adapter across tasks must serialize access
/// themselves (the server wraps it in a `tokio::sync::Mutex`).
///
/// # Example
///
/// ```no_run
/// use engine_adapter::{EngineAdapter, EngineConfig};
///
/// # async fn run() -> Result<(), engine_adapter::EngineError> {
/// let mut engine = EngineAdapter::new(EngineConfig::with_path("/usr/games/stockfish"));
/// engine.initialize().await?;
/// engine.set_moves(&["e4", "e5"]);
/// let best = engine.request_best_move(10, 500).await?;
/// println!("{} ({} cp)", best.compact_move, best.score);
/// engine.quit().await;
/// # Ok(())
/// # }
/// ```
pub struct EngineAdapter<V = StandardRules> {
    config: EngineConfig,
    translator: NotationTranslator<V>,
    link: Option<EngineLink>,
    readiness: Readiness,
}

impl EngineAdapter<StandardRules> {
    /// Creates an adapter using standard chess rules for notation.
    pub fn new(config: EngineConfig) -> Self {
        Self::with_rules(config, StandardRules::new())
    }
}

impl<V: MoveValidator> EngineAdapter<V> {
    /// Creates an adapter that translates notation with `rules`.
    pub fn with_rules(config: EngineConfig, rules: V) -> Self {
        Self {
            config,
            translator: NotationTranslator::with_rules(rules),
            link: None,
            readiness: Readiness::default(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Spawns the configured engine and performs the `uci` / `isready`
    /// handshake.
    ///
    /// Resolves immediately if the engine is already ready. If a previous
    /// engine died, a new one is spawned.
    ///
    /// # Errors
    ///
    /// - [`EngineError::Spawn`] if the executable cannot be started
    /// - [`EngineError::HandshakeTimeout`] if `readyok` never arrives
    /// - [`EngineError::ProcessExited`] if the engine exits first
    pub async fn initialize(&mut self) -> Result<(), EngineError> {
        if self.is_ready() {
            return Ok(());
        }
        self.shutdown().await;

        let spawned = supervisor::spawn(&self.config.path)?;
        tracing::info!(
            path = %self.config.path.display(),
            pid = spawned.child.id(),
            "engine spawned"
        );
        supervisor::forward_stderr(spawned.stderr);

        let handshake = self.attach(spawned.stdin, spawned.stdout, Some(spawned.child));
        self.handshake(handshake).await
    }

    /// Attaches to an engine reachable over arbitrary streams instead of
    /// spawning one, then performs the handshake.
    ///
    /// Any previously attached engine is shut down first.
    pub async fn connect<W, R>(&mut self, writer: W, reader: R) -> Result<(), EngineError>
    where
        W: AsyncWrite + Unpin + Send + 'static,
        R: AsyncRead + Unpin + Send + 'static,
    {
        self.shutdown().await;
        let handshake = self.attach(writer, reader, None);
        self.handshake(handshake).await
    }

    fn attach<W, R>(
        &mut self,
        writer: W,
        reader: R,
        child: Option<Child>,
    ) -> oneshot::Receiver<Result<(), EngineError>>
    where
        W: AsyncWrite + Unpin + Send + 'static,
        R: AsyncRead + Unpin + Send + 'static,
    {
        let (handshake_tx, handshake_rx) = oneshot::channel();
        let session = Arc::new(Mutex::new(Session::new(handshake_tx, self.readiness.clone())));

        let (commands, _writer) = CommandChannel::spawn(writer);
        let reader = spawn_reader(reader, session.clone());
        let on_exit = {
            let session = session.clone();
            move |code| lock(&session).exited(code)
        };
        let supervisor = Supervisor::start(child, reader, on_exit);

        self.link = Some(EngineLink {
            session,
            commands,
            supervisor,
        });
        handshake_rx
    }

    async fn handshake(
        &mut self,
        ready: oneshot::Receiver<Result<(), EngineError>>,
    ) -> Result<(), EngineError> {
        let Some(link) = self.link.as_ref() else {
            return Err(EngineError::NotReady);
        };

        let commands = link.commands.clone();
        let uci_delay = self.config.uci_delay();
        let isready_delay = self.config.isready_delay();
        let ceiling = self.config.handshake_timeout();

        let outcome = tokio::time::timeout(ceiling, async move {
            tokio::time::sleep(uci_delay).await;
            commands.send("uci");
            tokio::time::sleep(isready_delay).await;
            commands.send("isready");
            ready
                .await
                .unwrap_or(Err(EngineError::ProcessExited { code: None }))
        })
        .await;

        let error = match outcome {
            Ok(Ok(())) => {
                tracing::info!(name = ?self.engine_name(), "engine ready");
                return Ok(());
            }
            Ok(Err(e)) => e,
            Err(_) => {
                tracing::error!(timeout_ms = ceiling.as_millis() as u64, "engine handshake timed out");
                EngineError::HandshakeTimeout(ceiling)
            }
        };

        if let Some(link) = self.link.take() {
            lock(&link.session).closing = true;
            link.supervisor.terminate(std::time::Duration::ZERO).await;
        }
        Err(error)
    }

    /// Returns true once `readyok` has been seen and the engine is still alive.
    pub fn is_ready(&self) -> bool {
        self.link
            .as_ref()
            .is_some_and(|link| lock(&link.session).ready)
    }

    /// A handle that reports readiness without borrowing the adapter.
    pub fn readiness(&self) -> Readiness {
        self.readiness.clone()
    }

    /// Name the engine reported in `id name`, if any.
    pub fn engine_name(&self) -> Option<String> {
        self.link
            .as_ref()
            .and_then(|link| lock(&link.session).engine_name.clone())
    }

    /// Sets up a position given as FEN.
    pub fn set_position(&self, fen: &str) {
        self.send(&format!("position fen {}", fen.trim()));
    }

    /// Sets up the position reached by `moves` from the starting position.
    ///
    /// `moves` are in algebraic notation; they are translated to compact
    /// notation through the rules oracle. Illegal moves are skipped.
    pub fn set_moves<S: AsRef<str>>(&mut self, moves: &[S]) {
        let compact = self.translator.to_compact(moves);
        if compact.is_empty() {
            self.send("position startpos");
        } else {
            self.send(&format!("position startpos moves {}", compact.join(" ")));
        }
    }

    /// Asks the engine for its best move in the current position.
    ///
    /// `depth` and `time_limit_ms` are clamped to the configured caps. The
    /// request is abandoned, and the engine told to `stop`, if no answer
    /// arrives within the movetime plus the configured grace period.
    ///
    /// # Errors
    ///
    /// - [`EngineError::NotReady`] before the handshake completed (no `go`
    ///   is sent)
    /// - [`EngineError::RequestInFlight`] while another request is pending
    /// - [`EngineError::MoveTimeout`] when the deadline passes
    /// - [`EngineError::ProcessExited`] if the engine dies meanwhile
    pub async fn request_best_move(
        &self,
        depth: u32,
        time_limit_ms: u64,
    ) -> Result<EngineMove, EngineError> {
        let link = self.link.as_ref().ok_or(EngineError::NotReady)?;
        let depth = self.config.clamp_depth(depth);
        let movetime = self.config.clamp_movetime(time_limit_ms);
        let budget = self.config.move_deadline(movetime);

        let pending = {
            let mut session = lock(&link.session);
            if !session.ready {
                return Err(EngineError::NotReady);
            }
            session.correlator.begin(budget)?
        };
        let PendingMove {
            id,
            mut reply,
            deadline,
            reaped_abandoned,
        } = pending;

        if reaped_abandoned {
            link.commands.send("stop");
        }
        link.commands
            .send(&format!("go depth {} movetime {}", depth, movetime));

        // Expires the request if this future is dropped before it resolves.
        let mut guard = InFlight::new(link, id);
        let outcome = tokio::time::timeout_at(deadline, &mut reply).await;
        match outcome {
            Ok(Ok(result)) => {
                guard.disarm();
                result
            }
            Ok(Err(_)) => {
                guard.disarm();
                Err(EngineError::ProcessExited { code: None })
            }
            Err(_) => {
                if guard.abandon() {
                    tracing::warn!(
                        request = id,
                        budget_ms = budget.as_millis() as u64,
                        "no best move in time, stopping search"
                    );
                    return Err(EngineError::MoveTimeout(budget));
                }
                // answered in the same instant the deadline passed
                reply
                    .try_recv()
                    .unwrap_or(Err(EngineError::MoveTimeout(budget)))
            }
        }
    }

    /// Sets up `history`, asks for a move and translates it to SAN.
    pub async fn suggest_move<S: AsRef<str>>(
        &mut self,
        history: &[S],
        depth: u32,
        time_limit_ms: u64,
    ) -> Result<Suggestion, EngineError> {
        self.set_moves(history);
        let engine_move = self.request_best_move(depth, time_limit_ms).await?;
        let algebraic = self
            .translator
            .to_algebraic(&engine_move.compact_move, history);
        let white_to_move = self.translator.white_to_move_after(history);
        Ok(Suggestion {
            white_score: engine_move.white_relative(white_to_move),
            engine_move,
            algebraic,
        })
    }

    /// SAN for an engine move played after `history`.
    pub fn to_algebraic<S: AsRef<str>>(&mut self, compact: &str, history: &[S]) -> String {
        self.translator.to_algebraic(compact, history)
    }

    /// Tells the engine to stop searching. The pending request, if any,
    /// still resolves with whatever `bestmove` the engine then reports.
    pub fn stop_search(&self) {
        self.send("stop");
    }

    /// Sends `quit` and shuts the engine down, killing it if it lingers.
    ///
    /// Safe to call repeatedly.
    pub async fn quit(&mut self) {
        self.shutdown().await;
    }

    async fn shutdown(&mut self) {
        let Some(link) = self.link.take() else {
            return;
        };
        lock(&link.session).closing = true;
        if !link.supervisor.is_finished() {
            link.commands.send("quit");
        }
        link.supervisor.terminate(self.config.quit_grace()).await;
    }

    fn send(&self, command: &str) {
        match &self.link {
            Some(link) => link.commands.send(command),
            None => tracing::trace!(command, "no engine attached, command dropped"),
        }
    }
}

/// Keeps a search request accounted for until its caller stops waiting.
///
/// Dropping an armed guard marks the request abandoned and stops the search,
/// so a caller that is cancelled (a timed-out HTTP handler, a closed
/// socket) leaves no engine work running and its late `bestmove` is
/// discarded.
struct InFlight<'a> {
    link: &'a EngineLink,
    id: u64,
    armed: bool,
}

impl<'a> InFlight<'a> {
    fn new(link: &'a EngineLink, id: u64) -> Self {
        Self {
            link,
            id,
            armed: true,
        }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }

    /// Expires the request and sends `stop`. Returns false if it had already
    /// been answered.
    fn abandon(&mut self) -> bool {
        self.armed = false;
        let expired = lock(&self.link.session).correlator.expire(self.id);
        if expired {
            self.link.commands.send("stop");
        }
        expired
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if self.armed && self.abandon() {
            tracing::debug!(request = self.id, "search request dropped, stopping search");
        }
    }
}

fn spawn_reader<R>(mut reader: R, session: SharedSession) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut parser = OutputParser::new();
        let mut buf = vec![0u8; 4096];
        loop {
            let n = match reader.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) => {
                    tracing::warn!(error = %e, "engine output read failed");
                    break;
                }
            };
            let events = parser.feed(&buf[..n]);
            if events.is_empty() {
                continue;
            }
            let mut session = lock(&session);
            for event in events {
                session.dispatch(event);
            }
        }
        if let Some(event) = parser.finish() {
            lock(&session).dispatch(event);
        }
    })
}
