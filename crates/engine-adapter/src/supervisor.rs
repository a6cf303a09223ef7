//! Engine process lifecycle: spawn, exit detection, termination.

use crate::error::EngineError;
use std::future::Future;
use std::io;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// A freshly spawned engine with its pipes split out.
pub struct SpawnedEngine {
    pub child: Child,
    pub stdin: ChildStdin,
    pub stdout: ChildStdout,
    pub stderr: ChildStderr,
}

/// Launches the engine executable with no arguments.
///
/// All three standard streams are piped for the adapter's exclusive use and
/// the process is killed if its handle is dropped.
///
/// # Errors
///
/// Returns [`EngineError::Spawn`] if the executable cannot be started,
/// typically because it does not exist or lacks execute permission.
pub fn spawn(path: &Path) -> Result<SpawnedEngine, EngineError> {
    let mut child = Command::new(path)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| EngineError::Spawn {
            path: path.to_path_buf(),
            source,
        })?;

    let stdin = child.stdin.take().ok_or_else(|| missing_pipe("stdin"))?;
    let stdout = child.stdout.take().ok_or_else(|| missing_pipe("stdout"))?;
    let stderr = child.stderr.take().ok_or_else(|| missing_pipe("stderr"))?;

    Ok(SpawnedEngine {
        child,
        stdin,
        stdout,
        stderr,
    })
}

fn missing_pipe(name: &str) -> EngineError {
    EngineError::Io(io::Error::other(format!("engine {} was not captured", name)))
}

/// Surfaces everything the engine writes to stderr as log warnings.
///
/// Stderr is diagnostic only and never interpreted as protocol.
pub fn forward_stderr(stderr: ChildStderr) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut lines = BufReader::new(stderr).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            tracing::warn!(target: "engine_adapter::stderr", "{}", line);
        }
    })
}

/// Watches an engine until it exits and reports how it ended.
///
/// Dropping the supervisor kills the engine.
pub struct Supervisor {
    pid: Option<u32>,
    kill_tx: Option<oneshot::Sender<()>>,
    monitor: JoinHandle<()>,
}

impl Supervisor {
    /// Starts watching.
    ///
    /// `reader` is the task draining the engine's stdout. `on_exit` runs
    /// once, after the process has exited and `reader` has finished, so
    /// lines written just before exit are processed before the exit is
    /// reported. Without a `child` (an engine attached over plain streams)
    /// the end of `reader` counts as the exit.
    pub fn start<F>(child: Option<Child>, reader: JoinHandle<()>, on_exit: F) -> Self
    where
        F: FnOnce(Option<i32>) + Send + 'static,
    {
        let (kill_tx, kill_rx) = oneshot::channel();
        let pid = child.as_ref().and_then(Child::id);
        let monitor = tokio::spawn(async move {
            let code = watch(child, reader, kill_rx).await;
            on_exit(code);
        });

        Self {
            pid,
            kill_tx: Some(kill_tx),
            monitor,
        }
    }

    /// OS process id, if the engine is a child process.
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Returns true once the engine has exited and the exit was reported.
    pub fn is_finished(&self) -> bool {
        self.monitor.is_finished()
    }

    /// Waits up to `grace` for the engine to exit on its own, then kills it.
    ///
    /// The caller is expected to have sent `quit` already.
    pub async fn terminate(mut self, grace: Duration) {
        if tokio::time::timeout(grace, &mut self.monitor).await.is_ok() {
            return;
        }
        tracing::debug!(pid = self.pid, "engine did not exit in time, killing");
        if let Some(kill) = self.kill_tx.take() {
            let _ = kill.send(());
        }
        let _ = (&mut self.monitor).await;
    }
}

fn watch(
    child: Option<Child>,
    mut reader: JoinHandle<()>,
    kill_rx: oneshot::Receiver<()>,
) -> impl Future<Output = Option<i32>> {
    async move {
        let Some(mut child) = child else {
            tokio::select! {
                _ = &mut reader => {}
                _ = kill_rx => reader.abort(),
            }
            return None;
        };

        let status = tokio::select! {
            status = child.wait() => status,
            _ = kill_rx => {
                if let Err(e) = child.kill().await {
                    tracing::warn!(error = %e, "failed to kill engine");
                }
                child.wait().await
            }
        };

        let _ = reader.await;
        match status {
            Ok(status) => status.code(),
            Err(e) => {
                tracing::warn!(error = %e, "failed to observe engine exit");
                None
            }
        }
    }
}
