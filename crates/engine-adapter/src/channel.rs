//! Ordered command delivery to the engine's stdin.

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Writer half of the protocol.
///
/// Commands go through an unbounded queue drained by a single writer task,
/// so they reach the engine in exactly the order [`send`](Self::send) was
/// called. Once the writer has stopped (the pipe broke or the process is
/// gone) further sends are dropped without error, which keeps shutdown
/// races harmless.
#[derive(Debug, Clone)]
pub struct CommandChannel {
    tx: mpsc::UnboundedSender<String>,
}

impl CommandChannel {
    /// Starts the writer task over `writer`.
    pub fn spawn<W>(writer: W) -> (Self, JoinHandle<()>)
    where
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel::<String>();
        let task = tokio::spawn(write_commands(writer, rx));
        (Self { tx }, task)
    }

    /// Queues a command. The trailing newline is added by the writer.
    pub fn send(&self, command: &str) {
        tracing::debug!(command, "-> engine");
        if self.tx.send(command.to_string()).is_err() {
            tracing::trace!(command, "engine input closed, command dropped");
        }
    }

    /// Returns true once the writer task has stopped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

async fn write_commands<W>(mut writer: W, mut rx: mpsc::UnboundedReceiver<String>)
where
    W: AsyncWrite + Unpin,
{
    while let Some(command) = rx.recv().await {
        let mut line = command.into_bytes();
        line.push(b'\n');
        if let Err(e) = writer.write_all(&line).await {
            tracing::debug!(error = %e, "engine input write failed");
            break;
        }
        if writer.flush().await.is_err() {
            break;
        }
    }
}
