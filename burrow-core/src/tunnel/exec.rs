//! Process execution capability consumed by the supervisor
//!
//! A [`ProcessExecutor`] starts the tunnel binary and reports back through
//! the [`ProcessEvents`] it is handed: every output chunk goes to
//! [`ProcessEvents::output`], and an unexpected exit to
//! [`ProcessEvents::crash`]. [`TokioExecutor`] is the production
//! implementation.

use std::io::ErrorKind;

use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Split};
use tokio::process::Child;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::cloudflared::TunnelCommand;
use super::parser::LogParser;
use crate::error::TunnelError;

/// How a tunnel process ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessExit {
    pub code: Option<i32>,
    pub reason: String,
}

impl ProcessExit {
    pub fn new(code: Option<i32>, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
        }
    }
}

impl std::fmt::Display for ProcessExit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.code {
            Some(code) => write!(f, "{} (code {})", self.reason, code),
            None => write!(f, "{}", self.reason),
        }
    }
}

/// Event sink for one process attempt
///
/// Owns the attempt's [`LogParser`]. Dropping it without calling
/// [`crash`](Self::crash) tells the supervisor the executor is done with the
/// process and nothing will be reported for it.
#[derive(Debug)]
pub struct ProcessEvents {
    attempt: u32,
    parser: LogParser,
    crash_tx: oneshot::Sender<ProcessExit>,
    cancel: CancellationToken,
}

impl ProcessEvents {
    pub(crate) fn new(
        attempt: u32,
        parser: LogParser,
        cancel: CancellationToken,
    ) -> (Self, oneshot::Receiver<ProcessExit>) {
        let (crash_tx, crash_rx) = oneshot::channel();
        let events = Self {
            attempt,
            parser,
            crash_tx,
            cancel,
        };
        (events, crash_rx)
    }

    /// 1-based attempt number this sink belongs to
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Deliver a chunk of console output
    pub fn output(&mut self, chunk: &str) {
        self.parser.feed(chunk);
    }

    /// Report that the process terminated unexpectedly
    pub fn crash(self, exit: ProcessExit) {
        warn!(attempt = self.attempt, %exit, "Tunnel process crashed");
        let _ = self.crash_tx.send(exit);
    }

    /// Cancelled when the session is closed; executors should stop the process
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }
}

/// Capability to run the tunnel binary
#[async_trait]
pub trait ProcessExecutor: Send + Sync {
    /// Start `command`, routing its output and crash into `events`
    ///
    /// Resolves once the process has been started. Output and crash
    /// notifications may be delivered before or after that.
    async fn spawn(
        &self,
        command: &TunnelCommand,
        events: ProcessEvents,
    ) -> Result<(), TunnelError>;
}

/// Executor backed by `tokio::process`
///
/// Merges stdout and stderr line by line; cloudflared logs to stderr.
/// Both pipes are drained until the child closes them, whatever they carry.
/// Any exit of the child is reported as a crash.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioExecutor;

#[async_trait]
impl ProcessExecutor for TokioExecutor {
    async fn spawn(
        &self,
        command: &TunnelCommand,
        events: ProcessEvents,
    ) -> Result<(), TunnelError> {
        let mut child = command.to_command().spawn().map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                TunnelError::BinaryNotFound {
                    binary: command.program.clone(),
                }
            } else {
                TunnelError::SpawnFailed(e)
            }
        })?;

        info!(
            pid = ?child.id(),
            attempt = events.attempt(),
            "Tunnel process started"
        );

        let stdout = child.stdout.take().map(|s| BufReader::new(s).split(b'\n'));
        let stderr = child.stderr.take().map(|s| BufReader::new(s).split(b'\n'));
        tokio::spawn(watch_process(child, stdout, stderr, events));

        Ok(())
    }
}

enum Output {
    Cancelled,
    Stdout(Option<String>),
    Stderr(Option<String>),
}

async fn watch_process<O, E>(
    mut child: Child,
    mut stdout: Option<Split<O>>,
    mut stderr: Option<Split<E>>,
    mut events: ProcessEvents,
) where
    O: AsyncBufRead + Unpin,
    E: AsyncBufRead + Unpin,
{
    let cancel = events.cancellation().clone();

    while stdout.is_some() || stderr.is_some() {
        let next = tokio::select! {
            _ = cancel.cancelled() => Output::Cancelled,
            line = next_line(&mut stdout) => Output::Stdout(line),
            line = next_line(&mut stderr) => Output::Stderr(line),
        };

        match next {
            Output::Cancelled => break,
            Output::Stdout(Some(line)) | Output::Stderr(Some(line)) => events.output(&line),
            Output::Stdout(None) => stdout = None,
            Output::Stderr(None) => stderr = None,
        }
    }

    if cancel.is_cancelled() {
        debug!(attempt = events.attempt(), "Stopping tunnel process");
        if let Err(e) = child.kill().await {
            warn!(error = %e, "Failed to kill tunnel process");
        }
        return;
    }

    let exit = match child.wait().await {
        Ok(status) => ProcessExit::new(status.code(), format!("process exited: {}", status)),
        Err(e) => ProcessExit::new(None, format!("failed to wait for process: {}", e)),
    };
    events.crash(exit);
}

/// Next line of an output stream; pending forever once the stream is gone
///
/// Returns `None` only at end of stream. Bytes that are not UTF-8 are
/// replaced, and a failed read yields an empty line so the pipe keeps
/// being drained.
async fn next_line<R>(lines: &mut Option<Split<R>>) -> Option<String>
where
    R: AsyncBufRead + Unpin,
{
    let Some(lines) = lines else {
        return std::future::pending().await;
    };

    match lines.next_segment().await {
        Ok(Some(bytes)) => Some(decode_line(&bytes)),
        Ok(None) => None,
        Err(e) => {
            warn!(error = %e, "Error reading tunnel output");
            Some(String::new())
        }
    }
}

fn decode_line(bytes: &[u8]) -> String {
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    String::from_utf8_lossy(bytes).into_owned()
}
