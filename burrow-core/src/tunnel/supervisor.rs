//! Spawn/crash loop for one tunnel session

use std::sync::Arc;

use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::cloudflared::TunnelCommand;
use super::config::TunnelConfig;
use super::exec::{ProcessEvents, ProcessExecutor};
use super::parser::{LogParser, LogPatterns};
use super::restart::RestartPolicy;
use super::state::{StatusCell, TunnelStatus};
use crate::error::TunnelError;

/// Suggestion attached to the retry-exhaustion error
pub const RETRY_SUGGESTION: &str = "Run the command again. If the tunnel keeps crashing, check \
that the tunnel binary starts on its own, or expose the app through your own tunnel URL.";

/// Outcome of the first attempt sequence, sent once
pub type Settled = oneshot::Sender<Result<(), TunnelError>>;

/// Supervises the tunnel process of one session
///
/// Each attempt gets a fresh [`LogParser`]. A crash reported while the
/// executor's `spawn` call is still in progress is handled before the
/// session is considered settled, so a chain of immediate crashes runs to
/// completion before the caller gets a handle. Crashes that arrive later
/// are handled in the background.
pub struct Supervisor {
    executor: Arc<dyn ProcessExecutor>,
    command: TunnelCommand,
    status: StatusCell,
    patterns: Arc<LogPatterns>,
    policy: RestartPolicy,
    provider_name: String,
    max_retries_message: String,
    cancel: CancellationToken,
}

impl Supervisor {
    pub fn new(
        executor: Arc<dyn ProcessExecutor>,
        config: &TunnelConfig,
        local_port: u16,
        status: StatusCell,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            executor,
            command: TunnelCommand::quick(&config.binary, local_port),
            status,
            patterns: Arc::new(config.log_patterns()),
            policy: RestartPolicy::new(),
            provider_name: config.provider_name.clone(),
            max_retries_message: config.max_retries_message(),
            cancel,
        }
    }

    /// Run until the session is closed, fails, or its process goes away
    pub async fn run(mut self, settled: Settled) {
        let mut settled = Some(settled);

        loop {
            let attempt = self.policy.next_attempt();
            let parser = LogParser::new(self.status.clone(), Arc::clone(&self.patterns));
            let (events, mut crash_rx) =
                ProcessEvents::new(attempt, parser, self.cancel.child_token());

            info!(
                attempt,
                max_attempts = self.policy.max_attempts(),
                command = %self.command,
                "Starting tunnel process"
            );

            if let Err(e) = self.executor.spawn(&self.command, events).await {
                self.spawn_failed(&mut settled, e);
                return;
            }

            let crash = match crash_rx.try_recv() {
                Ok(exit) => Some(exit),
                Err(_) => {
                    settle(&mut settled, Ok(()));
                    tokio::select! {
                        _ = self.cancel.cancelled() => None,
                        exit = &mut crash_rx => exit.ok(),
                    }
                }
            };

            let Some(exit) = crash else {
                debug!(attempt, "Tunnel supervision finished");
                settle(&mut settled, Ok(()));
                return;
            };

            if self.cancel.is_cancelled() {
                debug!(attempt, "Tunnel closed, not restarting");
                settle(&mut settled, Ok(()));
                return;
            }

            if self.status.get().is_terminal() {
                debug!(attempt, %exit, "Tunnel already failed, not restarting");
                settle(&mut settled, Ok(()));
                return;
            }

            if !self.policy.should_restart() {
                error!(
                    attempts = self.policy.crashes(),
                    %exit,
                    "Max restart attempts reached, giving up"
                );
                self.status.set(TunnelStatus::Error {
                    message: self.max_retries_message.clone(),
                    suggestion: Some(RETRY_SUGGESTION.to_string()),
                });
                settle(&mut settled, Ok(()));
                return;
            }

            warn!(attempt, %exit, "Restarting tunnel process");
            // The next process gets a new public URL
            self.status.set(TunnelStatus::Starting);
        }
    }

    fn spawn_failed(&self, settled: &mut Option<Settled>, err: TunnelError) {
        match settled.take() {
            Some(tx) => {
                error!(error = %err, "Failed to start tunnel process");
                let _ = tx.send(Err(err));
            }
            None => {
                error!(error = %err, "Failed to restart tunnel process");
                self.status.set(TunnelStatus::error(format!(
                    "Could not restart {} tunnel: {}",
                    self.provider_name, err
                )));
            }
        }
    }
}

fn settle(settled: &mut Option<Settled>, result: Result<(), TunnelError>) {
    if let Some(tx) = settled.take() {
        let _ = tx.send(result);
    }
}
