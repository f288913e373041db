//! Scripted executor for testing
//!
//! ScriptedExecutor plays back a queued script per spawn instead of running
//! a real binary, enabling fast, deterministic tests of the supervisor.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use super::cloudflared::TunnelCommand;
use super::exec::{ProcessEvents, ProcessExecutor, ProcessExit};
use crate::error::TunnelError;

/// One step of a scripted process
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptStep {
    /// Write a chunk of output
    Output(String),
    /// Crash; later steps are skipped
    Crash(ProcessExit),
    /// Keep the process alive; the test drives it via `take_held()`
    Hold,
}

impl ScriptStep {
    pub fn output(chunk: impl Into<String>) -> Self {
        Self::Output(chunk.into())
    }

    pub fn crash() -> Self {
        Self::Crash(ProcessExit::new(Some(1), "Process crashed"))
    }
}

#[derive(Debug, Default)]
struct Inner {
    scripts: VecDeque<Vec<ScriptStep>>,
    fallback: Option<Vec<ScriptStep>>,
    commands: Vec<TunnelCommand>,
    held: Vec<ProcessEvents>,
}

/// In-memory [`ProcessExecutor`]
///
/// Queue scripts with `then()`; each spawn consumes one. When the queue is
/// empty the `repeat()` script is used, or an empty one.
#[derive(Debug, Default)]
pub struct ScriptedExecutor {
    inner: Mutex<Inner>,
    unavailable: bool,
}

impl ScriptedExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Executor whose binary can never be spawned
    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::default()
        }
    }

    /// Queue a script for the next unscripted spawn
    pub fn then(self, steps: Vec<ScriptStep>) -> Self {
        self.lock().scripts.push_back(steps);
        self
    }

    /// Script used once the queue runs dry
    pub fn repeat(self, steps: Vec<ScriptStep>) -> Self {
        self.lock().fallback = Some(steps);
        self
    }

    /// Number of spawn calls so far
    pub fn spawn_count(&self) -> usize {
        self.lock().commands.len()
    }

    /// Commands passed to spawn, in order
    pub fn commands(&self) -> Vec<TunnelCommand> {
        self.lock().commands.clone()
    }

    /// Sink of the most recent process held alive by [`ScriptStep::Hold`]
    pub fn take_held(&self) -> Option<ProcessEvents> {
        self.lock().held.pop()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl ProcessExecutor for ScriptedExecutor {
    async fn spawn(
        &self,
        command: &TunnelCommand,
        mut events: ProcessEvents,
    ) -> Result<(), TunnelError> {
        if self.unavailable {
            return Err(TunnelError::BinaryNotFound {
                binary: command.program.clone(),
            });
        }

        let script = {
            let mut inner = self.lock();
            inner.commands.push(command.clone());
            let fallback = inner.fallback.clone();
            inner.scripts.pop_front().or(fallback).unwrap_or_default()
        };

        for step in script {
            match step {
                ScriptStep::Output(chunk) => events.output(&chunk),
                ScriptStep::Crash(exit) => {
                    events.crash(exit);
                    return Ok(());
                }
                ScriptStep::Hold => {
                    self.lock().held.push(events);
                    return Ok(());
                }
            }
        }

        Ok(())
    }
}
