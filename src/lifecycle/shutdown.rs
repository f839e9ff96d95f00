//! Shutdown coordination.
//!
//! # State machine
//! ```text
//! Running ──serve error──▶ Failed
//!    │
//!    └──stop signal──▶ Draining ──drained in time──▶ Stopped
//!                          │
//!                          └──deadline / error──▶ force close ──▶ ForceStopped
//! ```
//!
//! `Running` is a single race between the server's [`ServeOutcome`] and the
//! [`ShutdownSignal`]; whichever resolves first decides the branch and the
//! other future is dropped. `Draining` gets exactly one `shutdown` call,
//! bounded by `now + shutdown_timeout`; on failure `force_close` is called
//! exactly once. There is no retry.
//!
//! [`ServeOutcome`]: crate::http::ServeOutcome

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinError;
use tokio::time::Instant;

use crate::http::ServeError;
use crate::lifecycle::signals::ShutdownSignal;
use crate::observability::metrics;

/// Commands the coordinator may issue to a running server.
#[async_trait]
pub trait Drain: Send {
    /// Stop accepting and wait for in-flight work to finish before `deadline`.
    async fn shutdown(&mut self, deadline: Instant) -> Result<(), DrainError>;

    /// Terminate every connection immediately.
    async fn force_close(&mut self) -> Result<(), ForceCloseError>;

    /// Connections still open, for diagnostics.
    fn in_flight(&self) -> u64 {
        0
    }
}

/// Graceful drain did not complete.
#[derive(Debug, thiserror::Error)]
pub enum DrainError {
    #[error("drain deadline exceeded with {in_flight} connection(s) still open")]
    DeadlineExceeded { in_flight: u64 },
    #[error("serve task failed while draining: {0}")]
    Join(#[from] JoinError),
}

/// Forced close did not complete cleanly.
#[derive(Debug, thiserror::Error)]
pub enum ForceCloseError {
    #[error("serve task failed while closing: {0}")]
    Join(#[from] JoinError),
}

/// The drain failed and the server was forcibly closed.
#[derive(Debug, thiserror::Error)]
#[error("could not stop server gracefully: {drain}")]
pub struct ShutdownError {
    #[source]
    pub drain: DrainError,
    /// Set when the forced close itself failed as well.
    pub force_close: Option<ForceCloseError>,
}

/// Coordinator phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Running,
    Draining,
    Stopped,
    ForceStopped,
    Failed,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Running => "running",
            Phase::Draining => "draining",
            Phase::Stopped => "stopped",
            Phase::ForceStopped => "force_stopped",
            Phase::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Stopped | Phase::ForceStopped | Phase::Failed)
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal outcome of the whole lifecycle.
#[derive(Debug)]
pub enum RunResult {
    CleanShutdown,
    ServeError(ServeError),
    ShutdownError(ShutdownError),
}

impl RunResult {
    /// The terminal phase this result was produced in.
    pub fn phase(&self) -> Phase {
        match self {
            RunResult::CleanShutdown => Phase::Stopped,
            RunResult::ServeError(_) => Phase::Failed,
            RunResult::ShutdownError(_) => Phase::ForceStopped,
        }
    }

    pub fn is_clean(&self) -> bool {
        matches!(self, RunResult::CleanShutdown)
    }

    /// Process exit status: zero only for a clean shutdown.
    pub fn exit_code(&self) -> u8 {
        if self.is_clean() {
            0
        } else {
            1
        }
    }
}

impl std::fmt::Display for RunResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunResult::CleanShutdown => f.write_str("clean shutdown"),
            RunResult::ServeError(e) => write!(f, "{}", e),
            RunResult::ShutdownError(e) => write!(f, "{}", e),
        }
    }
}

/// Races serve failure against the stop signal and drives the drain.
#[derive(Debug, Clone)]
pub struct Coordinator {
    shutdown_timeout: Duration,
}

impl Coordinator {
    pub fn new(shutdown_timeout: Duration) -> Self {
        Self { shutdown_timeout }
    }

    /// Run the lifecycle to a terminal state.
    ///
    /// `outcome` resolves only if serving fails; `signal` resolves when a stop
    /// is requested. Both are consumed; the loser is dropped unpolled.
    pub async fn run<S, O, G>(self, server: &mut S, outcome: O, signal: G) -> RunResult
    where
        S: Drain + ?Sized,
        O: Future<Output = ServeError>,
        G: Future<Output = ShutdownSignal>,
    {
        transition(Phase::Running);

        // A server that has already failed cannot be drained, so a serve
        // error wins a tie.
        let signal = tokio::select! {
            biased;
            err = outcome => {
                tracing::error!(error = %err, "Server stopped serving");
                transition(Phase::Failed);
                return RunResult::ServeError(err);
            }
            signal = signal => signal,
        };

        tracing::info!(signal = %signal, "Shutdown started");
        transition(Phase::Draining);
        self.drain(server, signal).await
    }

    async fn drain<S>(&self, server: &mut S, signal: ShutdownSignal) -> RunResult
    where
        S: Drain + ?Sized,
    {
        let deadline = Instant::now() + self.shutdown_timeout;
        tracing::info!(
            timeout = ?self.shutdown_timeout,
            in_flight = server.in_flight(),
            "Draining connections"
        );

        let timed = tokio::time::timeout_at(deadline, server.shutdown(deadline)).await;
        let drained = match timed {
            Ok(result) => result,
            Err(_) => Err(DrainError::DeadlineExceeded {
                in_flight: server.in_flight(),
            }),
        };

        match drained {
            Ok(()) => {
                tracing::info!(signal = %signal, "Drain complete");
                transition(Phase::Stopped);
                RunResult::CleanShutdown
            }
            Err(drain) => {
                tracing::warn!(error = %drain, "Graceful drain failed, forcing close");
                let force_close = match server.force_close().await {
                    Ok(()) => None,
                    Err(e) => {
                        tracing::error!(error = %e, "Forced close failed");
                        Some(e)
                    }
                };
                transition(Phase::ForceStopped);
                RunResult::ShutdownError(ShutdownError { drain, force_close })
            }
        }
    }
}

fn transition(to: Phase) {
    tracing::info!(phase = %to, "Lifecycle transition");
    metrics::record_transition(to.as_str());
}
