//! OS signal handling.
//!
//! # Responsibilities
//! - Register SIGINT and SIGTERM handlers up front
//! - Yield the first termination signal as a single [`ShutdownSignal`]
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - Both signals mean "stop"; the identity is kept for logging only
//! - One-shot: [`SignalWatcher::recv`] consumes the watcher
//! - A second signal during drain is not treated specially

use std::io;

/// The stop request that ended the `Running` phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownSignal {
    Interrupt,
    Terminate,
}

impl ShutdownSignal {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShutdownSignal::Interrupt => "SIGINT",
            ShutdownSignal::Terminate => "SIGTERM",
        }
    }
}

impl std::fmt::Display for ShutdownSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Subscription to the process termination signals.
///
/// Handlers are installed by [`SignalWatcher::watch`], so a signal that
/// arrives before anyone awaits [`SignalWatcher::recv`] is not lost.
pub struct SignalWatcher {
    #[cfg(unix)]
    interrupt: tokio::signal::unix::Signal,
    #[cfg(unix)]
    terminate: tokio::signal::unix::Signal,
}

impl SignalWatcher {
    /// Register interest in SIGINT and SIGTERM. Must run inside a Tokio runtime.
    #[cfg(unix)]
    pub fn watch() -> io::Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};

        Ok(Self {
            interrupt: signal(SignalKind::interrupt())?,
            terminate: signal(SignalKind::terminate())?,
        })
    }

    #[cfg(not(unix))]
    pub fn watch() -> io::Result<Self> {
        Ok(Self {})
    }

    /// Wait for the first termination signal.
    #[cfg(unix)]
    pub async fn recv(self) -> ShutdownSignal {
        let Self {
            mut interrupt,
            mut terminate,
        } = self;

        let signal = tokio::select! {
            Some(()) = interrupt.recv() => ShutdownSignal::Interrupt,
            Some(()) = terminate.recv() => ShutdownSignal::Terminate,
            // Both streams closed: no signal can ever arrive.
            else => std::future::pending().await,
        };
        tracing::info!(signal = %signal, "Shutdown signal received");
        signal
    }

    #[cfg(not(unix))]
    pub async fn recv(self) -> ShutdownSignal {
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
        tracing::info!(signal = %ShutdownSignal::Interrupt, "Shutdown signal received");
        ShutdownSignal::Interrupt
    }
}
