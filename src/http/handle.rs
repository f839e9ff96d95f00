//! Handle to a running [`HttpServer`](crate::http::HttpServer).
//!
//! [`ServerHandle::split`] separates the two halves the coordinator needs:
//! the [`ServeOutcome`] it races against the stop signal, and the
//! [`ServerControl`] it issues `shutdown`/`force_close` commands through.

use std::net::SocketAddr;

use async_trait::async_trait;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::lifecycle::shutdown::{Drain, DrainError, ForceCloseError};
use crate::net::{ConnectionTracker, ListenerError};

/// Command sent from the control half to the serve task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Command {
    Serve,
    Drain,
    Close,
}

/// Result of the serve task's attempt to bind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BindState {
    Pending,
    Bound(SocketAddr),
    Failed,
}

/// Serving stopped without being asked to.
#[derive(Debug, thiserror::Error)]
pub enum ServeError {
    #[error("server error: {0}")]
    Listener(#[from] ListenerError),
    #[error("server error: serve task ended without reporting")]
    Terminated,
}

pub struct ServerHandle {
    control: ServerControl,
    outcome: ServeOutcome,
}

impl ServerHandle {
    pub(crate) fn new(control: ServerControl, outcome: ServeOutcome) -> Self {
        Self { control, outcome }
    }

    pub fn split(self) -> (ServerControl, ServeOutcome) {
        (self.control, self.outcome)
    }
}

/// One-shot report of a serving failure.
///
/// Never resolves if serving ends because a drain or close was requested.
pub struct ServeOutcome {
    rx: oneshot::Receiver<ServeError>,
    commands: watch::Receiver<Command>,
}

impl ServeOutcome {
    pub(crate) fn new(rx: oneshot::Receiver<ServeError>, commands: watch::Receiver<Command>) -> Self {
        Self { rx, commands }
    }

    /// Wait for the serve task to report a failure.
    ///
    /// A serve task that vanishes (panic, abort) while still expected to be
    /// serving is reported as [`ServeError::Terminated`].
    pub async fn recv(self) -> ServeError {
        let result = self.rx.await;
        let stop_requested = *self.commands.borrow() != Command::Serve;
        match result {
            Ok(err) => err,
            Err(_) if stop_requested => std::future::pending().await,
            Err(_) => ServeError::Terminated,
        }
    }
}

/// Command side of a running server.
///
/// Dropping it force-closes whatever is still running.
pub struct ServerControl {
    commands: watch::Sender<Command>,
    bind_state: watch::Receiver<BindState>,
    tracker: ConnectionTracker,
    task: Option<JoinHandle<()>>,
}

impl ServerControl {
    pub(crate) fn new(
        commands: watch::Sender<Command>,
        bind_state: watch::Receiver<BindState>,
        tracker: ConnectionTracker,
        task: JoinHandle<()>,
    ) -> Self {
        Self {
            commands,
            bind_state,
            tracker,
            task: Some(task),
        }
    }

    /// Wait for the bind attempt. `None` if the listener failed to start.
    pub async fn listening(&self) -> Option<SocketAddr> {
        let mut rx = self.bind_state.clone();
        let state = match rx.wait_for(|state| *state != BindState::Pending).await {
            Ok(state) => *state,
            Err(_) => BindState::Failed,
        };
        match state {
            BindState::Bound(addr) => Some(addr),
            _ => None,
        }
    }

    pub fn active_connections(&self) -> u64 {
        self.tracker.active_count()
    }

    /// Stop accepting, let in-flight requests finish, and wait for every
    /// connection to close, bounded by `deadline`.
    pub async fn shutdown(&mut self, deadline: Instant) -> Result<(), DrainError> {
        self.commands.send_replace(Command::Drain);

        let Some(task) = self.task.as_mut() else {
            return Ok(());
        };

        match tokio::time::timeout_at(deadline, task).await {
            Ok(joined) => {
                self.task = None;
                joined?;
                Ok(())
            }
            Err(_) => Err(DrainError::DeadlineExceeded {
                in_flight: self.tracker.active_count(),
            }),
        }
    }

    /// Terminate every connection and the serve task immediately.
    pub async fn force_close(&mut self) -> Result<(), ForceCloseError> {
        self.commands.send_replace(Command::Close);

        match self.task.take() {
            Some(task) => Ok(task.await?),
            None => Ok(()),
        }
    }
}

impl Drop for ServerControl {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            self.commands.send_replace(Command::Close);
            task.abort();
        }
    }
}

#[async_trait]
impl Drain for ServerControl {
    async fn shutdown(&mut self, deadline: Instant) -> Result<(), DrainError> {
        ServerControl::shutdown(self, deadline).await
    }

    async fn force_close(&mut self) -> Result<(), ForceCloseError> {
        ServerControl::force_close(self).await
    }

    fn in_flight(&self) -> u64 {
        self.active_connections()
    }
}
