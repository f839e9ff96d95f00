//! HTTP server setup and the accept/serve loop.
//!
//! # Responsibilities
//! - Wrap the Axum Router with tracing and per-request timeout
//! - Bind the listener inside the serve task and report the result
//! - Serve HTTP/1.1 and HTTP/2 connections, one task per connection
//! - Close idle keep-alive connections
//! - On drain: stop accepting, let connections finish, then return
//! - On close: abort every connection

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ConnectInfo;
use axum::http::Request;
use axum::Router;
use hyper::body::Incoming;
use hyper_util::rt::{TokioExecutor, TokioIo, TokioTimer};
use hyper_util::server::conn::auto::Builder;
use hyper_util::service::TowerToHyperService;
use tokio::net::TcpStream;
use tokio::sync::{oneshot, watch};
use tokio::task::{JoinError, JoinSet};
use tokio::time::Instant;
use tower::ServiceExt;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::WebConfig;
use crate::http::handle::{BindState, Command, ServeError, ServeOutcome, ServerControl, ServerHandle};
use crate::net::{ConnectionGuard, ConnectionPermit, ConnectionTracker, Listener};
use crate::observability::metrics;
use crate::resilience::Backoff;

/// First accept retry delay.
const ACCEPT_BACKOFF_BASE_MS: u64 = 5;
/// Accept retry delay ceiling.
const ACCEPT_BACKOFF_MAX_MS: u64 = 1_000;
/// Consecutive non-transient accept failures before the listener gives up.
const MAX_ACCEPT_FAILURES: u32 = 10;

/// HTTP server for the API.
pub struct HttpServer {
    router: Router,
    config: WebConfig,
}

impl HttpServer {
    /// Create a new HTTP server serving `routes` with the given configuration.
    pub fn new(config: WebConfig, routes: Router) -> Self {
        let router = Self::build_router(&config, routes);
        Self { router, config }
    }

    /// Apply the middleware layers every route gets.
    #[allow(deprecated)]
    fn build_router(config: &WebConfig, routes: Router) -> Router {
        routes
            .layer(TimeoutLayer::new(config.write_timeout))
            .layer(TraceLayer::new_for_http())
    }

    /// Spawn the serve task and return immediately.
    ///
    /// Binding happens inside the task; a bind failure is delivered through
    /// the returned handle's [`ServeOutcome`]. Must be called inside a Tokio
    /// runtime.
    pub fn start(self) -> ServerHandle {
        let (outcome_tx, outcome_rx) = oneshot::channel();
        let (commands_tx, commands_rx) = watch::channel(Command::Serve);
        let (bind_tx, bind_rx) = watch::channel(BindState::Pending);
        let tracker = ConnectionTracker::new();

        let task = tokio::spawn(self.serve(
            commands_tx.subscribe(),
            bind_tx,
            outcome_tx,
            tracker.clone(),
        ));

        ServerHandle::new(
            ServerControl::new(commands_tx, bind_rx, tracker, task),
            ServeOutcome::new(outcome_rx, commands_rx),
        )
    }

    fn connection_builder(&self) -> Builder<TokioExecutor> {
        let mut builder = Builder::new(TokioExecutor::new());
        builder
            .http1()
            .timer(TokioTimer::new())
            .header_read_timeout(self.config.read_timeout);
        builder.http2().timer(TokioTimer::new());
        builder
    }

    async fn serve(
        self,
        mut commands: watch::Receiver<Command>,
        bind_tx: watch::Sender<BindState>,
        outcome_tx: oneshot::Sender<ServeError>,
        tracker: ConnectionTracker,
    ) {
        let listener = match Listener::bind(&self.config).await {
            Ok(listener) => listener,
            Err(e) => {
                tracing::error!(address = %self.config.api_host, error = %e, "API listener failed to start");
                let _ = outcome_tx.send(ServeError::Listener(e));
                bind_tx.send_replace(BindState::Failed);
                return;
            }
        };

        let local_addr = listener.local_addr().ok();
        bind_tx.send_replace(local_addr.map_or(BindState::Failed, BindState::Bound));
        tracing::info!(
            address = ?local_addr,
            max_connections = listener.max_connections(),
            read_timeout = ?self.config.read_timeout,
            write_timeout = ?self.config.write_timeout,
            idle_timeout = ?self.config.idle_timeout,
            "API router started"
        );

        let builder = Arc::new(self.connection_builder());
        let mut connections = JoinSet::new();
        let mut backoff = Backoff::new(ACCEPT_BACKOFF_BASE_MS, ACCEPT_BACKOFF_MAX_MS, MAX_ACCEPT_FAILURES);
        // Running out of descriptors is retried for as long as it lasts.
        let mut pressure = Backoff::new(ACCEPT_BACKOFF_BASE_MS, ACCEPT_BACKOFF_MAX_MS, MAX_ACCEPT_FAILURES);

        loop {
            tokio::select! {
                _ = commands.changed() => break,
                Some(joined) = connections.join_next(), if !connections.is_empty() => {
                    log_connection_exit(joined);
                }
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer, permit)) => {
                        backoff.reset();
                        pressure.reset();
                        connections.spawn(serve_connection(
                            Arc::clone(&builder),
                            self.router.clone(),
                            stream,
                            peer,
                            permit,
                            tracker.track(),
                            self.config.idle_timeout,
                        ));
                    }
                    Err(e) if e.is_transient() => {
                        metrics::record_accept_error(true);
                        tracing::debug!(error = %e, "Transient accept error");
                    }
                    Err(e) if e.is_resource_exhausted() => {
                        metrics::record_accept_error(true);
                        let delay = pressure.retry();
                        tracing::warn!(error = %e, retry_in = ?delay, "Accept out of resources, backing off");
                        tokio::time::sleep(delay).await;
                    }
                    Err(e) => {
                        metrics::record_accept_error(false);
                        match backoff.fail() {
                            Some(delay) => {
                                tracing::warn!(
                                    error = %e,
                                    failures = backoff.failures(),
                                    retry_in = ?delay,
                                    "Accept failed, backing off"
                                );
                                tokio::time::sleep(delay).await;
                            }
                            None => {
                                tracing::error!(error = %e, failures = backoff.failures(), "Accept keeps failing, stopping listener");
                                let _ = outcome_tx.send(ServeError::Listener(e));
                                return;
                            }
                        }
                    }
                },
            }
        }

        // Stop accepting before anything else.
        drop(listener);

        let close_now = *commands.borrow_and_update() == Command::Close;
        tracker.begin_drain();
        tracing::info!(in_flight = tracker.active_count(), "Listener closed, draining connections");

        if !close_now && drain_connections(&mut connections, &mut commands).await {
            tracing::info!("All connections drained");
            return;
        }

        let open = connections.len();
        connections.abort_all();
        while connections.join_next().await.is_some() {}
        tracing::warn!(aborted = open, "Connections forcibly closed");
    }
}

/// Wait for every connection to finish. Returns `false` if a close was
/// requested first.
async fn drain_connections(connections: &mut JoinSet<()>, commands: &mut watch::Receiver<Command>) -> bool {
    loop {
        tokio::select! {
            changed = commands.changed() => {
                if changed.is_err() || *commands.borrow_and_update() == Command::Close {
                    return false;
                }
            }
            joined = connections.join_next() => match joined {
                Some(joined) => log_connection_exit(joined),
                None => return true,
            },
        }
    }
}

fn log_connection_exit(joined: Result<(), JoinError>) {
    if let Err(e) = joined {
        if e.is_panic() {
            tracing::error!(error = %e, "Connection task panicked");
        }
    }
}

/// Request activity on one connection.
#[derive(Debug, Clone, Copy)]
struct Activity {
    in_flight: usize,
    idle_since: Instant,
}

impl Activity {
    /// When the connection becomes idle for too long. `None` while a request
    /// is in flight.
    fn idle_deadline(&self, idle_timeout: Duration) -> Option<Instant> {
        (self.in_flight == 0).then(|| self.idle_since + idle_timeout)
    }
}

/// Marks one request in flight. The idle clock restarts when it drops, which
/// is also the case for a request whose future is cancelled.
struct RequestActivity(Arc<watch::Sender<Activity>>);

impl RequestActivity {
    fn begin(activity: Arc<watch::Sender<Activity>>) -> Self {
        activity.send_modify(|a| a.in_flight += 1);
        Self(activity)
    }
}

impl Drop for RequestActivity {
    fn drop(&mut self) {
        self.0.send_modify(|a| {
            a.in_flight -= 1;
            a.idle_since = Instant::now();
        });
    }
}

async fn sleep_until_idle(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Serve one connection until it ends, is drained, or goes idle.
async fn serve_connection(
    builder: Arc<Builder<TokioExecutor>>,
    router: Router,
    stream: TcpStream,
    peer: SocketAddr,
    _permit: ConnectionPermit,
    mut guard: ConnectionGuard,
    idle_timeout: Duration,
) {
    let (activity_tx, mut activity) = watch::channel(Activity {
        in_flight: 0,
        idle_since: Instant::now(),
    });
    let activity_tx = Arc::new(activity_tx);

    let service = ServiceExt::<Request<Incoming>>::map_request(router, move |mut request: Request<Incoming>| {
        request.extensions_mut().insert(ConnectInfo(peer));
        request
    });
    let service = ServiceExt::<Request<Incoming>>::map_future(service, move |response| {
        let busy = RequestActivity::begin(Arc::clone(&activity_tx));
        async move {
            let response = response.await;
            drop(busy);
            response
        }
    });

    let connection = builder.serve_connection_with_upgrades(TokioIo::new(stream), TowerToHyperService::new(service));
    tokio::pin!(connection);

    let mut closing = false;
    loop {
        let idle_at = activity.borrow_and_update().idle_deadline(idle_timeout);
        tokio::select! {
            result = connection.as_mut() => {
                if let Err(e) = result {
                    tracing::debug!(connection_id = %guard.id(), peer = %peer, error = %e, "Connection error");
                }
                break;
            }
            _ = guard.draining(), if !closing => {
                closing = true;
                connection.as_mut().graceful_shutdown();
            }
            Ok(()) = activity.changed(), if !closing => {}
            _ = sleep_until_idle(idle_at), if !closing => {
                let still_idle = activity
                    .borrow()
                    .idle_deadline(idle_timeout)
                    .is_some_and(|at| at <= Instant::now());
                if still_idle {
                    tracing::debug!(connection_id = %guard.id(), peer = %peer, "Closing idle connection");
                    closing = true;
                    connection.as_mut().graceful_shutdown();
                }
            }
        }
    }
}
