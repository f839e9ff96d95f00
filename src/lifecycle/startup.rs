//! Startup orchestration.
//!
//! # Responsibilities
//! - Carry build identity as an explicit value
//! - Start the metrics endpoint and record build info
//! - Install signal handlers before the listener comes up
//! - Start the API server and hand both event sources to the coordinator
//!
//! # Design Decisions
//! - Fail fast: a startup error is fatal
//! - Signals are watched before binding, so none is missed
//! - Every exit path runs the same teardown (`LifecycleScope`, `ServerControl` drop)

use std::io;
use std::net::SocketAddr;
use std::time::Instant;

use axum::Router;

use crate::config::AppConfig;
use crate::http::HttpServer;
use crate::lifecycle::shutdown::{Coordinator, RunResult};
use crate::lifecycle::signals::SignalWatcher;
use crate::observability::metrics;

/// Build identity, fixed at compile time and passed to whoever needs it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildInfo {
    pub build: String,
    pub desc: String,
}

impl BuildInfo {
    pub fn new(build: impl Into<String>, desc: impl Into<String>) -> Self {
        Self {
            build: build.into(),
            desc: desc.into(),
        }
    }

    /// Build reference from `BUILD_REF` at compile time, `develop` otherwise.
    pub fn current() -> Self {
        Self::new(option_env!("BUILD_REF").unwrap_or("develop"), "wasfa")
    }
}

/// Errors that prevent the lifecycle from starting at all.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("installing signal handlers: {0}")]
    Signal(#[source] io::Error),
}

/// Logs start and completion around the whole run, whatever the outcome.
pub struct LifecycleScope {
    started: Instant,
}

impl LifecycleScope {
    pub fn enter(build: &BuildInfo) -> Self {
        tracing::info!(version = %build.build, desc = %build.desc, "Starting service");
        Self {
            started: Instant::now(),
        }
    }
}

impl Drop for LifecycleScope {
    fn drop(&mut self) {
        tracing::info!(uptime = ?self.started.elapsed(), "Shutdown complete");
    }
}

/// Run the service until it fails or is asked to stop.
pub async fn run(config: AppConfig, build: BuildInfo, routes: Router) -> Result<RunResult, StartupError> {
    let _scope = LifecycleScope::enter(&build);

    let parallelism = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
    tracing::info!(parallelism, "startup");
    tracing::info!(config = ?config, "startup");

    if config.observability.metrics_enabled {
        start_debug_endpoint(&config.web.debug_host);
    }
    metrics::record_build_info(&build);

    let signals = SignalWatcher::watch().map_err(StartupError::Signal)?;

    tracing::info!(host = %config.web.api_host, "Initializing API support");
    let (mut control, outcome) = HttpServer::new(config.web.clone(), routes).start().split();

    let result = Coordinator::new(config.web.shutdown_timeout)
        .run(&mut control, outcome.recv(), signals.recv())
        .await;

    match &result {
        RunResult::CleanShutdown => tracing::info!(phase = %result.phase(), "Run finished"),
        other => tracing::error!(phase = %other.phase(), error = %other, "Run finished"),
    }
    Ok(result)
}

/// Metrics are served from the debug host. Failure here is logged, not fatal.
fn start_debug_endpoint(debug_host: &str) {
    match debug_host.parse::<SocketAddr>() {
        Ok(addr) => {
            if let Err(e) = metrics::init_metrics(addr) {
                tracing::error!(address = %addr, error = %e, "Failed to start metrics endpoint");
            }
        }
        Err(e) => {
            tracing::error!(debug_host = %debug_host, error = %e, "Failed to parse debug host");
        }
    }
}
