//! Shared utilities for server lifecycle tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{routing::get, Router};
use tokio::sync::Notify;

use wasfa_api::config::WebConfig;
use wasfa_api::http::{HttpServer, ServeOutcome, ServerControl};

/// Config bound to an ephemeral loopback port.
pub fn local_config() -> WebConfig {
    WebConfig {
        api_host: "127.0.0.1:0".to_string(),
        ..WebConfig::default()
    }
}

/// Routes for exercising drain behavior.
///
/// `/slow` and `/forever` notify `started` once the handler is running, so a
/// test knows the request is in flight before it starts draining.
pub fn test_routes(started: Arc<Notify>) -> Router {
    let slow_started = Arc::clone(&started);
    let forever_started = started;

    Router::new()
        .route("/fast", get(|| async { "ok" }))
        .route(
            "/slow",
            get(move || {
                let started = Arc::clone(&slow_started);
                async move {
                    started.notify_one();
                    tokio::time::sleep(Duration::from_millis(300)).await;
                    "done"
                }
            }),
        )
        .route(
            "/forever",
            get(move || {
                let started = Arc::clone(&forever_started);
                async move {
                    started.notify_one();
                    std::future::pending::<&'static str>().await
                }
            }),
        )
}

/// Start a server and wait until it is listening.
pub async fn start_server(config: WebConfig, routes: Router) -> (ServerControl, ServeOutcome, SocketAddr) {
    let (control, outcome) = HttpServer::new(config, routes).start().split();
    let addr = control.listening().await.expect("server should bind");
    (control, outcome, addr)
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}

/// Wait until a handler reports it is running.
pub async fn wait_started(started: &Notify) {
    tokio::time::timeout(Duration::from_secs(5), started.notified())
        .await
        .expect("handler should start");
}
