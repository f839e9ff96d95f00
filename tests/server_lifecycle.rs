//! Server runner behavior against real sockets.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::Notify;
use tokio::time::Instant;

use wasfa_api::config::WebConfig;
use wasfa_api::http::{HttpServer, ServeError};
use wasfa_api::lifecycle::DrainError;
use wasfa_api::net::ListenerError;

mod common;

#[tokio::test]
async fn drain_with_no_connections_is_immediate() {
    let started = Arc::new(Notify::new());
    let (mut control, _outcome, addr) =
        common::start_server(common::local_config(), common::test_routes(started)).await;

    let begin = Instant::now();
    control
        .shutdown(Instant::now() + Duration::from_secs(20))
        .await
        .expect("empty drain should succeed");
    assert!(begin.elapsed() < Duration::from_secs(1));

    assert!(TcpStream::connect(addr).await.is_err(), "listener should be closed");
}

#[tokio::test]
async fn drain_waits_for_in_flight_request() {
    let started = Arc::new(Notify::new());
    let (mut control, _outcome, addr) =
        common::start_server(common::local_config(), common::test_routes(Arc::clone(&started))).await;

    let client = common::client();
    let request = tokio::spawn(async move { client.get(format!("http://{addr}/slow")).send().await });
    common::wait_started(&started).await;
    assert_eq!(control.active_connections(), 1);

    control
        .shutdown(Instant::now() + Duration::from_secs(5))
        .await
        .expect("in-flight request should finish before the deadline");

    let response = request.await.unwrap().expect("request should complete");
    assert_eq!(response.status(), 200);
    assert_eq!(response.text().await.unwrap(), "done");
    assert_eq!(control.active_connections(), 0);
}

#[tokio::test]
async fn stuck_request_times_out_then_force_close_ends_it() {
    let started = Arc::new(Notify::new());
    let (mut control, _outcome, addr) =
        common::start_server(common::local_config(), common::test_routes(Arc::clone(&started))).await;

    let client = common::client();
    let request = tokio::spawn(async move { client.get(format!("http://{addr}/forever")).send().await });
    common::wait_started(&started).await;

    let err = control
        .shutdown(Instant::now() + Duration::from_millis(200))
        .await
        .expect_err("drain cannot finish");
    assert!(matches!(err, DrainError::DeadlineExceeded { in_flight: 1 }));

    control.force_close().await.expect("force close should succeed");
    assert_eq!(control.active_connections(), 0);

    let result = tokio::time::timeout(Duration::from_secs(5), request)
        .await
        .expect("client should see the connection drop")
        .unwrap();
    assert!(result.is_err());
}

#[tokio::test]
async fn bind_failure_is_reported_as_outcome() {
    let occupied = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let config = WebConfig {
        api_host: occupied.local_addr().unwrap().to_string(),
        ..WebConfig::default()
    };

    let (control, outcome) = HttpServer::new(config, axum::Router::new()).start().split();

    let err = tokio::time::timeout(Duration::from_secs(5), outcome.recv())
        .await
        .expect("bind failure should be reported");
    assert!(matches!(err, ServeError::Listener(ListenerError::Bind { .. })));
    assert_eq!(control.listening().await, None);
}

#[tokio::test]
async fn write_timeout_answers_408() {
    let started = Arc::new(Notify::new());
    let config = WebConfig {
        write_timeout: Duration::from_millis(100),
        ..common::local_config()
    };
    let (_control, _outcome, addr) = common::start_server(config, common::test_routes(started)).await;

    let response = common::client()
        .get(format!("http://{addr}/forever"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 408);
}

#[tokio::test]
async fn idle_connection_is_closed() {
    let started = Arc::new(Notify::new());
    let config = WebConfig {
        idle_timeout: Duration::from_millis(200),
        ..common::local_config()
    };
    let (control, _outcome, addr) = common::start_server(config, common::test_routes(started)).await;

    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream
        .write_all(b"GET /fast HTTP/1.1\r\nHost: localhost\r\n\r\n")
        .await
        .unwrap();

    let mut received = Vec::new();
    tokio::time::timeout(Duration::from_secs(5), stream.read_to_end(&mut received))
        .await
        .expect("server should close the idle keep-alive connection")
        .unwrap();

    assert!(received.starts_with(b"HTTP/1.1 200"));
    drop(control);
}

#[tokio::test]
async fn request_longer_than_idle_timeout_keeps_connection_open() {
    let started = Arc::new(Notify::new());
    let config = WebConfig {
        idle_timeout: Duration::from_millis(200),
        ..common::local_config()
    };
    let (control, _outcome, addr) = common::start_server(config, common::test_routes(started)).await;

    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream
        .write_all(b"GET /slow HTTP/1.1\r\nHost: localhost\r\n\r\n")
        .await
        .unwrap();
    let first = read_response(&mut stream, b"done").await;
    assert!(first.starts_with("HTTP/1.1 200"));
    assert!(!first.to_ascii_lowercase().contains("connection: close"), "{first}");

    stream
        .write_all(b"GET /fast HTTP/1.1\r\nHost: localhost\r\n\r\n")
        .await
        .unwrap();
    let second = read_response(&mut stream, b"ok").await;
    assert!(second.starts_with("HTTP/1.1 200"), "{second}");
    drop(control);
}

/// Read from a keep-alive connection until the body ends with `body`.
async fn read_response(stream: &mut TcpStream, body: &[u8]) -> String {
    let mut received = Vec::new();
    let mut buf = [0u8; 1024];
    tokio::time::timeout(Duration::from_secs(5), async {
        while !received.ends_with(body) {
            let n = stream.read(&mut buf).await.unwrap();
            assert!(n > 0, "connection closed before the response finished");
            received.extend_from_slice(&buf[..n]);
        }
    })
    .await
    .expect("response should arrive");
    String::from_utf8(received).unwrap()
}

#[tokio::test]
async fn liveness_reports_build() {
    let build = wasfa_api::lifecycle::BuildInfo::new("test-build", "wasfa");
    let (_control, _outcome, addr) =
        common::start_server(common::local_config(), wasfa_api::http::api_routes(build)).await;

    let body: serde_json::Value = common::client()
        .get(format!("http://{addr}/v1/liveness"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["status"], "up");
    assert_eq!(body["build"], "test-build");
}

#[tokio::test]
async fn dropping_control_stops_the_server() {
    let started = Arc::new(Notify::new());
    let (control, _outcome, addr) =
        common::start_server(common::local_config(), common::test_routes(started)).await;

    drop(control);

    let mut refused = false;
    for _ in 0..50 {
        if TcpStream::connect(addr).await.is_err() {
            refused = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(refused, "listener should be released when control is dropped");
}
