//! Wasfa API service library.
//!
//! Brings the API listener online, waits for either a fatal serving error
//! or a termination signal, and drives a bounded graceful shutdown.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod resilience;

pub use config::AppConfig;
pub use http::HttpServer;
pub use lifecycle::{Coordinator, RunResult};
