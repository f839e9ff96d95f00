//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection (net::listener)
//!     → server.rs (hyper connection, Axum router, middleware)
//!     → routes.rs (liveness) or caller-supplied routes
//!     → Send to client
//!
//! Control:
//!     coordinator → handle.rs (ServerControl) → serve task
//!     serve task  → handle.rs (ServeOutcome)  → coordinator
//! ```

pub mod handle;
pub mod routes;
pub mod server;

pub use handle::{ServeError, ServeOutcome, ServerControl, ServerHandle};
pub use routes::api_routes;
pub use server::HttpServer;
