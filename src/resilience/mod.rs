//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! accept() fails
//!     → transient connection error? skip
//!     → otherwise backoff.rs (sleep, doubling with jitter)
//!     → run of failures exhausted? surface as a fatal serve error
//! ```
//!
//! # Design Decisions
//! - Only the accept loop retries; the server is never restarted in-process
//! - Retry runs are bounded so a broken listener still ends the process

pub mod backoff;

pub use backoff::Backoff;
