//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, gauges)
//!
//! Consumers:
//!     → stderr/stdout log collection
//!     → Metrics endpoint on the debug host (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Every lifecycle transition is both logged and counted
//! - Metrics are cheap (atomic increments) and optional

pub mod logging;
pub mod metrics;
