//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Config → Metrics endpoint → Watch signals → Start listener
//!
//! Race (shutdown.rs):
//!     ServeOutcome ──┐
//!                    ├─▶ Coordinator → RunResult → exit status
//!     Signals ───────┘
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → one ShutdownSignal
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then signals, then the listener
//! - Ordered shutdown: stop accept, drain, close
//! - Shutdown has timeout: forced close after deadline

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::{Coordinator, Drain, DrainError, ForceCloseError, Phase, RunResult, ShutdownError};
pub use signals::{ShutdownSignal, SignalWatcher};
pub use startup::{run, BuildInfo, LifecycleScope, StartupError};
