//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! defaults (schema.rs)
//!     → optional TOML file (loader.rs)
//!     → flag / environment overrides (args.rs)
//!     → AppConfig (immutable, passed by value to each subsystem)
//! ```
//!
//! # Design Decisions
//! - Config is immutable once resolved; there is no reload
//! - All fields have defaults to allow running with no config at all
//! - Durations are written as `5s`, `250ms`, `1m30s` (duration.rs)
//! - No semantic validation beyond parsing

pub mod args;
pub mod duration;
pub mod loader;
pub mod schema;

pub use args::Args;
pub use loader::ConfigError;
pub use schema::AppConfig;
pub use schema::ObservabilityConfig;
pub use schema::WebConfig;
