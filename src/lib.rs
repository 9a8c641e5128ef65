//! RamadanFlow Server Library
//!
//! This library exposes the internal modules for testing and potential reuse.

pub mod config;
pub mod scoring;
pub mod server;
pub mod sqlite_persistence;
pub mod telemetry;
pub mod tracker;
pub mod user;

// Re-export commonly used types for convenience
pub use scoring::{ScoringWeights, WeightRow};
pub use server::{make_app, run_server, RequestsLoggingLevel, ServerConfig};
pub use telemetry::{AnomalyDetector, SqliteTelemetryStore, TelemetryStore};
pub use tracker::{SqliteTrackerStore, TrackerStore};
pub use user::{AuthKeys, SqliteUserStore, UserStore};
