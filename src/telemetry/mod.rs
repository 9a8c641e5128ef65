pub mod detector;
pub mod models;
pub mod rules;
pub mod sqlite_telemetry_store;
pub mod state;
pub mod suppression;
pub mod telemetry_store;

pub use detector::{AnomalyDetector, Finding, RequestContext};
pub use models::{hash_ip, AnomalyRecord, Severity};
pub use sqlite_telemetry_store::SqliteTelemetryStore;
pub use state::TelemetryState;
pub use telemetry_store::TelemetryStore;
