use crate::telemetry::{AnomalyDetector, TelemetryStore};
use crate::tracker::TrackerStore;
use crate::user::{AuthKeys, UserStore};
use axum::extract::FromRef;
use std::sync::Arc;
use std::time::Instant;

use super::ServerConfig;

pub type GuardedUserStore = Arc<dyn UserStore>;
pub type GuardedTrackerStore = Arc<dyn TrackerStore>;
pub type GuardedTelemetryStore = Arc<dyn TelemetryStore>;
pub type GuardedDetector = Arc<AnomalyDetector>;

#[derive(Clone)]
pub struct ServerState {
    pub config: ServerConfig,
    pub start_time: Instant,
    pub user_store: GuardedUserStore,
    pub tracker_store: GuardedTrackerStore,
    pub telemetry_store: GuardedTelemetryStore,
    pub detector: GuardedDetector,
    pub auth_keys: AuthKeys,
}

impl FromRef<ServerState> for GuardedUserStore {
    fn from_ref(input: &ServerState) -> Self {
        input.user_store.clone()
    }
}

impl FromRef<ServerState> for GuardedTrackerStore {
    fn from_ref(input: &ServerState) -> Self {
        input.tracker_store.clone()
    }
}

impl FromRef<ServerState> for GuardedTelemetryStore {
    fn from_ref(input: &ServerState) -> Self {
        input.telemetry_store.clone()
    }
}

impl FromRef<ServerState> for GuardedDetector {
    fn from_ref(input: &ServerState) -> Self {
        input.detector.clone()
    }
}

impl FromRef<ServerState> for ServerConfig {
    fn from_ref(input: &ServerState) -> Self {
        input.config.clone()
    }
}

impl FromRef<ServerState> for AuthKeys {
    fn from_ref(input: &ServerState) -> Self {
        input.auth_keys.clone()
    }
}
