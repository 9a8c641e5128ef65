use super::detector::Finding;
use super::models::{
    AdminAuditEntry, AnomalyRecord, FingerprintRecord, FingerprintScore, HoneypotHit,
    RequestLogEntry, TypingProfile,
};
use anyhow::Result;
use serde_json::Value;

/// Storage for telemetry data. Anomaly, honeypot and audit rows are
/// append-only; nothing updates them after insert.
pub trait TelemetryStore: Send + Sync {
    /// Appends one anomaly row.
    fn insert_anomaly(&self, finding: &Finding) -> Result<()>;

    /// Anomalies in severity-then-recency order, bounded by `limit`.
    fn list_anomalies(&self, limit: usize) -> Result<Vec<AnomalyRecord>>;

    /// Appends one honeypot hit.
    fn insert_honeypot_hit(
        &self,
        session_id: &str,
        ip_hash: &str,
        route: &str,
        user_agent: &str,
        headers: &Value,
    ) -> Result<()>;

    /// Honeypot hits, newest first.
    fn list_honeypot_hits(&self, limit: usize) -> Result<Vec<HoneypotHit>>;

    /// Appends one request-log row for the live admin feed.
    #[allow(clippy::too_many_arguments)]
    fn insert_request_log(
        &self,
        method: &str,
        route: &str,
        username: Option<&str>,
        status_code: i64,
        response_ms: i64,
        country: &str,
        user_agent: &str,
    ) -> Result<()>;

    /// Request log, newest first.
    fn list_request_log(&self, limit: usize) -> Result<Vec<RequestLogEntry>>;

    /// Stores or replaces the fingerprint for a session id.
    fn upsert_fingerprint(&self, record: &FingerprintRecord) -> Result<()>;

    /// Per-user fingerprint consistency, most distinct fingerprints first.
    fn fingerprint_scores(&self) -> Result<Vec<FingerprintScore>>;

    /// The newest typing profile for the user, if any.
    fn get_latest_typing_profile(&self, username: &str) -> Result<Option<TypingProfile>>;

    /// Appends one typing profile row.
    #[allow(clippy::too_many_arguments)]
    fn insert_typing_profile(
        &self,
        username: &str,
        session_id: &str,
        avg_dwell_ms: f64,
        avg_flight_ms: f64,
        baseline_dwell: f64,
        baseline_flight: f64,
        deviation_pct: f64,
        flagged: bool,
    ) -> Result<()>;

    /// Typing profiles for a user, newest first.
    fn list_typing_profiles(&self, username: &str, limit: usize) -> Result<Vec<TypingProfile>>;

    /// Appends a batch of client behavioral events.
    fn insert_events(
        &self,
        session_id: &str,
        user_id: Option<i64>,
        username: Option<&str>,
        events: &[(String, Value)],
    ) -> Result<()>;

    /// Appends one admin audit row.
    fn insert_admin_audit(
        &self,
        admin_username: &str,
        action: &str,
        target_username: &str,
        before_state: &Value,
        after_state: &Value,
    ) -> Result<()>;

    /// Admin audit rows, newest first.
    fn list_admin_audit(&self, limit: usize) -> Result<Vec<AdminAuditEntry>>;
}
