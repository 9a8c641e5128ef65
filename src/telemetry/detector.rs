//! The anomaly detector dispatcher.
//!
//! Every public method is fail-silent: internal sub-checks return typed
//! errors, and this layer swallows all of them so the observed request is
//! never altered, delayed or failed by telemetry health.

use super::models::{FingerprintRecord, Severity};
use super::rules;
use super::state::TelemetryState;
use super::suppression::{evaluate_suppression, SuppressionEffect};
use super::telemetry_store::TelemetryStore;
use crate::server::metrics::record_anomaly_metric;
use chrono::Utc;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, error};

/// Everything the detector needs to know about one request, captured by the
/// HTTP layer before and after the handler runs.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub method: String,
    pub path: String,
    /// Opaque client-supplied session id (may be empty).
    pub session_id: String,
    pub ip_hash: String,
    /// Country code from the edge/CDN header (may be empty).
    pub country: String,
    pub user_agent: String,
    /// Authenticated user, if the request carried a valid token.
    pub user: Option<(i64, String)>,
}

impl RequestContext {
    fn user_id(&self) -> Option<i64> {
        self.user.as_ref().map(|(id, _)| *id)
    }

    fn username(&self) -> Option<String> {
        self.user.as_ref().map(|(_, name)| name.clone())
    }
}

/// One detected anomaly, before suppression and persistence.
#[derive(Debug, Clone)]
pub struct Finding {
    pub session_id: String,
    pub user_id: Option<i64>,
    pub username: Option<String>,
    pub severity: Severity,
    pub anomaly_type: String,
    pub details: Value,
    pub ip_hash: String,
    pub country: String,
}

pub struct AnomalyDetector {
    state: TelemetryState,
    store: Arc<dyn TelemetryStore>,
}

impl AnomalyDetector {
    pub fn new(store: Arc<dyn TelemetryStore>) -> Self {
        AnomalyDetector {
            state: TelemetryState::new(),
            store,
        }
    }

    pub fn store(&self) -> &Arc<dyn TelemetryStore> {
        &self.store
    }

    /// Applies suppression, adjusts severity, persists and alerts. Never
    /// fails; a lost reading is simply lost.
    pub fn record_anomaly(&self, mut finding: Finding) {
        match evaluate_suppression(&finding.anomaly_type, &finding.details) {
            Some(SuppressionEffect::Discard) => return,
            Some(SuppressionEffect::Downgrade { severity, reason }) => {
                finding.severity = severity;
                if let Value::Object(map) = &mut finding.details {
                    map.insert("suppressed".to_string(), json!(true));
                    map.insert("suppressReason".to_string(), json!(reason));
                }
            }
            None => {
                if finding.anomaly_type == "headless_browser" {
                    let flag_count = finding
                        .details
                        .get("flags")
                        .and_then(|flags| flags.as_array())
                        .map(|flags| flags.len())
                        .unwrap_or(0);
                    finding.severity = rules::headless_severity(flag_count);
                }
            }
        }

        if let Err(err) = self.store.insert_anomaly(&finding) {
            debug!("Failed to persist anomaly: {}", err);
            return;
        }
        record_anomaly_metric(finding.severity.as_str(), &finding.anomaly_type);

        if finding.severity == Severity::High {
            error!(
                "[TELEMETRY ALERT] HIGH severity anomaly: {} - {} - {}",
                finding.anomaly_type,
                finding.username.as_deref().unwrap_or("anonymous"),
                finding.details
            );
        }
    }

    /// Pre-handler rules: parameter tampering, bot cadence, impossible
    /// travel.
    pub fn observe_request(&self, ctx: &RequestContext, body_keys: Option<&[String]>) {
        let now_ms = Utc::now().timestamp_millis();

        if ctx.method == "POST" {
            if let Some(keys) = body_keys {
                if let Some(extra) = rules::extra_fields(&ctx.path, keys) {
                    self.record_anomaly(Finding {
                        session_id: ctx.session_id.clone(),
                        user_id: ctx.user_id(),
                        username: ctx.username(),
                        severity: Severity::Medium,
                        anomaly_type: "parameter_tampering".to_string(),
                        details: json!({
                            "route": ctx.path,
                            "extraFields": extra,
                            "bodyShape": keys,
                        }),
                        ip_hash: ctx.ip_hash.clone(),
                        country: ctx.country.clone(),
                    });
                }
            }
        }

        if !ctx.session_id.is_empty() {
            if let Some(sample) = self.state.record_request(&ctx.session_id, now_ms) {
                if rules::is_bot_cadence(&sample) {
                    self.record_anomaly(Finding {
                        session_id: ctx.session_id.clone(),
                        user_id: ctx.user_id(),
                        username: ctx.username(),
                        severity: Severity::Medium,
                        anomaly_type: "bot_cadence".to_string(),
                        details: json!({
                            "cv": format!("{:.3}", sample.cv),
                            "meanInterval": sample.mean_interval_ms.round() as i64,
                            "samples": sample.samples,
                        }),
                        ip_hash: ctx.ip_hash.clone(),
                        country: ctx.country.clone(),
                    });
                }
            }
        }

        if let Some((user_id, _)) = &ctx.user {
            if let Some(countries) = self.state.record_country(*user_id, &ctx.country, now_ms) {
                self.record_anomaly(Finding {
                    session_id: ctx.session_id.clone(),
                    user_id: ctx.user_id(),
                    username: ctx.username(),
                    severity: Severity::High,
                    anomaly_type: "impossible_travel".to_string(),
                    details: json!({ "countries": countries, "window": "1h" }),
                    ip_hash: ctx.ip_hash.clone(),
                    country: ctx.country.clone(),
                });
            }
        }
    }

    /// Post-handler rules: request log, slow request, privilege escalation,
    /// credential brute force.
    pub fn observe_response(&self, ctx: &RequestContext, status: u16, elapsed_ms: i64) {
        let now_ms = Utc::now().timestamp_millis();

        if ctx.path.starts_with("/api/") {
            if let Err(err) = self.store.insert_request_log(
                &ctx.method,
                &ctx.path,
                ctx.username().as_deref(),
                status as i64,
                elapsed_ms,
                &ctx.country,
                &ctx.user_agent,
            ) {
                debug!("Failed to log request: {}", err);
            }
        }

        if elapsed_ms > rules::SLOW_REQUEST_MS {
            self.record_anomaly(Finding {
                session_id: ctx.session_id.clone(),
                user_id: ctx.user_id(),
                username: ctx.username(),
                severity: Severity::Low,
                anomaly_type: "slow_request".to_string(),
                details: json!({
                    "route": ctx.path,
                    "method": ctx.method,
                    "elapsed_ms": elapsed_ms,
                }),
                ip_hash: ctx.ip_hash.clone(),
                country: ctx.country.clone(),
            });
        }

        if status == 403 && ctx.user.is_some() {
            let key = if ctx.session_id.is_empty() {
                ctx.ip_hash.clone()
            } else {
                ctx.session_id.clone()
            };
            if let Some(count) = self.state.record_forbidden(&key, now_ms) {
                self.record_anomaly(Finding {
                    session_id: ctx.session_id.clone(),
                    user_id: ctx.user_id(),
                    username: ctx.username(),
                    severity: Severity::High,
                    anomaly_type: "privilege_escalation".to_string(),
                    details: json!({ "count": count }),
                    ip_hash: ctx.ip_hash.clone(),
                    country: ctx.country.clone(),
                });
            }
        }

        if status == 401 {
            if let Some(count) = self.state.record_unauthorized(&ctx.ip_hash, now_ms) {
                self.record_anomaly(Finding {
                    session_id: ctx.session_id.clone(),
                    user_id: None,
                    username: None,
                    severity: Severity::High,
                    anomaly_type: "jwt_brute_force".to_string(),
                    details: json!({ "count": count, "window": "10min" }),
                    ip_hash: ctx.ip_hash.clone(),
                    country: ctx.country.clone(),
                });
                error!(
                    "[TELEMETRY ALERT] {}+ failed auth attempts from IP hash: {}",
                    count, ctx.ip_hash
                );
            }
        }
    }

    /// Stores a client-reported fingerprint and runs the headless rule.
    pub fn observe_fingerprint(&self, record: FingerprintRecord) {
        if let Err(err) = self.store.upsert_fingerprint(&record) {
            debug!("Failed to store fingerprint: {}", err);
        }

        if !record.headless_flags.is_empty() {
            self.record_anomaly(Finding {
                session_id: record.session_id.clone(),
                user_id: record.user_id,
                username: record.username.clone(),
                severity: Severity::Medium,
                anomaly_type: "headless_browser".to_string(),
                details: json!({ "flags": record.headless_flags }),
                ip_hash: String::new(),
                country: record.country.clone(),
            });
        }
    }

    /// Updates the per-username typing baseline and fires on deviation. The
    /// baseline persists in storage indefinitely (not a ring buffer).
    pub fn observe_typing(
        &self,
        session_id: &str,
        user_id: Option<i64>,
        username: &str,
        avg_dwell_ms: f64,
        avg_flight_ms: f64,
    ) {
        let existing = match self.store.get_latest_typing_profile(username) {
            Ok(profile) => profile,
            Err(err) => {
                debug!("Failed to read typing profile: {}", err);
                return;
            }
        };

        let mut deviation_pct = 0.0;
        let mut flagged = false;
        if let Some(prev) = &existing {
            if prev.baseline_dwell > 0.0 {
                deviation_pct =
                    (avg_dwell_ms - prev.baseline_dwell).abs() / prev.baseline_dwell * 100.0;
                if deviation_pct > rules::TYPING_DEVIATION_THRESHOLD_PCT {
                    flagged = true;
                    self.record_anomaly(Finding {
                        session_id: session_id.to_string(),
                        user_id,
                        username: Some(username.to_string()),
                        severity: Severity::Medium,
                        anomaly_type: "typing_deviation".to_string(),
                        details: json!({
                            "deviation": format!("{:.1}%", deviation_pct),
                            "expected": prev.baseline_dwell,
                            "actual": avg_dwell_ms,
                        }),
                        ip_hash: String::new(),
                        country: String::new(),
                    });
                }
            }
        }

        let baseline_dwell = match &existing {
            Some(prev) => {
                prev.baseline_dwell * rules::BASELINE_OLD_WEIGHT
                    + avg_dwell_ms * rules::BASELINE_NEW_WEIGHT
            }
            None => avg_dwell_ms,
        };
        let baseline_flight = match &existing {
            Some(prev) => {
                prev.baseline_flight * rules::BASELINE_OLD_WEIGHT
                    + avg_flight_ms * rules::BASELINE_NEW_WEIGHT
            }
            None => avg_flight_ms,
        };

        if let Err(err) = self.store.insert_typing_profile(
            username,
            session_id,
            avg_dwell_ms,
            avg_flight_ms,
            baseline_dwell,
            baseline_flight,
            deviation_pct,
            flagged,
        ) {
            debug!("Failed to store typing profile: {}", err);
        }
    }

    /// Logs a hit on a decoy endpoint: one honeypot row plus one HIGH
    /// anomaly, regardless of request content.
    pub fn record_honeypot_hit(
        &self,
        session_id: &str,
        ip_hash: &str,
        route: &str,
        user_agent: &str,
        headers: Value,
        country: &str,
    ) {
        if let Err(err) =
            self.store
                .insert_honeypot_hit(session_id, ip_hash, route, user_agent, &headers)
        {
            debug!("Failed to log honeypot hit: {}", err);
        }
        self.record_anomaly(Finding {
            session_id: session_id.to_string(),
            user_id: None,
            username: None,
            severity: Severity::High,
            anomaly_type: "honeypot_triggered".to_string(),
            details: json!({ "route": route }),
            ip_hash: ip_hash.to_string(),
            country: country.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::models::{
        AdminAuditEntry, AnomalyRecord, FingerprintScore, HoneypotHit, RequestLogEntry,
        TypingProfile,
    };
    use anyhow::{bail, Result};
    use std::sync::Mutex;

    /// Collects inserts in memory; reads serve back what was written.
    #[derive(Default)]
    struct RecordingStore {
        anomalies: Mutex<Vec<Finding>>,
        honeypot_hits: Mutex<Vec<String>>,
        typing_profiles: Mutex<Vec<TypingProfile>>,
        request_log: Mutex<Vec<(String, i64)>>,
    }

    impl TelemetryStore for RecordingStore {
        fn insert_anomaly(&self, finding: &Finding) -> Result<()> {
            self.anomalies.lock().unwrap().push(finding.clone());
            Ok(())
        }

        fn list_anomalies(&self, _limit: usize) -> Result<Vec<AnomalyRecord>> {
            Ok(Vec::new())
        }

        fn insert_honeypot_hit(
            &self,
            _session_id: &str,
            _ip_hash: &str,
            route: &str,
            _user_agent: &str,
            _headers: &serde_json::Value,
        ) -> Result<()> {
            self.honeypot_hits.lock().unwrap().push(route.to_string());
            Ok(())
        }

        fn list_honeypot_hits(&self, _limit: usize) -> Result<Vec<HoneypotHit>> {
            Ok(Vec::new())
        }

        fn insert_request_log(
            &self,
            _method: &str,
            route: &str,
            _username: Option<&str>,
            status_code: i64,
            _response_ms: i64,
            _country: &str,
            _user_agent: &str,
        ) -> Result<()> {
            self.request_log
                .lock()
                .unwrap()
                .push((route.to_string(), status_code));
            Ok(())
        }

        fn list_request_log(&self, _limit: usize) -> Result<Vec<RequestLogEntry>> {
            Ok(Vec::new())
        }

        fn upsert_fingerprint(&self, _record: &FingerprintRecord) -> Result<()> {
            Ok(())
        }

        fn fingerprint_scores(&self) -> Result<Vec<FingerprintScore>> {
            Ok(Vec::new())
        }

        fn get_latest_typing_profile(&self, username: &str) -> Result<Option<TypingProfile>> {
            Ok(self
                .typing_profiles
                .lock()
                .unwrap()
                .iter()
                .rev()
                .find(|p| p.username == username)
                .cloned())
        }

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
        ) -> Result<()> {
            self.typing_profiles.lock().unwrap().push(TypingProfile {
                id: 0,
                username: username.to_string(),
                session_id: session_id.to_string(),
                avg_dwell_ms,
                avg_flight_ms,
                baseline_dwell,
                baseline_flight,
                deviation_pct,
                flagged,
                created: 0,
            });
            Ok(())
        }

        fn list_typing_profiles(
            &self,
            _username: &str,
            _limit: usize,
        ) -> Result<Vec<TypingProfile>> {
            Ok(Vec::new())
        }

        fn insert_events(
            &self,
            _session_id: &str,
            _user_id: Option<i64>,
            _username: Option<&str>,
            _events: &[(String, serde_json::Value)],
        ) -> Result<()> {
            Ok(())
        }

        fn insert_admin_audit(
            &self,
            _admin_username: &str,
            _action: &str,
            _target_username: &str,
            _before_state: &serde_json::Value,
            _after_state: &serde_json::Value,
        ) -> Result<()> {
            Ok(())
        }

        fn list_admin_audit(&self, _limit: usize) -> Result<Vec<AdminAuditEntry>> {
            Ok(Vec::new())
        }
    }

    /// Fails every operation, for the fail-silent contract.
    struct BrokenStore;

    impl TelemetryStore for BrokenStore {
        fn insert_anomaly(&self, _finding: &Finding) -> Result<()> {
            bail!("disk on fire")
        }
        fn list_anomalies(&self, _limit: usize) -> Result<Vec<AnomalyRecord>> {
            bail!("disk on fire")
        }
        fn insert_honeypot_hit(
            &self,
            _session_id: &str,
            _ip_hash: &str,
            _route: &str,
            _user_agent: &str,
            _headers: &serde_json::Value,
        ) -> Result<()> {
            bail!("disk on fire")
        }
        fn list_honeypot_hits(&self, _limit: usize) -> Result<Vec<HoneypotHit>> {
            bail!("disk on fire")
        }
        fn insert_request_log(
            &self,
            _method: &str,
            _route: &str,
            _username: Option<&str>,
            _status_code: i64,
            _response_ms: i64,
            _country: &str,
            _user_agent: &str,
        ) -> Result<()> {
            bail!("disk on fire")
        }
        fn list_request_log(&self, _limit: usize) -> Result<Vec<RequestLogEntry>> {
            bail!("disk on fire")
        }
        fn upsert_fingerprint(&self, _record: &FingerprintRecord) -> Result<()> {
            bail!("disk on fire")
        }
        fn fingerprint_scores(&self) -> Result<Vec<FingerprintScore>> {
            bail!("disk on fire")
        }
        fn get_latest_typing_profile(&self, _username: &str) -> Result<Option<TypingProfile>> {
            bail!("disk on fire")
        }
        fn insert_typing_profile(
            &self,
            _username: &str,
            _session_id: &str,
            _avg_dwell_ms: f64,
            _avg_flight_ms: f64,
            _baseline_dwell: f64,
            _baseline_flight: f64,
            _deviation_pct: f64,
            _flagged: bool,
        ) -> Result<()> {
            bail!("disk on fire")
        }
        fn list_typing_profiles(
            &self,
            _username: &str,
            _limit: usize,
        ) -> Result<Vec<TypingProfile>> {
            bail!("disk on fire")
        }
        fn insert_events(
            &self,
            _session_id: &str,
            _user_id: Option<i64>,
            _username: Option<&str>,
            _events: &[(String, serde_json::Value)],
        ) -> Result<()> {
            bail!("disk on fire")
        }
        fn insert_admin_audit(
            &self,
            _admin_username: &str,
            _action: &str,
            _target_username: &str,
            _before_state: &serde_json::Value,
            _after_state: &serde_json::Value,
        ) -> Result<()> {
            bail!("disk on fire")
        }
        fn list_admin_audit(&self, _limit: usize) -> Result<Vec<AdminAuditEntry>> {
            bail!("disk on fire")
        }
    }

    fn detector() -> (Arc<RecordingStore>, AnomalyDetector) {
        let store = Arc::new(RecordingStore::default());
        let detector = AnomalyDetector::new(store.clone());
        (store, detector)
    }

    fn ctx(method: &str, path: &str) -> RequestContext {
        RequestContext {
            method: method.to_string(),
            path: path.to_string(),
            session_id: "sess-1".to_string(),
            ip_hash: "aabbccdd00112233".to_string(),
            country: "DE".to_string(),
            user_agent: "test-agent".to_string(),
            user: Some((1, "umar".to_string())),
        }
    }

    fn keys(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn extra_post_field_records_one_medium_finding() {
        let (store, detector) = detector();
        detector.observe_request(
            &ctx("POST", "/api/fasting/log"),
            Some(&keys(&["date", "completed", "isAdmin"])),
        );
        let anomalies = store.anomalies.lock().unwrap();
        assert_eq!(anomalies.len(), 1);
        assert_eq!(anomalies[0].anomaly_type, "parameter_tampering");
        assert_eq!(anomalies[0].severity, Severity::Medium);
    }

    #[test]
    fn whitelisted_post_records_nothing() {
        let (store, detector) = detector();
        detector.observe_request(
            &ctx("POST", "/api/fasting/log"),
            Some(&keys(&["date", "completed"])),
        );
        assert!(store.anomalies.lock().unwrap().is_empty());
    }

    #[test]
    fn admin_route_tampering_is_fully_suppressed() {
        let (store, detector) = detector();
        detector.observe_request(
            &ctx("POST", "/api/admin/change-role"),
            Some(&keys(&["targetUsername", "newRole", "region", "country", "city"])),
        );
        assert!(store.anomalies.lock().unwrap().is_empty());
    }

    #[test]
    fn lone_no_plugins_headless_flag_is_downgraded_and_annotated() {
        let (store, detector) = detector();
        detector.record_anomaly(Finding {
            session_id: "s".to_string(),
            user_id: None,
            username: None,
            severity: Severity::Medium,
            anomaly_type: "headless_browser".to_string(),
            details: json!({ "flags": ["no_plugins"] }),
            ip_hash: String::new(),
            country: String::new(),
        });
        let anomalies = store.anomalies.lock().unwrap();
        assert_eq!(anomalies.len(), 1);
        assert_eq!(anomalies[0].severity, Severity::Low);
        assert_eq!(anomalies[0].details["suppressed"], json!(true));
        assert_eq!(
            anomalies[0].details["suppressReason"],
            json!("single_no_plugins_flag")
        );
    }

    #[test]
    fn two_headless_flags_stay_medium_unsuppressed() {
        let (store, detector) = detector();
        detector.record_anomaly(Finding {
            session_id: "s".to_string(),
            user_id: None,
            username: None,
            severity: Severity::Medium,
            anomaly_type: "headless_browser".to_string(),
            details: json!({ "flags": ["no_plugins", "webdriver"] }),
            ip_hash: String::new(),
            country: String::new(),
        });
        let anomalies = store.anomalies.lock().unwrap();
        assert_eq!(anomalies.len(), 1);
        assert_eq!(anomalies[0].severity, Severity::Medium);
        assert!(anomalies[0].details.get("suppressed").is_none());
    }

    #[test]
    fn single_other_headless_flag_is_low_but_not_annotated() {
        let (store, detector) = detector();
        detector.record_anomaly(Finding {
            session_id: "s".to_string(),
            user_id: None,
            username: None,
            severity: Severity::Medium,
            anomaly_type: "headless_browser".to_string(),
            details: json!({ "flags": ["webdriver"] }),
            ip_hash: String::new(),
            country: String::new(),
        });
        let anomalies = store.anomalies.lock().unwrap();
        assert_eq!(anomalies[0].severity, Severity::Low);
        assert!(anomalies[0].details.get("suppressed").is_none());
    }

    #[test]
    fn ten_unauthorized_responses_fire_exactly_one_brute_force() {
        let (store, detector) = detector();
        let ctx = ctx("POST", "/api/auth/login");
        for _ in 0..10 {
            detector.observe_response(&ctx, 401, 5);
        }
        let anomalies = store.anomalies.lock().unwrap();
        let brute: Vec<_> = anomalies
            .iter()
            .filter(|a| a.anomaly_type == "jwt_brute_force")
            .collect();
        assert_eq!(brute.len(), 1);
        assert_eq!(brute[0].severity, Severity::High);
        assert_eq!(brute[0].details["count"], json!(10));
    }

    #[test]
    fn five_forbidden_responses_fire_privilege_escalation() {
        let (store, detector) = detector();
        let ctx = ctx("GET", "/api/admin/users");
        for _ in 0..5 {
            detector.observe_response(&ctx, 403, 5);
        }
        let anomalies = store.anomalies.lock().unwrap();
        let escalations: Vec<_> = anomalies
            .iter()
            .filter(|a| a.anomaly_type == "privilege_escalation")
            .collect();
        assert_eq!(escalations.len(), 1);
        assert_eq!(escalations[0].severity, Severity::High);
    }

    #[test]
    fn forbidden_without_user_is_not_counted() {
        let (store, detector) = detector();
        let mut anonymous = ctx("GET", "/api/admin/users");
        anonymous.user = None;
        for _ in 0..10 {
            detector.observe_response(&anonymous, 403, 5);
        }
        assert!(store
            .anomalies
            .lock()
            .unwrap()
            .iter()
            .all(|a| a.anomaly_type != "privilege_escalation"));
    }

    #[test]
    fn slow_request_is_low_severity() {
        let (store, detector) = detector();
        detector.observe_response(&ctx("GET", "/api/dashboard/2026"), 200, 2500);
        let anomalies = store.anomalies.lock().unwrap();
        assert_eq!(anomalies.len(), 1);
        assert_eq!(anomalies[0].anomaly_type, "slow_request");
        assert_eq!(anomalies[0].severity, Severity::Low);
    }

    #[test]
    fn api_requests_are_logged_others_not() {
        let (store, detector) = detector();
        detector.observe_response(&ctx("GET", "/api/dashboard/2026"), 200, 10);
        detector.observe_response(&ctx("GET", "/index.html"), 200, 10);
        let log = store.request_log.lock().unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].0, "/api/dashboard/2026");
    }

    #[test]
    fn typing_deviation_fires_and_baseline_moves() {
        let (store, detector) = detector();
        // First batch establishes the 200ms baseline
        detector.observe_typing("s", Some(1), "umar", 200.0, 80.0);
        assert!(store.anomalies.lock().unwrap().is_empty());

        // 300ms is a 50% deviation: fires, new baseline 0.7*200 + 0.3*300
        detector.observe_typing("s", Some(1), "umar", 300.0, 80.0);
        {
            let anomalies = store.anomalies.lock().unwrap();
            assert_eq!(anomalies.len(), 1);
            assert_eq!(anomalies[0].anomaly_type, "typing_deviation");
            assert_eq!(anomalies[0].severity, Severity::Medium);
            assert_eq!(anomalies[0].details["expected"], json!(200.0));
        }
        let profiles = store.typing_profiles.lock().unwrap();
        let latest = profiles.last().unwrap();
        assert!((latest.baseline_dwell - 230.0).abs() < 1e-9);
        assert!(latest.flagged);
    }

    #[test]
    fn small_typing_deviation_does_not_fire() {
        let (store, detector) = detector();
        detector.observe_typing("s", Some(1), "umar", 200.0, 80.0);
        detector.observe_typing("s", Some(1), "umar", 260.0, 80.0); // 30%
        assert!(store.anomalies.lock().unwrap().is_empty());
    }

    #[test]
    fn honeypot_hit_records_row_and_high_anomaly() {
        let (store, detector) = detector();
        detector.record_honeypot_hit("s", "iphash", "/api/export", "curl/8", json!({}), "DE");
        assert_eq!(store.honeypot_hits.lock().unwrap().len(), 1);
        let anomalies = store.anomalies.lock().unwrap();
        assert_eq!(anomalies.len(), 1);
        assert_eq!(anomalies[0].anomaly_type, "honeypot_triggered");
        assert_eq!(anomalies[0].severity, Severity::High);
    }

    #[test]
    fn broken_store_never_panics_the_detector() {
        let detector = AnomalyDetector::new(Arc::new(BrokenStore));
        let ctx = ctx("POST", "/api/fasting/log");
        detector.observe_request(&ctx, Some(&keys(&["date", "bogus"])));
        detector.observe_response(&ctx, 401, 5000);
        detector.observe_typing("s", None, "umar", 300.0, 80.0);
        detector.record_honeypot_hit("s", "ip", "/api/export", "ua", json!({}), "");
        detector.observe_fingerprint(FingerprintRecord {
            session_id: "s".to_string(),
            user_id: None,
            username: None,
            fingerprint_hash: String::new(),
            canvas_hash: String::new(),
            webgl_hash: String::new(),
            navigator_data: json!({}),
            timezone: String::new(),
            locale: String::new(),
            screen_resolution: String::new(),
            headless_flags: vec!["webdriver".to_string()],
            country: String::new(),
            user_agent: String::new(),
        });
    }
}
