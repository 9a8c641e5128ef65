use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Low => "LOW",
            Severity::Medium => "MEDIUM",
            Severity::High => "HIGH",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "LOW" => Some(Severity::Low),
            "MEDIUM" => Some(Severity::Medium),
            "HIGH" => Some(Severity::High),
            _ => None,
        }
    }
}

/// Client IPs are never stored raw; a truncated digest is enough to
/// correlate requests without keeping the address itself.
pub fn hash_ip(ip: &str) -> String {
    if ip.is_empty() {
        return "unknown".to_string();
    }
    let digest = Sha256::digest(ip.as_bytes());
    let hex: String = digest.iter().map(|b| format!("{:02x}", b)).collect();
    hex[..16].to_string()
}

/// One append-only anomaly row.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnomalyRecord {
    pub id: i64,
    pub session_id: String,
    pub user_id: Option<i64>,
    pub username: Option<String>,
    pub severity: String,
    pub anomaly_type: String,
    pub details: Value,
    pub ip_hash: String,
    pub country: String,
    pub created: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HoneypotHit {
    pub id: i64,
    pub session_id: String,
    pub ip_hash: String,
    pub route: String,
    pub user_agent: String,
    pub headers: Value,
    pub created: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestLogEntry {
    pub id: i64,
    pub method: String,
    pub route: String,
    pub username: Option<String>,
    pub status_code: i64,
    pub response_ms: i64,
    pub country: String,
    pub user_agent: String,
    pub created: i64,
}

/// Client-reported browser fingerprint, one row per session id.
#[derive(Debug, Clone)]
pub struct FingerprintRecord {
    pub session_id: String,
    pub user_id: Option<i64>,
    pub username: Option<String>,
    pub fingerprint_hash: String,
    pub canvas_hash: String,
    pub webgl_hash: String,
    pub navigator_data: Value,
    pub timezone: String,
    pub locale: String,
    pub screen_resolution: String,
    pub headless_flags: Vec<String>,
    pub country: String,
    pub user_agent: String,
}

/// Per-user fingerprint consistency summary for the admin view.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FingerprintScore {
    pub username: String,
    pub unique_fingerprints: i64,
    pub total_sessions: i64,
    pub first_seen: i64,
    pub last_seen: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingProfile {
    pub id: i64,
    pub username: String,
    pub session_id: String,
    pub avg_dwell_ms: f64,
    pub avg_flight_ms: f64,
    pub baseline_dwell: f64,
    pub baseline_flight: f64,
    pub deviation_pct: f64,
    pub flagged: bool,
    pub created: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminAuditEntry {
    pub id: i64,
    pub admin_username: String,
    pub action: String,
    pub target_username: String,
    pub before_state: Value,
    pub after_state: Value,
    pub created: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ip_hash_is_stable_and_truncated() {
        let a = hash_ip("203.0.113.7");
        let b = hash_ip("203.0.113.7");
        assert_eq!(a, b);
        assert_eq!(a.len(), 16);
        assert_ne!(a, hash_ip("203.0.113.8"));
        assert_eq!(hash_ip(""), "unknown");
    }

    #[test]
    fn severity_string_roundtrip() {
        for severity in [Severity::Low, Severity::Medium, Severity::High] {
            assert_eq!(Severity::from_str(severity.as_str()), Some(severity));
        }
        assert_eq!(Severity::from_str("CRITICAL"), None);
    }
}
