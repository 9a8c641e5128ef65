use super::detector::Finding;
use super::models::{
    AdminAuditEntry, AnomalyRecord, FingerprintRecord, FingerprintScore, HoneypotHit,
    RequestLogEntry, TypingProfile,
};
use super::telemetry_store::TelemetryStore;
use crate::sqlite_column;
use crate::sqlite_persistence::{
    open_versioned, Column, SqlType, Table, VersionedSchema, DEFAULT_TIMESTAMP,
};
use anyhow::Result;
use rusqlite::{params, Connection, Row};
use serde_json::Value;
use std::path::Path;
use std::sync::{Arc, Mutex};

const ANOMALY_TABLE: Table = Table {
    name: "anomaly",
    columns: &[
        sqlite_column!(
            "id",
            &SqlType::Integer,
            is_primary_key = true,
            is_unique = true
        ),
        sqlite_column!("session_id", &SqlType::Text, non_null = true),
        sqlite_column!("user_id", &SqlType::Integer),
        sqlite_column!("username", &SqlType::Text),
        sqlite_column!("severity", &SqlType::Text, non_null = true),
        sqlite_column!("anomaly_type", &SqlType::Text, non_null = true),
        sqlite_column!("details", &SqlType::Text, non_null = true),
        sqlite_column!("ip_hash", &SqlType::Text, non_null = true),
        sqlite_column!("country", &SqlType::Text, non_null = true),
        sqlite_column!(
            "created",
            &SqlType::Integer,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
    ],
    unique_constraints: &[],
    indices: &[("idx_anomaly_severity", "severity")],
};

const HONEYPOT_TABLE: Table = Table {
    name: "honeypot_hit",
    columns: &[
        sqlite_column!(
            "id",
            &SqlType::Integer,
            is_primary_key = true,
            is_unique = true
        ),
        sqlite_column!("session_id", &SqlType::Text, non_null = true),
        sqlite_column!("ip_hash", &SqlType::Text, non_null = true),
        sqlite_column!("route", &SqlType::Text, non_null = true),
        sqlite_column!("user_agent", &SqlType::Text, non_null = true),
        sqlite_column!("headers", &SqlType::Text, non_null = true),
        sqlite_column!(
            "created",
            &SqlType::Integer,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
    ],
    unique_constraints: &[],
    indices: &[],
};

const REQUEST_LOG_TABLE: Table = Table {
    name: "request_log",
    columns: &[
        sqlite_column!(
            "id",
            &SqlType::Integer,
            is_primary_key = true,
            is_unique = true
        ),
        sqlite_column!("method", &SqlType::Text, non_null = true),
        sqlite_column!("route", &SqlType::Text, non_null = true),
        sqlite_column!("username", &SqlType::Text),
        sqlite_column!("status_code", &SqlType::Integer, non_null = true),
        sqlite_column!("response_ms", &SqlType::Integer, non_null = true),
        sqlite_column!("country", &SqlType::Text, non_null = true),
        sqlite_column!("user_agent", &SqlType::Text, non_null = true),
        sqlite_column!(
            "created",
            &SqlType::Integer,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
    ],
    unique_constraints: &[],
    indices: &[],
};

const FINGERPRINT_TABLE: Table = Table {
    name: "fingerprint",
    columns: &[
        sqlite_column!("session_id", &SqlType::Text, is_primary_key = true),
        sqlite_column!("user_id", &SqlType::Integer),
        sqlite_column!("username", &SqlType::Text),
        sqlite_column!("fingerprint_hash", &SqlType::Text, non_null = true),
        sqlite_column!("canvas_hash", &SqlType::Text, non_null = true),
        sqlite_column!("webgl_hash", &SqlType::Text, non_null = true),
        sqlite_column!("navigator_data", &SqlType::Text, non_null = true),
        sqlite_column!("timezone", &SqlType::Text, non_null = true),
        sqlite_column!("locale", &SqlType::Text, non_null = true),
        sqlite_column!("screen_resolution", &SqlType::Text, non_null = true),
        sqlite_column!("headless_flags", &SqlType::Text, non_null = true),
        sqlite_column!("country", &SqlType::Text, non_null = true),
        sqlite_column!("user_agent", &SqlType::Text, non_null = true),
        sqlite_column!(
            "created",
            &SqlType::Integer,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
    ],
    unique_constraints: &[],
    indices: &[("idx_fingerprint_username", "username")],
};

const TYPING_PROFILE_TABLE: Table = Table {
    name: "typing_profile",
    columns: &[
        sqlite_column!(
            "id",
            &SqlType::Integer,
            is_primary_key = true,
            is_unique = true
        ),
        sqlite_column!("username", &SqlType::Text, non_null = true),
        sqlite_column!("session_id", &SqlType::Text, non_null = true),
        sqlite_column!("avg_dwell_ms", &SqlType::Real, non_null = true),
        sqlite_column!("avg_flight_ms", &SqlType::Real, non_null = true),
        sqlite_column!("baseline_dwell", &SqlType::Real, non_null = true),
        sqlite_column!("baseline_flight", &SqlType::Real, non_null = true),
        sqlite_column!("deviation_pct", &SqlType::Real, non_null = true),
        sqlite_column!("flagged", &SqlType::Integer, non_null = true),
        sqlite_column!(
            "created",
            &SqlType::Integer,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
    ],
    unique_constraints: &[],
    indices: &[("idx_typing_profile_username", "username")],
};

const EVENT_TABLE: Table = Table {
    name: "event",
    columns: &[
        sqlite_column!(
            "id",
            &SqlType::Integer,
            is_primary_key = true,
            is_unique = true
        ),
        sqlite_column!("session_id", &SqlType::Text, non_null = true),
        sqlite_column!("user_id", &SqlType::Integer),
        sqlite_column!("username", &SqlType::Text),
        sqlite_column!("event_type", &SqlType::Text, non_null = true),
        sqlite_column!("event_data", &SqlType::Text, non_null = true),
        sqlite_column!(
            "created",
            &SqlType::Integer,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
    ],
    unique_constraints: &[],
    indices: &[],
};

const ADMIN_AUDIT_TABLE: Table = Table {
    name: "admin_audit",
    columns: &[
        sqlite_column!(
            "id",
            &SqlType::Integer,
            is_primary_key = true,
            is_unique = true
        ),
        sqlite_column!("admin_username", &SqlType::Text, non_null = true),
        sqlite_column!("action", &SqlType::Text, non_null = true),
        sqlite_column!("target_username", &SqlType::Text, non_null = true),
        sqlite_column!("before_state", &SqlType::Text, non_null = true),
        sqlite_column!("after_state", &SqlType::Text, non_null = true),
        sqlite_column!(
            "created",
            &SqlType::Integer,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
    ],
    unique_constraints: &[],
    indices: &[],
};

pub const VERSIONED_SCHEMAS: &[VersionedSchema] = &[VersionedSchema {
    version: 0,
    tables: &[
        ANOMALY_TABLE,
        HONEYPOT_TABLE,
        REQUEST_LOG_TABLE,
        FINGERPRINT_TABLE,
        TYPING_PROFILE_TABLE,
        EVENT_TABLE,
        ADMIN_AUDIT_TABLE,
    ],
    migration: None,
}];

fn parse_json(raw: String) -> Value {
    serde_json::from_str(&raw).unwrap_or(Value::Null)
}

fn row_to_anomaly(row: &Row) -> rusqlite::Result<AnomalyRecord> {
    let details: String = row.get(6)?;
    Ok(AnomalyRecord {
        id: row.get(0)?,
        session_id: row.get(1)?,
        user_id: row.get(2)?,
        username: row.get(3)?,
        severity: row.get(4)?,
        anomaly_type: row.get(5)?,
        details: parse_json(details),
        ip_hash: row.get(7)?,
        country: row.get(8)?,
        created: row.get(9)?,
    })
}

fn row_to_typing_profile(row: &Row) -> rusqlite::Result<TypingProfile> {
    Ok(TypingProfile {
        id: row.get(0)?,
        username: row.get(1)?,
        session_id: row.get(2)?,
        avg_dwell_ms: row.get(3)?,
        avg_flight_ms: row.get(4)?,
        baseline_dwell: row.get(5)?,
        baseline_flight: row.get(6)?,
        deviation_pct: row.get(7)?,
        flagged: row.get::<_, i64>(8)? != 0,
        created: row.get(9)?,
    })
}

const TYPING_COLUMNS: &str = "id, username, session_id, avg_dwell_ms, avg_flight_ms, \
                              baseline_dwell, baseline_flight, deviation_pct, flagged, created";

#[derive(Clone)]
pub struct SqliteTelemetryStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteTelemetryStore {
    pub fn new<T: AsRef<Path>>(db_path: T) -> Result<Self> {
        let conn = open_versioned(db_path, VERSIONED_SCHEMAS)?;
        Ok(SqliteTelemetryStore {
            conn: Arc::new(Mutex::new(conn)),
        })
    }
}

impl TelemetryStore for SqliteTelemetryStore {
    fn insert_anomaly(&self, finding: &Finding) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            &format!(
                "INSERT INTO {} (session_id, user_id, username, severity, anomaly_type, details, ip_hash, country)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                ANOMALY_TABLE.name
            ),
            params![
                finding.session_id,
                finding.user_id,
                finding.username,
                finding.severity.as_str(),
                finding.anomaly_type,
                finding.details.to_string(),
                finding.ip_hash,
                finding.country,
            ],
        )?;
        Ok(())
    }

    fn list_anomalies(&self, limit: usize) -> Result<Vec<AnomalyRecord>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT id, session_id, user_id, username, severity, anomaly_type, details, ip_hash, country, created
             FROM {} ORDER BY
                CASE severity WHEN 'HIGH' THEN 0 WHEN 'MEDIUM' THEN 1 ELSE 2 END,
                created DESC, id DESC
             LIMIT ?1",
            ANOMALY_TABLE.name
        ))?;
        let anomalies = stmt
            .query_map(params![limit], row_to_anomaly)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(anomalies)
    }

    fn insert_honeypot_hit(
        &self,
        session_id: &str,
        ip_hash: &str,
        route: &str,
        user_agent: &str,
        headers: &Value,
    ) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            &format!(
                "INSERT INTO {} (session_id, ip_hash, route, user_agent, headers)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                HONEYPOT_TABLE.name
            ),
            params![session_id, ip_hash, route, user_agent, headers.to_string()],
        )?;
        Ok(())
    }

    fn list_honeypot_hits(&self, limit: usize) -> Result<Vec<HoneypotHit>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT id, session_id, ip_hash, route, user_agent, headers, created
             FROM {} ORDER BY created DESC, id DESC LIMIT ?1",
            HONEYPOT_TABLE.name
        ))?;
        let hits = stmt
            .query_map(params![limit], |row| {
                let headers: String = row.get(5)?;
                Ok(HoneypotHit {
                    id: row.get(0)?,
                    session_id: row.get(1)?,
                    ip_hash: row.get(2)?,
                    route: row.get(3)?,
                    user_agent: row.get(4)?,
                    headers: parse_json(headers),
                    created: row.get(6)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(hits)
    }

    fn insert_request_log(
        &self,
        method: &str,
        route: &str,
        username: Option<&str>,
        status_code: i64,
        response_ms: i64,
        country: &str,
        user_agent: &str,
    ) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            &format!(
                "INSERT INTO {} (method, route, username, status_code, response_ms, country, user_agent)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                REQUEST_LOG_TABLE.name
            ),
            params![method, route, username, status_code, response_ms, country, user_agent],
        )?;
        Ok(())
    }

    fn list_request_log(&self, limit: usize) -> Result<Vec<RequestLogEntry>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT id, method, route, username, status_code, response_ms, country, user_agent, created
             FROM {} ORDER BY created DESC, id DESC LIMIT ?1",
            REQUEST_LOG_TABLE.name
        ))?;
        let entries = stmt
            .query_map(params![limit], |row| {
                Ok(RequestLogEntry {
                    id: row.get(0)?,
                    method: row.get(1)?,
                    route: row.get(2)?,
                    username: row.get(3)?,
                    status_code: row.get(4)?,
                    response_ms: row.get(5)?,
                    country: row.get(6)?,
                    user_agent: row.get(7)?,
                    created: row.get(8)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    fn upsert_fingerprint(&self, record: &FingerprintRecord) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            &format!(
                "INSERT OR REPLACE INTO {} (session_id, user_id, username, fingerprint_hash, canvas_hash,
                 webgl_hash, navigator_data, timezone, locale, screen_resolution, headless_flags, country, user_agent)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
                FINGERPRINT_TABLE.name
            ),
            params![
                record.session_id,
                record.user_id,
                record.username,
                record.fingerprint_hash,
                record.canvas_hash,
                record.webgl_hash,
                record.navigator_data.to_string(),
                record.timezone,
                record.locale,
                record.screen_resolution,
                serde_json::to_string(&record.headless_flags)?,
                record.country,
                record.user_agent,
            ],
        )?;
        Ok(())
    }

    fn fingerprint_scores(&self) -> Result<Vec<FingerprintScore>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT username, COUNT(DISTINCT fingerprint_hash), COUNT(*), MIN(created), MAX(created)
             FROM {} WHERE username IS NOT NULL
             GROUP BY username ORDER BY COUNT(DISTINCT fingerprint_hash) DESC",
            FINGERPRINT_TABLE.name
        ))?;
        let scores = stmt
            .query_map([], |row| {
                Ok(FingerprintScore {
                    username: row.get(0)?,
                    unique_fingerprints: row.get(1)?,
                    total_sessions: row.get(2)?,
                    first_seen: row.get(3)?,
                    last_seen: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(scores)
    }

    fn get_latest_typing_profile(&self, username: &str) -> Result<Option<TypingProfile>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM {} WHERE username = ?1 ORDER BY id DESC LIMIT 1",
            TYPING_COLUMNS, TYPING_PROFILE_TABLE.name
        ))?;
        let mut rows = stmt.query_map(params![username], row_to_typing_profile)?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
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
        let conn = self.conn.lock().unwrap();
        conn.execute(
            &format!(
                "INSERT INTO {} (username, session_id, avg_dwell_ms, avg_flight_ms, baseline_dwell,
                 baseline_flight, deviation_pct, flagged)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                TYPING_PROFILE_TABLE.name
            ),
            params![
                username,
                session_id,
                avg_dwell_ms,
                avg_flight_ms,
                baseline_dwell,
                baseline_flight,
                deviation_pct,
                flagged as i64,
            ],
        )?;
        Ok(())
    }

    fn list_typing_profiles(&self, username: &str, limit: usize) -> Result<Vec<TypingProfile>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM {} WHERE username = ?1 ORDER BY id DESC LIMIT ?2",
            TYPING_COLUMNS, TYPING_PROFILE_TABLE.name
        ))?;
        let profiles = stmt
            .query_map(params![username, limit], row_to_typing_profile)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(profiles)
    }

    fn insert_events(
        &self,
        session_id: &str,
        user_id: Option<i64>,
        username: Option<&str>,
        events: &[(String, Value)],
    ) -> Result<()> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        for (event_type, event_data) in events {
            tx.execute(
                &format!(
                    "INSERT INTO {} (session_id, user_id, username, event_type, event_data)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    EVENT_TABLE.name
                ),
                params![session_id, user_id, username, event_type, event_data.to_string()],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    fn insert_admin_audit(
        &self,
        admin_username: &str,
        action: &str,
        target_username: &str,
        before_state: &Value,
        after_state: &Value,
    ) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            &format!(
                "INSERT INTO {} (admin_username, action, target_username, before_state, after_state)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                ADMIN_AUDIT_TABLE.name
            ),
            params![
                admin_username,
                action,
                target_username,
                before_state.to_string(),
                after_state.to_string(),
            ],
        )?;
        Ok(())
    }

    fn list_admin_audit(&self, limit: usize) -> Result<Vec<AdminAuditEntry>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT id, admin_username, action, target_username, before_state, after_state, created
             FROM {} ORDER BY created DESC, id DESC LIMIT ?1",
            ADMIN_AUDIT_TABLE.name
        ))?;
        let entries = stmt
            .query_map(params![limit], |row| {
                let before: String = row.get(4)?;
                let after: String = row.get(5)?;
                Ok(AdminAuditEntry {
                    id: row.get(0)?,
                    admin_username: row.get(1)?,
                    action: row.get(2)?,
                    target_username: row.get(3)?,
                    before_state: parse_json(before),
                    after_state: parse_json(after),
                    created: row.get(6)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::models::Severity;
    use serde_json::json;

    fn store() -> (tempfile::TempDir, SqliteTelemetryStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteTelemetryStore::new(dir.path().join("telemetry.db")).unwrap();
        (dir, store)
    }

    fn finding(severity: Severity, anomaly_type: &str) -> Finding {
        Finding {
            session_id: "s".to_string(),
            user_id: Some(1),
            username: Some("umar".to_string()),
            severity,
            anomaly_type: anomaly_type.to_string(),
            details: json!({ "example": true }),
            ip_hash: "iphash".to_string(),
            country: "DE".to_string(),
        }
    }

    #[test]
    fn anomalies_are_ordered_severity_then_recency() {
        let (_dir, store) = store();
        store.insert_anomaly(&finding(Severity::Low, "slow_request")).unwrap();
        store.insert_anomaly(&finding(Severity::High, "honeypot_triggered")).unwrap();
        store.insert_anomaly(&finding(Severity::Medium, "bot_cadence")).unwrap();
        store.insert_anomaly(&finding(Severity::High, "jwt_brute_force")).unwrap();

        let anomalies = store.list_anomalies(100).unwrap();
        let kinds: Vec<&str> = anomalies.iter().map(|a| a.anomaly_type.as_str()).collect();
        assert_eq!(
            kinds,
            vec![
                "jwt_brute_force",
                "honeypot_triggered",
                "bot_cadence",
                "slow_request"
            ]
        );
        assert_eq!(anomalies[0].severity, "HIGH");
        assert_eq!(anomalies[0].details, json!({ "example": true }));
    }

    #[test]
    fn anomaly_list_respects_limit() {
        let (_dir, store) = store();
        for _ in 0..5 {
            store.insert_anomaly(&finding(Severity::Low, "slow_request")).unwrap();
        }
        assert_eq!(store.list_anomalies(3).unwrap().len(), 3);
    }

    #[test]
    fn fingerprint_upsert_replaces_by_session() {
        let (_dir, store) = store();
        let mut record = FingerprintRecord {
            session_id: "sess".to_string(),
            user_id: Some(1),
            username: Some("umar".to_string()),
            fingerprint_hash: "fp1".to_string(),
            canvas_hash: String::new(),
            webgl_hash: String::new(),
            navigator_data: json!({}),
            timezone: "Europe/Berlin".to_string(),
            locale: "de-DE".to_string(),
            screen_resolution: "1920x1080".to_string(),
            headless_flags: vec![],
            country: "DE".to_string(),
            user_agent: "agent".to_string(),
        };
        store.upsert_fingerprint(&record).unwrap();
        record.fingerprint_hash = "fp2".to_string();
        store.upsert_fingerprint(&record).unwrap();

        let scores = store.fingerprint_scores().unwrap();
        assert_eq!(scores.len(), 1);
        assert_eq!(scores[0].username, "umar");
        assert_eq!(scores[0].total_sessions, 1);
        assert_eq!(scores[0].unique_fingerprints, 1);
    }

    #[test]
    fn typing_profiles_latest_first() {
        let (_dir, store) = store();
        store
            .insert_typing_profile("umar", "s", 200.0, 80.0, 200.0, 80.0, 0.0, false)
            .unwrap();
        store
            .insert_typing_profile("umar", "s", 300.0, 80.0, 230.0, 80.0, 50.0, true)
            .unwrap();

        let latest = store.get_latest_typing_profile("umar").unwrap().unwrap();
        assert_eq!(latest.baseline_dwell, 230.0);
        assert!(latest.flagged);
        assert_eq!(store.list_typing_profiles("umar", 10).unwrap().len(), 2);
        assert!(store.get_latest_typing_profile("nobody").unwrap().is_none());
    }

    #[test]
    fn events_insert_in_one_batch() {
        let (_dir, store) = store();
        store
            .insert_events(
                "sess",
                Some(1),
                Some("umar"),
                &[
                    ("click".to_string(), json!({"x": 1})),
                    ("scroll".to_string(), json!({"y": 2})),
                ],
            )
            .unwrap();
        // No read API beyond admin tooling; the insert succeeding is enough here.
    }

    #[test]
    fn admin_audit_roundtrip() {
        let (_dir, store) = store();
        store
            .insert_admin_audit(
                "boss",
                "set-multiplier",
                "umar",
                &json!({"multiplier": 1.0}),
                &json!({"multiplier": 2.0}),
            )
            .unwrap();
        let entries = store.list_admin_audit(10).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].action, "set-multiplier");
        assert_eq!(entries[0].after_state, json!({"multiplier": 2.0}));
    }
}
