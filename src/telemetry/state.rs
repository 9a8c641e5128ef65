//! In-memory request counters owned by the detector.
//!
//! All three maps are process-lifetime caches: losing them on restart is
//! intentional (best-effort heuristics, not durable security state). Each
//! map sits behind its own lock so concurrent requests from the same
//! session/IP never lose updates.

use super::rules::{cadence_stats, CadenceSample};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

/// Request timestamps kept per session for cadence analysis.
const REQUEST_RING_CAP: usize = 50;

/// Cadence is only evaluated at every Nth request of a session.
const CADENCE_CHECK_EVERY: usize = 20;

/// Country sightings kept per user for impossible-travel detection.
const COUNTRY_RING_CAP: usize = 20;

/// Trailing window for impossible travel.
const TRAVEL_WINDOW_MS: i64 = 3_600_000;

/// Failed-auth window: counting restarts after this long of a window.
const AUTH_FAILURE_WINDOW_MS: i64 = 600_000;

/// 401 responses from one hashed IP before the brute-force rule fires.
const BRUTE_FORCE_THRESHOLD: u32 = 10;

/// 403 responses from one session before the escalation rule fires.
const ESCALATION_THRESHOLD: u32 = 5;

struct FailureCounter {
    count: u32,
    first_ms: i64,
}

struct CountrySighting {
    country: String,
    ts_ms: i64,
}

#[derive(Default)]
pub struct TelemetryState {
    failed_auth: Mutex<HashMap<String, FailureCounter>>,
    request_times: Mutex<HashMap<String, VecDeque<i64>>>,
    user_countries: Mutex<HashMap<i64, VecDeque<CountrySighting>>>,
}

impl TelemetryState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a request timestamp for the session. Returns cadence stats at
    /// every checkpoint (ring at least 20 deep, length divisible by 20).
    pub fn record_request(&self, session_id: &str, now_ms: i64) -> Option<CadenceSample> {
        let mut map = self.request_times.lock().unwrap();
        let ring = map.entry(session_id.to_string()).or_default();
        ring.push_back(now_ms);
        if ring.len() > REQUEST_RING_CAP {
            ring.pop_front();
        }
        if ring.len() >= CADENCE_CHECK_EVERY && ring.len() % CADENCE_CHECK_EVERY == 0 {
            let timestamps: Vec<i64> = ring.iter().copied().collect();
            return cadence_stats(&timestamps);
        }
        None
    }

    /// Records a country sighting for the user. Returns the distinct
    /// countries seen within the trailing hour when there is more than one.
    pub fn record_country(&self, user_id: i64, country: &str, now_ms: i64) -> Option<Vec<String>> {
        if country.is_empty() {
            return None;
        }
        let mut map = self.user_countries.lock().unwrap();
        let ring = map.entry(user_id).or_default();
        ring.push_back(CountrySighting {
            country: country.to_string(),
            ts_ms: now_ms,
        });
        if ring.len() > COUNTRY_RING_CAP {
            ring.pop_front();
        }

        let cutoff = now_ms - TRAVEL_WINDOW_MS;
        let mut countries: Vec<String> = Vec::new();
        for sighting in ring.iter().filter(|s| s.ts_ms > cutoff) {
            if !countries.contains(&sighting.country) {
                countries.push(sighting.country.clone());
            }
        }
        if countries.len() > 1 {
            Some(countries)
        } else {
            None
        }
    }

    /// Counts a 401 against the hashed IP. The window restarts after ten
    /// minutes of counting; on firing the counter restarts at 1 (the failure
    /// that fired opens the next window). Returns the count that fired.
    pub fn record_unauthorized(&self, ip_hash: &str, now_ms: i64) -> Option<u32> {
        let mut map = self.failed_auth.lock().unwrap();
        let counter = map.entry(ip_hash.to_string()).or_insert(FailureCounter {
            count: 0,
            first_ms: now_ms,
        });
        counter.count += 1;
        if now_ms - counter.first_ms > AUTH_FAILURE_WINDOW_MS {
            counter.count = 1;
            counter.first_ms = now_ms;
        }
        if counter.count >= BRUTE_FORCE_THRESHOLD {
            let fired = counter.count;
            counter.count = 1;
            counter.first_ms = now_ms;
            return Some(fired);
        }
        None
    }

    /// Counts a 403 against the session (or IP fallback) key. No time
    /// window; the counter restarts at 0 after firing.
    pub fn record_forbidden(&self, key: &str, now_ms: i64) -> Option<u32> {
        let mut map = self.failed_auth.lock().unwrap();
        let counter = map
            .entry(format!("priv_{}", key))
            .or_insert(FailureCounter {
                count: 0,
                first_ms: now_ms,
            });
        counter.count += 1;
        if counter.count >= ESCALATION_THRESHOLD {
            let fired = counter.count;
            counter.count = 0;
            return Some(fired);
        }
        None
    }
}
