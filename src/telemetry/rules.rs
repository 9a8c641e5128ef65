//! Pure detector rules, independently testable.

use super::models::Severity;

/// Response latency above this is flagged as a slow request.
pub const SLOW_REQUEST_MS: i64 = 2000;

/// Typing deviation from the running baseline above this percentage fires.
pub const TYPING_DEVIATION_THRESHOLD_PCT: f64 = 40.0;

/// Running typing baseline update: `0.7 * old + 0.3 * new` per batch.
pub const BASELINE_OLD_WEIGHT: f64 = 0.7;
pub const BASELINE_NEW_WEIGHT: f64 = 0.3;

/// Expected top-level POST body fields per route. Anything outside the
/// whitelist is parameter tampering.
pub const ROUTE_SHAPES: &[(&str, &[&str])] = &[
    ("/api/auth/login", &["identifier", "password", "website"]),
    (
        "/api/auth/register",
        &["username", "email", "password", "gender", "age", "dateOfBirth", "website"],
    ),
    ("/api/auth/change-password", &["oldPassword", "newPassword"]),
    ("/api/taraweeh", &["date", "year", "completed", "rakaat"]),
    (
        "/api/quran",
        &["khatamId", "paraNumber", "completed", "type", "year", "id"],
    ),
    ("/api/fasting", &["date", "year", "completed"]),
    ("/api/azkar", &["date", "morning", "evening"]),
    ("/api/namaz", &["date", "prayer", "location"]),
    (
        "/api/surah",
        &["surahNumber", "surahName", "totalAyah", "memorizedAyah", "id"],
    ),
    (
        "/api/admin",
        &[
            "targetUsername",
            "newPassword",
            "newRole",
            "multiplier",
            "frozen",
            "message",
            "weights",
        ],
    ),
];

/// Finds the whitelist for a path, falling back to the path with its last
/// segment stripped so `/api/taraweeh/log` matches `/api/taraweeh`.
pub fn whitelist_for(path: &str) -> Option<&'static [&'static str]> {
    let exact = ROUTE_SHAPES.iter().find(|(route, _)| *route == path);
    if let Some((_, fields)) = exact {
        return Some(fields);
    }
    let base = match path.rfind('/') {
        Some(idx) if idx > 0 => &path[..idx],
        _ => return None,
    };
    ROUTE_SHAPES
        .iter()
        .find(|(route, _)| *route == base)
        .map(|(_, fields)| *fields)
}

/// Body fields outside the route's whitelist. Returns None when the route
/// carries no whitelist or every field is expected.
pub fn extra_fields(path: &str, body_keys: &[String]) -> Option<Vec<String>> {
    let whitelist = whitelist_for(path)?;
    let extra: Vec<String> = body_keys
        .iter()
        .filter(|key| !whitelist.contains(&key.as_str()))
        .cloned()
        .collect();
    if extra.is_empty() {
        None
    } else {
        Some(extra)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CadenceSample {
    pub cv: f64,
    pub mean_interval_ms: f64,
    pub samples: usize,
}

/// Coefficient of variation of inter-request intervals. Needs at least two
/// timestamps to form one interval.
pub fn cadence_stats(timestamps: &[i64]) -> Option<CadenceSample> {
    if timestamps.len() < 2 {
        return None;
    }
    let intervals: Vec<f64> = timestamps
        .windows(2)
        .map(|pair| (pair[1] - pair[0]) as f64)
        .collect();
    let mean = intervals.iter().sum::<f64>() / intervals.len() as f64;
    let variance = intervals
        .iter()
        .map(|interval| (interval - mean).powi(2))
        .sum::<f64>()
        / intervals.len() as f64;
    let std_dev = variance.sqrt();
    let cv = if mean > 0.0 { std_dev / mean } else { 1.0 };
    Some(CadenceSample {
        cv,
        mean_interval_ms: mean,
        samples: intervals.len(),
    })
}

/// Machine-like cadence: nearly uniform intervals at sub-5s pace.
pub fn is_bot_cadence(sample: &CadenceSample) -> bool {
    sample.cv < 0.1 && sample.mean_interval_ms < 5000.0
}

/// A single headless indicator is only LOW; two or more together are MEDIUM.
pub fn headless_severity(flag_count: usize) -> Severity {
    if flag_count >= 2 {
        Severity::Medium
    } else {
        Severity::Low
    }
}
