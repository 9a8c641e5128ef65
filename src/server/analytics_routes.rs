use super::error::ApiError;
use super::http_layers::meta_from_headers;
use super::session::AdminSession;
use super::state::ServerState;
use crate::telemetry::models::FingerprintRecord;
use axum::body::Bytes;
use axum::extract::{ConnectInfo, Path, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use std::net::SocketAddr;
use tracing::debug;

const ANOMALY_PAGE_SIZE: usize = 100;
const REQUEST_LOG_PAGE_SIZE: usize = 100;
const HONEYPOT_PAGE_SIZE: usize = 50;
const TYPING_PAGE_SIZE: usize = 50;
const AUDIT_PAGE_SIZE: usize = 50;

fn token_identity(state: &ServerState, headers: &HeaderMap) -> (Option<i64>, Option<String>) {
    headers
        .get(super::session::HEADER_SESSION_TOKEN_KEY)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .and_then(|token| state.auth_keys.verify_token(token).ok())
        .map(|claims| (Some(claims.sub), Some(claims.username)))
        .unwrap_or((None, None))
}

// --- public ingest endpoints, always fail-open ---

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase", default)]
struct FingerprintBody {
    session_id: String,
    username: Option<String>,
    fingerprint_hash: String,
    canvas_hash: String,
    webgl_hash: String,
    navigator_data: Value,
    timezone: String,
    locale: String,
    screen_resolution: String,
    headless_flags: Vec<String>,
}

/// Stores a client fingerprint. Answers `success` no matter what: a broken
/// payload is a lost reading, never a client-visible error.
pub async fn post_fingerprint(
    State(state): State<ServerState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    body: Bytes,
) -> Json<Value> {
    let ok = Json(json!({ "success": true }));

    let body: FingerprintBody = match serde_json::from_slice(&body) {
        Ok(body) => body,
        Err(err) => {
            debug!("Unparseable fingerprint payload: {}", err);
            return ok;
        }
    };
    if body.session_id.is_empty() {
        return ok;
    }

    let (user_id, token_username) = token_identity(&state, &headers);
    let (_, _ip_hash, country, user_agent) = meta_from_headers(&headers, Some(addr));

    state.detector.observe_fingerprint(FingerprintRecord {
        session_id: body.session_id,
        user_id,
        username: token_username.or(body.username),
        fingerprint_hash: body.fingerprint_hash,
        canvas_hash: body.canvas_hash,
        webgl_hash: body.webgl_hash,
        navigator_data: body.navigator_data,
        timezone: body.timezone,
        locale: body.locale,
        screen_resolution: body.screen_resolution,
        headless_flags: body.headless_flags,
        country,
        user_agent,
    });

    ok
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase", default)]
struct EventBatchBody {
    session_id: String,
    username: Option<String>,
    events: Vec<ClientEvent>,
    typing: Option<TypingBatch>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase", default)]
struct ClientEvent {
    #[serde(rename = "type")]
    event_type: String,
    data: Value,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase", default)]
struct TypingBatch {
    avg_dwell: f64,
    avg_flight: f64,
}

/// Ingests a batch of behavioral events and the keystroke-timing summary.
pub async fn post_events(
    State(state): State<ServerState>,
    headers: HeaderMap,
    body: Bytes,
) -> Json<Value> {
    let ok = Json(json!({ "success": true }));

    let body: EventBatchBody = match serde_json::from_slice(&body) {
        Ok(body) => body,
        Err(err) => {
            debug!("Unparseable event batch: {}", err);
            return ok;
        }
    };
    if body.session_id.is_empty() {
        return ok;
    }

    let (user_id, token_username) = token_identity(&state, &headers);
    let username = token_username.or(body.username);

    if !body.events.is_empty() {
        let events: Vec<(String, Value)> = body
            .events
            .into_iter()
            .map(|event| {
                let kind = if event.event_type.is_empty() {
                    "unknown".to_string()
                } else {
                    event.event_type
                };
                (kind, event.data)
            })
            .collect();
        if let Err(err) = state.telemetry_store.insert_events(
            &body.session_id,
            user_id,
            username.as_deref(),
            &events,
        ) {
            debug!("Failed to store event batch: {}", err);
        }
    }

    if let (Some(typing), Some(username)) = (&body.typing, &username) {
        state.detector.observe_typing(
            &body.session_id,
            user_id,
            username,
            typing.avg_dwell,
            typing.avg_flight,
        );
    }

    ok
}

// --- admin feeds ---

pub async fn get_anomalies(
    _session: AdminSession,
    State(state): State<ServerState>,
) -> Result<Json<Value>, ApiError> {
    let anomalies = state
        .telemetry_store
        .list_anomalies(ANOMALY_PAGE_SIZE)
        .map_err(|err| {
            debug!("Anomaly feed error: {:#}", err);
            ApiError::Failure("Failed to load anomalies.")
        })?;
    Ok(Json(json!({ "success": true, "anomalies": anomalies })))
}

pub async fn get_honeypot_log(
    _session: AdminSession,
    State(state): State<ServerState>,
) -> Result<Json<Value>, ApiError> {
    let hits = state
        .telemetry_store
        .list_honeypot_hits(HONEYPOT_PAGE_SIZE)
        .map_err(|err| {
            debug!("Honeypot feed error: {:#}", err);
            ApiError::Failure("Failed to load honeypot log.")
        })?;
    Ok(Json(json!({ "success": true, "hits": hits })))
}

pub async fn get_request_log(
    _session: AdminSession,
    State(state): State<ServerState>,
) -> Result<Json<Value>, ApiError> {
    let requests = state
        .telemetry_store
        .list_request_log(REQUEST_LOG_PAGE_SIZE)
        .map_err(|err| {
            debug!("Request log error: {:#}", err);
            ApiError::Failure("Failed to load request log.")
        })?;
    Ok(Json(json!({ "success": true, "requests": requests })))
}

pub async fn get_fingerprint_scores(
    _session: AdminSession,
    State(state): State<ServerState>,
) -> Result<Json<Value>, ApiError> {
    let scores = state.telemetry_store.fingerprint_scores().map_err(|err| {
        debug!("Fingerprint score error: {:#}", err);
        ApiError::Failure("Failed to load fingerprint scores.")
    })?;
    Ok(Json(json!({ "success": true, "scores": scores })))
}

pub async fn get_typing_profiles(
    _session: AdminSession,
    State(state): State<ServerState>,
    Path(username): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let profiles = state
        .telemetry_store
        .list_typing_profiles(&username, TYPING_PAGE_SIZE)
        .map_err(|err| {
            debug!("Typing profile error: {:#}", err);
            ApiError::Failure("Failed to load typing profiles.")
        })?;
    Ok(Json(json!({ "success": true, "profiles": profiles })))
}

pub async fn get_admin_audit(
    _session: AdminSession,
    State(state): State<ServerState>,
) -> Result<Json<Value>, ApiError> {
    let audits = state
        .telemetry_store
        .list_admin_audit(AUDIT_PAGE_SIZE)
        .map_err(|err| {
            debug!("Audit feed error: {:#}", err);
            ApiError::Failure("Failed to load audit log.")
        })?;
    Ok(Json(json!({ "success": true, "audits": audits })))
}
