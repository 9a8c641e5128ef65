//! Decoy endpoints never linked from the real UI. Each hit is logged and
//! answered with a plausible canned body so the caller learns nothing.

use super::http_layers::meta_from_headers;
use super::state::ServerState;
use axum::extract::{ConnectInfo, State};
use axum::http::HeaderMap;
use axum::Json;
use chrono::Utc;
use serde_json::{json, Value};
use std::net::SocketAddr;

fn log_hit(state: &ServerState, headers: &HeaderMap, addr: SocketAddr, route: &str) {
    let (session_id, ip_hash, country, user_agent) = meta_from_headers(headers, Some(addr));
    let interesting_headers = json!({
        "accept": headers.get("accept").and_then(|v| v.to_str().ok()),
        "referer": headers.get("referer").and_then(|v| v.to_str().ok()),
    });
    state.detector.record_honeypot_hit(
        &session_id,
        &ip_hash,
        route,
        &user_agent,
        interesting_headers,
        &country,
    );
}

pub async fn fake_export(
    State(state): State<ServerState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> Json<Value> {
    log_hit(&state, &headers, addr, "/api/export");
    Json(json!({ "success": true, "data": [], "format": "csv", "message": "Export queued" }))
}

pub async fn fake_users_all(
    State(state): State<ServerState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> Json<Value> {
    log_hit(&state, &headers, addr, "/api/users/all");
    Json(json!({ "success": true, "users": [], "total": 0, "page": 1 }))
}

pub async fn fake_backup(
    State(state): State<ServerState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> Json<Value> {
    log_hit(&state, &headers, addr, "/admin/backup");
    Json(json!({
        "success": true,
        "backup_id": format!("bk_{}", Utc::now().timestamp_millis()),
        "status": "queued",
    }))
}

pub async fn fake_dump(
    State(state): State<ServerState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> Json<Value> {
    log_hit(&state, &headers, addr, "/admin/dump");
    Json(json!({ "success": true, "tables": [], "format": "sql" }))
}

pub async fn fake_debug(
    State(state): State<ServerState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> Json<Value> {
    log_hit(&state, &headers, addr, "/api/debug");
    Json(json!({
        "success": true,
        "debug": true,
        "env": "production",
        "uptime": state.start_time.elapsed().as_secs(),
    }))
}
