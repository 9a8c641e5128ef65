//! Request interception for the anomaly detector.
//!
//! Pure side-channel: the response passes through untouched, and every
//! detector call is fail-silent. Small JSON POST bodies are buffered to
//! inspect their top-level field names, then handed onward unchanged.

use crate::server::session::HEADER_SESSION_TOKEN_KEY;
use crate::server::state::ServerState;
use crate::telemetry::{hash_ip, RequestContext};
use axum::body::{to_bytes, Body};
use axum::extract::{ConnectInfo, State};
use axum::http::{header, Method, Request};
use axum::middleware::Next;
use axum::response::Response;
use std::net::SocketAddr;
use std::time::Instant;
use tracing::debug;

/// Bodies above this size are not inspected for parameter tampering.
const MAX_INSPECTED_BODY_BYTES: usize = 32 * 1024;

pub const HEADER_SESSION_ID: &str = "x-session-id";
pub const HEADER_COUNTRY: &str = "cf-ipcountry";
pub const HEADER_CONNECTING_IP: &str = "cf-connecting-ip";

fn header_string(request: &Request<Body>, name: &str) -> String {
    request
        .headers()
        .get(name)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

/// (session id, hashed ip, country, user agent) for handlers that record
/// telemetry themselves (honeypots, auth honeypot field).
pub fn meta_from_headers(
    headers: &axum::http::HeaderMap,
    addr: Option<SocketAddr>,
) -> (String, String, String, String) {
    let get = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_string()
    };
    let ip = {
        let edge_ip = get(HEADER_CONNECTING_IP);
        if !edge_ip.is_empty() {
            edge_ip
        } else {
            addr.map(|addr| addr.ip().to_string()).unwrap_or_default()
        }
    };
    (
        get(HEADER_SESSION_ID),
        hash_ip(&ip),
        get(HEADER_COUNTRY),
        get(header::USER_AGENT.as_str()),
    )
}

pub fn build_request_context(state: &ServerState, request: &Request<Body>) -> RequestContext {
    let ip = {
        let edge_ip = header_string(request, HEADER_CONNECTING_IP);
        if !edge_ip.is_empty() {
            edge_ip
        } else {
            request
                .extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip().to_string())
                .unwrap_or_default()
        }
    };

    let user = request
        .headers()
        .get(HEADER_SESSION_TOKEN_KEY)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .and_then(|token| state.auth_keys.verify_token(token).ok())
        .map(|claims| (claims.sub, claims.username));

    RequestContext {
        method: request.method().to_string(),
        path: request.uri().path().to_string(),
        session_id: header_string(request, HEADER_SESSION_ID),
        ip_hash: hash_ip(&ip),
        country: header_string(request, HEADER_COUNTRY),
        user_agent: header_string(request, header::USER_AGENT.as_str()),
        user,
    }
}

/// Buffers a small JSON POST body and returns its top-level keys, handing
/// back an equivalent request.
async fn inspect_post_body(request: Request<Body>) -> (Request<Body>, Option<Vec<String>>) {
    if request.method() != Method::POST {
        return (request, None);
    }
    let is_json = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.contains("application/json"))
        .unwrap_or(false);
    if !is_json {
        return (request, None);
    }
    let small_enough = request
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<usize>().ok())
        .map(|size| size <= MAX_INSPECTED_BODY_BYTES)
        .unwrap_or(false);
    if !small_enough {
        return (request, None);
    }

    let (parts, body) = request.into_parts();
    match to_bytes(body, MAX_INSPECTED_BODY_BYTES).await {
        Ok(bytes) => {
            let keys = serde_json::from_slice::<serde_json::Value>(&bytes)
                .ok()
                .and_then(|value| {
                    value
                        .as_object()
                        .map(|object| object.keys().cloned().collect::<Vec<_>>())
                });
            (Request::from_parts(parts, Body::from(bytes)), keys)
        }
        Err(err) => {
            debug!("Failed to buffer request body for inspection: {}", err);
            (Request::from_parts(parts, Body::empty()), None)
        }
    }
}

pub async fn observe_requests(
    State(state): State<ServerState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let ctx = build_request_context(&state, &request);
    let start = Instant::now();

    let (request, body_keys) = inspect_post_body(request).await;
    state.detector.observe_request(&ctx, body_keys.as_deref());

    let response = next.run(request).await;

    let elapsed_ms = start.elapsed().as_millis() as i64;
    state
        .detector
        .observe_response(&ctx, response.status().as_u16(), elapsed_ms);

    response
}
