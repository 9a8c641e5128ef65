use super::error::ApiError;
use super::http_layers::meta_from_headers;
use super::metrics::record_login_attempt;
use super::session::Session;
use super::state::ServerState;
use crate::telemetry::{Finding, Severity};
use crate::user::auth::SaltedPassword;
use crate::user::user_models::{Gender, NewUser, UserRole};
use axum::extract::{ConnectInfo, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::json;
use std::net::SocketAddr;

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct RegisterBody {
    pub username: String,
    pub email: String,
    pub password: String,
    pub gender: Option<String>,
    pub age: Option<u32>,
    pub date_of_birth: Option<String>,
    /// Hidden honeypot form field; real users never fill it.
    pub website: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct LoginBody {
    pub identifier: String,
    pub password: String,
    pub website: Option<String>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordBody {
    pub old_password: String,
    pub new_password: String,
}

/// A filled honeypot field records a HIGH anomaly; the request then
/// proceeds normally so the caller cannot detect detection.
fn honeypot_field_check(
    state: &ServerState,
    headers: &HeaderMap,
    addr: SocketAddr,
    route: &str,
    website: Option<&str>,
    identifier: Option<&str>,
) {
    let filled = website.map(|value| !value.is_empty()).unwrap_or(false);
    if !filled {
        return;
    }
    let (session_id, ip_hash, country, _user_agent) = meta_from_headers(headers, Some(addr));
    state.detector.record_anomaly(Finding {
        session_id,
        user_id: None,
        username: identifier.map(|s| s.to_string()),
        severity: Severity::High,
        anomaly_type: "honeypot_form_field".to_string(),
        details: json!({ "route": route, "field": "website" }),
        ip_hash,
        country,
    });
}

pub async fn register(
    State(state): State<ServerState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(body): Json<RegisterBody>,
) -> Result<impl IntoResponse, ApiError> {
    honeypot_field_check(
        &state,
        &headers,
        addr,
        "/api/auth/register",
        body.website.as_deref(),
        Some(&body.username),
    );

    if body.username.trim().is_empty() || body.email.trim().is_empty() || body.password.is_empty() {
        return Err(ApiError::validation("All fields are required."));
    }
    if body.username.len() < 3 {
        return Err(ApiError::validation("Username must be at least 3 characters."));
    }
    if body.password.len() < 4 {
        return Err(ApiError::validation("Password must be at least 4 characters."));
    }
    let gender = match &body.gender {
        Some(raw) if !raw.is_empty() => Some(
            Gender::from_str(raw)
                .ok_or_else(|| ApiError::validation("Gender must be Male or Female."))?,
        ),
        _ => None,
    };
    let date_of_birth = match &body.date_of_birth {
        Some(raw) if !raw.is_empty() => Some(
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .map_err(|_| ApiError::validation("Date of birth must be YYYY-MM-DD."))?,
        ),
        _ => None,
    };

    if state.user_store.get_user_by_identifier(&body.username)?.is_some()
        || state.user_store.get_user_by_identifier(&body.email)?.is_some()
    {
        return Err(ApiError::validation("Username or email already taken."));
    }

    // First registered user becomes the admin
    let role = if state.user_store.count_users()? == 0 {
        UserRole::Admin
    } else {
        UserRole::User
    };

    let password = SaltedPassword::new(&body.password)?;
    let new_user = NewUser {
        username: body.username.clone(),
        email: body.email.clone(),
        role,
        gender,
        age: body.age,
        date_of_birth,
    };
    state.user_store.create_user(&new_user, &password)?;

    let message = match role {
        UserRole::Admin => "Account created! You are the admin.",
        UserRole::User => "Account created! You can now sign in.",
    };
    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "message": message })),
    ))
}

pub async fn login(
    State(state): State<ServerState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(body): Json<LoginBody>,
) -> Result<impl IntoResponse, ApiError> {
    honeypot_field_check(
        &state,
        &headers,
        addr,
        "/api/auth/login",
        body.website.as_deref(),
        Some(&body.identifier),
    );

    if body.identifier.is_empty() || body.password.is_empty() {
        return Err(ApiError::validation("All fields are required."));
    }

    let invalid_credentials =
        || ApiError::Unauthorized("Invalid username/email or password.".to_string());

    let user = match state.user_store.get_user_by_identifier(&body.identifier)? {
        Some(user) => user,
        None => {
            record_login_attempt("failure");
            return Err(invalid_credentials());
        }
    };
    let verified = match state.user_store.get_password(&user.username)? {
        Some(password) => password.verify(&body.password)?,
        None => false,
    };
    if !verified {
        record_login_attempt("failure");
        return Err(invalid_credentials());
    }

    let token = state.auth_keys.issue_token(&user)?;
    record_login_attempt("success");

    Ok(Json(json!({
        "success": true,
        "token": token,
        "username": user.username,
        "email": user.email,
        "role": user.role.as_str(),
    })))
}

pub async fn change_password(
    session: Session,
    State(state): State<ServerState>,
    Json(body): Json<ChangePasswordBody>,
) -> Result<impl IntoResponse, ApiError> {
    if body.old_password.is_empty() || body.new_password.is_empty() {
        return Err(ApiError::validation("All fields are required."));
    }
    if body.new_password.len() < 4 {
        return Err(ApiError::validation(
            "New password must be at least 4 characters.",
        ));
    }

    let current = state
        .user_store
        .get_password(&session.username)?
        .ok_or_else(|| ApiError::not_found("User not found."))?;
    if !current.verify(&body.old_password)? {
        return Err(ApiError::Unauthorized(
            "Current password is incorrect.".to_string(),
        ));
    }

    let replacement = SaltedPassword::new(&body.new_password)?;
    state.user_store.update_password(&session.username, &replacement)?;

    Ok(Json(json!({ "success": true, "message": "Password changed successfully!" })))
}
