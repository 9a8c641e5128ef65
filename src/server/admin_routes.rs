use super::error::ApiError;
use super::session::AdminSession;
use super::state::ServerState;
use crate::scoring::ScoringWeights;
use crate::user::user_models::UserRole;
use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

pub const MIN_SCORE_MULTIPLIER: f64 = 0.1;
pub const MAX_SCORE_MULTIPLIER: f64 = 5.0;

/// Best-effort audit trail; a failed write never fails the admin action.
fn audit(
    state: &ServerState,
    admin: &str,
    action: &str,
    target: &str,
    before: Value,
    after: Value,
) {
    if let Err(err) = state
        .telemetry_store
        .insert_admin_audit(admin, action, target, &before, &after)
    {
        debug!("Failed to write admin audit row: {}", err);
    }
}

pub async fn get_users(
    _session: AdminSession,
    State(state): State<ServerState>,
) -> Result<Json<Value>, ApiError> {
    let users = state.user_store.get_all_users()?;
    let users: Vec<Value> = users
        .into_iter()
        .map(|user| {
            json!({
                "username": user.username,
                "email": user.email,
                "role": user.role.as_str(),
                "gender": user.gender.map(|g| g.as_str()),
                "age": user.age,
                "scoreMultiplier": user.score_multiplier,
                "frozen": user.frozen,
                "created": user.created,
            })
        })
        .collect();
    Ok(Json(json!({ "success": true, "users": users })))
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordBody {
    pub target_username: String,
    pub new_password: String,
}

pub async fn reset_password(
    AdminSession(session): AdminSession,
    State(state): State<ServerState>,
    Json(body): Json<ResetPasswordBody>,
) -> Result<Json<Value>, ApiError> {
    if body.new_password.len() < 4 {
        return Err(ApiError::validation("Password must be at least 4 characters."));
    }
    let password = crate::user::auth::SaltedPassword::new(&body.new_password)?;
    if !state.user_store.update_password(&body.target_username, &password)? {
        return Err(ApiError::not_found("User not found."));
    }
    audit(
        &state,
        &session.username,
        "reset-password",
        &body.target_username,
        json!({}),
        json!({}),
    );
    Ok(Json(json!({
        "success": true,
        "message": format!("{} password reset.", body.target_username),
    })))
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ChangeRoleBody {
    pub target_username: String,
    pub new_role: String,
}

pub async fn change_role(
    AdminSession(session): AdminSession,
    State(state): State<ServerState>,
    Json(body): Json<ChangeRoleBody>,
) -> Result<Json<Value>, ApiError> {
    let role = UserRole::from_str(&body.new_role)
        .ok_or_else(|| ApiError::validation("Invalid role."))?;
    let before = state
        .user_store
        .get_user(&body.target_username)?
        .ok_or_else(|| ApiError::not_found("User not found."))?;
    state.user_store.set_role(&body.target_username, role)?;
    audit(
        &state,
        &session.username,
        "change-role",
        &body.target_username,
        json!({ "role": before.role.as_str() }),
        json!({ "role": role.as_str() }),
    );
    Ok(Json(json!({
        "success": true,
        "message": format!("{} is now {}", body.target_username, role.as_str()),
    })))
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct DeleteUserBody {
    pub target_username: String,
}

pub async fn delete_user(
    AdminSession(session): AdminSession,
    State(state): State<ServerState>,
    Json(body): Json<DeleteUserBody>,
) -> Result<Json<Value>, ApiError> {
    if body.target_username.eq_ignore_ascii_case(&session.username) {
        return Err(ApiError::validation("Cannot delete yourself."));
    }
    if !state.user_store.delete_user(&body.target_username)? {
        return Err(ApiError::not_found("User not found."));
    }
    state.tracker_store.delete_user_data(&body.target_username)?;
    audit(
        &state,
        &session.username,
        "delete-user",
        &body.target_username,
        json!({}),
        json!({}),
    );
    Ok(Json(json!({
        "success": true,
        "message": format!("{} deleted.", body.target_username),
    })))
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct SetMultiplierBody {
    pub target_username: String,
    pub multiplier: f64,
}

pub async fn set_multiplier(
    AdminSession(session): AdminSession,
    State(state): State<ServerState>,
    Json(body): Json<SetMultiplierBody>,
) -> Result<Json<Value>, ApiError> {
    if !body.multiplier.is_finite()
        || body.multiplier < MIN_SCORE_MULTIPLIER
        || body.multiplier > MAX_SCORE_MULTIPLIER
    {
        return Err(ApiError::validation(format!(
            "Multiplier must be between {} and {}.",
            MIN_SCORE_MULTIPLIER, MAX_SCORE_MULTIPLIER
        )));
    }
    let before = state
        .user_store
        .get_user(&body.target_username)?
        .ok_or_else(|| ApiError::not_found("User not found."))?;
    state
        .user_store
        .set_score_multiplier(&body.target_username, body.multiplier)?;
    audit(
        &state,
        &session.username,
        "set-multiplier",
        &body.target_username,
        json!({ "multiplier": before.score_multiplier }),
        json!({ "multiplier": body.multiplier }),
    );
    Ok(Json(json!({
        "success": true,
        "message": format!("{} multiplier set to {}.", body.target_username, body.multiplier),
    })))
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct SetFrozenBody {
    pub target_username: String,
    pub frozen: bool,
}

pub async fn set_frozen(
    AdminSession(session): AdminSession,
    State(state): State<ServerState>,
    Json(body): Json<SetFrozenBody>,
) -> Result<Json<Value>, ApiError> {
    let before = state
        .user_store
        .get_user(&body.target_username)?
        .ok_or_else(|| ApiError::not_found("User not found."))?;
    state.user_store.set_frozen(&body.target_username, body.frozen)?;
    audit(
        &state,
        &session.username,
        "set-frozen",
        &body.target_username,
        json!({ "frozen": before.frozen }),
        json!({ "frozen": body.frozen }),
    );
    let message = if body.frozen {
        format!("{} is now frozen.", body.target_username)
    } else {
        format!("{} is no longer frozen.", body.target_username)
    };
    Ok(Json(json!({ "success": true, "message": message })))
}

pub async fn export_year(
    _session: AdminSession,
    State(state): State<ServerState>,
    Path(year): Path<i32>,
) -> Result<Json<Value>, ApiError> {
    let taraweeh: Vec<Value> = state
        .tracker_store
        .export_taraweeh(year)?
        .into_iter()
        .map(|(username, entry)| {
            json!({
                "username": username,
                "year": year,
                "date": entry.date.to_string(),
                "rakaat": entry.rakaat,
            })
        })
        .collect();
    let fasting: Vec<Value> = state
        .tracker_store
        .export_fasting(year)?
        .into_iter()
        .map(|(username, entry)| {
            json!({ "username": username, "year": year, "date": entry.date.to_string() })
        })
        .collect();
    let quran: Vec<Value> = state
        .tracker_store
        .export_khatams(year)?
        .into_iter()
        .map(|khatam| {
            json!({
                "id": khatam.id,
                "username": khatam.username,
                "year": khatam.year,
                "type": khatam.khatam_type.as_str(),
                "startedAt": khatam.started_at,
                "completedAt": khatam.completed_at,
                "paraCount": khatam.para_count,
            })
        })
        .collect();

    Ok(Json(json!({
        "success": true,
        "data": { "taraweeh": taraweeh, "quran": quran, "fasting": fasting },
    })))
}

pub async fn get_weights(
    _session: AdminSession,
    State(state): State<ServerState>,
) -> Result<Json<Value>, ApiError> {
    let weights = state.tracker_store.get_weight_rows()?;
    Ok(Json(json!({ "success": true, "weights": weights })))
}

#[derive(Deserialize, Debug)]
pub struct WeightUpdate {
    pub key: String,
    pub value: f64,
}

#[derive(Deserialize, Debug)]
pub struct UpdateWeightsBody {
    pub weights: Vec<WeightUpdate>,
}

pub async fn update_weights(
    AdminSession(session): AdminSession,
    State(state): State<ServerState>,
    Json(body): Json<UpdateWeightsBody>,
) -> Result<Json<Value>, ApiError> {
    if body.weights.is_empty() {
        return Err(ApiError::validation("No weight updates given."));
    }
    for update in &body.weights {
        if !ScoringWeights::is_known_key(&update.key) {
            return Err(ApiError::validation(format!("Unknown weight key: {}", update.key)));
        }
        if !update.value.is_finite() || update.value < 0.0 {
            return Err(ApiError::validation(format!(
                "Weight {} must be a non-negative number.",
                update.key
            )));
        }
    }

    let before = state.tracker_store.get_weight_rows()?;
    let updates: Vec<(String, f64)> = body
        .weights
        .iter()
        .map(|update| (update.key.clone(), update.value))
        .collect();
    state.tracker_store.update_weights(&updates)?;

    audit(
        &state,
        &session.username,
        "update-weights",
        "scoring_weights",
        serde_json::to_value(&before).unwrap_or(Value::Null),
        serde_json::to_value(&body.weights.iter().map(|u| json!({ "key": u.key, "value": u.value })).collect::<Vec<_>>())
            .unwrap_or(Value::Null),
    );
    Ok(Json(json!({ "success": true, "message": "Weights updated." })))
}

pub async fn reset_weights(
    AdminSession(session): AdminSession,
    State(state): State<ServerState>,
) -> Result<Json<Value>, ApiError> {
    let before = state.tracker_store.get_weight_rows()?;
    state.tracker_store.reset_weights()?;
    audit(
        &state,
        &session.username,
        "reset-weights",
        "scoring_weights",
        serde_json::to_value(&before).unwrap_or(Value::Null),
        json!("defaults"),
    );
    Ok(Json(json!({ "success": true, "message": "Weights reset to defaults." })))
}

#[derive(Deserialize, Debug)]
pub struct AnnouncementBody {
    pub message: String,
}

pub async fn set_announcement(
    AdminSession(session): AdminSession,
    State(state): State<ServerState>,
    Json(body): Json<AnnouncementBody>,
) -> Result<Json<Value>, ApiError> {
    state.tracker_store.set_setting("announcement", &body.message)?;
    audit(
        &state,
        &session.username,
        "set-announcement",
        "announcement",
        json!({}),
        json!({ "message": body.message }),
    );
    Ok(Json(json!({ "success": true, "message": "Announcement updated." })))
}
