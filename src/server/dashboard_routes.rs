use super::error::ApiError;
use super::session::Session;
use super::state::ServerState;
use crate::scoring::{compute_leaderboard, ScoringWeights};
use axum::extract::{Path, State};
use axum::Json;
use chrono::Utc;
use serde_json::{json, Value};
use tracing::error;

/// The leaderboard, recomputed on every call. Admin callers see the
/// multiplier, frozen flag and email; everyone else gets redacted rows.
pub async fn get_dashboard(
    session: Session,
    State(state): State<ServerState>,
    Path(year): Path<i32>,
) -> Result<Json<Value>, ApiError> {
    let today = Utc::now().date_naive();

    let result = (|| {
        let users = state.user_store.get_all_users()?;
        let weights = ScoringWeights::from_rows(&state.tracker_store.get_weight_rows()?);
        compute_leaderboard(state.tracker_store.as_ref(), &users, &weights, year, today)
    })();

    let mut summaries = match result {
        Ok(summaries) => summaries,
        Err(err) => {
            error!("Dashboard error: {:#}", err);
            return Err(ApiError::Failure("Failed to load dashboard."));
        }
    };

    if !session.is_admin() {
        summaries = summaries.into_iter().map(|p| p.redacted()).collect();
    }

    Ok(Json(json!({ "success": true, "summaries": summaries })))
}
