use super::error::ApiError;
use super::session::Session;
use super::state::ServerState;
use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

/// Hijri month of Ramadan in the Aladhan calendar API.
const RAMADAN_MONTH: u32 = 9;

#[derive(Deserialize)]
struct AladhanResponse {
    code: i64,
    #[serde(default)]
    data: Vec<AladhanDay>,
}

#[derive(Deserialize)]
struct AladhanDay {
    gregorian: AladhanGregorian,
}

#[derive(Deserialize)]
struct AladhanGregorian {
    /// DD-MM-YYYY
    date: String,
}

fn to_iso(dd_mm_yyyy: &str) -> Option<String> {
    let mut parts = dd_mm_yyyy.split('-');
    let day = parts.next()?;
    let month = parts.next()?;
    let year = parts.next()?;
    Some(format!("{}-{}-{}", year, month, day))
}

/// Gregorian start/end of Ramadan for the year, cached in the settings
/// table after the first successful fetch.
pub async fn get_ramadan_dates(
    _session: Session,
    State(state): State<ServerState>,
    Path(year): Path<i32>,
) -> Result<Json<Value>, ApiError> {
    let cache_key = format!("ramadan_{}", year);

    if let Some(cached) = state.tracker_store.get_setting(&cache_key)? {
        match serde_json::from_str::<Value>(&cached) {
            Ok(dates) => return Ok(Json(json!({ "success": true, "dates": dates }))),
            Err(err) => debug!("Corrupted ramadan cache for {}: {}", year, err),
        }
    }

    let url = format!(
        "https://api.aladhan.com/v1/hijriCalendar/{}/{}?method=2",
        RAMADAN_MONTH, year
    );
    let response: AladhanResponse = match reqwest::get(&url).await {
        Ok(response) => match response.json().await {
            Ok(parsed) => parsed,
            Err(err) => {
                warn!("Failed to parse Aladhan response: {}", err);
                return Err(ApiError::Failure("Failed to fetch Ramadan dates."));
            }
        },
        Err(err) => {
            warn!("Failed to reach Aladhan API: {}", err);
            return Err(ApiError::Failure("Failed to fetch Ramadan dates."));
        }
    };

    if response.code != 200 || response.data.is_empty() {
        return Err(ApiError::Failure("Failed to fetch Ramadan dates."));
    }

    let start = to_iso(&response.data[0].gregorian.date);
    let end = to_iso(&response.data[response.data.len() - 1].gregorian.date);
    let (start, end) = match (start, end) {
        (Some(start), Some(end)) => (start, end),
        _ => return Err(ApiError::Failure("Failed to fetch Ramadan dates.")),
    };

    let dates = json!({ "start": start, "end": end });
    state.tracker_store.set_setting(&cache_key, &dates.to_string())?;

    Ok(Json(json!({ "success": true, "dates": dates })))
}
