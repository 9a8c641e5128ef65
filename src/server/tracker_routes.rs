use super::error::ApiError;
use super::session::Session;
use super::state::ServerState;
use crate::tracker::models::{clamp_rakaat, KhatamType, PrayerLocation, PrayerName};
use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{Method, Request};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{Datelike, NaiveDate, Utc};
use serde::Deserialize;
use serde_json::{json, Map, Value};

const DEFAULT_RAKAAT: i64 = 8;

fn parse_date(raw: &str) -> Result<NaiveDate, ApiError> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| ApiError::validation(format!("Bad date: {}", raw)))
}

fn date_or_today(raw: &Option<String>) -> Result<NaiveDate, ApiError> {
    match raw {
        Some(raw) if !raw.is_empty() => parse_date(raw),
        _ => Ok(Utc::now().date_naive()),
    }
}

/// Rejects tracker writes from frozen users. Reads pass through, and an
/// unauthenticated request falls through to the handler's own 401.
pub async fn frozen_guard(
    State(state): State<ServerState>,
    session: Option<Session>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if request.method() != Method::GET {
        if let Some(session) = &session {
            match state.user_store.is_frozen(&session.username) {
                Ok(Some(true)) => return ApiError::Frozen.into_response(),
                Ok(_) => {}
                Err(err) => return ApiError::Internal(err).into_response(),
            }
        }
    }
    next.run(request).await
}

// --- taraweeh ---

#[derive(Deserialize, Debug)]
pub struct TaraweehLogBody {
    pub date: Option<String>,
    pub completed: bool,
    pub rakaat: Option<i64>,
}

pub async fn log_taraweeh(
    session: Session,
    State(state): State<ServerState>,
    Json(body): Json<TaraweehLogBody>,
) -> Result<Json<Value>, ApiError> {
    let date = date_or_today(&body.date)?;

    if !body.completed {
        state.tracker_store.delete_taraweeh(&session.username, date)?;
        return Ok(Json(
            json!({ "success": true, "message": format!("Taraweeh removed for {}", date) }),
        ));
    }

    let rakaat = clamp_rakaat(body.rakaat.unwrap_or(DEFAULT_RAKAAT));
    state.tracker_store.upsert_taraweeh(&session.username, date, rakaat)?;
    Ok(Json(
        json!({ "success": true, "message": format!("Taraweeh logged for {}", date) }),
    ))
}

pub async fn get_taraweeh(
    _session: Session,
    State(state): State<ServerState>,
    Path((username, year)): Path<(String, i32)>,
) -> Result<Json<Value>, ApiError> {
    let entries = state.tracker_store.get_taraweeh(&username, year)?;
    let mut data = Map::new();
    for entry in entries {
        data.insert(
            entry.date.to_string(),
            json!({ "completed": true, "rakaat": entry.rakaat }),
        );
    }
    Ok(Json(json!({ "success": true, "data": data })))
}

// --- fasting ---

#[derive(Deserialize, Debug)]
pub struct FastingLogBody {
    pub date: Option<String>,
    pub completed: bool,
}

pub async fn log_fasting(
    session: Session,
    State(state): State<ServerState>,
    Json(body): Json<FastingLogBody>,
) -> Result<Json<Value>, ApiError> {
    let date = date_or_today(&body.date)?;

    if !body.completed {
        state.tracker_store.delete_fasting(&session.username, date)?;
        return Ok(Json(
            json!({ "success": true, "message": format!("Fasting removed for {}", date) }),
        ));
    }

    let inserted = state.tracker_store.log_fasting(&session.username, date)?;
    let message = if inserted {
        format!("Fasting logged for {}", date)
    } else {
        "Already logged.".to_string()
    };
    Ok(Json(json!({ "success": true, "message": message })))
}

pub async fn get_fasting(
    _session: Session,
    State(state): State<ServerState>,
    Path((username, year)): Path<(String, i32)>,
) -> Result<Json<Value>, ApiError> {
    let entries = state.tracker_store.get_fasting(&username, year)?;
    let mut data = Map::new();
    for entry in entries {
        data.insert(entry.date.to_string(), json!({ "completed": true }));
    }
    Ok(Json(json!({ "success": true, "data": data })))
}

// --- azkar ---

#[derive(Deserialize, Debug)]
pub struct AzkarLogBody {
    pub date: Option<String>,
    #[serde(default)]
    pub morning: bool,
    #[serde(default)]
    pub evening: bool,
}

pub async fn log_azkar(
    session: Session,
    State(state): State<ServerState>,
    Json(body): Json<AzkarLogBody>,
) -> Result<Json<Value>, ApiError> {
    let date = match &body.date {
        Some(raw) if !raw.is_empty() => parse_date(raw)?,
        _ => return Err(ApiError::validation("Missing date field.")),
    };
    state
        .tracker_store
        .upsert_azkar(&session.username, date, body.morning, body.evening)?;
    Ok(Json(json!({ "success": true, "message": "Azkar logged." })))
}

pub async fn get_azkar(
    _session: Session,
    State(state): State<ServerState>,
    Path((username, year)): Path<(String, i32)>,
) -> Result<Json<Value>, ApiError> {
    let entries = state.tracker_store.get_azkar(&username, year)?;
    let mut data = Map::new();
    for entry in entries {
        data.insert(
            entry.date.to_string(),
            json!({ "morning": entry.morning, "evening": entry.evening }),
        );
    }
    Ok(Json(json!({ "success": true, "data": data })))
}

// --- namaz ---

#[derive(Deserialize, Debug)]
pub struct NamazLogBody {
    pub date: String,
    pub prayer: String,
    pub location: String,
}

pub async fn log_namaz(
    session: Session,
    State(state): State<ServerState>,
    Json(body): Json<NamazLogBody>,
) -> Result<Json<Value>, ApiError> {
    let date = parse_date(&body.date)?;
    let prayer = PrayerName::from_str(&body.prayer)
        .ok_or_else(|| ApiError::validation(format!("Unknown prayer: {}", body.prayer)))?;

    // "missed" clears the entry instead of storing a location
    if body.location.eq_ignore_ascii_case("missed") {
        state.tracker_store.delete_namaz(&session.username, date, prayer)?;
        return Ok(Json(
            json!({ "success": true, "message": format!("{} cleared", prayer.as_str()) }),
        ));
    }

    let location = PrayerLocation::from_str(&body.location)
        .ok_or_else(|| ApiError::validation(format!("Unknown location: {}", body.location)))?;
    state
        .tracker_store
        .upsert_namaz(&session.username, date, prayer, location)?;
    Ok(Json(json!({
        "success": true,
        "message": format!("{} logged at {}", prayer.as_str(), location.as_str()),
    })))
}

pub async fn get_namaz(
    _session: Session,
    State(state): State<ServerState>,
    Path((username, year, month)): Path<(String, i32, u32)>,
) -> Result<Json<Value>, ApiError> {
    if !(1..=12).contains(&month) {
        return Err(ApiError::validation(format!("Bad month: {}", month)));
    }
    let entries = state.tracker_store.get_namaz_month(&username, year, month)?;
    let mut data = Map::new();
    for entry in entries {
        let day = data
            .entry(entry.date.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if let Value::Object(day) = day {
            day.insert(
                entry.prayer.as_str().to_string(),
                Value::String(entry.location.as_str().to_string()),
            );
        }
    }
    Ok(Json(json!({ "success": true, "data": data })))
}

// --- quran ---

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct CreateKhatamBody {
    #[serde(rename = "type")]
    pub khatam_type: String,
}

pub async fn create_khatam(
    session: Session,
    State(state): State<ServerState>,
    Json(body): Json<CreateKhatamBody>,
) -> Result<Json<Value>, ApiError> {
    let khatam_type = KhatamType::from_str(&body.khatam_type)
        .ok_or_else(|| ApiError::validation("Type must be Arabic or Translation."))?;
    let year = Utc::now().date_naive().year();
    let id = state
        .tracker_store
        .create_khatam(&session.username, khatam_type, year)?;
    Ok(Json(json!({
        "success": true,
        "khatamId": id,
        "message": format!("New {} Khatam started!", khatam_type.as_str()),
    })))
}

pub async fn get_khatams(
    _session: Session,
    State(state): State<ServerState>,
    Path((username, year)): Path<(String, i32)>,
) -> Result<Json<Value>, ApiError> {
    let khatams = state.tracker_store.get_khatams(&username, year)?;
    let mut result = Vec::with_capacity(khatams.len());
    for khatam in khatams {
        let paras = state.tracker_store.get_khatam_paras(&khatam.id)?;
        let mut para_map = Map::new();
        for para in paras {
            para_map.insert(para.to_string(), Value::Bool(true));
        }
        result.push(json!({
            "id": khatam.id,
            "type": khatam.khatam_type.as_str(),
            "startedAt": khatam.started_at,
            "completedAt": khatam.completed_at,
            "paraCount": khatam.para_count,
            "paras": para_map,
        }));
    }
    Ok(Json(json!({ "success": true, "khatams": result })))
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ToggleParaBody {
    pub khatam_id: String,
    pub para_number: i64,
    pub completed: bool,
}

pub async fn toggle_para(
    session: Session,
    State(state): State<ServerState>,
    Json(body): Json<ToggleParaBody>,
) -> Result<Json<Value>, ApiError> {
    if !(1..=30).contains(&body.para_number) {
        return Err(ApiError::validation(format!("Bad para number: {}", body.para_number)));
    }
    if state
        .tracker_store
        .get_khatam(&body.khatam_id, &session.username)?
        .is_none()
    {
        return Err(ApiError::not_found("Khatam not found."));
    }

    let count = state
        .tracker_store
        .set_khatam_para(&body.khatam_id, body.para_number, body.completed)?;
    let message = if body.completed {
        format!("Para {} completed!", body.para_number)
    } else {
        format!("Para {} unmarked.", body.para_number)
    };
    Ok(Json(json!({ "success": true, "paraCount": count, "message": message })))
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct DeleteKhatamBody {
    pub khatam_id: String,
}

pub async fn delete_khatam(
    session: Session,
    State(state): State<ServerState>,
    Json(body): Json<DeleteKhatamBody>,
) -> Result<Json<Value>, ApiError> {
    if !state
        .tracker_store
        .delete_khatam(&body.khatam_id, &session.username)?
    {
        return Err(ApiError::not_found("Khatam not found or unauthorized."));
    }
    Ok(Json(json!({ "success": true, "message": "Khatam deleted successfully." })))
}

// --- surah memorization ---

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct AddSurahBody {
    pub surah_number: i64,
    pub surah_name: String,
    pub total_ayah: i64,
}

pub async fn add_surah(
    session: Session,
    State(state): State<ServerState>,
    Json(body): Json<AddSurahBody>,
) -> Result<Json<Value>, ApiError> {
    if !(1..=114).contains(&body.surah_number) {
        return Err(ApiError::validation(format!("Bad surah number: {}", body.surah_number)));
    }
    if body.surah_name.trim().is_empty() || body.total_ayah <= 0 {
        return Err(ApiError::validation("Missing fields."));
    }
    state.tracker_store.add_surah(
        &session.username,
        body.surah_number,
        body.surah_name.trim(),
        body.total_ayah,
    )?;
    Ok(Json(json!({
        "success": true,
        "message": format!("Started memorizing {}!", body.surah_name.trim()),
    })))
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSurahBody {
    pub id: i64,
    pub memorized_ayah: i64,
}

pub async fn update_surah(
    session: Session,
    State(state): State<ServerState>,
    Json(body): Json<UpdateSurahBody>,
) -> Result<Json<Value>, ApiError> {
    let surah = state
        .tracker_store
        .update_surah(body.id, &session.username, body.memorized_ayah)?
        .ok_or_else(|| ApiError::not_found("Surah not found or not yours."))?;

    let message = if surah.completed_at.is_some() {
        format!("{}/{} ayah memorized. Complete!", surah.memorized_ayah, surah.total_ayah)
    } else {
        format!("{}/{} ayah memorized", surah.memorized_ayah, surah.total_ayah)
    };
    Ok(Json(json!({ "success": true, "message": message })))
}

#[derive(Deserialize, Debug)]
pub struct DeleteSurahBody {
    pub id: i64,
}

pub async fn delete_surah(
    session: Session,
    State(state): State<ServerState>,
    Json(body): Json<DeleteSurahBody>,
) -> Result<Json<Value>, ApiError> {
    if !state.tracker_store.delete_surah(body.id, &session.username)? {
        return Err(ApiError::not_found("Not found or not yours."));
    }
    Ok(Json(json!({ "success": true, "message": "Surah removed." })))
}

pub async fn get_surahs(
    _session: Session,
    State(state): State<ServerState>,
    Path(username): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let surahs = state.tracker_store.get_surahs(&username)?;
    let result: Vec<Value> = surahs
        .into_iter()
        .map(|surah| {
            json!({
                "id": surah.id,
                "surahNumber": surah.surah_number,
                "surahName": surah.surah_name,
                "totalAyah": surah.total_ayah,
                "memorizedAyah": surah.memorized_ayah,
                "startedAt": surah.started_at,
                "completedAt": surah.completed_at,
            })
        })
        .collect();
    Ok(Json(json!({ "success": true, "surahs": result })))
}
