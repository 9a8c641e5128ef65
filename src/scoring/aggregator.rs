//! Composite score computation and the leaderboard.
//!
//! Per-user aggregates are independent; the only cross-user step is the
//! final sort. Any storage read failure fails the whole computation, a
//! silently incomplete ranking being worse than an explicit error.

use super::weights::ScoringWeights;
use crate::tracker::models::{AzkarEntry, Khatam, NamazEntry, PrayerLocation, TaraweehEntry};
use crate::tracker::TrackerStore;
use crate::user::user_models::{Gender, UserAccount};
use anyhow::Result;
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::HashSet;

/// The streak walk is bounded by the calendar year; anything longer means
/// corrupt data rather than devotion.
const MAX_STREAK_WALK: usize = 366;

/// Flat bonus for children and elders.
const AGE_BONUS: f64 = 50.0;

/// Raw per-tracker rows for one user and year, as read from storage.
#[derive(Debug, Clone, Default)]
pub struct UserTrackerFacts {
    pub taraweeh: Vec<TaraweehEntry>,
    pub fasting_days: usize,
    pub azkar: Vec<AzkarEntry>,
    pub namaz: Vec<NamazEntry>,
    pub khatams: Vec<Khatam>,
    pub memorized_ayahs: i64,
}

impl UserTrackerFacts {
    pub fn load(store: &dyn TrackerStore, username: &str, year: i32) -> Result<Self> {
        Ok(UserTrackerFacts {
            taraweeh: store.get_taraweeh(username, year)?,
            fasting_days: store.get_fasting(username, year)?.len(),
            azkar: store.get_azkar(username, year)?,
            namaz: store.get_namaz_year(username, year)?,
            khatams: store.get_khatams(username, year)?,
            memorized_ayahs: store.sum_memorized_ayahs(username)?,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackerAggregates {
    pub taraweeh_count: i64,
    pub rakaat_sum: i64,
    pub taraweeh_average: i64,
    pub streak: i64,
    pub total_paras: i64,
    pub completed_khatams: i64,
    pub fasting_count: i64,
    pub azkar_points: i64,
    pub azkar_count: i64,
    pub namaz_mosque: i64,
    pub namaz_home: i64,
    pub namaz_count: i64,
    pub surah_ayahs: i64,
}

/// Consecutive days with a completed taraweeh entry, walking backward from
/// `today`. A missing entry for today itself means streak 0.
fn taraweeh_streak(dates: &HashSet<NaiveDate>, today: NaiveDate) -> i64 {
    let mut streak = 0;
    let mut check = today;
    for _ in 0..MAX_STREAK_WALK {
        if !dates.contains(&check) {
            break;
        }
        streak += 1;
        check = match check.pred_opt() {
            Some(prev) => prev,
            None => break,
        };
    }
    streak
}

pub fn aggregate_facts(facts: &UserTrackerFacts, today: NaiveDate) -> TrackerAggregates {
    let taraweeh_count = facts.taraweeh.len() as i64;
    let rakaat_sum: i64 = facts.taraweeh.iter().map(|t| t.rakaat).sum();
    let taraweeh_average = if taraweeh_count > 0 {
        (rakaat_sum as f64 / taraweeh_count as f64).round() as i64
    } else {
        0
    };

    let dates: HashSet<NaiveDate> = facts.taraweeh.iter().map(|t| t.date).collect();
    let streak = taraweeh_streak(&dates, today);

    let total_paras: i64 = facts.khatams.iter().map(|k| k.para_count).sum();
    let completed_khatams = facts
        .khatams
        .iter()
        .filter(|k| k.completed_at.is_some())
        .count() as i64;

    let azkar_points: i64 = facts
        .azkar
        .iter()
        .map(|a| a.morning as i64 + a.evening as i64)
        .sum();
    let azkar_count = facts
        .azkar
        .iter()
        .filter(|a| a.morning || a.evening)
        .count() as i64;

    let namaz_mosque = facts
        .namaz
        .iter()
        .filter(|n| n.location == PrayerLocation::Mosque)
        .count() as i64;
    let namaz_home = facts
        .namaz
        .iter()
        .filter(|n| n.location == PrayerLocation::Home)
        .count() as i64;

    TrackerAggregates {
        taraweeh_count,
        rakaat_sum,
        taraweeh_average,
        streak,
        total_paras,
        completed_khatams,
        fasting_count: facts.fasting_days as i64,
        azkar_points,
        azkar_count,
        namaz_mosque,
        namaz_home,
        namaz_count: namaz_mosque + namaz_home,
        surah_ayahs: facts.memorized_ayahs,
    }
}

/// Weighted raw score, floored to an integer. Home-prayer weight depends on
/// gender; age at or below 12 and at or above 60 earns the flat bonus.
pub fn raw_score(
    aggregates: &TrackerAggregates,
    weights: &ScoringWeights,
    gender: Option<Gender>,
    age: Option<u32>,
) -> i64 {
    let home_weight = match gender {
        Some(Gender::Female) => weights.namaz_home_women,
        _ => weights.namaz_home_men,
    };
    let age_bonus = match age {
        Some(age) if age <= 12 || age >= 60 => AGE_BONUS,
        _ => 0.0,
    };

    let score = aggregates.rakaat_sum as f64 * weights.taraweeh_per_rakaat
        + aggregates.total_paras as f64 * weights.quran_per_para
        + aggregates.completed_khatams as f64 * weights.quran_per_khatam
        + aggregates.fasting_count as f64 * weights.fasting_per_day
        + aggregates.azkar_points as f64 * weights.azkar_per_session
        + aggregates.surah_ayahs as f64 * weights.surah_per_ayah
        + aggregates.namaz_mosque as f64 * weights.namaz_mosque
        + aggregates.namaz_home as f64 * home_weight
        + aggregates.streak as f64 * weights.streak_per_day
        + age_bonus;

    score.floor() as i64
}

/// Applies the per-user multiplier to an already-floored raw score.
pub fn final_score(raw: i64, multiplier: f64) -> i64 {
    (raw as f64 * multiplier).floor() as i64
}

/// One leaderboard row. The admin-only fields are populated for every user
/// and stripped via [`UserScoreProfile::redacted`] for non-admin callers.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserScoreProfile {
    pub username: String,
    pub role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    pub taraweeh_count: i64,
    pub rakaat_sum: i64,
    pub taraweeh_average: i64,
    pub streak: i64,
    pub total_paras: i64,
    pub completed_khatams: i64,
    pub fasting_count: i64,
    pub azkar_points: i64,
    pub azkar_count: i64,
    pub namaz_mosque: i64,
    pub namaz_home: i64,
    pub namaz_count: i64,
    pub surah_ayahs: i64,
    pub score: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score_multiplier: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frozen: Option<bool>,
}

impl UserScoreProfile {
    /// Strips the fields non-admin callers must not see.
    pub fn redacted(mut self) -> Self {
        self.email = None;
        self.score_multiplier = None;
        self.frozen = None;
        self
    }
}

fn build_profile(
    user: &UserAccount,
    aggregates: TrackerAggregates,
    weights: &ScoringWeights,
    today: NaiveDate,
) -> UserScoreProfile {
    let raw = raw_score(&aggregates, weights, user.gender, user.age_at(today));
    let score = final_score(raw, user.score_multiplier);
    UserScoreProfile {
        username: user.username.clone(),
        role: user.role.as_str().to_string(),
        gender: user.gender.map(|g| g.as_str().to_string()),
        taraweeh_count: aggregates.taraweeh_count,
        rakaat_sum: aggregates.rakaat_sum,
        taraweeh_average: aggregates.taraweeh_average,
        streak: aggregates.streak,
        total_paras: aggregates.total_paras,
        completed_khatams: aggregates.completed_khatams,
        fasting_count: aggregates.fasting_count,
        azkar_points: aggregates.azkar_points,
        azkar_count: aggregates.azkar_count,
        namaz_mosque: aggregates.namaz_mosque,
        namaz_home: aggregates.namaz_home,
        namaz_count: aggregates.namaz_count,
        surah_ayahs: aggregates.surah_ayahs,
        score,
        email: Some(user.email.clone()),
        score_multiplier: Some(user.score_multiplier),
        frozen: Some(user.frozen),
    }
}

/// Computes the ranked leaderboard for the year. Users arrive in creation
/// order; the sort is stable, so ties keep that order.
pub fn compute_leaderboard(
    store: &dyn TrackerStore,
    users: &[UserAccount],
    weights: &ScoringWeights,
    year: i32,
    today: NaiveDate,
) -> Result<Vec<UserScoreProfile>> {
    let mut profiles = Vec::with_capacity(users.len());
    for user in users {
        let facts = UserTrackerFacts::load(store, &user.username, year)?;
        let aggregates = aggregate_facts(&facts, today);
        profiles.push(build_profile(user, aggregates, weights, today));
    }
    profiles.sort_by(|a, b| b.score.cmp(&a.score));
    Ok(profiles)
}
