//! Admin-tunable scoring weights.
//!
//! The weight table may be partially populated (older deployments, aborted
//! seeds); every missing key falls back to its hardcoded default here, never
//! to zero, so scoring keeps working against any table state.

use serde::{Deserialize, Serialize};

/// One persisted weight row as the admin console sees it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeightRow {
    pub key: String,
    pub value: f64,
    pub label: String,
    pub description: String,
}

/// Seed rows for first boot and for the admin "reset to defaults" action.
pub const DEFAULT_WEIGHT_ROWS: &[(&str, f64, &str, &str)] = &[
    (
        "taraweeh_per_rakaat",
        1.5,
        "Taraweeh (per rakaat)",
        "Points for every taraweeh rakaat prayed",
    ),
    (
        "quran_per_para",
        10.0,
        "Quran (per para)",
        "Points for every para read across khatams",
    ),
    (
        "quran_per_khatam",
        50.0,
        "Khatam completion",
        "Bonus points for every completed khatam",
    ),
    (
        "fasting_per_day",
        15.0,
        "Fasting (per day)",
        "Points for every completed fasting day",
    ),
    (
        "azkar_per_session",
        3.0,
        "Azkar (per session)",
        "Points for every morning or evening azkar session",
    ),
    (
        "surah_per_ayah",
        0.5,
        "Memorization (per ayah)",
        "Points for every memorized ayah",
    ),
    (
        "namaz_mosque",
        4.0,
        "Namaz at the mosque",
        "Points for every prayer performed at the mosque",
    ),
    (
        "namaz_home_men",
        2.0,
        "Namaz at home (men)",
        "Points for every prayer performed at home, for men",
    ),
    (
        "namaz_home_women",
        4.0,
        "Namaz at home (women)",
        "Points for every prayer performed at home, for women",
    ),
    (
        "streak_per_day",
        2.0,
        "Taraweeh streak (per day)",
        "Points for every day of the current unbroken taraweeh streak",
    ),
];

/// Resolved weights used by the score computation.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoringWeights {
    pub taraweeh_per_rakaat: f64,
    pub quran_per_para: f64,
    pub quran_per_khatam: f64,
    pub fasting_per_day: f64,
    pub azkar_per_session: f64,
    pub surah_per_ayah: f64,
    pub namaz_mosque: f64,
    pub namaz_home_men: f64,
    pub namaz_home_women: f64,
    pub streak_per_day: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        ScoringWeights {
            taraweeh_per_rakaat: 1.5,
            quran_per_para: 10.0,
            quran_per_khatam: 50.0,
            fasting_per_day: 15.0,
            azkar_per_session: 3.0,
            surah_per_ayah: 0.5,
            namaz_mosque: 4.0,
            namaz_home_men: 2.0,
            namaz_home_women: 4.0,
            streak_per_day: 2.0,
        }
    }
}

impl ScoringWeights {
    /// Resolves weights from the raw row set. Keys absent from the rows keep
    /// their default; unknown keys are ignored.
    pub fn from_rows(rows: &[WeightRow]) -> Self {
        let mut weights = ScoringWeights::default();
        for row in rows {
            match row.key.as_str() {
                "taraweeh_per_rakaat" => weights.taraweeh_per_rakaat = row.value,
                "quran_per_para" => weights.quran_per_para = row.value,
                "quran_per_khatam" => weights.quran_per_khatam = row.value,
                "fasting_per_day" => weights.fasting_per_day = row.value,
                "azkar_per_session" => weights.azkar_per_session = row.value,
                "surah_per_ayah" => weights.surah_per_ayah = row.value,
                "namaz_mosque" => weights.namaz_mosque = row.value,
                "namaz_home_men" => weights.namaz_home_men = row.value,
                "namaz_home_women" => weights.namaz_home_women = row.value,
                "streak_per_day" => weights.streak_per_day = row.value,
                _ => {}
            }
        }
        weights
    }

    pub fn is_known_key(key: &str) -> bool {
        DEFAULT_WEIGHT_ROWS.iter().any(|(k, _, _, _)| *k == key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(key: &str, value: f64) -> WeightRow {
        WeightRow {
            key: key.to_string(),
            value,
            label: String::new(),
            description: String::new(),
        }
    }

    #[test]
    fn empty_rows_yield_defaults() {
        assert_eq!(ScoringWeights::from_rows(&[]), ScoringWeights::default());
    }

    #[test]
    fn missing_keys_fall_back_to_defaults_not_zero() {
        let weights = ScoringWeights::from_rows(&[row("fasting_per_day", 20.0)]);
        assert_eq!(weights.fasting_per_day, 20.0);
        assert_eq!(weights.taraweeh_per_rakaat, 1.5);
        assert_eq!(weights.quran_per_para, 10.0);
        assert_eq!(weights.streak_per_day, 2.0);
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let weights = ScoringWeights::from_rows(&[row("mystery_metric", 1000.0)]);
        assert_eq!(weights, ScoringWeights::default());
        assert!(!ScoringWeights::is_known_key("mystery_metric"));
        assert!(ScoringWeights::is_known_key("namaz_home_women"));
    }

    #[test]
    fn default_rows_cover_every_field() {
        let rows: Vec<WeightRow> = DEFAULT_WEIGHT_ROWS
            .iter()
            .map(|(key, value, label, description)| WeightRow {
                key: key.to_string(),
                value: *value,
                label: label.to_string(),
                description: description.to_string(),
            })
            .collect();
        assert_eq!(ScoringWeights::from_rows(&rows), ScoringWeights::default());
        assert_eq!(rows.len(), 10);
    }
}
