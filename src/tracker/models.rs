use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Portions of the Quran; a khatam completes when all of them are read.
pub const PARAS_PER_KHATAM: i64 = 30;

/// The five canonical daily prayers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PrayerName {
    Fajr,
    Dhuhr,
    Asr,
    Maghrib,
    Isha,
}

impl PrayerName {
    pub fn as_str(self) -> &'static str {
        match self {
            PrayerName::Fajr => "fajr",
            PrayerName::Dhuhr => "dhuhr",
            PrayerName::Asr => "asr",
            PrayerName::Maghrib => "maghrib",
            PrayerName::Isha => "isha",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "fajr" => Some(PrayerName::Fajr),
            "dhuhr" => Some(PrayerName::Dhuhr),
            "asr" => Some(PrayerName::Asr),
            "maghrib" => Some(PrayerName::Maghrib),
            "isha" => Some(PrayerName::Isha),
            _ => None,
        }
    }
}

/// Where a prayer was performed. A "missed" submission removes the row
/// instead of storing a location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PrayerLocation {
    Mosque,
    Home,
}

impl PrayerLocation {
    pub fn as_str(self) -> &'static str {
        match self {
            PrayerLocation::Mosque => "mosque",
            PrayerLocation::Home => "home",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "mosque" => Some(PrayerLocation::Mosque),
            "home" => Some(PrayerLocation::Home),
            _ => None,
        }
    }
}

/// Taraweeh rakaat are prayed in pairs; the tracked count is an even number
/// between 2 and 20.
pub fn clamp_rakaat(rakaat: i64) -> i64 {
    let clamped = rakaat.clamp(2, 20);
    clamped - (clamped % 2)
}

#[derive(Debug, Clone)]
pub struct TaraweehEntry {
    pub date: NaiveDate,
    pub rakaat: i64,
}

#[derive(Debug, Clone)]
pub struct FastingEntry {
    pub date: NaiveDate,
}

#[derive(Debug, Clone)]
pub struct AzkarEntry {
    pub date: NaiveDate,
    pub morning: bool,
    pub evening: bool,
}

#[derive(Debug, Clone)]
pub struct NamazEntry {
    pub date: NaiveDate,
    pub prayer: PrayerName,
    pub location: PrayerLocation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KhatamType {
    Arabic,
    Translation,
}

impl KhatamType {
    pub fn as_str(self) -> &'static str {
        match self {
            KhatamType::Arabic => "Arabic",
            KhatamType::Translation => "Translation",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "Arabic" => Some(KhatamType::Arabic),
            "Translation" => Some(KhatamType::Translation),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Khatam {
    pub id: String,
    pub username: String,
    pub year: i32,
    pub khatam_type: KhatamType,
    pub started_at: i64,
    /// ISO 8601, set when all paras are read.
    pub completed_at: Option<String>,
    pub para_count: i64,
}

#[derive(Debug, Clone)]
pub struct SurahMemorization {
    pub id: i64,
    pub username: String,
    pub surah_number: i64,
    pub surah_name: String,
    pub total_ayah: i64,
    pub memorized_ayah: i64,
    pub started_at: i64,
    pub completed_at: Option<String>,
}
