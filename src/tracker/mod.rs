pub mod models;
pub mod sqlite_tracker_store;
pub mod tracker_store;

pub use models::{
    clamp_rakaat, AzkarEntry, FastingEntry, Khatam, KhatamType, NamazEntry, PrayerLocation,
    PrayerName, SurahMemorization, TaraweehEntry, PARAS_PER_KHATAM,
};
pub use sqlite_tracker_store::SqliteTrackerStore;
pub use tracker_store::TrackerStore;
