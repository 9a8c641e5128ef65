use super::models::{
    AzkarEntry, FastingEntry, Khatam, KhatamType, NamazEntry, PrayerLocation, PrayerName,
    SurahMemorization, TaraweehEntry,
};
use crate::scoring::WeightRow;
use anyhow::Result;
use chrono::NaiveDate;

pub trait TrackerStore: Send + Sync {
    // --- taraweeh ---

    /// Upserts the taraweeh entry for (username, date).
    fn upsert_taraweeh(&self, username: &str, date: NaiveDate, rakaat: i64) -> Result<()>;

    /// Removes the taraweeh entry for (username, date), if any.
    fn delete_taraweeh(&self, username: &str, date: NaiveDate) -> Result<()>;

    /// Returns completed taraweeh entries for the user in the given year.
    fn get_taraweeh(&self, username: &str, year: i32) -> Result<Vec<TaraweehEntry>>;

    // --- fasting ---

    /// Records a fasting day. Returns false if it was already logged.
    fn log_fasting(&self, username: &str, date: NaiveDate) -> Result<bool>;

    fn delete_fasting(&self, username: &str, date: NaiveDate) -> Result<()>;

    fn get_fasting(&self, username: &str, year: i32) -> Result<Vec<FastingEntry>>;

    // --- azkar ---

    fn upsert_azkar(&self, username: &str, date: NaiveDate, morning: bool, evening: bool)
        -> Result<()>;

    fn get_azkar(&self, username: &str, year: i32) -> Result<Vec<AzkarEntry>>;

    // --- namaz ---

    fn upsert_namaz(
        &self,
        username: &str,
        date: NaiveDate,
        prayer: PrayerName,
        location: PrayerLocation,
    ) -> Result<()>;

    fn delete_namaz(&self, username: &str, date: NaiveDate, prayer: PrayerName) -> Result<()>;

    fn get_namaz_month(&self, username: &str, year: i32, month: u32) -> Result<Vec<NamazEntry>>;

    fn get_namaz_year(&self, username: &str, year: i32) -> Result<Vec<NamazEntry>>;

    // --- quran ---

    /// Creates a new khatam for the user and returns its id.
    fn create_khatam(&self, username: &str, khatam_type: KhatamType, year: i32) -> Result<String>;

    fn get_khatams(&self, username: &str, year: i32) -> Result<Vec<Khatam>>;

    /// Returns the khatam only if it belongs to the user.
    fn get_khatam(&self, khatam_id: &str, username: &str) -> Result<Option<Khatam>>;

    /// Completed para numbers for the khatam.
    fn get_khatam_paras(&self, khatam_id: &str) -> Result<Vec<i64>>;

    /// Marks or unmarks a para and refreshes the khatam's para count and
    /// completion timestamp. Returns the new count.
    fn set_khatam_para(&self, khatam_id: &str, para_number: i64, completed: bool) -> Result<i64>;

    /// Deletes the khatam and its progress rows. Returns false if the khatam
    /// does not exist or belongs to someone else.
    fn delete_khatam(&self, khatam_id: &str, username: &str) -> Result<bool>;

    // --- surah memorization ---

    fn add_surah(
        &self,
        username: &str,
        surah_number: i64,
        surah_name: &str,
        total_ayah: i64,
    ) -> Result<i64>;

    /// Updates memorized ayah count (clamped to [0, total]) and completion
    /// timestamp. Returns the updated row, or Ok(None) if the row does not
    /// exist or belongs to someone else.
    fn update_surah(
        &self,
        id: i64,
        username: &str,
        memorized_ayah: i64,
    ) -> Result<Option<SurahMemorization>>;

    /// Returns false if the row does not exist or belongs to someone else.
    fn delete_surah(&self, id: i64, username: &str) -> Result<bool>;

    /// All-time memorization rows for the user, newest first.
    fn get_surahs(&self, username: &str) -> Result<Vec<SurahMemorization>>;

    /// Sum of memorized ayahs across all rows, all-time.
    fn sum_memorized_ayahs(&self, username: &str) -> Result<i64>;

    // --- scoring weights ---

    /// Returns all weight rows currently in the table. The table may be
    /// partially populated; missing keys fall back to hardcoded defaults at
    /// the scoring boundary, never to zero.
    fn get_weight_rows(&self) -> Result<Vec<WeightRow>>;

    /// Applies a partial set of {key, value} updates in one transaction.
    /// An unknown key fails the whole batch.
    fn update_weights(&self, updates: &[(String, f64)]) -> Result<()>;

    /// Atomically replaces the whole table with the hardcoded defaults.
    fn reset_weights(&self) -> Result<()>;

    // --- settings ---

    fn get_setting(&self, key: &str) -> Result<Option<String>>;

    fn set_setting(&self, key: &str, value: &str) -> Result<()>;

    // --- admin ---

    /// Removes every tracker fact belonging to the user.
    fn delete_user_data(&self, username: &str) -> Result<()>;

    /// Year exports for the admin JSON bundle.
    fn export_taraweeh(&self, year: i32) -> Result<Vec<(String, TaraweehEntry)>>;
    fn export_fasting(&self, year: i32) -> Result<Vec<(String, FastingEntry)>>;
    fn export_khatams(&self, year: i32) -> Result<Vec<Khatam>>;
}
