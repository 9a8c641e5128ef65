use crate::scoring::weights::{WeightRow, DEFAULT_WEIGHT_ROWS};
use crate::sqlite_column;
use crate::sqlite_persistence::{
    open_versioned, Column, ForeignKey, SqlType, Table, VersionedSchema, DEFAULT_TIMESTAMP,
};
use crate::tracker::models::{
    AzkarEntry, FastingEntry, Khatam, KhatamType, NamazEntry, PrayerLocation, PrayerName,
    SurahMemorization, TaraweehEntry, PARAS_PER_KHATAM,
};
use crate::tracker::tracker_store::TrackerStore;
use anyhow::{anyhow, Context, Result};
use chrono::{Datelike, NaiveDate, Utc};
use rusqlite::{params, Connection, Row};
use std::path::Path;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// V 0, the core Ramadan trackers
const TARAWEEH_TABLE: Table = Table {
    name: "taraweeh",
    columns: &[
        sqlite_column!(
            "id",
            &SqlType::Integer,
            is_primary_key = true,
            is_unique = true
        ),
        sqlite_column!("username", &SqlType::Text, non_null = true),
        sqlite_column!("year", &SqlType::Integer, non_null = true),
        sqlite_column!("date", &SqlType::Text, non_null = true),
        sqlite_column!("rakaat", &SqlType::Integer, default_value = Some("8")),
    ],
    unique_constraints: &[&["username", "date"]],
    indices: &[("idx_taraweeh_username", "username")],
};

const FASTING_TABLE: Table = Table {
    name: "fasting",
    columns: &[
        sqlite_column!(
            "id",
            &SqlType::Integer,
            is_primary_key = true,
            is_unique = true
        ),
        sqlite_column!("username", &SqlType::Text, non_null = true),
        sqlite_column!("year", &SqlType::Integer, non_null = true),
        sqlite_column!("date", &SqlType::Text, non_null = true),
    ],
    unique_constraints: &[&["username", "date"]],
    indices: &[("idx_fasting_username", "username")],
};

const KHATAM_TABLE: Table = Table {
    name: "khatam",
    columns: &[
        sqlite_column!("id", &SqlType::Text, is_primary_key = true, is_unique = true),
        sqlite_column!("username", &SqlType::Text, non_null = true),
        sqlite_column!("year", &SqlType::Integer, non_null = true),
        sqlite_column!("type", &SqlType::Text, non_null = true),
        sqlite_column!(
            "started_at",
            &SqlType::Integer,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
        sqlite_column!("completed_at", &SqlType::Text),
        sqlite_column!("para_count", &SqlType::Integer, default_value = Some("0")),
    ],
    unique_constraints: &[],
    indices: &[("idx_khatam_username", "username")],
};

const KHATAM_FK: ForeignKey = ForeignKey {
    foreign_table: "khatam",
    foreign_column: "id",
};

const QURAN_PROGRESS_TABLE: Table = Table {
    name: "quran_progress",
    columns: &[
        sqlite_column!(
            "id",
            &SqlType::Integer,
            is_primary_key = true,
            is_unique = true
        ),
        sqlite_column!(
            "khatam_id",
            &SqlType::Text,
            non_null = true,
            foreign_key = Some(&KHATAM_FK)
        ),
        sqlite_column!("para_number", &SqlType::Integer, non_null = true),
    ],
    unique_constraints: &[&["khatam_id", "para_number"]],
    indices: &[],
};

const SETTING_TABLE: Table = Table {
    name: "setting",
    columns: &[
        sqlite_column!("key", &SqlType::Text, is_primary_key = true),
        sqlite_column!("value", &SqlType::Text),
    ],
    unique_constraints: &[],
    indices: &[],
};

/// V 1, daily azkar, five daily prayers and surah memorization
const AZKAR_TABLE: Table = Table {
    name: "azkar",
    columns: &[
        sqlite_column!(
            "id",
            &SqlType::Integer,
            is_primary_key = true,
            is_unique = true
        ),
        sqlite_column!("username", &SqlType::Text, non_null = true),
        sqlite_column!("date", &SqlType::Text, non_null = true),
        sqlite_column!("morning", &SqlType::Integer, default_value = Some("0")),
        sqlite_column!("evening", &SqlType::Integer, default_value = Some("0")),
    ],
    unique_constraints: &[&["username", "date"]],
    indices: &[("idx_azkar_username", "username")],
};

const NAMAZ_TABLE: Table = Table {
    name: "namaz",
    columns: &[
        sqlite_column!(
            "id",
            &SqlType::Integer,
            is_primary_key = true,
            is_unique = true
        ),
        sqlite_column!("username", &SqlType::Text, non_null = true),
        sqlite_column!("date", &SqlType::Text, non_null = true),
        sqlite_column!("prayer", &SqlType::Text, non_null = true),
        sqlite_column!("location", &SqlType::Text, non_null = true),
    ],
    unique_constraints: &[&["username", "date", "prayer"]],
    indices: &[("idx_namaz_username", "username")],
};

const SURAH_TABLE: Table = Table {
    name: "surah_memorization",
    columns: &[
        sqlite_column!(
            "id",
            &SqlType::Integer,
            is_primary_key = true,
            is_unique = true
        ),
        sqlite_column!("username", &SqlType::Text, non_null = true),
        sqlite_column!("surah_number", &SqlType::Integer, non_null = true),
        sqlite_column!("surah_name", &SqlType::Text, non_null = true),
        sqlite_column!("total_ayah", &SqlType::Integer, non_null = true),
        sqlite_column!("memorized_ayah", &SqlType::Integer, default_value = Some("0")),
        sqlite_column!(
            "started_at",
            &SqlType::Integer,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
        sqlite_column!("completed_at", &SqlType::Text),
    ],
    unique_constraints: &[],
    indices: &[("idx_surah_username", "username")],
};

/// V 2, the admin-tunable scoring weight table
const SCORING_WEIGHT_TABLE: Table = Table {
    name: "scoring_weight",
    columns: &[
        sqlite_column!("key", &SqlType::Text, is_primary_key = true),
        sqlite_column!("value", &SqlType::Real, non_null = true),
        sqlite_column!("label", &SqlType::Text, non_null = true),
        sqlite_column!("description", &SqlType::Text, non_null = true),
    ],
    unique_constraints: &[],
    indices: &[],
};

pub const VERSIONED_SCHEMAS: &[VersionedSchema] = &[
    VersionedSchema {
        version: 0,
        tables: &[
            TARAWEEH_TABLE,
            FASTING_TABLE,
            KHATAM_TABLE,
            QURAN_PROGRESS_TABLE,
            SETTING_TABLE,
        ],
        migration: None,
    },
    VersionedSchema {
        version: 1,
        tables: &[
            TARAWEEH_TABLE,
            FASTING_TABLE,
            KHATAM_TABLE,
            QURAN_PROGRESS_TABLE,
            SETTING_TABLE,
            AZKAR_TABLE,
            NAMAZ_TABLE,
            SURAH_TABLE,
        ],
        migration: Some(|conn: &Connection| {
            AZKAR_TABLE.create(conn)?;
            NAMAZ_TABLE.create(conn)?;
            SURAH_TABLE.create(conn)?;
            Ok(())
        }),
    },
    VersionedSchema {
        version: 2,
        tables: &[
            TARAWEEH_TABLE,
            FASTING_TABLE,
            KHATAM_TABLE,
            QURAN_PROGRESS_TABLE,
            SETTING_TABLE,
            AZKAR_TABLE,
            NAMAZ_TABLE,
            SURAH_TABLE,
            SCORING_WEIGHT_TABLE,
        ],
        migration: Some(|conn: &Connection| {
            SCORING_WEIGHT_TABLE.create(conn)?;
            Ok(())
        }),
    },
];

fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").with_context(|| format!("Bad date in db: {}", s))
}

fn date_string(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

fn row_to_khatam(row: &Row) -> rusqlite::Result<Khatam> {
    let type_str: String = row.get(3)?;
    Ok(Khatam {
        id: row.get(0)?,
        username: row.get(1)?,
        year: row.get(2)?,
        khatam_type: KhatamType::from_str(&type_str).unwrap_or(KhatamType::Arabic),
        started_at: row.get(4)?,
        completed_at: row.get(5)?,
        para_count: row.get(6)?,
    })
}

const KHATAM_COLUMNS: &str = "id, username, year, type, started_at, completed_at, para_count";
const SURAH_COLUMNS: &str =
    "id, username, surah_number, surah_name, total_ayah, memorized_ayah, started_at, completed_at";

fn row_to_surah(row: &Row) -> rusqlite::Result<SurahMemorization> {
    Ok(SurahMemorization {
        id: row.get(0)?,
        username: row.get(1)?,
        surah_number: row.get(2)?,
        surah_name: row.get(3)?,
        total_ayah: row.get(4)?,
        memorized_ayah: row.get(5)?,
        started_at: row.get(6)?,
        completed_at: row.get(7)?,
    })
}

#[derive(Clone)]
pub struct SqliteTrackerStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteTrackerStore {
    pub fn new<T: AsRef<Path>>(db_path: T) -> Result<Self> {
        let conn = open_versioned(db_path, VERSIONED_SCHEMAS)?;
        // Seed missing weight rows so a fresh or partially seeded table
        // always carries the full default set.
        for (key, value, label, description) in DEFAULT_WEIGHT_ROWS {
            conn.execute(
                &format!(
                    "INSERT OR IGNORE INTO {} (key, value, label, description) VALUES (?1, ?2, ?3, ?4)",
                    SCORING_WEIGHT_TABLE.name
                ),
                params![key, value, label, description],
            )?;
        }
        Ok(SqliteTrackerStore {
            conn: Arc::new(Mutex::new(conn)),
        })
    }
}

impl TrackerStore for SqliteTrackerStore {
    fn upsert_taraweeh(&self, username: &str, date: NaiveDate, rakaat: i64) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            &format!(
                "INSERT INTO {} (username, year, date, rakaat) VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(username, date) DO UPDATE SET rakaat = ?4",
                TARAWEEH_TABLE.name
            ),
            params![username, date.year(), date_string(date), rakaat],
        )?;
        Ok(())
    }

    fn delete_taraweeh(&self, username: &str, date: NaiveDate) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            &format!(
                "DELETE FROM {} WHERE username = ?1 AND date = ?2",
                TARAWEEH_TABLE.name
            ),
            params![username, date_string(date)],
        )?;
        Ok(())
    }

    fn get_taraweeh(&self, username: &str, year: i32) -> Result<Vec<TaraweehEntry>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT date, rakaat FROM {} WHERE username = ?1 AND year = ?2 ORDER BY date",
            TARAWEEH_TABLE.name
        ))?;
        let rows = stmt
            .query_map(params![username, year], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter()
            .map(|(date, rakaat)| Ok(TaraweehEntry { date: parse_date(&date)?, rakaat }))
            .collect()
    }

    fn log_fasting(&self, username: &str, date: NaiveDate) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let inserted = conn.execute(
            &format!(
                "INSERT OR IGNORE INTO {} (username, year, date) VALUES (?1, ?2, ?3)",
                FASTING_TABLE.name
            ),
            params![username, date.year(), date_string(date)],
        )?;
        Ok(inserted > 0)
    }

    fn delete_fasting(&self, username: &str, date: NaiveDate) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            &format!(
                "DELETE FROM {} WHERE username = ?1 AND date = ?2",
                FASTING_TABLE.name
            ),
            params![username, date_string(date)],
        )?;
        Ok(())
    }

    fn get_fasting(&self, username: &str, year: i32) -> Result<Vec<FastingEntry>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT date FROM {} WHERE username = ?1 AND year = ?2 ORDER BY date",
            FASTING_TABLE.name
        ))?;
        let rows = stmt
            .query_map(params![username, year], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter()
            .map(|date| Ok(FastingEntry { date: parse_date(&date)? }))
            .collect()
    }

    fn upsert_azkar(
        &self,
        username: &str,
        date: NaiveDate,
        morning: bool,
        evening: bool,
    ) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            &format!(
                "INSERT INTO {} (username, date, morning, evening) VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(username, date) DO UPDATE SET morning = ?3, evening = ?4",
                AZKAR_TABLE.name
            ),
            params![username, date_string(date), morning as i64, evening as i64],
        )?;
        Ok(())
    }

    fn get_azkar(&self, username: &str, year: i32) -> Result<Vec<AzkarEntry>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT date, morning, evening FROM {} WHERE username = ?1 AND date LIKE ?2 ORDER BY date",
            AZKAR_TABLE.name
        ))?;
        let rows = stmt
            .query_map(params![username, format!("{}%", year)], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, i64>(2)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter()
            .map(|(date, morning, evening)| {
                Ok(AzkarEntry {
                    date: parse_date(&date)?,
                    morning: morning != 0,
                    evening: evening != 0,
                })
            })
            .collect()
    }

    fn upsert_namaz(
        &self,
        username: &str,
        date: NaiveDate,
        prayer: PrayerName,
        location: PrayerLocation,
    ) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            &format!(
                "INSERT INTO {} (username, date, prayer, location) VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(username, date, prayer) DO UPDATE SET location = ?4",
                NAMAZ_TABLE.name
            ),
            params![username, date_string(date), prayer.as_str(), location.as_str()],
        )?;
        Ok(())
    }

    fn delete_namaz(&self, username: &str, date: NaiveDate, prayer: PrayerName) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            &format!(
                "DELETE FROM {} WHERE username = ?1 AND date = ?2 AND prayer = ?3",
                NAMAZ_TABLE.name
            ),
            params![username, date_string(date), prayer.as_str()],
        )?;
        Ok(())
    }

    fn get_namaz_month(&self, username: &str, year: i32, month: u32) -> Result<Vec<NamazEntry>> {
        self.get_namaz_prefix(username, &format!("{}-{:02}%", year, month))
    }

    fn get_namaz_year(&self, username: &str, year: i32) -> Result<Vec<NamazEntry>> {
        self.get_namaz_prefix(username, &format!("{}%", year))
    }

    fn create_khatam(&self, username: &str, khatam_type: KhatamType, year: i32) -> Result<String> {
        let suffix = Uuid::new_v4().simple().to_string();
        let id = format!(
            "{}_{}_{}",
            username.to_lowercase(),
            khatam_type.as_str().to_lowercase(),
            &suffix[..8]
        );
        let conn = self.conn.lock().unwrap();
        conn.execute(
            &format!(
                "INSERT INTO {} (id, username, year, type, para_count) VALUES (?1, ?2, ?3, ?4, 0)",
                KHATAM_TABLE.name
            ),
            params![id, username, year, khatam_type.as_str()],
        )?;
        Ok(id)
    }

    fn get_khatams(&self, username: &str, year: i32) -> Result<Vec<Khatam>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM {} WHERE username = ?1 AND year = ?2 ORDER BY started_at DESC",
            KHATAM_COLUMNS, KHATAM_TABLE.name
        ))?;
        let khatams = stmt
            .query_map(params![username, year], |row| {
                row_to_khatam(row)
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(khatams)
    }

    fn get_khatam(&self, khatam_id: &str, username: &str) -> Result<Option<Khatam>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM {} WHERE id = ?1 AND username = ?2",
            KHATAM_COLUMNS, KHATAM_TABLE.name
        ))?;
        let mut rows = stmt.query_map(params![khatam_id, username], |row| {
            row_to_khatam(row)
        })?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    fn get_khatam_paras(&self, khatam_id: &str) -> Result<Vec<i64>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT para_number FROM {} WHERE khatam_id = ?1 ORDER BY para_number",
            QURAN_PROGRESS_TABLE.name
        ))?;
        let paras = stmt
            .query_map(params![khatam_id], |row| row.get(0))?
            .collect::<Result<Vec<i64>, _>>()?;
        Ok(paras)
    }

    fn set_khatam_para(&self, khatam_id: &str, para_number: i64, completed: bool) -> Result<i64> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        if completed {
            tx.execute(
                &format!(
                    "INSERT OR IGNORE INTO {} (khatam_id, para_number) VALUES (?1, ?2)",
                    QURAN_PROGRESS_TABLE.name
                ),
                params![khatam_id, para_number],
            )?;
        } else {
            tx.execute(
                &format!(
                    "DELETE FROM {} WHERE khatam_id = ?1 AND para_number = ?2",
                    QURAN_PROGRESS_TABLE.name
                ),
                params![khatam_id, para_number],
            )?;
        }

        let count: i64 = tx.query_row(
            &format!(
                "SELECT COUNT(*) FROM {} WHERE khatam_id = ?1",
                QURAN_PROGRESS_TABLE.name
            ),
            params![khatam_id],
            |row| row.get(0),
        )?;

        let completed_at = if count >= PARAS_PER_KHATAM {
            Some(Utc::now().to_rfc3339())
        } else {
            None
        };
        tx.execute(
            &format!(
                "UPDATE {} SET para_count = ?1, completed_at = ?2 WHERE id = ?3",
                KHATAM_TABLE.name
            ),
            params![count, completed_at, khatam_id],
        )?;

        tx.commit()?;
        Ok(count)
    }

    fn delete_khatam(&self, khatam_id: &str, username: &str) -> Result<bool> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        tx.execute(
            &format!(
                "DELETE FROM {} WHERE khatam_id = ?1",
                QURAN_PROGRESS_TABLE.name
            ),
            params![khatam_id],
        )?;
        let deleted = tx.execute(
            &format!(
                "DELETE FROM {} WHERE id = ?1 AND username = ?2",
                KHATAM_TABLE.name
            ),
            params![khatam_id, username],
        )?;
        tx.commit()?;
        Ok(deleted > 0)
    }

    fn add_surah(
        &self,
        username: &str,
        surah_number: i64,
        surah_name: &str,
        total_ayah: i64,
    ) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            &format!(
                "INSERT INTO {} (username, surah_number, surah_name, total_ayah) VALUES (?1, ?2, ?3, ?4)",
                SURAH_TABLE.name
            ),
            params![username, surah_number, surah_name, total_ayah],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn update_surah(
        &self,
        id: i64,
        username: &str,
        memorized_ayah: i64,
    ) -> Result<Option<SurahMemorization>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM {} WHERE id = ?1 AND username = ?2",
            SURAH_COLUMNS, SURAH_TABLE.name
        ))?;
        let mut rows = stmt.query_map(params![id, username], row_to_surah)?;
        let mut surah = match rows.next() {
            Some(row) => row?,
            None => return Ok(None),
        };
        drop(rows);
        drop(stmt);

        let clamped = memorized_ayah.clamp(0, surah.total_ayah);
        let completed_at = if clamped >= surah.total_ayah {
            Some(Utc::now().to_rfc3339())
        } else {
            None
        };
        conn.execute(
            &format!(
                "UPDATE {} SET memorized_ayah = ?1, completed_at = ?2 WHERE id = ?3",
                SURAH_TABLE.name
            ),
            params![clamped, completed_at, id],
        )?;

        surah.memorized_ayah = clamped;
        surah.completed_at = completed_at;
        Ok(Some(surah))
    }

    fn delete_surah(&self, id: i64, username: &str) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let deleted = conn.execute(
            &format!(
                "DELETE FROM {} WHERE id = ?1 AND username = ?2",
                SURAH_TABLE.name
            ),
            params![id, username],
        )?;
        Ok(deleted > 0)
    }

    fn get_surahs(&self, username: &str) -> Result<Vec<SurahMemorization>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM {} WHERE username = ?1 ORDER BY started_at DESC, id DESC",
            SURAH_COLUMNS, SURAH_TABLE.name
        ))?;
        let surahs = stmt
            .query_map(params![username], row_to_surah)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(surahs)
    }

    fn sum_memorized_ayahs(&self, username: &str) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        let sum = conn.query_row(
            &format!(
                "SELECT COALESCE(SUM(memorized_ayah), 0) FROM {} WHERE username = ?1",
                SURAH_TABLE.name
            ),
            params![username],
            |row| row.get(0),
        )?;
        Ok(sum)
    }

    fn get_weight_rows(&self) -> Result<Vec<WeightRow>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT key, value, label, description FROM {} ORDER BY key",
            SCORING_WEIGHT_TABLE.name
        ))?;
        let rows = stmt
            .query_map([], |row| {
                Ok(WeightRow {
                    key: row.get(0)?,
                    value: row.get(1)?,
                    label: row.get(2)?,
                    description: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn update_weights(&self, updates: &[(String, f64)]) -> Result<()> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        for (key, value) in updates {
            let changed = tx.execute(
                &format!(
                    "UPDATE {} SET value = ?1 WHERE key = ?2",
                    SCORING_WEIGHT_TABLE.name
                ),
                params![value, key],
            )?;
            if changed == 0 {
                return Err(anyhow!("Unknown weight key: {}", key));
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn reset_weights(&self) -> Result<()> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        tx.execute(&format!("DELETE FROM {}", SCORING_WEIGHT_TABLE.name), [])?;
        for (key, value, label, description) in DEFAULT_WEIGHT_ROWS {
            tx.execute(
                &format!(
                    "INSERT INTO {} (key, value, label, description) VALUES (?1, ?2, ?3, ?4)",
                    SCORING_WEIGHT_TABLE.name
                ),
                params![key, value, label, description],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    fn get_setting(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT value FROM {} WHERE key = ?1",
            SETTING_TABLE.name
        ))?;
        let mut rows = stmt.query_map(params![key], |row| row.get::<_, Option<String>>(0))?;
        match rows.next() {
            Some(row) => Ok(row?),
            None => Ok(None),
        }
    }

    fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            &format!(
                "INSERT OR REPLACE INTO {} (key, value) VALUES (?1, ?2)",
                SETTING_TABLE.name
            ),
            params![key, value],
        )?;
        Ok(())
    }

    fn delete_user_data(&self, username: &str) -> Result<()> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        for table in [
            TARAWEEH_TABLE.name,
            FASTING_TABLE.name,
            AZKAR_TABLE.name,
            NAMAZ_TABLE.name,
            SURAH_TABLE.name,
        ] {
            tx.execute(
                &format!("DELETE FROM {} WHERE username = ?1", table),
                params![username],
            )?;
        }
        tx.execute(
            &format!(
                "DELETE FROM {} WHERE khatam_id IN (SELECT id FROM {} WHERE username = ?1)",
                QURAN_PROGRESS_TABLE.name, KHATAM_TABLE.name
            ),
            params![username],
        )?;
        tx.execute(
            &format!("DELETE FROM {} WHERE username = ?1", KHATAM_TABLE.name),
            params![username],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn export_taraweeh(&self, year: i32) -> Result<Vec<(String, TaraweehEntry)>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT username, date, rakaat FROM {} WHERE year = ?1 ORDER BY username, date",
            TARAWEEH_TABLE.name
        ))?;
        let rows = stmt
            .query_map(params![year], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, i64>(2)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter()
            .map(|(username, date, rakaat)| {
                Ok((username, TaraweehEntry { date: parse_date(&date)?, rakaat }))
            })
            .collect()
    }

    fn export_fasting(&self, year: i32) -> Result<Vec<(String, FastingEntry)>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT username, date FROM {} WHERE year = ?1 ORDER BY username, date",
            FASTING_TABLE.name
        ))?;
        let rows = stmt
            .query_map(params![year], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter()
            .map(|(username, date)| Ok((username, FastingEntry { date: parse_date(&date)? })))
            .collect()
    }

    fn export_khatams(&self, year: i32) -> Result<Vec<Khatam>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM {} WHERE year = ?1 ORDER BY username, started_at",
            KHATAM_COLUMNS, KHATAM_TABLE.name
        ))?;
        let khatams = stmt
            .query_map(params![year], |row| row_to_khatam(row))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(khatams)
    }
}

impl SqliteTrackerStore {
    fn get_namaz_prefix(&self, username: &str, date_pattern: &str) -> Result<Vec<NamazEntry>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT date, prayer, location FROM {} WHERE username = ?1 AND date LIKE ?2 ORDER BY date",
            NAMAZ_TABLE.name
        ))?;
        let rows = stmt
            .query_map(params![username, date_pattern], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter()
            .map(|(date, prayer, location)| {
                Ok(NamazEntry {
                    date: parse_date(&date)?,
                    prayer: PrayerName::from_str(&prayer)
                        .ok_or_else(|| anyhow!("Bad prayer name in db: {}", prayer))?,
                    location: PrayerLocation::from_str(&location)
                        .ok_or_else(|| anyhow!("Bad prayer location in db: {}", location))?,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (tempfile::TempDir, SqliteTrackerStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteTrackerStore::new(dir.path().join("tracker.db")).unwrap();
        (dir, store)
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn taraweeh_upsert_is_unique_per_day() {
        let (_dir, store) = store();
        store.upsert_taraweeh("umar", date("2026-03-01"), 8).unwrap();
        store.upsert_taraweeh("umar", date("2026-03-01"), 20).unwrap();
        store.upsert_taraweeh("umar", date("2026-03-02"), 8).unwrap();

        let entries = store.get_taraweeh("umar", 2026).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].rakaat, 20);

        store.delete_taraweeh("umar", date("2026-03-01")).unwrap();
        assert_eq!(store.get_taraweeh("umar", 2026).unwrap().len(), 1);
    }

    #[test]
    fn fasting_log_is_idempotent() {
        let (_dir, store) = store();
        assert!(store.log_fasting("umar", date("2026-03-05")).unwrap());
        assert!(!store.log_fasting("umar", date("2026-03-05")).unwrap());
        assert_eq!(store.get_fasting("umar", 2026).unwrap().len(), 1);
        store.delete_fasting("umar", date("2026-03-05")).unwrap();
        assert!(store.get_fasting("umar", 2026).unwrap().is_empty());
    }

    #[test]
    fn khatam_completes_at_thirty_paras() {
        let (_dir, store) = store();
        let id = store.create_khatam("umar", KhatamType::Arabic, 2026).unwrap();

        for para in 1..=29 {
            store.set_khatam_para(&id, para, true).unwrap();
        }
        let khatam = store.get_khatam(&id, "umar").unwrap().unwrap();
        assert_eq!(khatam.para_count, 29);
        assert!(khatam.completed_at.is_none());

        let count = store.set_khatam_para(&id, 30, true).unwrap();
        assert_eq!(count, 30);
        let khatam = store.get_khatam(&id, "umar").unwrap().unwrap();
        assert!(khatam.completed_at.is_some());

        // Unmarking a para reopens the khatam
        store.set_khatam_para(&id, 30, false).unwrap();
        let khatam = store.get_khatam(&id, "umar").unwrap().unwrap();
        assert_eq!(khatam.para_count, 29);
        assert!(khatam.completed_at.is_none());
    }

    #[test]
    fn khatam_ownership_is_enforced() {
        let (_dir, store) = store();
        let id = store.create_khatam("umar", KhatamType::Translation, 2026).unwrap();
        assert!(store.get_khatam(&id, "someone_else").unwrap().is_none());
        assert!(!store.delete_khatam(&id, "someone_else").unwrap());
        assert!(store.delete_khatam(&id, "umar").unwrap());
    }

    #[test]
    fn surah_update_clamps_and_completes() {
        let (_dir, store) = store();
        let id = store.add_surah("umar", 112, "Al-Ikhlas", 4).unwrap();

        let surah = store.update_surah(id, "umar", 10).unwrap().unwrap();
        assert_eq!(surah.memorized_ayah, 4);
        assert!(surah.completed_at.is_some());

        let surah = store.update_surah(id, "umar", 2).unwrap().unwrap();
        assert_eq!(surah.memorized_ayah, 2);
        assert!(surah.completed_at.is_none());

        assert!(store.update_surah(id, "someone_else", 1).unwrap().is_none());
        assert_eq!(store.sum_memorized_ayahs("umar").unwrap(), 2);
    }

    #[test]
    fn weights_are_seeded_updated_and_reset() {
        let (_dir, store) = store();
        let rows = store.get_weight_rows().unwrap();
        assert_eq!(rows.len(), DEFAULT_WEIGHT_ROWS.len());

        store
            .update_weights(&[("fasting_per_day".to_string(), 99.0)])
            .unwrap();
        let rows = store.get_weight_rows().unwrap();
        let fasting = rows.iter().find(|r| r.key == "fasting_per_day").unwrap();
        assert_eq!(fasting.value, 99.0);

        // Unknown key fails the whole batch
        let err = store.update_weights(&[
            ("streak_per_day".to_string(), 5.0),
            ("bogus_key".to_string(), 1.0),
        ]);
        assert!(err.is_err());
        let rows = store.get_weight_rows().unwrap();
        let streak = rows.iter().find(|r| r.key == "streak_per_day").unwrap();
        assert_eq!(streak.value, 2.0);

        store.reset_weights().unwrap();
        let rows = store.get_weight_rows().unwrap();
        let fasting = rows.iter().find(|r| r.key == "fasting_per_day").unwrap();
        assert_eq!(fasting.value, 15.0);
    }

    #[test]
    fn delete_user_data_cascades() {
        let (_dir, store) = store();
        store.upsert_taraweeh("umar", date("2026-03-01"), 8).unwrap();
        store.log_fasting("umar", date("2026-03-01")).unwrap();
        store.upsert_azkar("umar", date("2026-03-01"), true, false).unwrap();
        store
            .upsert_namaz("umar", date("2026-03-01"), PrayerName::Fajr, PrayerLocation::Mosque)
            .unwrap();
        let khatam_id = store.create_khatam("umar", KhatamType::Arabic, 2026).unwrap();
        store.set_khatam_para(&khatam_id, 1, true).unwrap();
        store.add_surah("umar", 1, "Al-Fatiha", 7).unwrap();

        store.delete_user_data("umar").unwrap();

        assert!(store.get_taraweeh("umar", 2026).unwrap().is_empty());
        assert!(store.get_fasting("umar", 2026).unwrap().is_empty());
        assert!(store.get_azkar("umar", 2026).unwrap().is_empty());
        assert!(store.get_namaz_year("umar", 2026).unwrap().is_empty());
        assert!(store.get_khatams("umar", 2026).unwrap().is_empty());
        assert!(store.get_surahs("umar").unwrap().is_empty());
    }

    #[test]
    fn namaz_month_filter() {
        let (_dir, store) = store();
        store
            .upsert_namaz("umar", date("2026-03-15"), PrayerName::Asr, PrayerLocation::Home)
            .unwrap();
        store
            .upsert_namaz("umar", date("2026-04-01"), PrayerName::Asr, PrayerLocation::Mosque)
            .unwrap();

        let march = store.get_namaz_month("umar", 2026, 3).unwrap();
        assert_eq!(march.len(), 1);
        assert_eq!(march[0].location, PrayerLocation::Home);
        assert_eq!(store.get_namaz_year("umar", 2026).unwrap().len(), 2);
    }
}
