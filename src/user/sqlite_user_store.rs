use crate::sqlite_column;
use crate::sqlite_persistence::{
    open_versioned, Column, SqlType, Table, VersionedSchema, DEFAULT_TIMESTAMP,
};
use crate::user::auth::{RamadanflowHasher, SaltedPassword};
use crate::user::user_models::{Gender, NewUser, UserAccount, UserRole};
use crate::user::user_store::UserStore;
use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use rusqlite::{params, Connection, Row};
use std::path::Path;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

/// V 0
const USER_TABLE_V_0: Table = Table {
    name: "user",
    columns: &[
        sqlite_column!(
            "id",
            &SqlType::Integer,
            is_primary_key = true,
            is_unique = true
        ),
        sqlite_column!("username", &SqlType::Text, non_null = true, is_unique = true),
        sqlite_column!("email", &SqlType::Text, non_null = true, is_unique = true),
        sqlite_column!("salt", &SqlType::Text, non_null = true),
        sqlite_column!("hash", &SqlType::Text, non_null = true),
        sqlite_column!("hasher", &SqlType::Text, non_null = true),
        sqlite_column!("role", &SqlType::Text, non_null = true, default_value = Some("'user'")),
        sqlite_column!("gender", &SqlType::Text),
        sqlite_column!("age", &SqlType::Integer),
        sqlite_column!("date_of_birth", &SqlType::Text),
        sqlite_column!(
            "created",
            &SqlType::Integer,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
    ],
    unique_constraints: &[],
    indices: &[("idx_user_username", "username")],
};

/// V 1, adds the per-user score multiplier and the frozen flag
const USER_TABLE_V_1: Table = Table {
    name: "user",
    columns: &[
        sqlite_column!(
            "id",
            &SqlType::Integer,
            is_primary_key = true,
            is_unique = true
        ),
        sqlite_column!("username", &SqlType::Text, non_null = true, is_unique = true),
        sqlite_column!("email", &SqlType::Text, non_null = true, is_unique = true),
        sqlite_column!("salt", &SqlType::Text, non_null = true),
        sqlite_column!("hash", &SqlType::Text, non_null = true),
        sqlite_column!("hasher", &SqlType::Text, non_null = true),
        sqlite_column!("role", &SqlType::Text, non_null = true, default_value = Some("'user'")),
        sqlite_column!("gender", &SqlType::Text),
        sqlite_column!("age", &SqlType::Integer),
        sqlite_column!("date_of_birth", &SqlType::Text),
        sqlite_column!(
            "created",
            &SqlType::Integer,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
        sqlite_column!("score_multiplier", &SqlType::Real, default_value = Some("1.0")),
        sqlite_column!("frozen", &SqlType::Integer, default_value = Some("0")),
    ],
    unique_constraints: &[],
    indices: &[("idx_user_username", "username")],
};

pub const VERSIONED_SCHEMAS: &[VersionedSchema] = &[
    VersionedSchema {
        version: 0,
        tables: &[USER_TABLE_V_0],
        migration: None,
    },
    VersionedSchema {
        version: 1,
        tables: &[USER_TABLE_V_1],
        migration: Some(|conn: &Connection| {
            conn.execute(
                "ALTER TABLE user ADD COLUMN score_multiplier REAL DEFAULT 1.0",
                [],
            )?;
            conn.execute("ALTER TABLE user ADD COLUMN frozen INTEGER DEFAULT 0", [])?;
            Ok(())
        }),
    },
];

const USER_COLUMNS: &str =
    "id, username, email, role, gender, age, date_of_birth, score_multiplier, frozen, created";

fn row_to_user(row: &Row) -> rusqlite::Result<UserAccount> {
    let role: String = row.get(3)?;
    let gender: Option<String> = row.get(4)?;
    let dob: Option<String> = row.get(6)?;
    Ok(UserAccount {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        role: UserRole::from_str(&role).unwrap_or(UserRole::User),
        gender: gender.as_deref().and_then(Gender::from_str),
        age: row.get(5)?,
        date_of_birth: dob
            .as_deref()
            .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()),
        score_multiplier: row.get(7)?,
        frozen: row.get::<_, i64>(8)? != 0,
        created: row.get(9)?,
    })
}

#[derive(Clone)]
pub struct SqliteUserStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteUserStore {
    pub fn new<T: AsRef<Path>>(db_path: T) -> Result<Self> {
        let conn = open_versioned(db_path, VERSIONED_SCHEMAS)?;
        Ok(SqliteUserStore {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn update_single_column<P: rusqlite::ToSql>(
        &self,
        column: &str,
        value: P,
        username: &str,
    ) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let changed = conn.execute(
            &format!(
                "UPDATE {} SET {} = ?1 WHERE username = ?2 COLLATE NOCASE",
                USER_TABLE_V_1.name, column
            ),
            params![value, username],
        )?;
        Ok(changed > 0)
    }
}

impl UserStore for SqliteUserStore {
    fn create_user(&self, new_user: &NewUser, password: &SaltedPassword) -> Result<i64> {
        let conn = self.conn.lock().unwrap();

        let taken: i64 = conn.query_row(
            &format!(
                "SELECT COUNT(*) FROM {} WHERE username = ?1 COLLATE NOCASE OR email = ?2 COLLATE NOCASE",
                USER_TABLE_V_1.name
            ),
            params![new_user.username, new_user.email],
            |row| row.get(0),
        )?;
        if taken > 0 {
            bail!("Username or email already taken.");
        }

        conn.execute(
            &format!(
                "INSERT INTO {} (username, email, salt, hash, hasher, role, gender, age, date_of_birth)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                USER_TABLE_V_1.name
            ),
            params![
                new_user.username,
                new_user.email,
                password.salt,
                password.hash,
                password.hasher.to_string(),
                new_user.role.as_str(),
                new_user.gender.map(Gender::as_str),
                new_user.age,
                new_user.date_of_birth.map(|d| d.format("%Y-%m-%d").to_string()),
            ],
        )
        .with_context(|| format!("Failed to create user {}", new_user.username))?;
        Ok(conn.last_insert_rowid())
    }

    fn get_user(&self, username: &str) -> Result<Option<UserAccount>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM {} WHERE username = ?1 COLLATE NOCASE",
            USER_COLUMNS,
            USER_TABLE_V_1.name
        ))?;
        let mut rows = stmt.query_map(params![username], row_to_user)?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    fn get_user_by_identifier(&self, identifier: &str) -> Result<Option<UserAccount>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM {} WHERE username = ?1 COLLATE NOCASE OR email = ?1 COLLATE NOCASE",
            USER_COLUMNS,
            USER_TABLE_V_1.name
        ))?;
        let mut rows = stmt.query_map(params![identifier], row_to_user)?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    fn get_all_users(&self) -> Result<Vec<UserAccount>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM {} ORDER BY id",
            USER_COLUMNS,
            USER_TABLE_V_1.name
        ))?;
        let users = stmt
            .query_map([], row_to_user)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(users)
    }

    fn count_users(&self) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        let count = conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", USER_TABLE_V_1.name),
            [],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    fn get_password(&self, username: &str) -> Result<Option<SaltedPassword>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT salt, hash, hasher FROM {} WHERE username = ?1 COLLATE NOCASE",
            USER_TABLE_V_1.name
        ))?;
        let mut rows = stmt.query_map(params![username], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;
        match rows.next() {
            Some(row) => {
                let (salt, hash, hasher) = row?;
                Ok(Some(SaltedPassword {
                    salt,
                    hash,
                    hasher: RamadanflowHasher::from_str(&hasher)?,
                }))
            }
            None => Ok(None),
        }
    }

    fn update_password(&self, username: &str, password: &SaltedPassword) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let changed = conn.execute(
            &format!(
                "UPDATE {} SET salt = ?1, hash = ?2, hasher = ?3 WHERE username = ?4 COLLATE NOCASE",
                USER_TABLE_V_1.name
            ),
            params![
                password.salt,
                password.hash,
                password.hasher.to_string(),
                username
            ],
        )?;
        Ok(changed > 0)
    }

    fn set_role(&self, username: &str, role: UserRole) -> Result<bool> {
        self.update_single_column("role", role.as_str(), username)
    }

    fn set_score_multiplier(&self, username: &str, multiplier: f64) -> Result<bool> {
        self.update_single_column("score_multiplier", multiplier, username)
    }

    fn set_frozen(&self, username: &str, frozen: bool) -> Result<bool> {
        self.update_single_column("frozen", frozen as i64, username)
    }

    fn is_frozen(&self, username: &str) -> Result<Option<bool>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT frozen FROM {} WHERE username = ?1 COLLATE NOCASE",
            USER_TABLE_V_1.name
        ))?;
        let mut rows = stmt.query_map(params![username], |row| row.get::<_, i64>(0))?;
        match rows.next() {
            Some(row) => Ok(Some(row? != 0)),
            None => Ok(None),
        }
    }

    fn delete_user(&self, username: &str) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let changed = conn.execute(
            &format!(
                "DELETE FROM {} WHERE username = ?1 COLLATE NOCASE",
                USER_TABLE_V_1.name
            ),
            params![username],
        )?;
        Ok(changed > 0)
    }
}
