use anyhow::{bail, Context, Result};
use rusqlite::Connection;
use std::path::Path;
use tracing::info;

pub const DEFAULT_TIMESTAMP: &str = "(cast(strftime('%s','now') as int))";

/// Offset added to `PRAGMA user_version` so that a plain SQLite file (version
/// 0) is never mistaken for one of our schema versions.
pub const BASE_DB_VERSION: usize = 77000;

#[macro_export]
macro_rules! sqlite_column {
    ($name:expr, $sql_type:expr $(, $field:ident = $value:expr)*) => {
        {
            #[allow(unused_mut)]
            let mut column = Column {
                name: $name,
                sql_type: $sql_type,
                is_primary_key: false,
                non_null: false,
                is_unique: false,
                default_value: None,
                foreign_key: None,
            };
            $(
                column.$field = $value;
            )*
            column
        }
    };
}

#[derive(Debug, PartialEq, Eq)]
pub enum SqlType {
    Text,
    Integer,
    Real,
}

impl SqlType {
    fn sql(&self) -> &'static str {
        match self {
            SqlType::Text => "TEXT",
            SqlType::Integer => "INTEGER",
            SqlType::Real => "REAL",
        }
    }
}

pub struct ForeignKey {
    pub foreign_table: &'static str,
    pub foreign_column: &'static str,
}

pub struct Column {
    pub name: &'static str,
    pub sql_type: &'static SqlType,
    pub is_primary_key: bool,
    pub non_null: bool,
    pub is_unique: bool,
    pub default_value: Option<&'static str>,
    pub foreign_key: Option<&'static ForeignKey>,
}

pub struct Table {
    pub name: &'static str,
    pub columns: &'static [Column],
    pub indices: &'static [(&'static str, &'static str)],
    pub unique_constraints: &'static [&'static [&'static str]],
}

impl Table {
    pub fn create(&self, conn: &Connection) -> Result<()> {
        let mut sql = format!("CREATE TABLE {} (", self.name);
        for (i, column) in self.columns.iter().enumerate() {
            if i > 0 {
                sql.push_str(", ");
            }
            sql.push_str(column.name);
            sql.push(' ');
            sql.push_str(column.sql_type.sql());
            if column.is_primary_key {
                sql.push_str(" PRIMARY KEY");
            }
            if column.non_null {
                sql.push_str(" NOT NULL");
            }
            if column.is_unique {
                sql.push_str(" UNIQUE");
            }
            if let Some(default_value) = column.default_value {
                sql.push_str(&format!(" DEFAULT {}", default_value));
            }
            if let Some(fk) = column.foreign_key {
                sql.push_str(&format!(
                    " REFERENCES {}({}) ON DELETE CASCADE",
                    fk.foreign_table, fk.foreign_column
                ));
            }
        }
        for unique in self.unique_constraints {
            sql.push_str(&format!(", UNIQUE ({})", unique.join(", ")));
        }
        sql.push_str(");");
        conn.execute(&sql, [])?;

        for (index_name, column_name) in self.indices {
            conn.execute(
                &format!(
                    "CREATE INDEX {} ON {}({});",
                    index_name, self.name, column_name
                ),
                [],
            )?;
        }
        Ok(())
    }

    /// Checks that the table exists on disk with the declared column names.
    /// Types and constraints are trusted once the names line up; a renamed or
    /// dropped column is what this needs to catch.
    fn validate(&self, conn: &Connection) -> Result<()> {
        let mut stmt = conn.prepare(&format!("PRAGMA table_info({});", self.name))?;
        let actual: Vec<String> = stmt
            .query_map([], |row| row.get::<usize, String>(1))?
            .collect::<Result<_, _>>()?;

        if actual.is_empty() {
            bail!("Table {} does not exist", self.name);
        }
        let expected: Vec<&str> = self.columns.iter().map(|c| c.name).collect();
        if actual != expected {
            bail!(
                "Table {} columns mismatch: found [{}], expected [{}]",
                self.name,
                actual.join(", "),
                expected.join(", ")
            );
        }
        Ok(())
    }
}

pub struct VersionedSchema {
    pub version: usize,
    pub tables: &'static [Table],
    pub migration: Option<fn(&Connection) -> Result<()>>,
}

impl VersionedSchema {
    pub fn create(&self, conn: &Connection) -> Result<()> {
        conn.execute("PRAGMA foreign_keys = ON;", [])?;
        for table in self.tables {
            table.create(conn)?;
        }
        conn.execute(
            &format!("PRAGMA user_version = {}", BASE_DB_VERSION + self.version),
            [],
        )?;
        Ok(())
    }

    pub fn validate(&self, conn: &Connection) -> Result<()> {
        for table in self.tables {
            table.validate(conn)?;
        }
        Ok(())
    }
}

/// Opens (or creates) a SQLite database governed by a schema chain.
///
/// A missing file is created at the latest schema version. An existing file
/// has its `PRAGMA user_version` checked against the chain, is validated
/// against the schema it claims, and is then migrated forward step by step.
pub fn open_versioned<P: AsRef<Path>>(
    db_path: P,
    schemas: &'static [VersionedSchema],
) -> Result<Connection> {
    let conn = if db_path.as_ref().exists() {
        Connection::open(&db_path)?
    } else {
        let conn = Connection::open(&db_path)?;
        schemas
            .last()
            .context("Empty schema chain")?
            .create(&conn)?;
        conn
    };

    let raw_version = conn
        .query_row("PRAGMA user_version;", [], |row| row.get::<usize, i64>(0))
        .context("Failed to read database version")?;
    let version = raw_version - BASE_DB_VERSION as i64;

    if version < 0 {
        bail!(
            "Database at {:?} does not carry a known schema version (user_version = {})",
            db_path.as_ref(),
            raw_version
        );
    }
    if version as usize >= schemas.len() {
        bail!(
            "Database at {:?} has schema version {} which is newer than this binary supports",
            db_path.as_ref(),
            version
        );
    }

    schemas[version as usize].validate(&conn)?;

    let mut current = version as usize;
    for schema in schemas.iter().skip(current + 1) {
        if let Some(migration_fn) = schema.migration {
            info!(
                "Migrating db from version {} to {}",
                current, schema.version
            );
            migration_fn(&conn)?;
        }
        current = schema.version;
    }
    conn.execute(
        &format!("PRAGMA user_version = {}", BASE_DB_VERSION + current),
        [],
    )?;
    conn.execute("PRAGMA foreign_keys = ON;", [])?;

    Ok(conn)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ACCOUNT_V0: Table = Table {
        name: "account",
        columns: &[
            sqlite_column!(
                "id",
                &SqlType::Integer,
                is_primary_key = true,
                is_unique = true
            ),
            sqlite_column!("name", &SqlType::Text, non_null = true),
        ],
        indices: &[("idx_account_name", "name")],
        unique_constraints: &[],
    };

    const ACCOUNT_V1: Table = Table {
        name: "account",
        columns: &[
            sqlite_column!(
                "id",
                &SqlType::Integer,
                is_primary_key = true,
                is_unique = true
            ),
            sqlite_column!("name", &SqlType::Text, non_null = true),
            sqlite_column!("score", &SqlType::Real, default_value = Some("0")),
        ],
        indices: &[("idx_account_name", "name")],
        unique_constraints: &[],
    };

    const SCHEMAS: &[VersionedSchema] = &[
        VersionedSchema {
            version: 0,
            tables: &[ACCOUNT_V0],
            migration: None,
        },
        VersionedSchema {
            version: 1,
            tables: &[ACCOUNT_V1],
            migration: Some(|conn| {
                conn.execute("ALTER TABLE account ADD COLUMN score REAL DEFAULT 0", [])?;
                Ok(())
            }),
        },
    ];

    #[test]
    fn creates_fresh_db_at_latest_version() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fresh.db");
        let conn = open_versioned(&path, SCHEMAS).unwrap();
        let version: i64 = conn
            .query_row("PRAGMA user_version;", [], |row| row.get(0))
            .unwrap();
        assert_eq!(version as usize, BASE_DB_VERSION + 1);
        SCHEMAS[1].validate(&conn).unwrap();
    }

    #[test]
    fn migrates_old_db_forward() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("old.db");
        {
            let conn = Connection::open(&path).unwrap();
            SCHEMAS[0].create(&conn).unwrap();
        }
        let conn = open_versioned(&path, SCHEMAS).unwrap();
        let version: i64 = conn
            .query_row("PRAGMA user_version;", [], |row| row.get(0))
            .unwrap();
        assert_eq!(version as usize, BASE_DB_VERSION + 1);
        conn.execute("UPDATE account SET score = 1.5", []).unwrap();
    }

    #[test]
    fn rejects_unversioned_db() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plain.db");
        {
            let conn = Connection::open(&path).unwrap();
            conn.execute("CREATE TABLE account (id INTEGER)", [])
                .unwrap();
        }
        assert!(open_versioned(&path, SCHEMAS).is_err());
    }

    #[test]
    fn validate_detects_column_mismatch() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute("CREATE TABLE account (id INTEGER, wrong TEXT)", [])
            .unwrap();
        let err = ACCOUNT_V0.validate(&conn).unwrap_err().to_string();
        assert!(err.contains("columns mismatch"));
    }
}
