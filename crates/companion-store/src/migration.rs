//! Schema steps.
//!
//! The applied step count lives in SQLite's `user_version` pragma, so a
//! fresh file is version 0 and needs no bookkeeping table. Each step runs in
//! its own transaction together with the version bump.

use rusqlite::Connection;
use tracing::{debug, info};

use crate::error::{StoreError, StoreResult};

/// Append new steps at the end; never edit a released one.
const STEPS: &[&str] = &[
    // 1: profiles and chat turns
    r#"
    CREATE TABLE profiles (
        user_id            INTEGER PRIMARY KEY,
        first_name         TEXT NOT NULL DEFAULT '',
        username           TEXT,
        gender             TEXT CHECK(gender IN ('male','female','transgender','nonbinary')),
        mode               TEXT NOT NULL DEFAULT 'balanced'
                           CHECK(mode IN ('romantic','calm','thinker','motivating','balanced')),
        banned             BOOLEAN NOT NULL DEFAULT 0,
        conversation_count INTEGER NOT NULL DEFAULT 0,
        joined_at          INTEGER NOT NULL
    );

    CREATE TABLE chat_turns (
        id         INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id    INTEGER NOT NULL,
        user_text  TEXT NOT NULL,
        bot_text   TEXT NOT NULL,
        created_at INTEGER NOT NULL
    );
    CREATE INDEX idx_chat_turns_user ON chat_turns(user_id, created_at);
    "#,
    // 2: key-value bot state (polling offset)
    r#"
    CREATE TABLE bot_state (
        key   TEXT PRIMARY KEY,
        value TEXT NOT NULL
    );
    "#,
];

/// Schema version after every step has run.
pub const LATEST: u32 = STEPS.len() as u32;

pub fn schema_version(conn: &Connection) -> StoreResult<u32> {
    Ok(conn.pragma_query_value(None, "user_version", |row| row.get(0))?)
}

/// Apply every step newer than the stored version. Returns the new version.
///
/// A file written by a newer build is refused rather than guessed at.
pub fn migrate(conn: &mut Connection) -> StoreResult<u32> {
    let current = schema_version(conn)?;
    if current > LATEST {
        return Err(StoreError::Migration {
            version: current,
            message: format!("database is newer than this build (v{LATEST})"),
        });
    }
    if current == LATEST {
        debug!(version = current, "schema up to date");
        return Ok(current);
    }

    for (version, sql) in (1..=LATEST).zip(STEPS).skip(current as usize) {
        let tx = conn.transaction()?;
        tx.execute_batch(sql).map_err(|e| StoreError::Migration {
            version,
            message: e.to_string(),
        })?;
        tx.pragma_update(None, "user_version", version)?;
        tx.commit()?;
        info!(version, "schema step applied");
    }
    Ok(LATEST)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn migrated() -> Connection {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate(&mut conn).unwrap();
        conn
    }

    #[test]
    fn fresh_database_reaches_latest() {
        let conn = migrated();
        assert_eq!(schema_version(&conn).unwrap(), LATEST);

        let mut stmt = conn
            .prepare("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
            .unwrap();
        let tables: Vec<String> = stmt
            .query_map([], |row| row.get(0))
            .unwrap()
            .map(|r| r.unwrap())
            .collect();
        for table in ["bot_state", "chat_turns", "profiles"] {
            assert!(tables.iter().any(|t| t == table), "missing {table}");
        }
    }

    #[test]
    fn rerun_is_a_no_op() {
        let mut conn = migrated();
        conn.execute("INSERT INTO bot_state (key, value) VALUES ('k', 'v')", [])
            .unwrap();
        assert_eq!(migrate(&mut conn).unwrap(), LATEST);

        let kept: String = conn
            .query_row("SELECT value FROM bot_state WHERE key = 'k'", [], |row| row.get(0))
            .unwrap();
        assert_eq!(kept, "v");
    }

    #[test]
    fn partial_schema_is_completed() {
        let mut conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(STEPS[0]).unwrap();
        conn.pragma_update(None, "user_version", 1).unwrap();

        assert_eq!(migrate(&mut conn).unwrap(), LATEST);
        conn.execute("INSERT INTO bot_state (key, value) VALUES ('k', 'v')", [])
            .unwrap();
    }

    #[test]
    fn newer_database_is_refused() {
        let mut conn = Connection::open_in_memory().unwrap();
        conn.pragma_update(None, "user_version", LATEST + 1).unwrap();
        assert!(matches!(
            migrate(&mut conn),
            Err(StoreError::Migration { .. })
        ));
    }

    #[test]
    fn profile_checks_reject_unknown_values() {
        let conn = migrated();
        conn.execute(
            "INSERT INTO profiles (user_id, first_name, joined_at) VALUES (1, 'a', 0)",
            [],
        )
        .unwrap();

        let bad_mode = conn.execute(
            "INSERT INTO profiles (user_id, mode, joined_at) VALUES (2, 'grumpy', 0)",
            [],
        );
        assert!(bad_mode.is_err());

        let bad_gender = conn.execute(
            "INSERT INTO profiles (user_id, gender, joined_at) VALUES (3, 'robot', 0)",
            [],
        );
        assert!(bad_gender.is_err());
    }
}
