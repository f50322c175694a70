//! Key-value table for bot state that must survive restarts.
//!
//! Today this only holds the Telegram `getUpdates` offset.

use tracing::{debug, instrument};

use crate::db::Database;
use crate::error::StoreResult;

/// Key under which the next `getUpdates` offset is stored.
pub const POLLING_OFFSET_KEY: &str = "telegram_offset";

#[derive(Clone)]
pub struct BotStateStore {
    db: Database,
}

impl BotStateStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Raw string value for `key`, if set.
    #[instrument(skip(self))]
    pub async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let key = key.to_string();
        self.db
            .call(move |conn| {
                match conn.query_row(
                    "SELECT value FROM bot_state WHERE key = ?1",
                    rusqlite::params![key],
                    |row| row.get(0),
                ) {
                    Ok(value) => Ok(Some(value)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
    }

    /// Upsert `key`.
    #[instrument(skip(self, value))]
    pub async fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        let key = key.to_string();
        let value = value.to_string();
        self.db
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO bot_state (key, value) VALUES (?1, ?2) \
                     ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                    rusqlite::params![key, value],
                )?;
                Ok(())
            })
            .await
    }

    /// The persisted polling offset, or 0 when none is stored or it is garbled.
    pub async fn polling_offset(&self) -> StoreResult<i64> {
        let raw = self.get(POLLING_OFFSET_KEY).await?;
        Ok(raw.and_then(|v| v.parse().ok()).unwrap_or(0))
    }

    pub async fn set_polling_offset(&self, offset: i64) -> StoreResult<()> {
        self.set(POLLING_OFFSET_KEY, &offset.to_string()).await?;
        debug!(offset, "polling offset saved");
        Ok(())
    }
}

// ── tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    async fn setup() -> BotStateStore {
        let db = Database::in_memory().unwrap();
        BotStateStore::new(db)
    }

    #[tokio::test]
    async fn missing_key_is_none() {
        let store = setup().await;
        assert!(store.get("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn set_overwrites() {
        let store = setup().await;
        store.set("k", "old").await.unwrap();
        store.set("k", "new").await.unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("new"));
    }

    #[tokio::test]
    async fn offset_defaults_to_zero() {
        let store = setup().await;
        assert_eq!(store.polling_offset().await.unwrap(), 0);

        store.set(POLLING_OFFSET_KEY, "not-a-number").await.unwrap();
        assert_eq!(store.polling_offset().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn offset_round_trips() {
        let store = setup().await;
        store.set_polling_offset(123_456_789).await.unwrap();
        assert_eq!(store.polling_offset().await.unwrap(), 123_456_789);
    }
}
