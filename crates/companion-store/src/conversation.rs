//! Conversation log: one row per user-message / bot-reply pair.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::db::Database;
use crate::error::StoreResult;

/// One stored exchange. Immutable once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub id: i64,
    pub user_id: i64,
    pub user_text: String,
    pub bot_text: String,
    /// Unix timestamp (seconds) of the reply.
    pub timestamp: i64,
}

/// Append-only turn log with bounded reads.
#[derive(Clone)]
pub struct ConversationStore {
    db: Database,
}

impl ConversationStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Store a turn and bump the owner's `conversation_count` atomically.
    #[instrument(skip(self, user_text, bot_text))]
    pub async fn append_turn(
        &self,
        user_id: i64,
        user_text: &str,
        bot_text: &str,
    ) -> StoreResult<ChatTurn> {
        let user_text = user_text.to_string();
        let bot_text = bot_text.to_string();
        let now = Utc::now().timestamp();

        self.db
            .call(move |conn| {
                let tx = conn.transaction()?;
                tx.execute(
                    "INSERT INTO chat_turns (user_id, user_text, bot_text, created_at) \
                     VALUES (?1, ?2, ?3, ?4)",
                    rusqlite::params![user_id, user_text, bot_text, now],
                )?;
                let id = tx.last_insert_rowid();
                tx.execute(
                    "UPDATE profiles SET conversation_count = conversation_count + 1 \
                     WHERE user_id = ?1",
                    rusqlite::params![user_id],
                )?;
                tx.commit()?;

                debug!(user_id, turn_id = id, "turn stored");
                Ok(ChatTurn {
                    id,
                    user_id,
                    user_text,
                    bot_text,
                    timestamp: now,
                })
            })
            .await
    }

    /// The `limit` most recent turns for `user_id`, newest first.
    ///
    /// Callers assembling a prompt reverse this to chronological order.
    #[instrument(skip(self))]
    pub async fn recent(&self, user_id: i64, limit: usize) -> StoreResult<Vec<ChatTurn>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        self.db
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, user_id, user_text, bot_text, created_at FROM chat_turns \
                     WHERE user_id = ?1 ORDER BY created_at DESC, id DESC LIMIT ?2",
                )?;
                let turns = stmt
                    .query_map(rusqlite::params![user_id, limit], |row| {
                        Ok(ChatTurn {
                            id: row.get(0)?,
                            user_id: row.get(1)?,
                            user_text: row.get(2)?,
                            bot_text: row.get(3)?,
                            timestamp: row.get(4)?,
                        })
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(turns)
            })
            .await
    }

    /// Delete every turn for `user_id`. Returns the number removed.
    #[instrument(skip(self))]
    pub async fn clear(&self, user_id: i64) -> StoreResult<usize> {
        self.db
            .call(move |conn| {
                let removed = conn.execute(
                    "DELETE FROM chat_turns WHERE user_id = ?1",
                    rusqlite::params![user_id],
                )?;
                debug!(user_id, removed, "history cleared");
                Ok(removed)
            })
            .await
    }

    /// Number of turns currently stored for `user_id`.
    pub async fn count_for(&self, user_id: i64) -> StoreResult<i64> {
        self.db
            .call(move |conn| {
                let count = conn.query_row(
                    "SELECT count(*) FROM chat_turns WHERE user_id = ?1",
                    rusqlite::params![user_id],
                    |row| row.get(0),
                )?;
                Ok(count)
            })
            .await
    }
}

// ── tests ────────────────────────────────────────────────────────────
