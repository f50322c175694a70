//! Per-user profile persistence.
//!
//! A profile is created the first time a user talks to the bot and is never
//! deleted; `/reset` clears conversation turns, not the profile row.

use std::fmt;
use std::str::FromStr;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::db::Database;
use crate::error::{StoreError, StoreResult};

// ═══════════════════════════════════════════════════════════════════════
//  Types
// ═══════════════════════════════════════════════════════════════════════

/// Gender the user picked on the `/start` keyboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    Transgender,
    Nonbinary,
    /// No choice made yet. Stored as `NULL`.
    #[default]
    Unset,
}

impl Gender {
    /// Database / callback representation. `None` for [`Gender::Unset`].
    pub fn as_db(&self) -> Option<&'static str> {
        match self {
            Self::Male => Some("male"),
            Self::Female => Some("female"),
            Self::Transgender => Some("transgender"),
            Self::Nonbinary => Some("nonbinary"),
            Self::Unset => None,
        }
    }

    fn from_db(value: Option<String>) -> StoreResult<Self> {
        match value {
            None => Ok(Self::Unset),
            Some(s) => s.parse(),
        }
    }

    /// Human-readable label used in bot replies.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Male => "Male",
            Self::Female => "Female",
            Self::Transgender => "Transgender",
            Self::Nonbinary => "Non-binary",
            Self::Unset => "Not set",
        }
    }
}

impl FromStr for Gender {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "male" => Ok(Self::Male),
            "female" => Ok(Self::Female),
            "transgender" => Ok(Self::Transgender),
            "nonbinary" => Ok(Self::Nonbinary),
            "unset" => Ok(Self::Unset),
            other => Err(StoreError::InvalidArgument(format!("unknown gender: {other}"))),
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_db().unwrap_or("unset"))
    }
}

/// Persona behaviour setting. Only affects system-prompt phrasing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Romantic,
    Calm,
    Thinker,
    Motivating,
    #[default]
    Balanced,
}

impl Mode {
    /// Every mode, in the order the `/mode` keyboard shows them.
    pub const ALL: [Mode; 5] = [
        Mode::Romantic,
        Mode::Calm,
        Mode::Thinker,
        Mode::Motivating,
        Mode::Balanced,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Romantic => "romantic",
            Self::Calm => "calm",
            Self::Thinker => "thinker",
            Self::Motivating => "motivating",
            Self::Balanced => "balanced",
        }
    }

    /// Capitalised name for replies, e.g. `Motivating`.
    pub fn title(&self) -> &'static str {
        match self {
            Self::Romantic => "Romantic",
            Self::Calm => "Calm",
            Self::Thinker => "Thinker",
            Self::Motivating => "Motivating",
            Self::Balanced => "Balanced",
        }
    }
}

impl FromStr for Mode {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "romantic" => Ok(Self::Romantic),
            "calm" => Ok(Self::Calm),
            "thinker" => Ok(Self::Thinker),
            "motivating" => Ok(Self::Motivating),
            "balanced" => Ok(Self::Balanced),
            other => Err(StoreError::InvalidArgument(format!("unknown mode: {other}"))),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stored state for one Telegram user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    /// Telegram user id.
    pub id: i64,
    pub first_name: String,
    pub username: Option<String>,
    pub gender: Gender,
    pub mode: Mode,
    pub banned: bool,
    /// Number of stored turns. Only ever incremented.
    pub conversation_count: i64,
    /// Unix timestamp of the first interaction.
    pub joined_at: i64,
}

impl UserProfile {
    /// A fresh profile with defaults, not yet persisted.
    pub fn new(id: i64, first_name: impl Into<String>) -> Self {
        Self {
            id,
            first_name: first_name.into(),
            username: None,
            gender: Gender::Unset,
            mode: Mode::Balanced,
            banned: false,
            conversation_count: 0,
            joined_at: Utc::now().timestamp(),
        }
    }
}

/// Counts per gender for `/viewstats`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GenderBreakdown {
    pub male: i64,
    pub female: i64,
    pub transgender: i64,
    pub nonbinary: i64,
    pub unset: i64,
}

impl GenderBreakdown {
    pub fn total(&self) -> i64 {
        self.male + self.female + self.transgender + self.nonbinary + self.unset
    }
}

// ═══════════════════════════════════════════════════════════════════════
//  ProfileStore
// ═══════════════════════════════════════════════════════════════════════

const PROFILE_COLUMNS: &str =
    "user_id, first_name, username, gender, mode, banned, conversation_count, joined_at";

/// CRUD operations on user profiles.
#[derive(Clone)]
pub struct ProfileStore {
    db: Database,
}

impl ProfileStore {
    /// Create a new profile store backed by `db`.
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Insert a profile if none exists for `id`, then return the stored row.
    ///
    /// An existing profile is left untouched, so calling this on every
    /// `/start` never resets gender, mode or the ban flag.
    #[instrument(skip(self))]
    pub async fn ensure(
        &self,
        id: i64,
        first_name: &str,
        username: Option<&str>,
    ) -> StoreResult<UserProfile> {
        let first_name = first_name.to_string();
        let username = username.map(str::to_string);
        let now = Utc::now().timestamp();

        self.db
            .call(move |conn| {
                let inserted = conn.execute(
                    "INSERT INTO profiles (user_id, first_name, username, joined_at) \
                     VALUES (?1, ?2, ?3, ?4) ON CONFLICT(user_id) DO NOTHING",
                    rusqlite::params![id, first_name, username, now],
                )?;
                if inserted > 0 {
                    debug!(user_id = id, "profile created");
                }
                query_profile(conn, id)?.ok_or_else(|| StoreError::NotFound {
                    entity: "profile",
                    id: id.to_string(),
                })
            })
            .await
    }

    /// Whether a profile row already exists for `id`.
    pub async fn exists(&self, id: i64) -> StoreResult<bool> {
        Ok(self.get(id).await?.is_some())
    }

    /// Fetch a profile, returning `None` if the user never interacted.
    #[instrument(skip(self))]
    pub async fn get(&self, id: i64) -> StoreResult<Option<UserProfile>> {
        self.db.call(move |conn| query_profile(conn, id)).await
    }

    /// Record the user's gender choice.
    #[instrument(skip(self))]
    pub async fn set_gender(&self, id: i64, gender: Gender) -> StoreResult<()> {
        self.db
            .call(move |conn| {
                let updated = conn.execute(
                    "UPDATE profiles SET gender = ?1 WHERE user_id = ?2",
                    rusqlite::params![gender.as_db(), id],
                )?;
                require_row(updated, id)
            })
            .await
    }

    /// Record the user's mode choice.
    #[instrument(skip(self))]
    pub async fn set_mode(&self, id: i64, mode: Mode) -> StoreResult<()> {
        self.db
            .call(move |conn| {
                let updated = conn.execute(
                    "UPDATE profiles SET mode = ?1 WHERE user_id = ?2",
                    rusqlite::params![mode.as_str(), id],
                )?;
                require_row(updated, id)
            })
            .await
    }

    /// Set or clear the ban flag.
    ///
    /// Operators may ban an id that never talked to the bot; a stub profile
    /// is created so the ban holds when that user eventually shows up.
    #[instrument(skip(self))]
    pub async fn set_banned(&self, id: i64, banned: bool) -> StoreResult<()> {
        let now = Utc::now().timestamp();
        self.db
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO profiles (user_id, banned, joined_at) VALUES (?1, ?2, ?3) \
                     ON CONFLICT(user_id) DO UPDATE SET banned = excluded.banned",
                    rusqlite::params![id, banned, now],
                )?;
                debug!(user_id = id, banned, "ban flag updated");
                Ok(())
            })
            .await
    }

    /// `false` for unknown users.
    pub async fn is_banned(&self, id: i64) -> StoreResult<bool> {
        Ok(self.get(id).await?.map(|p| p.banned).unwrap_or(false))
    }

    /// Total number of profiles.
    pub async fn count(&self) -> StoreResult<i64> {
        self.db
            .call(|conn| {
                let count = conn.query_row("SELECT count(*) FROM profiles", [], |row| row.get(0))?;
                Ok(count)
            })
            .await
    }

    /// Every known user id that is not banned, in join order. Broadcast targets.
    pub async fn active_ids(&self) -> StoreResult<Vec<i64>> {
        self.db
            .call(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT user_id FROM profiles WHERE banned = 0 ORDER BY joined_at, user_id",
                )?;
                let ids = stmt
                    .query_map([], |row| row.get(0))?
                    .collect::<Result<Vec<i64>, _>>()?;
                Ok(ids)
            })
            .await
    }

    /// Profile counts grouped by gender.
    pub async fn gender_breakdown(&self) -> StoreResult<GenderBreakdown> {
        self.db
            .call(|conn| {
                let mut stmt =
                    conn.prepare("SELECT gender, count(*) FROM profiles GROUP BY gender")?;
                let rows = stmt.query_map([], |row| {
                    Ok((row.get::<_, Option<String>>(0)?, row.get::<_, i64>(1)?))
                })?;

                let mut breakdown = GenderBreakdown::default();
                for row in rows {
                    let (gender, count) = row?;
                    match Gender::from_db(gender)? {
                        Gender::Male => breakdown.male += count,
                        Gender::Female => breakdown.female += count,
                        Gender::Transgender => breakdown.transgender += count,
                        Gender::Nonbinary => breakdown.nonbinary += count,
                        Gender::Unset => breakdown.unset += count,
                    }
                }
                Ok(breakdown)
            })
            .await
    }
}

// ── row helpers ──────────────────────────────────────────────────────

fn query_profile(conn: &rusqlite::Connection, id: i64) -> StoreResult<Option<UserProfile>> {
    let sql = format!("SELECT {PROFILE_COLUMNS} FROM profiles WHERE user_id = ?1");
    let result = conn.query_row(&sql, rusqlite::params![id], |row| {
        Ok((
            row.get::<_, i64>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, Option<String>>(2)?,
            row.get::<_, Option<String>>(3)?,
            row.get::<_, String>(4)?,
            row.get::<_, bool>(5)?,
            row.get::<_, i64>(6)?,
            row.get::<_, i64>(7)?,
        ))
    });

    match result {
        Ok((id, first_name, username, gender, mode, banned, conversation_count, joined_at)) => {
            Ok(Some(UserProfile {
                id,
                first_name,
                username,
                gender: Gender::from_db(gender)?,
                mode: mode.parse()?,
                banned,
                conversation_count,
                joined_at,
            }))
        }
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn require_row(updated: usize, id: i64) -> StoreResult<()> {
    if updated == 0 {
        return Err(StoreError::NotFound {
            entity: "profile",
            id: id.to_string(),
        });
    }
    Ok(())
}

// ── tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    async fn setup() -> ProfileStore {
        let db = Database::in_memory().unwrap();
        ProfileStore::new(db)
    }

    #[tokio::test]
    async fn ensure_creates_with_defaults() {
        let store = setup().await;
        let profile = store.ensure(42, "Asha", Some("asha")).await.unwrap();

        assert_eq!(profile.id, 42);
        assert_eq!(profile.first_name, "Asha");
        assert_eq!(profile.username.as_deref(), Some("asha"));
        assert_eq!(profile.gender, Gender::Unset);
        assert_eq!(profile.mode, Mode::Balanced);
        assert!(!profile.banned);
        assert_eq!(profile.conversation_count, 0);
    }

    #[tokio::test]
    async fn ensure_keeps_existing_choices() {
        let store = setup().await;
        store.ensure(1, "Ravi", None).await.unwrap();
        store.set_gender(1, Gender::Male).await.unwrap();
        store.set_mode(1, Mode::Calm).await.unwrap();

        let again = store.ensure(1, "Ravi K", None).await.unwrap();
        assert_eq!(again.gender, Gender::Male);
        assert_eq!(again.mode, Mode::Calm);
        assert_eq!(again.first_name, "Ravi");
    }

    #[tokio::test]
    async fn get_unknown_returns_none() {
        let store = setup().await;
        assert!(store.get(999).await.unwrap().is_none());
        assert!(!store.exists(999).await.unwrap());
    }

    #[tokio::test]
    async fn set_mode_on_missing_profile_is_not_found() {
        let store = setup().await;
        let err = store.set_mode(5, Mode::Thinker).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound { entity: "profile", .. }));
    }

    #[tokio::test]
    async fn gender_can_be_cleared() {
        let store = setup().await;
        store.ensure(3, "Kiran", None).await.unwrap();
        store.set_gender(3, Gender::Nonbinary).await.unwrap();
        store.set_gender(3, Gender::Unset).await.unwrap();
        assert_eq!(store.get(3).await.unwrap().unwrap().gender, Gender::Unset);
    }

    #[tokio::test]
    async fn ban_unknown_user_creates_stub() {
        let store = setup().await;
        store.set_banned(77, true).await.unwrap();
        assert!(store.is_banned(77).await.unwrap());

        // First /start after the ban must not lift it.
        let profile = store.ensure(77, "Late", None).await.unwrap();
        assert!(profile.banned);

        store.set_banned(77, false).await.unwrap();
        assert!(!store.is_banned(77).await.unwrap());
    }

    #[tokio::test]
    async fn active_ids_skip_banned() {
        let store = setup().await;
        store.ensure(1, "a", None).await.unwrap();
        store.ensure(2, "b", None).await.unwrap();
        store.ensure(3, "c", None).await.unwrap();
        store.set_banned(2, true).await.unwrap();

        let ids = store.active_ids().await.unwrap();
        assert_eq!(ids.len(), 2);
        assert!(ids.contains(&1));
        assert!(ids.contains(&3));
        assert_eq!(store.count().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn breakdown_counts_each_gender() {
        let store = setup().await;
        for (id, gender) in [
            (1, Gender::Male),
            (2, Gender::Female),
            (3, Gender::Female),
            (4, Gender::Transgender),
            (5, Gender::Nonbinary),
        ] {
            store.ensure(id, "u", None).await.unwrap();
            store.set_gender(id, gender).await.unwrap();
        }
        store.ensure(6, "u", None).await.unwrap();

        let b = store.gender_breakdown().await.unwrap();
        assert_eq!(
            b,
            GenderBreakdown {
                male: 1,
                female: 2,
                transgender: 1,
                nonbinary: 1,
                unset: 1,
            }
        );
        assert_eq!(b.total(), 6);
    }

    #[test]
    fn enums_parse_their_own_names() {
        for mode in Mode::ALL {
            assert_eq!(mode.as_str().parse::<Mode>().unwrap(), mode);
        }
        assert_eq!("female".parse::<Gender>().unwrap(), Gender::Female);
        assert!("grumpy".parse::<Mode>().is_err());
        assert_eq!(Mode::default(), Mode::Balanced);
    }
}
