use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::debug;

use crate::error::{AppError, Result};
use crate::storage::{apply_update, ProfileStore};
use crate::types::{NewProfile, Profile, ProfileUpdate};

/// SQLite-backed profile store.
///
/// A single connection behind a mutex: profile operations are small
/// single-row statements, so serializing them keeps every operation atomic
/// without WAL tuning or a pool.
pub struct SqlProfileStore {
    conn: Mutex<Connection>,
}

impl SqlProfileStore {
    /// Open (or create) the database at `path` and ensure the schema exists.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path.as_ref())?;
        Self::init_schema(&conn)?;
        debug!("opened profile database at {:?}", path.as_ref());
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory database, mainly for tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn init_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS aura_profiles (
                telegram_id            INTEGER PRIMARY KEY,
                first_name             TEXT NOT NULL,
                last_name              TEXT,
                username               TEXT,
                language_code          TEXT,
                is_premium             INTEGER NOT NULL DEFAULT 0,
                photo_url              TEXT,
                credits                INTEGER NOT NULL DEFAULT 0,
                referral_source        TEXT,
                onboarding_completed   INTEGER NOT NULL DEFAULT 0,
                preferred_time_morning TEXT,
                preferred_time_evening TEXT,
                goals                  TEXT NOT NULL DEFAULT '[]',
                current_mood           TEXT,
                created_at             TEXT NOT NULL,
                updated_at             TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS aura_user_events (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                telegram_id INTEGER NOT NULL,
                event_type  TEXT NOT NULL,
                event_data  TEXT NOT NULL,
                created_at  TEXT NOT NULL
            );",
        )?;
        Ok(())
    }

    fn write_row(conn: &Connection, profile: &Profile) -> Result<()> {
        conn.execute(
            "INSERT OR REPLACE INTO aura_profiles (
                telegram_id, first_name, last_name, username, language_code,
                is_premium, photo_url, credits, referral_source,
                onboarding_completed, preferred_time_morning,
                preferred_time_evening, goals, current_mood,
                created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
            params![
                profile.telegram_id,
                profile.first_name,
                profile.last_name,
                profile.username,
                profile.language_code,
                profile.is_premium,
                profile.photo_url,
                profile.credits,
                profile.referral_source,
                profile.onboarding_completed,
                profile.preferred_time_morning,
                profile.preferred_time_evening,
                serde_json::to_string(&profile.goals)?,
                profile.current_mood,
                profile.created_at.to_rfc3339(),
                profile.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn read_row(conn: &Connection, telegram_id: i64) -> Result<Option<Profile>> {
        conn.query_row(
            "SELECT telegram_id, first_name, last_name, username, language_code,
                    is_premium, photo_url, credits, referral_source,
                    onboarding_completed, preferred_time_morning,
                    preferred_time_evening, goals, current_mood,
                    created_at, updated_at
             FROM aura_profiles WHERE telegram_id = ?1",
            params![telegram_id],
            profile_from_row,
        )
        .optional()
        .map_err(AppError::from)
    }
}

fn profile_from_row(row: &Row<'_>) -> rusqlite::Result<Profile> {
    let goals_json: String = row.get(12)?;
    let goals = serde_json::from_str(&goals_json).unwrap_or_default();

    Ok(Profile {
        telegram_id: row.get(0)?,
        first_name: row.get(1)?,
        last_name: row.get(2)?,
        username: row.get(3)?,
        language_code: row.get(4)?,
        is_premium: row.get(5)?,
        photo_url: row.get(6)?,
        credits: row.get(7)?,
        referral_source: row.get(8)?,
        onboarding_completed: row.get(9)?,
        preferred_time_morning: row.get(10)?,
        preferred_time_evening: row.get(11)?,
        goals,
        current_mood: row.get(13)?,
        created_at: parse_timestamp(row, 14)?,
        updated_at: parse_timestamp(row, 15)?,
    })
}

fn parse_timestamp(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                idx,
                rusqlite::types::Type::Text,
                Box::new(e),
            )
        })
}

#[async_trait]
impl ProfileStore for SqlProfileStore {
    async fn fetch(&self, telegram_id: i64) -> Result<Option<Profile>> {
        let conn = self.conn.lock();
        Self::read_row(&conn, telegram_id)
    }

    async fn insert(&self, new: NewProfile) -> Result<Profile> {
        let now = Utc::now();
        let profile = Profile {
            telegram_id: new.telegram_id,
            first_name: new.first_name,
            last_name: new.last_name,
            username: new.username,
            language_code: new.language_code,
            is_premium: new.is_premium,
            photo_url: new.photo_url,
            credits: 0,
            referral_source: new.referral_source,
            onboarding_completed: false,
            preferred_time_morning: None,
            preferred_time_evening: None,
            goals: Vec::new(),
            current_mood: None,
            created_at: now,
            updated_at: now,
        };

        let conn = self.conn.lock();
        if Self::read_row(&conn, profile.telegram_id)?.is_some() {
            return Err(AppError::Database(format!(
                "profile {} already exists",
                profile.telegram_id
            )));
        }
        Self::write_row(&conn, &profile)?;
        Ok(profile)
    }

    async fn update(&self, telegram_id: i64, update: ProfileUpdate) -> Result<Option<Profile>> {
        let conn = self.conn.lock();
        match Self::read_row(&conn, telegram_id)? {
            Some(mut profile) => {
                apply_update(&mut profile, update);
                profile.updated_at = Utc::now();
                Self::write_row(&conn, &profile)?;
                Ok(Some(profile))
            }
            None => Ok(None),
        }
    }

    async fn record_event(
        &self,
        telegram_id: i64,
        event_type: &str,
        event_data: serde_json::Value,
    ) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO aura_user_events (telegram_id, event_type, event_data, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                telegram_id,
                event_type,
                event_data.to_string(),
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_profile(id: i64) -> NewProfile {
        NewProfile {
            telegram_id: id,
            first_name: "Grace".to_string(),
            last_name: Some("Hopper".to_string()),
            username: None,
            language_code: Some("en".to_string()),
            is_premium: true,
            photo_url: None,
            referral_source: None,
        }
    }

    #[tokio::test]
    async fn roundtrip_through_sqlite() {
        let store = SqlProfileStore::open_in_memory().unwrap();
        let inserted = store.insert(new_profile(10)).await.unwrap();

        let fetched = store.fetch(10).await.unwrap().expect("row exists");
        assert_eq!(fetched.telegram_id, inserted.telegram_id);
        assert_eq!(fetched.first_name, "Grace");
        assert_eq!(fetched.last_name.as_deref(), Some("Hopper"));
        assert!(fetched.is_premium);
        assert_eq!(fetched.credits, 0);
        assert!(fetched.goals.is_empty());
    }

    #[tokio::test]
    async fn fetch_unknown_is_none() {
        let store = SqlProfileStore::open_in_memory().unwrap();
        assert!(store.fetch(999).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn update_persists_goals_as_json() {
        let store = SqlProfileStore::open_in_memory().unwrap();
        store.insert(new_profile(10)).await.unwrap();

        store
            .update(
                10,
                ProfileUpdate {
                    goals: Some(vec!["sleep".to_string()]),
                    current_mood: Some(Some("great".to_string())),
                    ..ProfileUpdate::default()
                },
            )
            .await
            .unwrap();

        let fetched = store.fetch(10).await.unwrap().unwrap();
        assert_eq!(fetched.goals, vec!["sleep"]);
        assert_eq!(fetched.current_mood.as_deref(), Some("great"));
    }

    #[tokio::test]
    async fn survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("profiles.db");

        {
            let store = SqlProfileStore::open(&path).unwrap();
            store.insert(new_profile(3)).await.unwrap();
        }

        let store = SqlProfileStore::open(&path).unwrap();
        let fetched = store.fetch(3).await.unwrap().expect("persisted row");
        assert_eq!(fetched.first_name, "Grace");
    }

    #[tokio::test]
    async fn records_events() {
        let store = SqlProfileStore::open_in_memory().unwrap();
        store
            .record_event(3, "user_registered", serde_json::json!({"referral_source": "x"}))
            .await
            .unwrap();

        let conn = store.conn.lock();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM aura_user_events", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }
}
