use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;

use crate::error::{AppError, Result};
use crate::storage::{apply_update, ProfileStore};
use crate::types::{NewProfile, Profile, ProfileUpdate};

/// Recorded analytics event, kept only in memory.
#[derive(Debug, Clone)]
pub struct StoredEvent {
    pub telegram_id: i64,
    pub event_type: String,
    pub event_data: serde_json::Value,
}

/// In-memory profile store.
///
/// Backs tests and ephemeral runs; everything is lost on shutdown. All
/// operations take the same write lock, which makes each single-key
/// operation atomic.
#[derive(Default)]
pub struct MemoryProfileStore {
    profiles: RwLock<HashMap<i64, Profile>>,
    events: RwLock<Vec<StoredEvent>>,
}

impl MemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Events recorded so far, for test assertions.
    #[cfg(test)]
    pub fn events(&self) -> Vec<StoredEvent> {
        self.events.read().clone()
    }
}

#[async_trait]
impl ProfileStore for MemoryProfileStore {
    async fn fetch(&self, telegram_id: i64) -> Result<Option<Profile>> {
        Ok(self.profiles.read().get(&telegram_id).cloned())
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

        let mut profiles = self.profiles.write();
        if profiles.contains_key(&profile.telegram_id) {
            return Err(AppError::Database(format!(
                "profile {} already exists",
                profile.telegram_id
            )));
        }
        profiles.insert(profile.telegram_id, profile.clone());
        Ok(profile)
    }

    async fn update(&self, telegram_id: i64, update: ProfileUpdate) -> Result<Option<Profile>> {
        let mut profiles = self.profiles.write();
        match profiles.get_mut(&telegram_id) {
            Some(profile) => {
                apply_update(profile, update);
                profile.updated_at = Utc::now();
                Ok(Some(profile.clone()))
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
        self.events.write().push(StoredEvent {
            telegram_id,
            event_type: event_type.to_string(),
            event_data,
        });
        Ok(())
    }
}
