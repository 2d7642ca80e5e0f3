//! Profile persistence.
//!
//! The rest of the service treats the store as opaque: four single-key
//! operations, each atomic and strongly consistent for its key, no
//! transaction ever spanning more than one key. Backends plug in through the
//! [`ProfileStore`] trait; SQLite is the persistent implementation, the
//! in-memory one backs tests and ephemeral runs.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{NewProfile, Profile, ProfileUpdate};

/// In-memory profile store
pub mod memory_storage;
/// SQLite-backed profile store
pub mod sql_storage;

pub use memory_storage::MemoryProfileStore;
pub use sql_storage::SqlProfileStore;

/// Event type recorded when a profile row is first created.
pub const EVENT_USER_REGISTERED: &str = "user_registered";

/// Single-key profile store contract.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Fetch a profile by Telegram id.
    async fn fetch(&self, telegram_id: i64) -> Result<Option<Profile>>;

    /// Insert a new profile with default application fields.
    ///
    /// The caller is expected to have checked for existence first; inserting
    /// a duplicate key is an error.
    async fn insert(&self, new: NewProfile) -> Result<Profile>;

    /// Apply a partial update to an existing profile, refreshing
    /// `updated_at`. Returns `None` when no row exists for the key.
    async fn update(&self, telegram_id: i64, update: ProfileUpdate) -> Result<Option<Profile>>;

    /// Append an analytics event for the given user.
    async fn record_event(
        &self,
        telegram_id: i64,
        event_type: &str,
        event_data: serde_json::Value,
    ) -> Result<()>;
}

/// Apply `update` to `profile` in place, without touching timestamps.
/// Backends refresh `updated_at` themselves.
pub(crate) fn apply_update(profile: &mut Profile, update: ProfileUpdate) {
    if let Some(first_name) = update.first_name {
        profile.first_name = first_name;
    }
    if let Some(last_name) = update.last_name {
        profile.last_name = last_name;
    }
    if let Some(username) = update.username {
        profile.username = username;
    }
    if let Some(language_code) = update.language_code {
        profile.language_code = language_code;
    }
    if let Some(is_premium) = update.is_premium {
        profile.is_premium = is_premium;
    }
    if let Some(photo_url) = update.photo_url {
        profile.photo_url = photo_url;
    }
    if let Some(onboarding_completed) = update.onboarding_completed {
        profile.onboarding_completed = onboarding_completed;
    }
    if let Some(preferred_time_morning) = update.preferred_time_morning {
        profile.preferred_time_morning = preferred_time_morning;
    }
    if let Some(preferred_time_evening) = update.preferred_time_evening {
        profile.preferred_time_evening = preferred_time_evening;
    }
    if let Some(goals) = update.goals {
        profile.goals = goals;
    }
    if let Some(current_mood) = update.current_mood {
        profile.current_mood = current_mood;
    }
}
