use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::TelegramUser;

/// A stored AuraSync user profile, keyed by Telegram id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    /// Telegram user id (primary key)
    pub telegram_id: i64,

    /// First name, refreshed from init data on every sign-in
    pub first_name: String,

    /// Last name, if set
    pub last_name: Option<String>,

    /// Telegram username, if set
    pub username: Option<String>,

    /// IETF language tag of the user's client
    pub language_code: Option<String>,

    /// Whether the user has Telegram Premium
    pub is_premium: bool,

    /// Profile photo URL
    pub photo_url: Option<String>,

    /// Wellness credits balance
    pub credits: i64,

    /// Deep-link start parameter seen at registration, if any
    pub referral_source: Option<String>,

    /// Whether the onboarding flow has been completed
    pub onboarding_completed: bool,

    /// Preferred morning check-in time ("HH:MM")
    pub preferred_time_morning: Option<String>,

    /// Preferred evening check-in time ("HH:MM")
    pub preferred_time_evening: Option<String>,

    /// Wellness goals selected during onboarding
    pub goals: Vec<String>,

    /// Most recently logged mood
    pub current_mood: Option<String>,

    /// Row creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last modification timestamp
    pub updated_at: DateTime<Utc>,
}

/// Fields for a freshly registered profile.
#[derive(Debug, Clone)]
pub struct NewProfile {
    pub telegram_id: i64,
    pub first_name: String,
    pub last_name: Option<String>,
    pub username: Option<String>,
    pub language_code: Option<String>,
    pub is_premium: bool,
    pub photo_url: Option<String>,
    pub referral_source: Option<String>,
}

impl NewProfile {
    /// Build registration fields from an authenticated Telegram user.
    pub fn from_telegram_user(user: &TelegramUser, referral_source: Option<String>) -> Self {
        Self {
            telegram_id: user.id,
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            username: user.username.clone(),
            language_code: user.language_code.clone(),
            is_premium: user.is_premium.unwrap_or(false),
            photo_url: user.photo_url.clone(),
            referral_source,
        }
    }
}

/// Partial update of a profile row. `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<Option<String>>,
    pub username: Option<Option<String>>,
    pub language_code: Option<Option<String>>,
    pub is_premium: Option<bool>,
    pub photo_url: Option<Option<String>>,
    pub onboarding_completed: Option<bool>,
    pub preferred_time_morning: Option<Option<String>>,
    pub preferred_time_evening: Option<Option<String>>,
    pub goals: Option<Vec<String>>,
    pub current_mood: Option<Option<String>>,
}

impl ProfileUpdate {
    /// Whether any field would actually change.
    pub fn is_empty(&self) -> bool {
        self.first_name.is_none()
            && self.last_name.is_none()
            && self.username.is_none()
            && self.language_code.is_none()
            && self.is_premium.is_none()
            && self.photo_url.is_none()
            && self.onboarding_completed.is_none()
            && self.preferred_time_morning.is_none()
            && self.preferred_time_evening.is_none()
            && self.goals.is_none()
            && self.current_mood.is_none()
    }

    /// Telegram-derived fields refreshed on every sign-in.
    pub fn from_telegram_user(user: &TelegramUser) -> Self {
        Self {
            first_name: Some(user.first_name.clone()),
            last_name: Some(user.last_name.clone()),
            username: Some(user.username.clone()),
            language_code: Some(user.language_code.clone()),
            is_premium: Some(user.is_premium.unwrap_or(false)),
            photo_url: Some(user.photo_url.clone()),
            ..Self::default()
        }
    }
}

/// Request body for `POST /api/auth/telegram`.
#[derive(Debug, Deserialize)]
pub struct AuthRequest {
    /// Raw init-data string from the Telegram WebApp host
    pub init_data: String,
    /// Deep-link start parameter forwarded by the client
    pub start_param: Option<String>,
}

/// Distinguishes a key that is absent from one set to an explicit `null`,
/// so a PATCH can clear a nullable field.
mod double_option {
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
    where
        T: Deserialize<'de>,
        D: Deserializer<'de>,
    {
        Deserialize::deserialize(deserializer).map(Some)
    }
}

/// Request body for `PATCH /api/user/profile`.
///
/// Only the whitelisted fields below are recognized; anything else in the
/// body is ignored rather than rejected. For the nullable fields an explicit
/// `null` clears the stored value, while leaving the key out leaves it alone.
#[derive(Debug, Default, Deserialize)]
pub struct ProfilePatch {
    pub onboarding_completed: Option<bool>,
    #[serde(default, deserialize_with = "double_option::deserialize")]
    pub preferred_time_morning: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option::deserialize")]
    pub preferred_time_evening: Option<Option<String>>,
    pub goals: Option<Vec<String>>,
    #[serde(default, deserialize_with = "double_option::deserialize")]
    pub current_mood: Option<Option<String>>,
}

impl ProfilePatch {
    pub fn is_empty(&self) -> bool {
        self.onboarding_completed.is_none()
            && self.preferred_time_morning.is_none()
            && self.preferred_time_evening.is_none()
            && self.goals.is_none()
            && self.current_mood.is_none()
    }

    pub fn into_update(self) -> ProfileUpdate {
        ProfileUpdate {
            onboarding_completed: self.onboarding_completed,
            preferred_time_morning: self.preferred_time_morning,
            preferred_time_evening: self.preferred_time_evening,
            goals: self.goals,
            current_mood: self.current_mood,
            ..ProfileUpdate::default()
        }
    }
}

/// Standard JSON envelope for all API responses.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    /// Success status
    pub success: bool,

    /// Response data
    pub data: Option<T>,

    /// Error message if success is false
    pub error: Option<String>,

    /// Response timestamp
    pub timestamp: DateTime<Utc>,
}

impl<T> ApiResponse<T> {
    /// Create a successful response
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            timestamp: Utc::now(),
        }
    }

    /// Create an error response
    pub fn error(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
            timestamp: Utc::now(),
        }
    }
}
