use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use url::form_urlencoded;

type HmacSha256 = Hmac<Sha256>;

/// Domain-separation constant used to derive the signing key from the bot token,
/// fixed by the Telegram WebApp protocol.
const KEY_DOMAIN: &[u8] = b"WebAppData";

/// Default replay window for `auth_date`, in seconds (24 hours).
pub const DEFAULT_MAX_AGE_SECS: i64 = 86_400;

/// Rejection reasons for init-data validation.
///
/// The three variants are distinguishable so callers can map them to the
/// right HTTP status: a malformed payload is a client formatting error,
/// the other two are authentication failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InitDataError {
    #[error("malformed init data: {0}")]
    MalformedPayload(String),

    #[error("init data signature mismatch")]
    SignatureMismatch,

    #[error("init data expired")]
    Expired,
}

/// Telegram user profile embedded in init data.
///
/// Unknown fields are ignored on deserialization; Telegram extends this
/// object over time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelegramUser {
    /// Telegram user id
    pub id: i64,
    /// First name; Telegram always sends one, but tolerate its absence
    #[serde(default)]
    pub first_name: String,
    /// Last name, if set
    pub last_name: Option<String>,
    /// Username, if set
    pub username: Option<String>,
    /// IETF language tag of the user's client
    pub language_code: Option<String>,
    /// Whether the user has Telegram Premium
    pub is_premium: Option<bool>,
    /// Profile photo URL
    pub photo_url: Option<String>,
}

/// Identity claims extracted from init data whose signature has been verified.
///
/// A value of this type is only ever constructed after the HMAC check and the
/// replay-window check both pass. It is a transient, request-scoped value;
/// callers translate it into a stored profile row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VerifiedIdentity {
    /// Unique query id, present when the app was launched from an inline query
    pub query_id: Option<String>,
    /// The authenticated user, if the payload carried one
    pub user: Option<TelegramUser>,
    /// Unix timestamp (seconds) at which the payload was signed
    pub auth_date: i64,
    /// The hex-encoded signature that was verified
    pub hash: String,
    /// Deep-link start parameter
    pub start_param: Option<String>,
}

/// Fields read out of init data *without* any signature check.
///
/// Deliberately a separate type from [`VerifiedIdentity`]: an unverified
/// parse must never be usable where an authenticated identity is required.
/// Suitable only for display purposes on trusted-input paths.
#[derive(Debug, Clone)]
pub struct UnverifiedInitData {
    pub query_id: Option<String>,
    pub user: Option<TelegramUser>,
    pub auth_date: i64,
    pub hash: String,
}

/// Validates Telegram WebApp init data against a bot token.
///
/// The verifier is pure: it performs no I/O and reads no ambient state. The
/// wall clock enters only through [`InitDataVerifier::validate`]; tests use
/// [`InitDataVerifier::validate_at`] with an explicit timestamp.
#[derive(Clone)]
pub struct InitDataVerifier {
    bot_token: String,
    max_age_secs: i64,
}

impl InitDataVerifier {
    /// Create a verifier for the given bot token with the default 24-hour
    /// replay window.
    pub fn new(bot_token: impl Into<String>) -> Self {
        Self {
            bot_token: bot_token.into(),
            max_age_secs: DEFAULT_MAX_AGE_SECS,
        }
    }

    /// Override the replay window.
    pub fn with_max_age(mut self, max_age_secs: i64) -> Self {
        self.max_age_secs = max_age_secs;
        self
    }

    /// Validate `payload` against the current wall clock.
    pub fn validate(&self, payload: &str) -> Result<VerifiedIdentity, InitDataError> {
        self.validate_at(payload, chrono::Utc::now().timestamp())
    }

    /// Validate `payload` as of the given Unix timestamp.
    ///
    /// Steps, in order:
    /// 1. parse the payload as a URL-encoded query string and extract `hash`;
    /// 2. recompute the signature over the canonical data-check string and
    ///    compare it to `hash`;
    /// 3. enforce the replay window on `auth_date` (a missing `auth_date`
    ///    reads as 0; future-dated payloads are accepted);
    /// 4. deserialize the embedded `user` object, if present.
    ///
    /// The signature comparison is plain string equality over lowercase hex,
    /// matching the protocol reference behavior.
    pub fn validate_at(&self, payload: &str, now: i64) -> Result<VerifiedIdentity, InitDataError> {
        let mut pairs: Vec<(String, String)> =
            form_urlencoded::parse(payload.as_bytes()).into_owned().collect();

        let hash = first_value(&pairs, "hash")
            .map(str::to_owned)
            .ok_or_else(|| InitDataError::MalformedPayload("missing hash field".to_string()))?;
        pairs.retain(|(key, _)| key != "hash");

        let expected = signature_hex(&self.bot_token, &canonical_data_string(&mut pairs));
        if expected != hash {
            return Err(InitDataError::SignatureMismatch);
        }

        let auth_date = first_value(&pairs, "auth_date")
            .and_then(|raw| raw.parse::<i64>().ok())
            .unwrap_or(0);
        if now - auth_date > self.max_age_secs {
            return Err(InitDataError::Expired);
        }

        let user = parse_user(&pairs)?;

        Ok(VerifiedIdentity {
            query_id: first_value(&pairs, "query_id").map(str::to_owned),
            user,
            auth_date,
            hash,
            start_param: first_value(&pairs, "start_param").map(str::to_owned),
        })
    }
}

/// Parse init data without checking its signature.
///
/// Performs only the query-string and user-JSON parsing steps. Returns `None`
/// when the user object fails to deserialize. Must never gate any
/// state-mutating action.
pub fn parse_unverified(payload: &str) -> Option<UnverifiedInitData> {
    let pairs: Vec<(String, String)> =
        form_urlencoded::parse(payload.as_bytes()).into_owned().collect();

    let user = parse_user(&pairs).ok()?;

    Some(UnverifiedInitData {
        query_id: first_value(&pairs, "query_id").map(str::to_owned),
        user,
        auth_date: first_value(&pairs, "auth_date")
            .and_then(|raw| raw.parse::<i64>().ok())
            .unwrap_or(0),
        hash: first_value(&pairs, "hash").unwrap_or_default().to_owned(),
    })
}

/// First value for `key`, if any. Telegram never sends duplicate keys, but
/// lookups stay well-defined if a client does.
fn first_value<'a>(pairs: &'a [(String, String)], key: &str) -> Option<&'a str> {
    pairs
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

/// Build the canonical data-check string: pairs sorted by key in ascending
/// byte order, each rendered as `key=value`, joined with `\n`.
///
/// The sort is stable, so duplicate keys keep their payload order. This
/// canonicalization is what makes validation independent of the key order the
/// client happened to encode.
fn canonical_data_string(pairs: &mut [(String, String)]) -> String {
    pairs.sort_by(|a, b| a.0.cmp(&b.0));
    pairs
        .iter()
        .map(|(key, value)| format!("{}={}", key, value))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Compute the expected signature: HMAC-SHA256 of the canonical string under
/// a key derived as HMAC-SHA256 of the bot token keyed by `"WebAppData"`.
fn signature_hex(bot_token: &str, canonical: &str) -> String {
    let mut key_mac =
        HmacSha256::new_from_slice(KEY_DOMAIN).expect("HMAC accepts keys of any length");
    key_mac.update(bot_token.as_bytes());
    let derived_key = key_mac.finalize().into_bytes();

    let mut mac =
        HmacSha256::new_from_slice(&derived_key).expect("HMAC accepts keys of any length");
    mac.update(canonical.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Test support: produce a correctly signed payload for the given pairs,
/// percent-encoded the way a WebApp client encodes it.
#[cfg(test)]
pub(crate) fn sign_payload(bot_token: &str, pairs: &[(&str, &str)]) -> String {
    let mut owned: Vec<(String, String)> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    let hash = signature_hex(bot_token, &canonical_data_string(&mut owned));

    let mut serializer = form_urlencoded::Serializer::new(String::new());
    for (key, value) in pairs {
        serializer.append_pair(key, value);
    }
    serializer.append_pair("hash", &hash);
    serializer.finish()
}

fn parse_user(pairs: &[(String, String)]) -> Result<Option<TelegramUser>, InitDataError> {
    match first_value(pairs, "user") {
        Some(raw) => serde_json::from_str(raw)
            .map(Some)
            .map_err(|e| InitDataError::MalformedPayload(format!("invalid user object: {}", e))),
        None => Ok(None),
    }
}
