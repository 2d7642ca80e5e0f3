//! Telegram Mini-App authentication.
//!
//! The only trust boundary in this service: a client proves who it is by
//! forwarding the signed init-data string its Telegram host handed it, and
//! [`InitDataVerifier`] checks that signature against the bot token before
//! any identity claim is believed.
//!
//! Two structurally distinct operations are exposed:
//!
//! * [`InitDataVerifier::validate`]: full verification, producing a
//!   [`VerifiedIdentity`]; the only path that may authorize anything.
//! * [`parse_unverified`]: parsing without verification, producing an
//!   [`UnverifiedInitData`]; display-only.

mod init_data;

pub use init_data::{
    parse_unverified, InitDataError, InitDataVerifier, TelegramUser, UnverifiedInitData,
    VerifiedIdentity, DEFAULT_MAX_AGE_SECS,
};

#[cfg(test)]
pub(crate) use init_data::sign_payload;
