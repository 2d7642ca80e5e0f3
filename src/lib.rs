//! AuraSync Backend
//!
//! Backend service for the AuraSync Telegram Mini-App. The client runs inside
//! Telegram and proves its identity by forwarding the signed init-data string
//! its host hands it; this service verifies that signature and serves the
//! user's profile over a small HTTP API.
//!
//! # Architecture
//!
//! * **Auth layer**: HMAC-SHA256 verification of Telegram WebApp init data,
//!   the single trust boundary of the service.
//! * **API layer**: axum router exposing sign-in and profile endpoints.
//! * **Storage layer**: pluggable single-key profile store (SQLite or
//!   in-memory) behind the `ProfileStore` trait.

/// HTTP API: router, handlers, and the authentication middleware.
pub mod api;

/// Telegram init-data verification.
pub mod auth;

/// Service configuration loaded from TOML and the environment.
pub mod config;

/// Error types for the service.
pub mod error;

/// Profile persistence backends.
pub mod storage;

/// Shared data types: profiles, request/response DTOs, the API envelope.
pub mod types;
