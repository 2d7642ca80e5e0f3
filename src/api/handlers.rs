use axum::{
    extract::{Extension, State},
    response::IntoResponse,
    Json,
};
use serde_json::json;
use tracing::{info, warn};

use crate::api::middleware::CurrentUser;
use crate::api::AppState;
use crate::error::{AppError, Result};
use crate::storage::EVENT_USER_REGISTERED;
use crate::types::{ApiResponse, AuthRequest, NewProfile, Profile, ProfilePatch, ProfileUpdate};

/// Liveness probe
pub async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::success(json!({ "status": "ok" })))
}

/// `POST /api/auth/telegram`: sign a client in.
///
/// Validates the init data from the request body, then upserts the profile
/// row: first sight of a Telegram id registers it (default fields, referral
/// source from the start parameter, a `user_registered` event); later
/// sign-ins refresh the Telegram-derived fields.
pub async fn authenticate(
    State(state): State<AppState>,
    Json(request): Json<AuthRequest>,
) -> Result<Json<ApiResponse<Profile>>> {
    if request.init_data.is_empty() {
        return Err(AppError::Validation("Missing init_data".to_string()));
    }

    let identity = state.verifier.validate(&request.init_data)?;
    let user = identity
        .user
        .ok_or_else(|| AppError::Unauthorized("Init data carries no user".to_string()))?;

    // The start parameter may arrive either inside the signed payload or as
    // a separate body field; the signed value wins.
    let start_param = identity.start_param.or(request.start_param);

    let profile = match state.store.fetch(user.id).await? {
        Some(_) => state
            .store
            .update(user.id, ProfileUpdate::from_telegram_user(&user))
            .await?
            .ok_or_else(|| AppError::Internal("Profile vanished during sign-in".to_string()))?,
        None => {
            let profile = state
                .store
                .insert(NewProfile::from_telegram_user(&user, start_param.clone()))
                .await?;
            info!(telegram_id = user.id, "registered new profile");

            // Analytics only; a failed event write must not fail the signup.
            if let Err(e) = state
                .store
                .record_event(
                    user.id,
                    EVENT_USER_REGISTERED,
                    json!({ "referral_source": start_param }),
                )
                .await
            {
                warn!("Failed to record registration event: {}", e);
            }

            profile
        }
    };

    Ok(Json(ApiResponse::success(profile)))
}

/// `GET /api/user/profile`: the caller's profile, or 404.
pub async fn get_profile(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> Result<Json<ApiResponse<Profile>>> {
    let profile = state
        .store
        .fetch(user.id)
        .await?
        .ok_or_else(|| AppError::NotFound("Profile not found".to_string()))?;

    Ok(Json(ApiResponse::success(profile)))
}

/// `PATCH /api/user/profile`: update whitelisted profile fields.
///
/// Unrecognized body keys are ignored; a request that touches none of the
/// recognized fields is a 400.
pub async fn update_profile(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Json(patch): Json<ProfilePatch>,
) -> Result<Json<ApiResponse<Profile>>> {
    if patch.is_empty() {
        return Err(AppError::Validation(
            "No valid fields to update".to_string(),
        ));
    }

    let profile = state
        .store
        .update(user.id, patch.into_update())
        .await?
        .ok_or_else(|| AppError::NotFound("Profile not found".to_string()))?;

    Ok(Json(ApiResponse::success(profile)))
}
