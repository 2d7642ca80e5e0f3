use axum::{
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};
use tracing::debug;

use crate::api::AppState;
use crate::auth::TelegramUser;
use crate::error::AppError;

/// Header carrying the raw init-data string on authenticated endpoints.
pub const INIT_DATA_HEADER: &str = "x-telegram-init-data";

/// The authenticated caller, injected into request extensions once the
/// init-data signature has been verified.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub TelegramUser);

/// Authentication layer for profile endpoints.
///
/// Reads the init-data header, runs full signature verification, requires an
/// embedded user claim, and hands the verified user to the handler via
/// request extensions. Requests failing any step never reach a handler.
pub async fn require_identity<B>(
    State(state): State<AppState>,
    mut request: Request<B>,
    next: Next<B>,
) -> Result<Response, AppError> {
    let payload = request
        .headers()
        .get(INIT_DATA_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| AppError::Validation("Missing init data header".to_string()))?;

    let identity = state.verifier.validate(payload)?;
    let user = identity
        .user
        .ok_or_else(|| AppError::Unauthorized("Init data carries no user".to_string()))?;

    debug!(telegram_id = user.id, "authenticated request");
    request.extensions_mut().insert(CurrentUser(user));

    Ok(next.run(request).await)
}
