use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;

use axum::{
    extract::Json,
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{debug, error, info};

use crate::auth::InitDataVerifier;
use crate::config::AppConfig;
use crate::error::{AppError, Result};
use crate::storage::ProfileStore;
use crate::types::ApiResponse;

mod handlers;
mod middleware;

pub use middleware::INIT_DATA_HEADER;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Profile store backend
    store: Arc<dyn ProfileStore>,

    /// Init-data verifier holding the bot token
    verifier: InitDataVerifier,
}

impl AppState {
    pub fn new(store: Arc<dyn ProfileStore>, verifier: InitDataVerifier) -> Self {
        Self { store, verifier }
    }
}

/// Build the application router.
///
/// Separate from [`start_api_server`] so tests can drive the full router
/// in-process with `tower::ServiceExt::oneshot`.
pub fn router(state: AppState, config: &AppConfig) -> Router {
    let cors = cors_layer(config);

    Router::new()
        // Profile endpoints sit behind the init-data authentication layer.
        .route(
            "/api/user/profile",
            get(handlers::get_profile).patch(handlers::update_profile),
        )
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::require_identity,
        ))
        // The auth endpoint validates its payload itself, from the body.
        .route("/api/auth/telegram", post(handlers::authenticate))
        .route("/health", get(handlers::health_check))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

fn cors_layer(config: &AppConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PATCH])
        .allow_headers([
            header::CONTENT_TYPE,
            header::HeaderName::from_static(INIT_DATA_HEADER),
        ]);

    let origins: Vec<HeaderValue> = config
        .api
        .allowed_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    if origins.is_empty() {
        // Local development default; production deployments list their
        // Mini-App origins explicitly.
        cors.allow_origin(Any)
    } else {
        cors.allow_origin(AllowOrigin::list(origins))
    }
}

/// Start the API server
pub async fn start_api_server(
    config: AppConfig,
    store: Arc<dyn ProfileStore>,
    bot_token: String,
) -> Result<()> {
    let addr = SocketAddr::from_str(&config.api.listen_addr)
        .map_err(|e| AppError::Configuration(format!("Invalid listen address: {}", e)))?;

    let verifier =
        InitDataVerifier::new(bot_token).with_max_age(config.auth.max_age_secs);
    let state = AppState::new(store, verifier);
    let app = router(state, &config);

    info!("Starting AuraSync API server on {}", addr);
    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .await
        .map_err(|e| AppError::Internal(format!("Server error: {}", e)))?;

    Ok(())
}

/// Map application errors to HTTP responses.
///
/// Client-side failures carry their message through; anything server-side is
/// logged in full and collapsed to a generic message so internals never
/// reach the caller.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Authentication(err) => (StatusCode::UNAUTHORIZED, err.to_string()),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            _ => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
        };

        if status.as_u16() >= 500 {
            error!("Server error: {}", self);
        } else {
            debug!("Client error: {}", self);
        }

        let body = Json(ApiResponse::<()>::error(message));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests;
