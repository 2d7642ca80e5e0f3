use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use crate::api::{router, AppState, INIT_DATA_HEADER};
use crate::auth::{sign_payload, InitDataVerifier};
use crate::config::AppConfig;
use crate::storage::MemoryProfileStore;

const BOT_TOKEN: &str = "123456:test-bot-token";

fn test_router() -> (Router, Arc<MemoryProfileStore>) {
    let store = Arc::new(MemoryProfileStore::new());
    let state = AppState::new(store.clone(), InitDataVerifier::new(BOT_TOKEN));
    (router(state, &AppConfig::default()), store)
}

/// A signed payload for the given user JSON, fresh as of now.
fn fresh_init_data(user_json: &str, start_param: Option<&str>) -> String {
    let auth_date = chrono::Utc::now().timestamp().to_string();
    let mut pairs = vec![("auth_date", auth_date.as_str()), ("user", user_json)];
    if let Some(param) = start_param {
        pairs.push(("start_param", param));
    }
    sign_payload(BOT_TOKEN, &pairs)
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn auth_body(init_data: &str) -> Body {
    Body::from(json!({ "init_data": init_data }).to_string())
}

#[tokio::test]
async fn health_is_public() {
    let (app, _) = test_router();
    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn auth_registers_then_refreshes() {
    let (app, store) = test_router();

    let init_data = fresh_init_data(
        r#"{"id":42,"first_name":"Ada","username":"ada"}"#,
        Some("friend_invite"),
    );
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/auth/telegram")
                .header("content-type", "application/json")
                .body(auth_body(&init_data))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["data"]["telegram_id"], json!(42));
    assert_eq!(body["data"]["referral_source"], json!("friend_invite"));
    assert_eq!(body["data"]["credits"], json!(0));

    // Registration event was recorded once.
    let events = store.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_type, "user_registered");

    // Second sign-in with a changed name refreshes the row, no new event.
    let refreshed = fresh_init_data(r#"{"id":42,"first_name":"Ada L."}"#, None);
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/auth/telegram")
                .header("content-type", "application/json")
                .body(auth_body(&refreshed))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["data"]["first_name"], json!("Ada L."));
    // Referral source from registration survives the refresh.
    assert_eq!(body["data"]["referral_source"], json!("friend_invite"));
    assert_eq!(store.events().len(), 1);
}

#[tokio::test]
async fn auth_rejects_forged_signature() {
    let (app, _) = test_router();

    let mut init_data = fresh_init_data(r#"{"id":42,"first_name":"Ada"}"#, None);
    // Flip the last hex digit of the hash.
    let flipped = if init_data.ends_with('0') { '1' } else { '0' };
    init_data.pop();
    init_data.push(flipped);

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/auth/telegram")
                .header("content-type", "application/json")
                .body(auth_body(&init_data))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn auth_rejects_payload_without_user() {
    let (app, _) = test_router();
    let auth_date = chrono::Utc::now().timestamp().to_string();
    let init_data = sign_payload(BOT_TOKEN, &[("auth_date", auth_date.as_str())]);

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/auth/telegram")
                .header("content-type", "application/json")
                .body(auth_body(&init_data))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn auth_rejects_stale_payload() {
    let (app, _) = test_router();
    let stale = (chrono::Utc::now().timestamp() - 100_000).to_string();
    let init_data = sign_payload(
        BOT_TOKEN,
        &[("auth_date", stale.as_str()), ("user", r#"{"id":1,"first_name":"A"}"#)],
    );

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/auth/telegram")
                .header("content-type", "application/json")
                .body(auth_body(&init_data))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn profile_requires_the_header() {
    let (app, _) = test_router();
    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/user/profile")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn profile_of_unregistered_user_is_not_found() {
    let (app, _) = test_router();
    let init_data = fresh_init_data(r#"{"id":7,"first_name":"New"}"#, None);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/user/profile")
                .header(INIT_DATA_HEADER, init_data.as_str())
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn patch_updates_whitelisted_fields() {
    let (app, _) = test_router();
    let init_data = fresh_init_data(r#"{"id":9,"first_name":"Joan"}"#, None);

    // Register first.
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/auth/telegram")
                .header("content-type", "application/json")
                .body(auth_body(&init_data))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("PATCH")
                .uri("/api/user/profile")
                .header(INIT_DATA_HEADER, init_data.as_str())
                .header("content-type", "application/json")
                .body(Body::from(
                    json!({
                        "onboarding_completed": true,
                        "goals": ["sleep"],
                        "credits": 1_000_000
                    })
                    .to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["data"]["onboarding_completed"], json!(true));
    assert_eq!(body["data"]["goals"], json!(["sleep"]));
    // `credits` is not whitelisted and must be untouched.
    assert_eq!(body["data"]["credits"], json!(0));
}

#[tokio::test]
async fn patch_null_clears_nullable_field() {
    let (app, _) = test_router();
    let init_data = fresh_init_data(r#"{"id":12,"first_name":"Mary"}"#, None);

    app.clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/auth/telegram")
                .header("content-type", "application/json")
                .body(auth_body(&init_data))
                .unwrap(),
        )
        .await
        .unwrap();

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("PATCH")
                .uri("/api/user/profile")
                .header(INIT_DATA_HEADER, init_data.as_str())
                .header("content-type", "application/json")
                .body(Body::from(json!({ "current_mood": "calm" }).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["data"]["current_mood"], json!("calm"));

    // An explicit null clears the field; an absent key would leave it alone.
    let response = app
        .oneshot(
            Request::builder()
                .method("PATCH")
                .uri("/api/user/profile")
                .header(INIT_DATA_HEADER, init_data.as_str())
                .header("content-type", "application/json")
                .body(Body::from(json!({ "current_mood": null }).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["data"]["current_mood"], json!(null));
}

#[tokio::test]
async fn patch_with_no_recognized_fields_is_bad_request() {
    let (app, _) = test_router();
    let init_data = fresh_init_data(r#"{"id":9,"first_name":"Joan"}"#, None);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/auth/telegram")
                .header("content-type", "application/json")
                .body(auth_body(&init_data))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(
            Request::builder()
                .method("PATCH")
                .uri("/api/user/profile")
                .header(INIT_DATA_HEADER, init_data.as_str())
                .header("content-type", "application/json")
                .body(Body::from(json!({ "credits": 99 }).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = body_json(response).await;
    assert_eq!(body["success"], json!(false));
}

#[tokio::test]
async fn get_profile_after_registration() {
    let (app, _) = test_router();
    let init_data = fresh_init_data(r#"{"id":11,"first_name":"Kay"}"#, None);

    app.clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/auth/telegram")
                .header("content-type", "application/json")
                .body(auth_body(&init_data))
                .unwrap(),
        )
        .await
        .unwrap();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/user/profile")
                .header(INIT_DATA_HEADER, init_data.as_str())
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["data"]["telegram_id"], json!(11));
    assert_eq!(body["data"]["first_name"], json!("Kay"));
}
