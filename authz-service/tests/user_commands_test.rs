mod common;

use authz_service::commands::{Command, CommandOutcome};
use axum::http::StatusCode;
use common::TestApp;
use serde_json::json;
use service_core::error::AppError;
use uuid::Uuid;

#[tokio::test]
async fn update_user_ignores_blank_fields() {
    let app = TestApp::new().await;
    let user = app.create_user("ada@example.com", "Ada", "Lovelace").await;

    let outcome = app
        .state
        .bus
        .handle(Command::UpdateUser {
            first_name: Some("Augusta".to_string()),
            last_name: Some(String::new()),
            phone_number: Some("+44 20 7946 0000".to_string()),
            actor: user.user_id,
        })
        .await
        .unwrap();

    let CommandOutcome::User(updated) = outcome else {
        panic!("expected a user");
    };
    assert_eq!(updated.first_name, "Augusta");
    assert_eq!(updated.last_name, "Lovelace");
    assert_eq!(updated.phone_number.as_deref(), Some("+44 20 7946 0000"));
}

#[tokio::test]
async fn delete_user_deactivates() {
    let app = TestApp::new().await;
    let user = app.create_user("ada@example.com", "Ada", "Lovelace").await;
    let token = app.token_for(user.user_id);

    let (status, _) = app
        .request("DELETE", "/api/v1/users/me", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let stored = app
        .store
        .users()
        .await
        .into_iter()
        .find(|u| u.user_id == user.user_id)
        .unwrap();
    assert!(!stored.is_active);
}

#[tokio::test]
async fn unknown_user_is_not_found() {
    let app = TestApp::new().await;

    let err = app
        .state
        .bus
        .handle(Command::DeleteUser {
            actor: Uuid::new_v4(),
        })
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn avatar_round_trip_over_http() {
    let app = TestApp::new().await;
    let user = app.create_user("ada@example.com", "Ada", "Lovelace").await;
    let token = app.token_for(user.user_id);

    let (status, body) = app
        .request(
            "PUT",
            "/api/v1/users/me/avatar",
            Some(&token),
            Some(json!({ "avatar_url": "https://cdn.example.com/ada.png" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["previous"], serde_json::Value::Null);

    let (status, body) = app
        .request("DELETE", "/api/v1/users/me/avatar", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["previous"], "https://cdn.example.com/ada.png");

    let (status, _) = app
        .request(
            "PUT",
            "/api/v1/users/me/avatar",
            Some(&token),
            Some(json!({ "avatar_url": "not a url" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}
