//! Authentication API Tests

use axum::http::StatusCode;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

use crate::common::TestApp;

fn registration(username: &str, password: &str) -> Value {
    json!({
        "username": username,
        "first_name": "Ada",
        "last_name": "Lovelace",
        "password": password,
        "confirm_password": password,
        "gender": "female",
        "date_of_birth": "1815-12-10",
        "email": "ada@example.com",
    })
}

#[tokio::test]
async fn test_register_then_login_grants_api_access() {
    let app = TestApp::new();

    let response = app
        .server
        .post("/api/v1/auth/register")
        .json(&registration("ada_l", "analytical engine"))
        .await;
    response.assert_status(StatusCode::CREATED);
    let body: Value = response.json();
    assert_eq!(body["user"]["username"], "ada_l");
    assert_eq!(body["user"]["gender"], "female");
    assert_eq!(body["token_type"], "Bearer");

    let chats = app
        .server
        .get("/api/v1/chats")
        .authorization_bearer(body["access_token"].as_str().unwrap())
        .await;
    chats.assert_status_ok();

    let login = app
        .server
        .post("/api/v1/auth/login")
        .json(&json!({ "username": "ada_l", "password": "analytical engine" }))
        .await;
    login.assert_status_ok();
    let token: Value = login.json();
    assert_eq!(token["expires_in"], 15 * 60);

    app.server
        .get("/api/v1/chats")
        .authorization_bearer(token["access_token"].as_str().unwrap())
        .await
        .assert_status_ok();
}

#[tokio::test]
async fn test_registered_user_is_reachable_by_username() {
    let app = TestApp::new();
    let alice = app.user();

    let registered: Value = app
        .server
        .post("/api/v1/auth/register")
        .json(&registration("charles_b", "difference engine"))
        .await
        .json();

    let chat = app
        .server
        .post("/api/v1/chats/direct")
        .authorization_bearer(&alice.token)
        .json(&json!({ "username": "charles_b" }))
        .await;
    chat.assert_status(StatusCode::CREATED);

    let chats: Vec<Value> = app
        .server
        .get("/api/v1/chats")
        .authorization_bearer(registered["access_token"].as_str().unwrap())
        .await
        .json();
    assert_eq!(chats.len(), 1);
}

#[tokio::test]
async fn test_duplicate_username_conflicts() {
    let app = TestApp::new();
    let existing = app.user();

    let response = app
        .server
        .post("/api/v1/auth/register")
        .json(&registration(&existing.username, "password-one"))
        .await;
    response.assert_status(StatusCode::CONFLICT);
    assert_eq!(response.json::<Value>()["code"], 10005);
}

#[tokio::test]
async fn test_invalid_forms_are_rejected() {
    let app = TestApp::new();

    let mut mismatch = registration("ada_l", "analytical engine");
    mismatch["confirm_password"] = json!("something else");
    let response = app.server.post("/api/v1/auth/register").json(&mismatch).await;
    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(response.json::<Value>()["code"], 10007);

    let mut bad_gender = registration("ada_l", "analytical engine");
    bad_gender["gender"] = json!("robot");
    app.server
        .post("/api/v1/auth/register")
        .json(&bad_gender)
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    let mut bad_date = registration("ada_l", "analytical engine");
    bad_date["date_of_birth"] = json!("10.12.1815");
    app.server
        .post("/api/v1/auth/register")
        .json(&bad_date)
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    app.server
        .post("/api/v1/auth/login")
        .json(&json!({ "username": "ada_l", "password": "analytical engine" }))
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_wrong_password_is_unauthorized() {
    let app = TestApp::new();
    app.server
        .post("/api/v1/auth/register")
        .json(&registration("ada_l", "analytical engine"))
        .await
        .assert_status(StatusCode::CREATED);

    let response = app
        .server
        .post("/api/v1/auth/login")
        .json(&json!({ "username": "ada_l", "password": "wrong password" }))
        .await;
    response.assert_status(StatusCode::UNAUTHORIZED);
    assert_eq!(response.json::<Value>()["code"], 10003);
}
