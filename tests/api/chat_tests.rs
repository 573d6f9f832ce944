//! Chat API Tests

use axum::http::StatusCode;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

use crate::common::TestApp;

#[tokio::test]
async fn test_requests_without_token_are_rejected() {
    let app = TestApp::new();

    let response = app.server.get("/api/v1/chats").await;
    response.assert_status(StatusCode::UNAUTHORIZED);

    let response = app
        .server
        .get("/api/v1/chats")
        .authorization_bearer("not-a-token")
        .await;
    response.assert_status(StatusCode::UNAUTHORIZED);
    assert_eq!(response.json::<Value>()["code"], 10003);
}

#[tokio::test]
async fn test_direct_chat_is_shared_and_idempotent() {
    let app = TestApp::new();
    let (alice, bob) = (app.user(), app.user());

    let first = app
        .server
        .post("/api/v1/chats/direct")
        .authorization_bearer(&alice.token)
        .json(&json!({ "username": bob.username }))
        .await;
    first.assert_status(StatusCode::CREATED);
    let first: Value = first.json();
    assert_eq!(first["type"], "direct");

    let second: Value = app
        .server
        .post("/api/v1/chats/direct")
        .authorization_bearer(&bob.token)
        .json(&json!({ "username": alice.username }))
        .await
        .json();
    assert_eq!(first["chat_id"], second["chat_id"]);

    for user in [&alice, &bob] {
        let chats: Vec<Value> = app
            .server
            .get("/api/v1/chats")
            .authorization_bearer(&user.token)
            .await
            .json();
        assert_eq!(chats.len(), 1);
        assert_eq!(chats[0]["chat_id"], first["chat_id"]);
    }
}

#[tokio::test]
async fn test_direct_chat_errors() {
    let app = TestApp::new();
    let alice = app.user();

    app.server
        .post("/api/v1/chats/direct")
        .authorization_bearer(&alice.token)
        .json(&json!({ "username": alice.username }))
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    app.server
        .post("/api/v1/chats/direct")
        .authorization_bearer(&alice.token)
        .json(&json!({ "username": "nobody_here" }))
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_group_membership_rules() {
    let app = TestApp::new();
    let (alice, bob, carol, dave) = (app.user(), app.user(), app.user(), app.user());

    let group: Value = app
        .server
        .post("/api/v1/chats/group")
        .authorization_bearer(&alice.token)
        .json(&json!({ "name": "team", "usernames": [bob.username] }))
        .await
        .json();
    assert_eq!(group["type"], "group");
    assert_eq!(group["name"], "team");
    let members_path = format!("/api/v1/chats/{}/members", group["chat_id"].as_str().unwrap());

    // outsiders cannot add people
    app.server
        .post(&members_path)
        .authorization_bearer(&carol.token)
        .json(&json!({ "user_id": dave.id }))
        .await
        .assert_status(StatusCode::FORBIDDEN);

    app.server
        .post(&members_path)
        .authorization_bearer(&bob.token)
        .json(&json!({ "user_id": carol.id }))
        .await
        .assert_status_ok();

    app.server
        .post(&members_path)
        .authorization_bearer(&alice.token)
        .json(&json!({ "user_id": carol.id }))
        .await
        .assert_status(StatusCode::CONFLICT);

    let carols: Vec<Value> = app
        .server
        .get("/api/v1/chats")
        .authorization_bearer(&carol.token)
        .await
        .json();
    assert_eq!(carols.len(), 1);
}

#[tokio::test]
async fn test_members_cannot_be_added_to_direct_chats() {
    let app = TestApp::new();
    let (alice, bob, carol) = (app.user(), app.user(), app.user());

    let direct: Value = app
        .server
        .post("/api/v1/chats/direct")
        .authorization_bearer(&alice.token)
        .json(&json!({ "username": bob.username }))
        .await
        .json();

    app.server
        .post(&format!("/api/v1/chats/{}/members", direct["chat_id"].as_str().unwrap()))
        .authorization_bearer(&alice.token)
        .json(&json!({ "user_id": carol.id }))
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_group_requires_another_member() {
    let app = TestApp::new();
    let alice = app.user();

    app.server
        .post("/api/v1/chats/group")
        .authorization_bearer(&alice.token)
        .json(&json!({ "name": "solo", "usernames": [alice.username] }))
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    app.server
        .post("/api/v1/chats/group")
        .authorization_bearer(&alice.token)
        .json(&json!({ "name": "empty", "usernames": [] }))
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}
