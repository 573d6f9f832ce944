//! Message API Tests

use axum::http::StatusCode;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

use chat_hub::config::{HubSettings, OverflowPolicy};
use chat_hub::presentation::websocket::ServerFrame;

use crate::common::{TestApp, TestUser};

async fn open_direct(app: &TestApp, from: &TestUser, to: &TestUser) -> String {
    let chat: Value = app
        .server
        .post("/api/v1/chats/direct")
        .authorization_bearer(&from.token)
        .json(&json!({ "username": to.username }))
        .await
        .json();
    chat["chat_id"].as_str().unwrap().to_string()
}

async fn send(app: &TestApp, user: &TestUser, chat_id: &str, content: &str) -> axum_test::TestResponse {
    app.server
        .post(&format!("/api/v1/chats/{chat_id}/messages"))
        .authorization_bearer(&user.token)
        .json(&json!({ "content": content }))
        .await
}

#[tokio::test]
async fn test_http_send_is_delivered_to_connected_members() {
    let app = TestApp::new();
    let (alice, bob) = (app.user(), app.user());
    let chat_id = open_direct(&app, &alice, &bob).await;
    let (_handle, mut outbox) = app.state.hub.connect(bob.id).await.unwrap();

    let response = send(&app, &alice, &chat_id, "hello").await;
    response.assert_status(StatusCode::CREATED);
    let body: Value = response.json();
    assert_eq!(body["content"], "hello");
    assert_eq!(body["sender_id"], alice.id.to_string());

    match outbox.try_recv() {
        Some(ServerFrame::MessageCreate(message)) => {
            assert_eq!(message.id, body["id"].as_i64().unwrap());
            assert_eq!(message.content, "hello");
        }
        other => panic!("expected MESSAGE_CREATE, got {:?}", other),
    }
}

#[tokio::test]
async fn test_non_member_cannot_send_or_read() {
    let app = TestApp::new();
    let (alice, bob, mallory) = (app.user(), app.user(), app.user());
    let chat_id = open_direct(&app, &alice, &bob).await;

    send(&app, &mallory, &chat_id, "hi")
        .await
        .assert_status(StatusCode::FORBIDDEN);
    assert_eq!(app.store.message_count(), 0);

    app.server
        .get(&format!("/api/v1/chats/{chat_id}/messages"))
        .authorization_bearer(&mallory.token)
        .await
        .assert_status(StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_invalid_content_is_rejected() {
    let app = TestApp::with_hub_settings(HubSettings {
        max_content_length: 10,
        overflow_policy: OverflowPolicy::Drop,
        ..HubSettings::default()
    });
    let (alice, bob) = (app.user(), app.user());
    let chat_id = open_direct(&app, &alice, &bob).await;

    send(&app, &alice, &chat_id, "")
        .await
        .assert_status(StatusCode::BAD_REQUEST);
    send(&app, &alice, &chat_id, "   ")
        .await
        .assert_status(StatusCode::BAD_REQUEST);
    send(&app, &alice, &chat_id, "far too long for this hub")
        .await
        .assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(app.store.message_count(), 0);
}

#[tokio::test]
async fn test_history_is_newest_first_and_paged() {
    let app = TestApp::new();
    let (alice, bob) = (app.user(), app.user());
    let chat_id = open_direct(&app, &alice, &bob).await;

    for i in 0..5 {
        send(&app, if i % 2 == 0 { &alice } else { &bob }, &chat_id, &format!("m{i}"))
            .await
            .assert_status(StatusCode::CREATED);
    }

    let page: Vec<Value> = app
        .server
        .get(&format!("/api/v1/chats/{chat_id}/messages"))
        .add_query_param("limit", 3)
        .authorization_bearer(&bob.token)
        .await
        .json();
    let contents: Vec<&str> = page.iter().map(|m| m["content"].as_str().unwrap()).collect();
    assert_eq!(contents, vec!["m4", "m3", "m2"]);

    let before = page[2]["id"].as_i64().unwrap();
    let older: Vec<Value> = app
        .server
        .get(&format!("/api/v1/chats/{chat_id}/messages"))
        .add_query_param("before", before)
        .authorization_bearer(&bob.token)
        .await
        .json();
    let contents: Vec<&str> = older.iter().map(|m| m["content"].as_str().unwrap()).collect();
    assert_eq!(contents, vec!["m1", "m0"]);
}

#[tokio::test]
async fn test_only_the_sender_can_delete() {
    let app = TestApp::new();
    let (alice, bob) = (app.user(), app.user());
    let chat_id = open_direct(&app, &alice, &bob).await;
    let message: Value = send(&app, &alice, &chat_id, "oops").await.json();
    let path = format!("/api/v1/messages/{}", message["id"]);

    app.server
        .delete(&path)
        .authorization_bearer(&bob.token)
        .await
        .assert_status(StatusCode::FORBIDDEN);

    app.server
        .delete(&path)
        .authorization_bearer(&alice.token)
        .await
        .assert_status_ok();

    app.server
        .delete(&path)
        .authorization_bearer(&alice.token)
        .await
        .assert_status(StatusCode::NOT_FOUND);

    let history: Vec<Value> = app
        .server
        .get(&format!("/api/v1/chats/{chat_id}/messages"))
        .authorization_bearer(&alice.token)
        .await
        .json();
    assert!(history.is_empty());
}

#[tokio::test]
async fn test_store_outage_is_reported_as_unavailable() {
    let app = TestApp::new();
    let (alice, bob) = (app.user(), app.user());
    let chat_id = open_direct(&app, &alice, &bob).await;

    app.store.set_available(false);
    send(&app, &alice, &chat_id, "anyone?")
        .await
        .assert_status(StatusCode::SERVICE_UNAVAILABLE);

    app.store.set_available(true);
    send(&app, &alice, &chat_id, "anyone?")
        .await
        .assert_status(StatusCode::CREATED);
    assert_eq!(app.store.message_count(), 1);
}
