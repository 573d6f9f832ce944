//! Live delivery scenarios
//!
//! Drive the hub the way sessions do, reading what each connection's
//! outbound queue receives.

use std::time::Duration;

use pretty_assertions::assert_eq;
use tokio::time::timeout;

use chat_hub::application::services::{ChatService, ChatServiceImpl};
use chat_hub::domain::{Chat, ChatId, ChatRepository, MessageDraft, UserId};
use chat_hub::presentation::websocket::{DeliveryError, Outbox, ServerFrame, SessionState};

use crate::common::TestApp;

async fn next_message(outbox: &mut Outbox) -> chat_hub::domain::Message {
    match timeout(Duration::from_secs(1), outbox.recv()).await {
        Ok(Some(ServerFrame::MessageCreate(message))) => message,
        other => panic!("expected a MESSAGE_CREATE frame, got {:?}", other),
    }
}

fn assert_silent(outbox: &mut Outbox) {
    assert!(outbox.try_recv().is_none(), "no frame expected");
}

async fn direct_chat(app: &TestApp, a: UserId, b: UserId) -> ChatId {
    let chat = Chat::direct(a, b);
    app.store.create(&chat, &[a, b]).await.unwrap();
    chat.id
}

#[tokio::test]
async fn test_hello_reaches_the_other_member_only() {
    let app = TestApp::new();
    let (a, b) = (app.user(), app.user());
    let chat = direct_chat(&app, a.id, b.id).await;
    let hub = &app.state.hub;

    let (_ha, mut out_a) = hub.connect(a.id).await.unwrap();
    let (_hb, mut out_b) = hub.connect(b.id).await.unwrap();

    let sent = hub
        .submit(MessageDraft::new(chat.clone(), a.id, "hello"))
        .await
        .unwrap();

    let received = next_message(&mut out_b).await;
    assert_eq!(received, sent);
    assert_eq!(received.sender_id, a.id);
    assert_eq!(received.content, "hello");
    assert_silent(&mut out_a);
    assert_eq!(app.store.messages_in(&chat).len(), 1);
}

#[tokio::test]
async fn test_non_member_submission_is_refused_without_side_effects() {
    let app = TestApp::new();
    let (a, b, c) = (app.user(), app.user(), app.user());
    let chat = direct_chat(&app, a.id, b.id).await;
    let hub = &app.state.hub;

    let (_ha, mut out_a) = hub.connect(a.id).await.unwrap();
    let (_hb, mut out_b) = hub.connect(b.id).await.unwrap();
    let (_hc, mut out_c) = hub.connect(c.id).await.unwrap();

    let result = hub.submit(MessageDraft::new(chat.clone(), c.id, "let me in")).await;

    assert_eq!(result.unwrap_err(), DeliveryError::NotAMember);
    assert_eq!(app.store.message_count(), 0);
    assert_silent(&mut out_a);
    assert_silent(&mut out_b);
    assert_silent(&mut out_c);
}

#[tokio::test]
async fn test_store_outage_reaches_nobody_and_recovers() {
    let app = TestApp::new();
    let (a, b) = (app.user(), app.user());
    let chat = direct_chat(&app, a.id, b.id).await;
    let hub = &app.state.hub;

    let (_ha, _out_a) = hub.connect(a.id).await.unwrap();
    let (_hb, mut out_b) = hub.connect(b.id).await.unwrap();

    app.store.set_available(false);
    let result = hub.submit(MessageDraft::new(chat.clone(), a.id, "lost?")).await;
    assert!(matches!(result, Err(DeliveryError::Persistence(_))));
    assert_silent(&mut out_b);

    app.store.set_available(true);
    hub.submit(MessageDraft::new(chat.clone(), a.id, "back"))
        .await
        .unwrap();
    assert_eq!(next_message(&mut out_b).await.content, "back");
    assert_eq!(app.store.message_count(), 1);
}

#[tokio::test]
async fn test_member_added_while_connected_receives_next_message() {
    let app = TestApp::new();
    let (a, b, c) = (app.user(), app.user(), app.user());
    let hub = app.state.hub.clone();
    let service = ChatServiceImpl::new(app.state.users.clone(), app.state.chats.clone(), hub.clone());

    let group = service
        .create_group_chat(a.id, "team", &[b.username.clone()])
        .await
        .unwrap();

    let (_hc, mut out_c) = hub.connect(c.id).await.unwrap();
    assert!(!hub.subscribers_of(&group.id).contains(&c.id));

    service.add_member(a.id, &group.id, c.id).await.unwrap();
    assert!(hub.subscribers_of(&group.id).contains(&c.id));

    hub.submit(MessageDraft::new(group.id.clone(), b.id, "welcome"))
        .await
        .unwrap();
    let received = next_message(&mut out_c).await;
    assert_eq!(received.content, "welcome");
    assert_eq!(received.chat_id, group.id);
}

#[tokio::test]
async fn test_reconnect_supersedes_previous_connection() {
    let app = TestApp::new();
    let (a, b) = (app.user(), app.user());
    let chat = direct_chat(&app, a.id, b.id).await;
    let hub = &app.state.hub;

    let (old, mut old_out) = hub.connect(b.id).await.unwrap();
    let (new, mut new_out) = hub.connect(b.id).await.unwrap();

    assert!(old.is_closed());
    assert_eq!(new.state(), SessionState::Active);
    assert_eq!(hub.connection_count(), 1);

    hub.submit(MessageDraft::new(chat, a.id, "which one?"))
        .await
        .unwrap();
    assert_eq!(next_message(&mut new_out).await.content, "which one?");
    assert_silent(&mut old_out);
}

#[tokio::test]
async fn test_disconnect_removes_user_from_every_chat() {
    let app = TestApp::new();
    let (a, b, c) = (app.user(), app.user(), app.user());
    let ab = direct_chat(&app, a.id, b.id).await;
    let ac = direct_chat(&app, a.id, c.id).await;
    let hub = &app.state.hub;

    let (handle, _out) = hub.connect(a.id).await.unwrap();
    assert_eq!(hub.subscribers_of(&ab), vec![a.id]);
    assert_eq!(hub.subscribers_of(&ac), vec![a.id]);

    hub.disconnect(&handle);

    assert!(hub.subscribers_of(&ab).is_empty());
    assert!(hub.subscribers_of(&ac).is_empty());
    assert!(!hub.is_online(a.id));
    assert!(hub.registry_is_consistent());
    assert!(handle.is_closed());
}

#[tokio::test]
async fn test_concurrent_senders_are_seen_in_one_order() {
    let app = TestApp::new();
    let (a, b, c) = (app.user(), app.user(), app.user());
    let hub = app.state.hub.clone();
    let service = ChatServiceImpl::new(app.state.users.clone(), app.state.chats.clone(), hub.clone());
    let group = service
        .create_group_chat(a.id, "race", &[b.username.clone(), c.username.clone()])
        .await
        .unwrap();

    let (_hb, mut out_b) = hub.connect(b.id).await.unwrap();
    let (_hc, mut out_c) = hub.connect(c.id).await.unwrap();

    let mut tasks = Vec::new();
    for i in 0..20 {
        let hub = hub.clone();
        let chat = group.id.clone();
        let sender = if i % 2 == 0 { a.id } else { b.id };
        tasks.push(tokio::spawn(async move {
            hub.submit(MessageDraft::new(chat, sender, format!("m{i}")))
                .await
                .unwrap()
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    // c sees all twenty in id order; b sees a's ten in the same relative order
    let mut seen_by_c = Vec::new();
    for _ in 0..20 {
        seen_by_c.push(next_message(&mut out_c).await.id);
    }
    let mut sorted = seen_by_c.clone();
    sorted.sort_unstable();
    assert_eq!(seen_by_c, sorted);

    let mut seen_by_b = Vec::new();
    for _ in 0..10 {
        let message = next_message(&mut out_b).await;
        assert_eq!(message.sender_id, a.id);
        seen_by_b.push(message.id);
    }
    let expected: Vec<i64> = app
        .store
        .messages_in(&group.id)
        .into_iter()
        .filter(|m| m.sender_id == a.id)
        .map(|m| m.id)
        .collect();
    let mut expected = expected;
    expected.sort_unstable();
    assert_eq!(seen_by_b, expected);
    assert_silent(&mut out_b);
}
