//! Chat store integration tests against a mocked diary API.

use std::sync::Arc;
use std::time::Duration;

use kasaneha_core::models::{Message, Sender, SessionStatus};
use kasaneha_core::{ApiClient, ApiError, MemoryStorage, NoopNavigator, TokenStorage, TOKEN_KEY};
use kasaneha_stores::ChatStore;
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn session_json(id: &str) -> serde_json::Value {
    json!({
        "id": id,
        "user_id": "u1",
        "session_date": "2025-06-01T00:00:00Z",
        "status": "active",
        "created_at": "2025-06-01T07:00:00Z",
        "updated_at": "2025-06-01T07:30:00Z"
    })
}

fn message_json(id: &str, sender: &str, content: &str, seq: i64) -> serde_json::Value {
    json!({
        "id": id,
        "session_id": "s1",
        "sender": sender,
        "content": content,
        "created_at": "2025-06-01T07:00:00Z",
        "sequence_number": seq
    })
}

fn store_for(server: &MockServer) -> ChatStore {
    let storage = Arc::new(MemoryStorage::new());
    storage.set(TOKEN_KEY, "tok1").unwrap();
    let api = ApiClient::with_base_url(server.uri(), storage, Arc::new(NoopNavigator)).unwrap();
    ChatStore::new(Arc::new(api))
}

async fn mount_today(server: &MockServer, body: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path("/api/v1/sessions/today"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

// ===========================================================================
// load_today_session
// ===========================================================================

#[tokio::test]
async fn test_today_session_with_initial_message_skips_history_fetch() {
    let server = MockServer::start().await;
    let store = store_for(&server);

    mount_today(
        &server,
        json!({
            "session": session_json("s1"),
            "initial_message": message_json("m0", "ai", "Good morning! How are you today?", 1)
        }),
    )
    .await;

    Mock::given(method("GET"))
        .and(path("/api/v1/sessions/s1/messages"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let response = store.load_today_session().await.unwrap();
    assert_eq!(response.session.id, "s1");

    let state = store.snapshot();
    assert_eq!(state.current_session.unwrap().id, "s1");
    assert_eq!(state.messages.len(), 1);
    assert_eq!(state.messages[0].content, "Good morning! How are you today?");
    assert!(!state.is_loading);
    assert!(state.error.is_none());
}

#[tokio::test]
async fn test_today_session_without_initial_message_fetches_history_after_session() {
    let server = MockServer::start().await;
    let store = store_for(&server);

    // The session response is slow; the history request must still come after it.
    Mock::given(method("GET"))
        .and(path("/api/v1/sessions/today"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "session": session_json("s1") }))
                .set_delay(Duration::from_millis(50)),
        )
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/v1/sessions/s1/messages"))
        .and(header("authorization", "Bearer tok1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "session": session_json("s1"),
            "messages": [
                message_json("m1", "ai", "How was your day?", 1),
                message_json("m2", "user", "Busy but fine.", 2),
                message_json("m3", "ai", "What kept you busy?", 3)
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    store.load_today_session().await.unwrap();

    let requests = server.received_requests().await.unwrap();
    let paths: Vec<&str> = requests.iter().map(|r| r.url.path()).collect();
    assert_eq!(
        paths,
        vec!["/api/v1/sessions/today", "/api/v1/sessions/s1/messages"]
    );

    let contents: Vec<String> = store.messages().into_iter().map(|m| m.content).collect();
    assert_eq!(
        contents,
        vec!["How was your day?", "Busy but fine.", "What kept you busy?"]
    );
    assert!(!store.is_loading());
}

#[tokio::test]
async fn test_today_session_failure_records_error_and_clears_loading() {
    let server = MockServer::start().await;
    let store = store_for(&server);

    Mock::given(method("GET"))
        .and(path("/api/v1/sessions/today"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "error": { "code": "INTERNAL_ERROR", "message": "Failed to get session" }
        })))
        .mount(&server)
        .await;

    let err = store.load_today_session().await.unwrap_err();
    assert_eq!(err.to_string(), "Failed to get session");

    let state = store.snapshot();
    assert_eq!(state.error.as_deref(), Some("Failed to get session"));
    assert!(!state.is_loading);
    assert!(state.current_session.is_none());
}

#[tokio::test]
async fn test_history_failure_keeps_session_and_records_error() {
    let server = MockServer::start().await;
    let store = store_for(&server);

    mount_today(&server, json!({ "session": session_json("s1") })).await;
    Mock::given(method("GET"))
        .and(path("/api/v1/sessions/s1/messages"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    assert!(store.load_today_session().await.is_err());

    let state = store.snapshot();
    assert_eq!(state.current_session.unwrap().id, "s1");
    assert_eq!(state.error.as_deref(), Some("API request failed"));
    assert!(!state.is_loading);
}

// ===========================================================================
// load_session_messages
// ===========================================================================

#[tokio::test]
async fn test_load_session_messages_replaces_session_and_messages() {
    let server = MockServer::start().await;
    let store = store_for(&server);

    Mock::given(method("GET"))
        .and(path("/api/v1/sessions/s9/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "session": session_json("s9"),
            "messages": [message_json("m1", "ai", "Looking back...", 1)]
        })))
        .expect(1)
        .mount(&server)
        .await;

    store.add_message(Message::pending("old", Sender::User, "stale"));
    store.load_session_messages("s9").await.unwrap();

    let state = store.snapshot();
    assert_eq!(state.current_session.unwrap().id, "s9");
    assert_eq!(state.messages.len(), 1);
    assert_eq!(state.messages[0].content, "Looking back...");
}

// ===========================================================================
// send_message
// ===========================================================================

#[tokio::test]
async fn test_send_message_reconciles_pending_messages() {
    let server = MockServer::start().await;
    let store = store_for(&server);

    mount_today(
        &server,
        json!({
            "session": session_json("s1"),
            "initial_message": message_json("m0", "ai", "Hi there!", 1)
        }),
    )
    .await;

    Mock::given(method("POST"))
        .and(path("/api/v1/sessions/s1/messages"))
        .and(body_json(json!({ "content": "I went hiking." })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "user_message": message_json("m1", "user", "I went hiking.", 2),
            "ai_response": message_json("m2", "ai", "That sounds refreshing!", 3)
        })))
        .expect(1)
        .mount(&server)
        .await;

    store.load_today_session().await.unwrap();
    store.add_message(Message::pending("s1", Sender::User, "I went hiking."));
    assert!(store.messages().iter().any(|m| m.is_pending()));

    let response = store.send_message("I went hiking.").await.unwrap();

    let messages = store.messages();
    assert!(messages.iter().all(|m| !m.is_pending()));
    assert_eq!(messages.len(), 3);
    assert_eq!(messages[messages.len() - 2], response.user_message);
    assert_eq!(messages[messages.len() - 1], response.ai_response);
    assert_eq!(messages[1].sender, Sender::User);
    assert_eq!(messages[2].sender, Sender::Ai);
    assert!(!store.is_sending());
}

#[tokio::test]
async fn test_send_message_without_session_makes_no_request() {
    let server = MockServer::start().await;
    let store = store_for(&server);

    let err = store.send_message("hello?").await.unwrap_err();
    assert!(matches!(err, ApiError::NoActiveSession));

    let requests = server.received_requests().await.unwrap();
    assert!(requests.is_empty());
}

#[tokio::test]
async fn test_send_message_failure_keeps_pending_and_records_error() {
    let server = MockServer::start().await;
    let store = store_for(&server);

    mount_today(
        &server,
        json!({
            "session": session_json("s1"),
            "initial_message": message_json("m0", "ai", "Hi there!", 1)
        }),
    )
    .await;
    Mock::given(method("POST"))
        .and(path("/api/v1/sessions/s1/messages"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": { "code": "VALIDATION_ERROR", "message": "Message is too long" }
        })))
        .mount(&server)
        .await;

    store.load_today_session().await.unwrap();
    store.add_message(Message::pending("s1", Sender::User, "x".repeat(3000)));

    let err = store.send_message(&"x".repeat(3000)).await.unwrap_err();
    assert_eq!(err.to_string(), "Message is too long");

    let state = store.snapshot();
    assert_eq!(state.error.as_deref(), Some("Message is too long"));
    assert!(!state.is_sending);
    assert!(state.messages.last().unwrap().is_pending());

    // The caller rolls back its optimistic message.
    store.remove_temp_messages();
    assert_eq!(store.messages().len(), 1);
}

#[tokio::test]
async fn test_dropped_send_clears_sending_flag() {
    let server = MockServer::start().await;
    let store = store_for(&server);

    mount_today(
        &server,
        json!({
            "session": session_json("s1"),
            "initial_message": message_json("m0", "ai", "Hi there!", 1)
        }),
    )
    .await;
    Mock::given(method("POST"))
        .and(path("/api/v1/sessions/s1/messages"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({
                    "user_message": message_json("m1", "user", "slow", 2),
                    "ai_response": message_json("m2", "ai", "late reply", 3)
                }))
                .set_delay(Duration::from_secs(10)),
        )
        .mount(&server)
        .await;

    store.load_today_session().await.unwrap();

    let mut rx = store.subscribe();
    let sender = store.clone();
    let in_flight = tokio::spawn(async move { sender.send_message("slow").await });

    rx.wait_for(|s| s.is_sending).await.unwrap();
    in_flight.abort();
    assert!(in_flight.await.unwrap_err().is_cancelled());

    let state = store.snapshot();
    assert!(!state.is_sending);
    assert!(state.error.is_none());
    assert_eq!(state.messages.len(), 1);
}

// ===========================================================================
// complete_session
// ===========================================================================

#[tokio::test]
async fn test_complete_session_only_touches_status_and_completed_at() {
    let server = MockServer::start().await;
    let store = store_for(&server);

    mount_today(
        &server,
        json!({
            "session": session_json("s1"),
            "initial_message": message_json("m0", "ai", "Hi there!", 1)
        }),
    )
    .await;
    Mock::given(method("PUT"))
        .and(path("/api/v1/sessions/s1/complete"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "message": "Session completed successfully",
            "session_id": "s1",
            "completed_at": "2025-06-01T22:15:00Z"
        })))
        .expect(1)
        .mount(&server)
        .await;

    store.load_today_session().await.unwrap();
    let before = store.current_session().unwrap();

    store.complete_session().await.unwrap();
    let after = store.current_session().unwrap();

    assert_eq!(after.status, SessionStatus::Completed);
    assert_eq!(
        after.completed_at,
        Some("2025-06-01T22:15:00Z".parse().unwrap())
    );
    assert_eq!(after.id, before.id);
    assert_eq!(after.user_id, before.user_id);
    assert_eq!(after.session_date, before.session_date);
    assert_eq!(after.created_at, before.created_at);
    assert_eq!(after.updated_at, before.updated_at);
    assert!(!store.is_loading());

    // Only the two expected requests were made; nothing was refetched.
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_complete_session_failure_leaves_session_active() {
    let server = MockServer::start().await;
    let store = store_for(&server);

    mount_today(
        &server,
        json!({
            "session": session_json("s1"),
            "initial_message": message_json("m0", "ai", "Hi there!", 1)
        }),
    )
    .await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    store.load_today_session().await.unwrap();
    assert!(store.complete_session().await.is_err());

    assert_eq!(store.current_session().unwrap().status, SessionStatus::Active);
    assert_eq!(store.error().as_deref(), Some("API request failed"));
    assert!(!store.is_loading());

    store.clear_error();
    assert!(store.error().is_none());
}

// ===========================================================================
// transport failures
// ===========================================================================

#[tokio::test]
async fn test_unreachable_server_records_transport_error_and_clears_loading() {
    let api = ApiClient::with_base_url(
        "http://127.0.0.1:9",
        Arc::new(MemoryStorage::new()),
        Arc::new(NoopNavigator),
    )
    .unwrap();
    let store = ChatStore::new(Arc::new(api));

    let err = store.load_today_session().await.unwrap_err();
    assert!(matches!(err, ApiError::Transport(_)), "got: {:?}", err);

    let state = store.snapshot();
    assert!(!state.is_loading);
    assert_eq!(state.error, Some(err.to_string()));
    assert!(state.current_session.is_none());
}
