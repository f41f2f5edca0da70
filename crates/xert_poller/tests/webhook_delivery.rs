use secrecy::SecretString;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};
use xert_poller::error::DispatchError;
use xert_poller::webhook::WebhookDispatcher;

#[tokio::test]
async fn event_body_carries_type_availability_and_payload() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/webhook/hook-1"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let dispatcher = WebhookDispatcher::new(&server.uri(), "hook-1", None);
    let payload = serde_json::json!({"success": true, "tl": 42.5});
    dispatcher
        .send("xert_training_info_update", &payload)
        .await
        .expect("send");

    let received = server.received_requests().await.unwrap();
    assert_eq!(received.len(), 1);
    let body: serde_json::Value = serde_json::from_slice(&received[0].body).unwrap();
    assert_eq!(body["event_type"], "xert_training_info_update");
    assert_eq!(body["data"]["available"], true);
    assert_eq!(body["data"]["parsed"], payload);
}

#[tokio::test]
async fn payload_without_success_flag_reports_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/webhook/hook-1"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let dispatcher = WebhookDispatcher::new(&server.uri(), "hook-1", None);
    dispatcher
        .send("xert_activity_list_update", &serde_json::json!({"activities": []}))
        .await
        .expect("send");

    let received = server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&received[0].body).unwrap();
    assert_eq!(body["data"]["available"], false);
}

#[tokio::test]
async fn configured_hub_token_is_sent_as_bearer() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/webhook/hook-1"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let dispatcher = WebhookDispatcher::new(
        &server.uri(),
        "hook-1",
        Some(SecretString::new("ll-token".into())),
    );
    dispatcher
        .send("xert_training_info_update", &serde_json::json!({"success": true}))
        .await
        .expect("send");

    let received = server.received_requests().await.unwrap();
    let auth = received[0].headers.get("authorization").unwrap();
    assert_eq!(auth.to_str().unwrap(), "Bearer ll-token");
}

#[tokio::test]
async fn server_error_is_transient() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/webhook/hook-1"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let dispatcher = WebhookDispatcher::new(&server.uri(), "hook-1", None);
    let err = dispatcher
        .send("xert_training_info_update", &serde_json::json!({"success": true}))
        .await
        .expect_err("should fail");
    assert!(matches!(err, DispatchError::Transient(_)));

    // the dispatcher itself never retries
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn unknown_webhook_id_is_permanent() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/webhook/wrong-id"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let dispatcher = WebhookDispatcher::new(&server.uri(), "wrong-id", None);
    let err = dispatcher
        .send("xert_training_info_update", &serde_json::json!({"success": true}))
        .await
        .expect_err("should fail");
    assert!(matches!(err, DispatchError::Permanent(_)));
}
