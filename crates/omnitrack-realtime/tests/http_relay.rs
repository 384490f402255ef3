use omnitrack_realtime::{HttpRelay, RealtimeEvent, RelayError, RelayPublisher};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn status_notice() -> RealtimeEvent {
    RealtimeEvent::new(
        "system:status",
        "notice",
        serde_json::json!({"message": "maintenance window"}),
    )
}

#[tokio::test]
async fn publishes_event_json_with_bearer_auth() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/publish"))
        .and(header("authorization", "Bearer relay-key-1"))
        .and(body_partial_json(serde_json::json!({
            "channel": "system:status",
            "event_type": "notice",
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let relay = HttpRelay::new(
        reqwest::Client::new(),
        format!("{}/publish", server.uri()),
        Some("relay-key-1".to_owned()),
    );
    relay.publish(&status_notice()).await.unwrap();
}

#[tokio::test]
async fn non_success_status_is_a_rejection() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let relay = HttpRelay::new(
        reqwest::Client::new(),
        format!("{}/publish", server.uri()),
        None,
    );
    let err = relay.publish(&status_notice()).await.unwrap_err();
    assert!(matches!(err, RelayError::Rejected { status: 401 }));
}
