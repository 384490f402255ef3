//! Integration tests for `DoordashAdapter` using wiremock HTTP mocks.

use std::sync::Arc;

use omnitrack_adapters::platforms::DoordashAdapter;
use omnitrack_adapters::{
    AdapterConnection, AdapterContext, AdapterError, Credential, MemoryCounterStore,
    MemoryTtlStore, OAuthConfig, PlatformAdapter, RateLimiter,
};
use omnitrack_core::{DeliveryStatus, Platform};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_context() -> AdapterContext {
    AdapterContext {
        http: reqwest::Client::new(),
        limiter: Arc::new(RateLimiter::new(Arc::new(MemoryCounterStore::new()), 60)),
        ttl_store: Arc::new(MemoryTtlStore::new()),
        max_retries: 2,
        backoff_base_ms: 1,
        rate_limit_fallback_secs: 60,
        pkce_ttl_secs: 600,
    }
}

fn test_adapter(base_url: &str) -> DoordashAdapter {
    DoordashAdapter::with_base_url(
        test_context(),
        OAuthConfig {
            client_id: "client".to_owned(),
            client_secret: "secret".to_owned(),
            authorize_url: format!("{base_url}/oauth/authorize"),
            token_url: format!("{base_url}/oauth/token"),
            redirect_uri: "https://app.example.com/callback".to_owned(),
            scopes: vec!["orders.read".to_owned()],
        },
        base_url,
    )
}

fn connection() -> AdapterConnection {
    AdapterConnection {
        user_id: "user-1".to_owned(),
        platform: Platform::Doordash,
        credential: Credential::OAuth {
            access_token: "live-token".to_owned(),
            refresh_token: None,
            expires_at: None,
        },
    }
}

#[tokio::test]
async fn active_orders_are_normalized_and_filtered() {
    let server = MockServer::start().await;

    let body = serde_json::json!({
        "orders": [
            {
                "id": "8842",
                "status": "picked_up",
                "status_updated_at": "2026-08-29T12:00:00Z",
                "dasher": {
                    "first_name": "Maria",
                    "last_name": "Gonzalez",
                    "phone_number": "(555) 867-5289"
                },
                "quoted_delivery_minutes": 12.0
            },
            {
                "id": "8001",
                "status": "delivered",
                "status_updated_at": "2026-08-29T11:00:00Z"
            }
        ]
    });

    Mock::given(method("GET"))
        .and(path("/v1/orders/active"))
        .and(header("authorization", "Bearer live-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&body))
        .mount(&server)
        .await;

    let adapter = test_adapter(&server.uri());
    let deliveries = adapter
        .get_active_deliveries(&connection())
        .await
        .expect("should list active deliveries");

    // The delivered order is terminal and dropped from the active list.
    assert_eq!(deliveries.len(), 1);
    let delivery = &deliveries[0];
    assert_eq!(delivery.id, "dd_8842");
    assert_eq!(delivery.status, DeliveryStatus::OutForDelivery);
    assert_eq!(delivery.eta.minutes_remaining, Some(12.0));
    let driver = delivery.driver.as_ref().expect("dasher present");
    assert_eq!(driver.name.as_deref(), Some("Maria G."));
    assert_eq!(driver.masked_phone.as_deref(), Some("(555) ***-**89"));
}

#[tokio::test]
async fn order_detail_fetches_live_location_sub_resource() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/orders/8842"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "8842",
            "status": "out_for_delivery",
            "dasher": { "first_name": "Maria" }
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v1/orders/8842/dasher_location"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "lat": 33.99,
            "lng": -81.03,
            "heading": 45.0
        })))
        .mount(&server)
        .await;

    let adapter = test_adapter(&server.uri());
    let delivery = adapter
        .get_delivery_details(&connection(), "dd_8842")
        .await
        .expect("should fetch detail");

    let location = delivery
        .driver
        .expect("driver present")
        .location
        .expect("location fetched from sub-resource");
    assert!((location.lat - 33.99).abs() < 1e-9);
    assert_eq!(location.heading, Some(45.0));
}

#[tokio::test]
async fn missing_location_sub_resource_degrades_gracefully() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/orders/8842"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "8842",
            "status": "out_for_delivery",
            "dasher": { "first_name": "Maria" }
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v1/orders/8842/dasher_location"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let adapter = test_adapter(&server.uri());
    let delivery = adapter
        .get_delivery_details(&connection(), "dd_8842")
        .await
        .expect("detail should still succeed");
    assert!(delivery.driver.expect("driver present").location.is_none());
}

#[tokio::test]
async fn server_errors_are_retried_until_success() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/orders/active"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v1/orders/active"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({ "orders": [] })),
        )
        .mount(&server)
        .await;

    let adapter = test_adapter(&server.uri());
    let deliveries = adapter
        .get_active_deliveries(&connection())
        .await
        .expect("retry should recover from a transient 503");
    assert!(deliveries.is_empty());
}

#[tokio::test]
async fn unauthorized_is_an_auth_error_and_not_retried() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/orders/active"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let adapter = test_adapter(&server.uri());
    let err = adapter
        .get_active_deliveries(&connection())
        .await
        .expect_err("401 must surface as an error");
    assert!(matches!(err, AdapterError::Auth { .. }), "got: {err}");
}

#[tokio::test]
async fn rate_limited_surfaces_retry_after() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/orders/active"))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "7"))
        .mount(&server)
        .await;

    let ctx = AdapterContext {
        max_retries: 0,
        ..test_context()
    };
    let adapter = DoordashAdapter::with_base_url(
        ctx,
        OAuthConfig {
            client_id: "client".to_owned(),
            client_secret: "secret".to_owned(),
            authorize_url: format!("{}/oauth/authorize", server.uri()),
            token_url: format!("{}/oauth/token", server.uri()),
            redirect_uri: "https://app.example.com/callback".to_owned(),
            scopes: vec![],
        },
        &server.uri(),
    );
    let err = adapter
        .get_active_deliveries(&connection())
        .await
        .expect_err("429 must surface");
    match err {
        AdapterError::RateLimited { retry_after_secs, .. } => {
            assert_eq!(retry_after_secs, 7);
        }
        other => panic!("expected RateLimited, got: {other}"),
    }
}

#[tokio::test]
async fn oauth_round_trip_exchanges_code_with_pkce() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "fresh-token",
            "refresh_token": "refresh-1",
            "expires_in": 3600
        })))
        .mount(&server)
        .await;

    let adapter = test_adapter(&server.uri());
    let url = adapter
        .oauth_authorize_url("state-1")
        .await
        .expect("authorize url");
    assert!(url.contains("code_challenge="));
    assert!(url.contains("code_challenge_method=S256"));

    let tokens = adapter
        .exchange_code("state-1", "auth-code")
        .await
        .expect("code exchange");
    assert_eq!(tokens.access_token, "fresh-token");
    assert_eq!(tokens.refresh_token.as_deref(), Some("refresh-1"));

    // The verifier is one-shot; replaying the state must fail.
    let err = adapter
        .exchange_code("state-1", "auth-code")
        .await
        .expect_err("state replay must fail");
    assert!(matches!(err, AdapterError::Auth { .. }));
}
