//! Circuit breaker behaviour through the full router.

use axum::{body::Body, http::{header, Request, StatusCode}};
use surge_breaker::config::ClientIpSource;
use surge_breaker::Shutdown;

mod common;

#[tokio::test]
async fn test_heavy_hitter_rejected_with_429() {
    let shutdown = Shutdown::new();
    let (server, app) = common::start(common::low_config(), &shutdown);

    // 400 requests: the attacker holds 320, over the 250 threshold by tick 4
    common::drive_spike(&app, "203.0.113.66", 400).await;
    assert!(common::wait_until_rejected(&app, "203.0.113.66").await);

    let request = Request::builder().uri("/anything").body(Body::empty()).unwrap();
    let response = common::send_request(&app, "203.0.113.66", request).await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(response.headers().get(header::RETRY_AFTER).unwrap(), "180");

    // background clients are untouched
    assert_eq!(common::get(&app, "10.1.0.5", "/").await, StatusCode::OK);
    assert!(server.controller().status().ticks >= 4);

    shutdown.trigger();
}

#[tokio::test]
async fn test_rejected_requests_are_not_counted() {
    let shutdown = Shutdown::new();
    let (server, app) = common::start(common::low_config(), &shutdown);

    common::drive_spike(&app, "203.0.113.66", 400).await;
    assert!(common::wait_until_rejected(&app, "203.0.113.66").await);

    let before = server.controller().status().observed;
    for _ in 0..50 {
        assert_eq!(common::get(&app, "203.0.113.66", "/").await, StatusCode::TOO_MANY_REQUESTS);
    }
    assert_eq!(server.controller().status().observed, before);

    shutdown.trigger();
}

#[tokio::test]
async fn test_disabled_breaker_never_rejects() {
    let shutdown = Shutdown::new();
    let mut config = common::low_config();
    config.breaker.enabled = false;
    let (server, app) = common::start(config, &shutdown);

    for _ in 0..600 {
        assert_eq!(common::get(&app, "203.0.113.66", "/").await, StatusCode::OK);
    }
    assert_eq!(server.controller().status().observed, 0);

    shutdown.trigger();
}

#[tokio::test]
async fn test_forwarded_for_keys_clients_behind_one_peer() {
    let shutdown = Shutdown::new();
    let mut config = common::low_config();
    config.breaker.client_ip_source = ClientIpSource::XForwardedFor;
    let (_server, app) = common::start(config, &shutdown);

    let via_proxy = |client: String| {
        Request::builder()
            .uri("/")
            .header("x-forwarded-for", format!("{client}, 192.0.2.1"))
            .body(Body::empty())
            .unwrap()
    };

    for i in 0..400 {
        if i % 5 == 0 {
            let response = common::send_request(&app, "192.0.2.1", via_proxy(format!("10.2.0.{}", i % 50))).await;
            assert_eq!(response.status(), StatusCode::OK);
        } else {
            common::send_request(&app, "192.0.2.1", via_proxy("198.51.100.9".into())).await;
        }
    }

    let mut rejected = false;
    for _ in 0..100 {
        let response = common::send_request(&app, "192.0.2.1", via_proxy("198.51.100.9".into())).await;
        if response.status() == StatusCode::TOO_MANY_REQUESTS {
            rejected = true;
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    assert!(rejected);

    // same peer, different forwarded client
    let response = common::send_request(&app, "192.0.2.1", via_proxy("10.2.0.5".into())).await;
    assert_eq!(response.status(), StatusCode::OK);

    shutdown.trigger();
}

#[tokio::test]
async fn test_request_id_is_attached() {
    let shutdown = Shutdown::new();
    let (_server, app) = common::start(common::low_config(), &shutdown);

    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let response = common::send_request(&app, "10.0.0.1", request).await;
    assert_eq!(response.status(), StatusCode::OK);
    let id = response.headers().get("x-request-id").expect("request id header");
    assert_eq!(id.to_str().unwrap().len(), 36);

    let request = Request::builder()
        .uri("/health")
        .header("x-request-id", "caller-supplied")
        .body(Body::empty())
        .unwrap();
    let response = common::send_request(&app, "10.0.0.1", request).await;
    assert_eq!(response.headers().get("x-request-id").unwrap(), "caller-supplied");

    shutdown.trigger();
}
