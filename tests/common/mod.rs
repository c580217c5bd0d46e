//! Shared utilities for integration tests.
#![allow(dead_code)]

use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{Request, Response, StatusCode},
    Router,
};
use std::net::SocketAddr;
use std::time::Duration;
use surge_breaker::breaker::SensitivityLevel;
use surge_breaker::config::BreakerServiceConfig;
use surge_breaker::{HttpServer, Shutdown};
use tower::ServiceExt;

pub const ADMIN_KEY: &str = "test-admin-key";

/// Config on the `low` preset: tick 100, window 5, threshold 250, activation 100 rps.
pub fn low_config() -> BreakerServiceConfig {
    let mut config = BreakerServiceConfig::default();
    config.breaker.level = SensitivityLevel::Low;
    config.admin.enabled = true;
    config.admin.api_key = ADMIN_KEY.to_string();
    config
}

/// Build a server, start its block worker, and return the router.
pub fn start(config: BreakerServiceConfig, shutdown: &Shutdown) -> (HttpServer, Router) {
    let mut server = HttpServer::new(config).expect("valid breaker config");
    server.spawn_worker(shutdown.subscribe());
    let router = server.router();
    (server, router)
}

fn peer(ip: &str) -> SocketAddr {
    format!("{ip}:40000").parse().unwrap()
}

/// Send a request as if it arrived from `ip`.
pub async fn send_request(app: &Router, ip: &str, request: Request<Body>) -> Response<Body> {
    let mut request = request;
    request.extensions_mut().insert(ConnectInfo(peer(ip)));
    app.clone().oneshot(request).await.unwrap()
}

pub async fn get(app: &Router, ip: &str, path: &str) -> StatusCode {
    let request = Request::builder().uri(path).body(Body::empty()).unwrap();
    send_request(app, ip, request).await.status()
}

/// Poll until `ip` is rejected or a second has passed.
pub async fn wait_until_rejected(app: &Router, ip: &str) -> bool {
    for _ in 0..100 {
        if get(app, ip, "/").await == StatusCode::TOO_MANY_REQUESTS {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

/// Drive `total` requests where every fifth comes from a rotating pool of
/// background clients and the rest from `attacker`.
pub async fn drive_spike(app: &Router, attacker: &str, total: usize) {
    for i in 0..total {
        if i % 5 == 0 {
            let status = get(app, &format!("10.1.0.{}", i % 50), "/").await;
            assert_eq!(status, StatusCode::OK, "background request {i} rejected");
        } else {
            get(app, attacker, "/").await;
        }
    }
}
