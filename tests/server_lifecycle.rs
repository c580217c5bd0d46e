//! Real TCP serving and graceful shutdown.

use std::sync::Arc;
use std::time::Duration;
use surge_breaker::{HttpServer, Shutdown};
use tokio::net::TcpListener;

mod common;

#[tokio::test]
async fn test_serves_and_stops_on_shutdown() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let mut config = common::low_config();
    config.listener.bind_address = addr.to_string();
    let server = HttpServer::new(config).unwrap();

    let shutdown = Arc::new(Shutdown::new());
    let server_shutdown = shutdown.clone();
    let handle = tokio::spawn(async move { server.run(listener, &server_shutdown).await });

    let client = reqwest::Client::builder().no_proxy().build().unwrap();
    let res = client.get(format!("http://{addr}/health")).send().await.expect("server reachable");
    assert_eq!(res.status(), 200);
    assert_eq!(res.text().await.unwrap(), "ok");

    let res = client.get(format!("http://{addr}/some/app/path")).send().await.unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(res.text().await.unwrap(), "GET /some/app/path\n");

    shutdown.trigger();
    let result = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("server stops after shutdown")
        .unwrap();
    assert!(result.is_ok());
}
