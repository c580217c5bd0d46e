//! Circuit breaker middleware.

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{header, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::net::SocketAddr;
use std::sync::Arc;

use crate::breaker::{Controller, Verdict};
use crate::config::ClientIpSource;
use crate::observability::metrics;
use crate::security::client_ip::client_key;

/// State required by the breaker middleware.
#[derive(Clone)]
pub struct BreakerState {
    pub controller: Arc<Controller>,
    pub ip_source: ClientIpSource,
}

/// Reject blocked clients; forward and count everyone else.
pub async fn breaker_middleware(
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    State(state): State<BreakerState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if !state.controller.is_enabled() {
        return next.run(request).await;
    }

    let client = client_key(state.ip_source, addr, request.headers());

    match state.controller.check(&client) {
        Verdict::Rejected => {
            tracing::debug!(client = %client, "Request rejected by circuit breaker");
            metrics::record_request("rejected");
            let retry_after = state.controller.registry().block_duration().as_secs().to_string();
            (
                StatusCode::TOO_MANY_REQUESTS,
                [(header::RETRY_AFTER, retry_after)],
                "Too many requests",
            )
                .into_response()
        }
        Verdict::Pass => {
            state.controller.process(&client);
            metrics::record_request("pass");
            next.run(request).await
        }
    }
}
