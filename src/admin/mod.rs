//! Admin API: breaker status and block lookups behind a bearer key.

pub mod auth;
pub mod handlers;

use axum::{middleware, routing::get, Router};

use self::auth::admin_auth_middleware;
use self::handlers::*;
use crate::http::server::AppState;

/// Routes mounted under `/admin`.
pub fn setup_admin_router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/status", get(get_status))
        .route("/blocked/{ip}", get(get_blocked))
        .route_layer(middleware::from_fn_with_state(state, admin_auth_middleware))
}
