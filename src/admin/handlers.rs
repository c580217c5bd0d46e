use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use std::net::IpAddr;

use crate::breaker::{BreakerStatus, SensitivityLevel};
use crate::http::server::AppState;
use crate::security::client_ip::normalize_ip;

#[derive(Serialize)]
pub struct StatusResponse {
    pub version: &'static str,
    pub level: SensitivityLevel,
    pub block_duration_secs: u64,
    pub bucket_secs: u64,
    #[serde(flatten)]
    pub breaker: BreakerStatus,
}

#[derive(Serialize)]
pub struct BlockedResponse {
    pub client: String,
    pub blocked: bool,
}

pub async fn get_status(State(state): State<AppState>) -> Json<StatusResponse> {
    let breaker = &state.config.breaker;
    Json(StatusResponse {
        version: env!("CARGO_PKG_VERSION"),
        level: breaker.level,
        block_duration_secs: breaker.block_duration_secs,
        bucket_secs: breaker.bucket_secs,
        breaker: state.controller.status(),
    })
}

pub async fn get_blocked(
    State(state): State<AppState>,
    Path(ip): Path<String>,
) -> Result<Json<BlockedResponse>, StatusCode> {
    let ip: IpAddr = ip.parse().map_err(|_| StatusCode::BAD_REQUEST)?;
    let client = normalize_ip(ip).to_string();
    let blocked = state.controller.registry().is_blocked(&client);
    Ok(Json(BlockedResponse { client, blocked }))
}
