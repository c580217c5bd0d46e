//! Configuration validation.
//!
//! Serde handles syntax; this module checks value ranges and relations
//! between fields. Every failing rule is reported, not just the first.

use std::net::SocketAddr;
use thiserror::Error;

use crate::config::schema::BreakerServiceConfig;

/// A single semantic validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("listener.bind_address '{0}' is not a socket address")]
    BindAddress(String),

    #[error("observability.metrics_address '{0}' is not a socket address")]
    MetricsAddress(String),

    #[error("timeouts.request_secs must be positive")]
    RequestTimeout,

    #[error("breaker.block_duration_secs must be positive")]
    BlockDuration,

    #[error("breaker.bucket_secs must be positive")]
    BucketWidth,

    #[error("breaker.block_duration_secs ({block}) exceeds breaker.bucket_secs ({bucket})")]
    BlockLongerThanBucket { block: u64, bucket: u64 },

    #[error("breaker.cache_max_cost must be positive")]
    CacheCost,

    #[error("admin.api_key must not be empty when the admin API is enabled")]
    AdminKey,
}

/// Validate a parsed configuration.
pub fn validate_config(config: &BreakerServiceConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(config.listener.bind_address.clone()));
    }

    let obs = &config.observability;
    if obs.metrics_enabled && obs.metrics_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::MetricsAddress(obs.metrics_address.clone()));
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::RequestTimeout);
    }

    let breaker = &config.breaker;
    if breaker.block_duration_secs == 0 {
        errors.push(ValidationError::BlockDuration);
    }
    if breaker.bucket_secs == 0 {
        errors.push(ValidationError::BucketWidth);
    } else if breaker.block_duration_secs > breaker.bucket_secs {
        // a block may spill into one following bucket, never two
        errors.push(ValidationError::BlockLongerThanBucket {
            block: breaker.block_duration_secs,
            bucket: breaker.bucket_secs,
        });
    }
    if breaker.cache_max_cost <= 0 {
        errors.push(ValidationError::CacheCost);
    }

    if config.admin.enabled && config.admin.api_key.trim().is_empty() {
        errors.push(ValidationError::AdminKey);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
