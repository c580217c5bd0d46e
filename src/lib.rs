//! Adaptive traffic-share circuit breaker library.

pub mod admin;
pub mod breaker;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod security;

pub use breaker::{BreakerError, Controller, SensitivityLevel, SketchParams, Verdict};
pub use config::BreakerServiceConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
