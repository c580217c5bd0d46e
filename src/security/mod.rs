//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → client_ip.rs (derive the client key)
//!     → breaker.rs (reject blocked clients with 429, count the rest)
//!     → Pass to handlers
//! ```
//!
//! # Design Decisions
//! - The breaker runs before every route, admin included
//! - Forwarding headers are only trusted when configured

pub mod breaker;
pub mod client_ip;

pub use breaker::{breaker_middleware, BreakerState};
pub use client_ip::client_key;
