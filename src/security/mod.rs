//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → rate_limit.rs (per-route token buckets)
//!     → auth.rs (bearer token on protected groups)
//!     → Pass to handler
//!
//! Token issuance:
//!     /auth → credentials.rs (pair exists and is active?) → auth.rs (sign)
//! ```
//!
//! # Design Decisions
//! - Fail closed: reject on any auth check failure
//! - Rejections are immediate; nothing waits for tokens to refill
//! - Tokens are self-contained; no server-side session state

pub mod auth;
pub mod credentials;
pub mod rate_limit;
