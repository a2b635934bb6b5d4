//! Request admission and fault containment for the blog content service.
//!
//! Every inbound request passes a per-route token bucket, gets a cooperative
//! deadline, is authenticated when it targets the `/api/v1` group, and runs
//! inside a crash guard that turns panics into a safe 500 plus an alert.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod resilience;
pub mod security;

pub use config::AppConfig;
pub use http::{HttpServer, Pipeline};
pub use lifecycle::Shutdown;
