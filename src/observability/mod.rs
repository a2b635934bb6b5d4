//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters)
//!     → alert.rs (crash reports, out of band)
//! ```
//!
//! # Design Decisions
//! - Structured logging, JSON when configured, for machine parsing
//! - Request ID flows through spans and crash reports
//! - Alert delivery failure is logged, never escalated

pub mod alert;
pub mod logging;
pub mod metrics;
