//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Every request:
//!     → crash_guard.rs (outermost; panic → alert + 500)
//!     → deadline.rs (RequestContext bound, timeout outcome if overrun)
//! ```
//!
//! # Design Decisions
//! - One fault boundary per request; faults never cross requests
//! - Cancellation is cooperative, handlers poll the RequestContext
//! - Timeout errors are distinct from other errors (504)

pub mod crash_guard;
pub mod deadline;
