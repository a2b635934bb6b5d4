//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, route assembly)
//!     → pipeline.rs (crash guard, rate limit, deadline, auth)
//!     → handlers.rs (/auth, /healthz, /api/v1/whoami) or mounted routes
//!     → response.rs (error envelope)
//!     → Send to client
//! ```

pub mod handlers;
pub mod pipeline;
pub mod request;
pub mod response;
pub mod server;

pub use pipeline::Pipeline;
pub use request::X_REQUEST_ID;
pub use response::{ApiError, ErrorBody};
pub use server::{HttpServer, API_V1};
