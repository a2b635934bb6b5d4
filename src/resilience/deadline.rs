//! Per-request deadlines.
//!
//! Every request gets a [`RequestContext`] in its extensions holding one
//! deadline derived from `timeouts.request_ms`. Cancellation is cooperative:
//! the middleware never drops or preempts the handler. Handlers and the
//! persistence calls they make must poll [`RequestContext::check`], await
//! [`RequestContext::cancelled`], or wrap work in [`RequestContext::run`] to
//! stop early. A handler that ignores the signal still runs to completion, and
//! its response is then replaced by a timeout error so the caller can tell
//! the late result apart from a normal one.

use std::future::Future;
use std::time::Duration;

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use tokio::time::Instant;

use crate::http::response::ApiError;
use crate::observability::metrics;

/// Deadline and cancellation signal for one request.
#[derive(Debug, Clone, Copy)]
pub struct RequestContext {
    started: Instant,
    deadline: Instant,
}

impl RequestContext {
    pub fn new(timeout: Duration) -> Self {
        let started = Instant::now();
        Self {
            started,
            deadline: started + timeout,
        }
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Elapsed whole milliseconds, saturating at `u64::MAX`.
    pub fn elapsed_ms(&self) -> u64 {
        u64::try_from(self.elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    pub fn is_cancelled(&self) -> bool {
        Instant::now() >= self.deadline
    }

    /// `Err(DeadlineExceeded)` once the deadline has passed.
    pub fn check(&self) -> Result<(), ApiError> {
        if self.is_cancelled() {
            Err(ApiError::DeadlineExceeded)
        } else {
            Ok(())
        }
    }

    /// Resolves when the deadline passes.
    pub async fn cancelled(&self) {
        tokio::time::sleep_until(self.deadline).await;
    }

    /// Race `fut` against the deadline, dropping it if the deadline wins.
    pub async fn run<F: Future>(&self, fut: F) -> Result<F::Output, ApiError> {
        tokio::time::timeout_at(self.deadline, fut)
            .await
            .map_err(|_| ApiError::DeadlineExceeded)
    }
}

/// Binds a [`RequestContext`] to every request.
#[derive(Debug, Clone, Copy)]
pub struct DeadlineGuard {
    timeout: Duration,
}

impl DeadlineGuard {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn bind(&self) -> RequestContext {
        RequestContext::new(self.timeout)
    }
}

pub async fn deadline_middleware(
    State(guard): State<DeadlineGuard>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let ctx = guard.bind();
    request.extensions_mut().insert(ctx);
    let path = request.uri().path().to_owned();

    let response = next.run(request).await;

    if ctx.is_cancelled() {
        tracing::warn!(
            path = %path,
            elapsed_ms = ctx.elapsed_ms(),
            status = %response.status(),
            "Request finished after its deadline"
        );
        metrics::record_timeout();
        return ApiError::DeadlineExceeded.into_response();
    }
    response
}
