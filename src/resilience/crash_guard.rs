//! Per-request fault containment.
//!
//! The crash guard is the outermost layer around the admission chain. A panic
//! anywhere below it is caught once, turned into a [`CrashReport`], handed to
//! the alert transport and answered with the generic 500 envelope. The panic
//! text and stack never reach the client, and the next request is served as
//! usual.
//!
//! The panic-site backtrace is captured by a process panic hook into a
//! thread-local slot. Unwinding happens on the thread that polled the
//! handler, which is also where the guard catches it, so the slot is read on
//! the same thread that filled it. A snapshot is only used when its message
//! matches the caught payload; a payload re-raised with `resume_unwind`
//! never runs the hook and gets a backtrace taken at the guard instead.
//!
//! Alert delivery runs on a spawned task. The caller gets its 500 without
//! waiting on the alert endpoint.

use std::any::Any;
use std::backtrace::Backtrace;
use std::cell::{Cell, RefCell};
use std::future::{poll_fn, Future};
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Once};

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use futures_util::FutureExt;
use serde::{Deserialize, Serialize};

use crate::http::response::ApiError;
use crate::http::X_REQUEST_ID;
use crate::observability::alert::AlertTransport;
use crate::observability::metrics;

/// What the alert transport receives for one contained fault.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CrashReport {
    pub timestamp: DateTime<Utc>,
    pub message: String,
    pub stack_trace: String,
    pub request_method: String,
    pub request_path: String,
    pub request_id: Option<String>,
    /// Status sent to the caller in place of the handler's response.
    pub status_at_failure: u16,
}

struct PanicSnapshot {
    message: String,
    location: Option<String>,
    backtrace: String,
}

thread_local! {
    static LAST_PANIC: RefCell<Option<PanicSnapshot>> = const { RefCell::new(None) };
    static GUARD_DEPTH: Cell<usize> = const { Cell::new(0) };
}

static PANIC_HOOK: Once = Once::new();

/// Install the hook recording panic backtraces. Idempotent.
///
/// Panics raised while a guard is polling are reported by the guard, so the
/// previous hook only runs for panics outside any guard.
pub fn install_panic_hook() {
    PANIC_HOOK.call_once(|| {
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            if GUARD_DEPTH.with(Cell::get) == 0 {
                previous(info);
                return;
            }
            let snapshot = PanicSnapshot {
                message: panic_message(info.payload()),
                location: info.location().map(ToString::to_string),
                backtrace: Backtrace::force_capture().to_string(),
            };
            LAST_PANIC.with(|slot| *slot.borrow_mut() = Some(snapshot));
        }));
    });
}

/// Marks the current thread as polling inside a guard.
struct GuardScope;

impl GuardScope {
    fn enter() -> Self {
        let depth = GUARD_DEPTH.with(|d| d.replace(d.get() + 1));
        if depth == 0 {
            // Left behind by a panic some inner catch_unwind swallowed.
            LAST_PANIC.with(|slot| slot.borrow_mut().take());
        }
        GuardScope
    }
}

impl Drop for GuardScope {
    fn drop(&mut self) {
        GUARD_DEPTH.with(|d| d.set(d.get().saturating_sub(1)));
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Request details captured before the request moves into the chain.
#[derive(Debug, Clone)]
pub struct RequestSummary {
    pub method: String,
    pub path: String,
    pub request_id: Option<String>,
}

impl RequestSummary {
    pub fn of(request: &Request<Body>) -> Self {
        Self {
            method: request.method().to_string(),
            path: request.uri().path().to_string(),
            request_id: request
                .headers()
                .get(X_REQUEST_ID)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string),
        }
    }
}

pub struct CrashGuard {
    alerts: Arc<dyn AlertTransport>,
}

impl CrashGuard {
    pub fn new(alerts: Arc<dyn AlertTransport>) -> Self {
        install_panic_hook();
        Self { alerts }
    }

    /// Poll `fut` to completion, catching any panic it raises.
    pub async fn guard<F, T>(&self, fut: F) -> Result<T, Box<dyn Any + Send>>
    where
        F: Future<Output = T>,
    {
        let mut caught = std::pin::pin!(AssertUnwindSafe(fut).catch_unwind());
        poll_fn(|cx| {
            let _scope = GuardScope::enter();
            caught.as_mut().poll(cx)
        })
        .await
    }

    /// Build the report for a caught panic, consuming the recorded backtrace.
    pub fn report(&self, payload: &(dyn Any + Send), request: &RequestSummary) -> CrashReport {
        let message = panic_message(payload);
        let snapshot = LAST_PANIC
            .with(|slot| slot.borrow_mut().take())
            .filter(|snapshot| snapshot.message == message);
        let stack_trace = match snapshot {
            Some(PanicSnapshot {
                location: Some(location),
                backtrace,
                ..
            }) => format!("panicked at {location}\n{backtrace}"),
            Some(snapshot) => snapshot.backtrace,
            None => Backtrace::force_capture().to_string(),
        };

        CrashReport {
            timestamp: Utc::now(),
            message,
            stack_trace,
            request_method: request.method.clone(),
            request_path: request.path.clone(),
            request_id: request.request_id.clone(),
            status_at_failure: StatusCode::INTERNAL_SERVER_ERROR.as_u16(),
        }
    }

    /// Record the fault, hand the alert to a background task and produce the
    /// response for the caller.
    pub fn contain(&self, payload: Box<dyn Any + Send>, request: &RequestSummary) -> Response {
        let report = self.report(payload.as_ref(), request);
        metrics::record_crash();
        tracing::error!(
            method = %report.request_method,
            path = %report.request_path,
            request_id = report.request_id.as_deref().unwrap_or("-"),
            message = %report.message,
            "Request handler panicked"
        );

        tokio::spawn(dispatch_alert(self.alerts.clone(), report));

        ApiError::Internal.into_response()
    }
}

async fn dispatch_alert(alerts: Arc<dyn AlertTransport>, report: CrashReport) {
    if let Err(e) = alerts.dispatch(&report).await {
        metrics::record_alert_failure();
        tracing::error!(
            error = %e,
            request_id = report.request_id.as_deref().unwrap_or("-"),
            "Crash alert dispatch failed; monitoring is degraded"
        );
    }
}

pub async fn crash_guard_middleware(
    State(guard): State<Arc<CrashGuard>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let summary = RequestSummary::of(&request);

    match guard.guard(next.run(request)).await {
        Ok(response) => response,
        Err(payload) => guard.contain(payload, &summary),
    }
}
