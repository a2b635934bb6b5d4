//! Admission pipeline composition.
//!
//! # Layer order (outermost first)
//! ```text
//! SetRequestId → PropagateRequestId
//!     → TraceLayer (access log, sees the final status of every request)
//!     → CrashGuard (catches any panic below, once per request)
//!     → rate limit (429 before any other work)
//!     → deadline (RequestContext in extensions)
//!     → auth (protected groups only, 401)
//!     → handler
//! ```
//!
//! Request-id stamping sits outside the crash guard so that crash reports
//! and the 500 they produce carry the id. The access log wraps the guard so
//! a contained panic is logged with the 500 that replaced it.

use std::sync::Arc;

use axum::{middleware, Router};

use crate::config::AppConfig;
use crate::http::request::{propagate_request_id_layer, set_request_id_layer, trace_layer};
use crate::observability::alert::AlertTransport;
use crate::resilience::crash_guard::{crash_guard_middleware, CrashGuard};
use crate::resilience::deadline::{deadline_middleware, DeadlineGuard};
use crate::security::auth::{auth_middleware, AuthValidator};
use crate::security::credentials::CredentialStore;
use crate::security::rate_limit::{rate_limit_middleware, RateLimiterRegistry};

/// The shared components every request passes through.
#[derive(Clone)]
pub struct Pipeline {
    limiter: Arc<RateLimiterRegistry>,
    auth: Arc<AuthValidator>,
    deadline: DeadlineGuard,
    crash_guard: Arc<CrashGuard>,
}

impl Pipeline {
    pub fn new(
        limiter: RateLimiterRegistry,
        auth: AuthValidator,
        deadline: DeadlineGuard,
        crash_guard: CrashGuard,
    ) -> Self {
        Self {
            limiter: Arc::new(limiter),
            auth: Arc::new(auth),
            deadline,
            crash_guard: Arc::new(crash_guard),
        }
    }

    pub fn from_config(
        config: &AppConfig,
        credentials: Arc<dyn CredentialStore>,
        alerts: Arc<dyn AlertTransport>,
    ) -> Self {
        let limiter = RateLimiterRegistry::from_config(&config.rate_limit);
        tracing::info!(rules = limiter.len(), "Rate limiter ready");

        Self::new(
            limiter,
            AuthValidator::new(&config.auth, credentials),
            DeadlineGuard::new(config.timeouts.request()),
            CrashGuard::new(alerts),
        )
    }

    pub fn limiter(&self) -> &Arc<RateLimiterRegistry> {
        &self.limiter
    }

    pub fn auth(&self) -> &Arc<AuthValidator> {
        &self.auth
    }

    pub fn deadline(&self) -> DeadlineGuard {
        self.deadline
    }

    /// Require a valid bearer token on every route of `router`.
    pub fn protect<S>(&self, router: Router<S>) -> Router<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        router.route_layer(middleware::from_fn_with_state(self.auth.clone(), auth_middleware))
    }

    /// Wrap `router` in the admission chain.
    pub fn wrap(&self, router: Router) -> Router {
        router
            .layer(middleware::from_fn_with_state(self.deadline, deadline_middleware))
            .layer(middleware::from_fn_with_state(self.limiter.clone(), rate_limit_middleware))
            .layer(middleware::from_fn_with_state(self.crash_guard.clone(), crash_guard_middleware))
            .layer(trace_layer())
            .layer(propagate_request_id_layer())
            .layer(set_request_id_layer())
    }
}
