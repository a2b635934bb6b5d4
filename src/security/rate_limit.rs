//! Per-route token bucket rate limiting.
//!
//! Rules are matched against the request path in registration order and the
//! first rule whose key is a prefix of the path wins. Two rules sharing a
//! prefix therefore depend on declaration order: with `/auth` registered
//! before `/auth/refresh`, the second rule never matches. Paths matching no
//! rule are not limited at all.
//!
//! Buckets refill lazily on access; there is no background timer and a
//! rejected request is never queued.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::config::{LimiterRuleConfig, RateLimitConfig};
use crate::http::response::ApiError;
use crate::observability::metrics;

/// Outcome of a rate limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Admit,
    Reject,
}

/// An immutable bucket rule keyed by route prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LimiterRule {
    pub key: String,
    pub capacity: u64,
    pub quantum: u64,
    pub fill_interval: Duration,
}

impl From<&LimiterRuleConfig> for LimiterRule {
    fn from(config: &LimiterRuleConfig) -> Self {
        Self {
            key: config.key.clone(),
            capacity: config.capacity,
            quantum: config.quantum,
            fill_interval: Duration::from_millis(config.fill_interval_ms),
        }
    }
}

/// A token bucket with lazy, whole-interval refill.
#[derive(Debug)]
pub struct TokenBucket {
    capacity: u64,
    quantum: u64,
    fill_interval: Duration,
    tokens: u64,
    last_refill: Instant,
}

impl TokenBucket {
    /// Create a full bucket.
    pub fn new(capacity: u64, quantum: u64, fill_interval: Duration, now: Instant) -> Self {
        Self {
            capacity,
            quantum,
            fill_interval,
            tokens: capacity,
            last_refill: now,
        }
    }

    pub fn tokens(&self) -> u64 {
        self.tokens
    }

    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    fn refill(&mut self, now: Instant) {
        let interval_nanos = self.fill_interval.as_nanos();
        if interval_nanos == 0 {
            self.tokens = self.capacity;
            self.last_refill = now;
            return;
        }

        // saturating: an `Instant` earlier than `last_refill` adds nothing
        let elapsed = now.saturating_duration_since(self.last_refill);
        let intervals = elapsed.as_nanos() / interval_nanos;
        if intervals == 0 {
            return;
        }

        let added = u64::try_from(intervals)
            .unwrap_or(u64::MAX)
            .saturating_mul(self.quantum);
        self.tokens = self.tokens.saturating_add(added).min(self.capacity);

        // Only whole intervals are consumed, so the remainder keeps counting
        // toward the next refill and `last_refill` never passes `now`.
        let consumed = u64::try_from(intervals * interval_nanos).unwrap_or(u64::MAX);
        self.last_refill = self
            .last_refill
            .checked_add(Duration::from_nanos(consumed))
            .map_or(now, |t| t.min(now));
    }

    /// Refill, then take one token if available.
    pub fn take_at(&mut self, now: Instant) -> Admission {
        self.refill(now);
        if self.tokens >= 1 {
            self.tokens -= 1;
            Admission::Admit
        } else {
            Admission::Reject
        }
    }
}

#[derive(Debug)]
struct LimiterEntry {
    rule: LimiterRule,
    bucket: Mutex<TokenBucket>,
}

/// Fixed arena of buckets, one lock per bucket.
#[derive(Debug, Default)]
pub struct RateLimiterRegistry {
    entries: Vec<LimiterEntry>,
}

impl RateLimiterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the registry from config. A disabled limiter has no rules.
    pub fn from_config(config: &RateLimitConfig) -> Self {
        let mut registry = Self::new();
        if config.enabled {
            for rule in &config.rules {
                registry = registry.with_rule(LimiterRule::from(rule));
            }
        }
        registry
    }

    /// Register a rule after all existing ones.
    pub fn with_rule(mut self, rule: LimiterRule) -> Self {
        if let Some(earlier) = self.entries.iter().find(|e| rule.key.starts_with(&e.rule.key)) {
            tracing::warn!(
                rule = %rule.key,
                shadowed_by = %earlier.rule.key,
                "Rate limit rule can never match"
            );
        }

        let bucket = TokenBucket::new(rule.capacity, rule.quantum, rule.fill_interval, Instant::now());
        self.entries.push(LimiterEntry {
            rule,
            bucket: Mutex::new(bucket),
        });
        self
    }

    /// The rule governing `path`, if any.
    pub fn resolve(&self, path: &str) -> Option<&LimiterRule> {
        self.find(path).map(|e| &e.rule)
    }

    fn find(&self, path: &str) -> Option<&LimiterEntry> {
        self.entries.iter().find(|e| path.starts_with(&e.rule.key))
    }

    pub fn check(&self, path: &str) -> Admission {
        self.check_at(path, Instant::now())
    }

    pub fn check_at(&self, path: &str, now: Instant) -> Admission {
        let Some(entry) = self.find(path) else {
            return Admission::Admit;
        };

        // refill + take run under one lock; nothing in it can panic, so a
        // poisoned lock still guards a consistent bucket
        let mut bucket = entry.bucket.lock().unwrap_or_else(PoisonError::into_inner);
        bucket.take_at(now)
    }

    /// Current token count of the bucket for `path`.
    pub fn tokens(&self, path: &str) -> Option<u64> {
        self.find(path)
            .map(|e| e.bucket.lock().unwrap_or_else(PoisonError::into_inner).tokens())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Middleware rejecting requests whose bucket is empty.
pub async fn rate_limit_middleware(
    State(registry): State<Arc<RateLimiterRegistry>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let path = request.uri().path();

    match registry.check(path) {
        Admission::Admit => next.run(request).await,
        Admission::Reject => {
            let rule = registry.resolve(path).map(|r| r.key.as_str()).unwrap_or_default();
            tracing::warn!(path = %path, rule = %rule, "Rate limit exceeded");
            metrics::record_rate_limited(rule);
            ApiError::TooManyRequests.into_response()
        }
    }
}
