//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the service.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration for the service.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Per-route rate limiting rules.
    pub rate_limit: RateLimitConfig,

    /// Token issuance and verification.
    pub auth: AuthConfig,

    /// Crash alert delivery.
    pub alert: AlertConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8000").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8000".to_string(),
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Deadline bound to every request, in milliseconds.
    pub request_ms: u64,

    /// How long in-flight requests may drain after a shutdown signal.
    pub shutdown_ms: u64,
}

impl TimeoutConfig {
    pub fn request(&self) -> Duration {
        Duration::from_millis(self.request_ms)
    }

    pub fn shutdown(&self) -> Duration {
        Duration::from_millis(self.shutdown_ms)
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request_ms: 60_000,
            shutdown_ms: 5_000,
        }
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable rate limiting.
    pub enabled: bool,

    /// Rules, matched in declaration order against the request path.
    pub rules: Vec<LimiterRuleConfig>,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            rules: vec![LimiterRuleConfig {
                key: "/auth".to_string(),
                capacity: 10,
                quantum: 10,
                fill_interval_ms: 1_000,
            }],
        }
    }
}

/// A single token bucket rule.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct LimiterRuleConfig {
    /// Path prefix this rule applies to.
    pub key: String,

    /// Maximum tokens held by the bucket.
    pub capacity: u64,

    /// Tokens added on every elapsed fill interval.
    pub quantum: u64,

    /// Fill interval in milliseconds.
    pub fill_interval_ms: u64,
}

/// Authentication configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Symmetric signing secret.
    pub secret: String,

    /// Issuer claim written into and expected from every token.
    pub issuer: String,

    /// Token lifetime in seconds.
    pub expire_secs: u64,

    /// Known app credentials.
    pub credentials: Vec<CredentialConfig>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            // WARNING: This is a placeholder! Change this in production.
            secret: "CHANGE_ME_IN_PRODUCTION".to_string(),
            issuer: "blog-service".to_string(),
            expire_secs: 7_200,
            credentials: Vec::new(),
        }
    }
}

/// An app key / app secret pair accepted by the static credential store.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CredentialConfig {
    pub app_key: String,
    pub app_secret: String,

    /// Inactive credentials are kept in config but rejected.
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

/// Crash alert configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AlertConfig {
    /// Webhook receiving crash reports. Reports are only logged when unset.
    pub webhook_url: Option<String>,

    /// Recipients forwarded to the webhook alongside the report.
    pub recipients: Vec<String>,

    /// Webhook request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            recipients: Vec::new(),
            timeout_secs: 5,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
