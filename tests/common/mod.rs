//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::Value;
use tower::ServiceExt;

use blog_service::config::{AppConfig, CredentialConfig, LimiterRuleConfig};
use blog_service::http::{HttpServer, Pipeline};
use blog_service::observability::alert::{AlertError, AlertTransport};
use blog_service::resilience::crash_guard::CrashReport;
use blog_service::security::credentials::StaticCredentialStore;

pub const APP_KEY: &str = "blog";
pub const APP_SECRET: &str = "pw";

/// Alert transport keeping every report it receives.
#[derive(Default)]
pub struct RecordingAlerts {
    reports: Mutex<Vec<CrashReport>>,
}

impl RecordingAlerts {
    pub fn reports(&self) -> Vec<CrashReport> {
        self.reports.lock().unwrap().clone()
    }

    /// Alerts are delivered in the background; wait until `count` arrived.
    pub async fn wait_for(&self, count: usize) -> Vec<CrashReport> {
        settle(|| self.reports.lock().unwrap().len() >= count).await;
        self.reports()
    }
}

#[async_trait]
impl AlertTransport for RecordingAlerts {
    async fn dispatch(&self, report: &CrashReport) -> Result<(), AlertError> {
        self.reports.lock().unwrap().push(report.clone());
        Ok(())
    }
}

/// Alert transport that always fails, counting attempts.
#[derive(Default)]
pub struct FailingAlerts {
    attempts: Mutex<usize>,
}

impl FailingAlerts {
    pub fn attempts(&self) -> usize {
        *self.attempts.lock().unwrap()
    }

    pub async fn wait_for(&self, count: usize) -> usize {
        settle(|| self.attempts() >= count).await;
        self.attempts()
    }
}

/// Alert transport whose endpoint never answers.
#[derive(Default)]
pub struct StalledAlerts;

#[async_trait]
impl AlertTransport for StalledAlerts {
    async fn dispatch(&self, _report: &CrashReport) -> Result<(), AlertError> {
        std::future::pending::<()>().await;
        Ok(())
    }
}

/// Poll `done` until it holds, for at most two seconds.
pub async fn settle(done: impl Fn() -> bool) {
    for _ in 0..400 {
        if done() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached in time");
}

#[async_trait]
impl AlertTransport for FailingAlerts {
    async fn dispatch(&self, _report: &CrashReport) -> Result<(), AlertError> {
        *self.attempts.lock().unwrap() += 1;
        Err(AlertError::Unavailable("mail relay refused connection".into()))
    }
}

/// Config with one known credential and an extra single-token rule on `/limited`.
pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.timeouts.request_ms = 2_000;
    config.auth.secret = "integration-secret".into();
    config.auth.expire_secs = 3_600;
    config.auth.credentials = vec![CredentialConfig {
        app_key: APP_KEY.into(),
        app_secret: APP_SECRET.into(),
        active: true,
    }];
    config.rate_limit.rules.push(LimiterRuleConfig {
        key: "/limited".into(),
        capacity: 1,
        quantum: 1,
        fill_interval_ms: 3_600_000,
    });
    config
}

pub fn pipeline(config: &AppConfig, alerts: Arc<dyn AlertTransport>) -> Pipeline {
    let credentials = Arc::new(StaticCredentialStore::from_config(&config.auth.credentials));
    Pipeline::from_config(config, credentials, alerts)
}

pub fn build_app(
    config: &AppConfig,
    alerts: Arc<dyn AlertTransport>,
    public: Router,
    protected: Router,
) -> Router {
    HttpServer::build_router(&pipeline(config, alerts), public, protected)
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub fn get_with_token(uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header("authorization", format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap()
}

pub fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Response pieces the tests look at.
pub struct TestResponse {
    pub status: StatusCode,
    pub request_id: Option<String>,
    pub text: String,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_str(&self.text).unwrap_or(Value::Null)
    }
}

pub async fn send(app: &Router, request: Request<Body>) -> TestResponse {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let request_id = response
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    TestResponse {
        status,
        request_id,
        text: String::from_utf8_lossy(&bytes).into_owned(),
    }
}

pub async fn fetch_token(app: &Router) -> String {
    let res = send(
        app,
        post_json("/auth", serde_json::json!({ "app_key": APP_KEY, "app_secret": APP_SECRET })),
    )
    .await;
    assert_eq!(res.status, StatusCode::OK, "token request failed: {}", res.text);
    res.json()["token"].as_str().unwrap().to_string()
}
