//! Out-of-band crash alerts.
//!
//! The crash guard hands every [`CrashReport`] to an [`AlertTransport`] on a
//! spawned task, after the failing request already has its 500. Delivery
//! failures are logged there as a monitoring problem.

use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::config::AlertConfig;
use crate::resilience::crash_guard::CrashReport;

#[derive(Debug, Error)]
pub enum AlertError {
    #[error("alert transport request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("alert endpoint answered with status {0}")]
    Rejected(u16),

    #[error("alert transport unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait AlertTransport: Send + Sync {
    async fn dispatch(&self, report: &CrashReport) -> Result<(), AlertError>;
}

/// Writes the report as a structured error event.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogAlertTransport;

#[async_trait]
impl AlertTransport for LogAlertTransport {
    async fn dispatch(&self, report: &CrashReport) -> Result<(), AlertError> {
        tracing::error!(
            timestamp = %report.timestamp,
            method = %report.request_method,
            path = %report.request_path,
            request_id = report.request_id.as_deref().unwrap_or("-"),
            status = report.status_at_failure,
            message = %report.message,
            stack_trace = %report.stack_trace,
            "Crash report"
        );
        Ok(())
    }
}

#[derive(Serialize)]
struct AlertPayload<'a> {
    subject: String,
    recipients: &'a [String],
    report: &'a CrashReport,
}

/// POSTs the report as JSON to a webhook.
#[derive(Debug, Clone)]
pub struct WebhookAlertTransport {
    client: reqwest::Client,
    url: String,
    recipients: Vec<String>,
}

impl WebhookAlertTransport {
    pub fn new(url: impl Into<String>, recipients: Vec<String>, timeout: Duration) -> Result<Self, AlertError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
            recipients,
        })
    }
}

#[async_trait]
impl AlertTransport for WebhookAlertTransport {
    async fn dispatch(&self, report: &CrashReport) -> Result<(), AlertError> {
        let payload = AlertPayload {
            subject: format!("blog-service crash at {}", report.timestamp.to_rfc3339()),
            recipients: &self.recipients,
            report,
        };

        let response = self.client.post(&self.url).json(&payload).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(AlertError::Rejected(status.as_u16()));
        }
        Ok(())
    }
}

/// Webhook transport when a URL is configured, log transport otherwise.
pub fn transport_from_config(config: &AlertConfig) -> Result<Arc<dyn AlertTransport>, AlertError> {
    match &config.webhook_url {
        Some(url) => {
            let transport = WebhookAlertTransport::new(
                url.clone(),
                config.recipients.clone(),
                Duration::from_secs(config.timeout_secs),
            )?;
            tracing::info!(url = %url, "Crash alerts go to webhook");
            Ok(Arc::new(transport))
        }
        None => {
            tracing::info!("No alert webhook configured; crash reports are logged only");
            Ok(Arc::new(LogAlertTransport))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn report() -> CrashReport {
        CrashReport {
            timestamp: chrono::Utc::now(),
            message: "boom".into(),
            stack_trace: "0: handler".into(),
            request_method: "GET".into(),
            request_path: "/api/v1/tags".into(),
            request_id: Some("req-1".into()),
            status_at_failure: 500,
        }
    }

    /// One-shot HTTP endpoint answering with `status_line`; returns the raw request.
    async fn one_shot_endpoint(status_line: &'static str) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/alerts", listener.local_addr().unwrap());
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 16 * 1024];
            let mut received = Vec::new();
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                received.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&received);
                if let Some(split) = text.find("\r\n\r\n") {
                    let content_length = text[..split]
                        .lines()
                        .find_map(|l| l.to_ascii_lowercase().strip_prefix("content-length:").map(|v| v.trim().parse::<usize>().unwrap()))
                        .unwrap_or(0);
                    if received.len() >= split + 4 + content_length {
                        break;
                    }
                }
                if n == 0 {
                    break;
                }
            }
            let response = format!("HTTP/1.1 {}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n", status_line);
            socket.write_all(response.as_bytes()).await.unwrap();
            let _ = socket.shutdown().await;
            String::from_utf8_lossy(&received).into_owned()
        });
        (url, handle)
    }

    #[tokio::test]
    async fn test_webhook_posts_report() {
        let (url, endpoint) = one_shot_endpoint("200 OK").await;
        let transport = WebhookAlertTransport::new(url, vec!["ops@example.com".into()], Duration::from_secs(5)).unwrap();

        transport.dispatch(&report()).await.unwrap();

        let request = endpoint.await.unwrap();
        assert!(request.starts_with("POST /alerts"));
        assert!(request.contains("\"message\":\"boom\""));
        assert!(request.contains("ops@example.com"));
    }

    #[tokio::test]
    async fn test_webhook_error_status_is_reported() {
        let (url, endpoint) = one_shot_endpoint("503 Service Unavailable").await;
        let transport = WebhookAlertTransport::new(url, vec![], Duration::from_secs(5)).unwrap();

        let err = transport.dispatch(&report()).await.unwrap_err();
        assert!(matches!(err, AlertError::Rejected(503)));
        endpoint.await.unwrap();
    }

    #[tokio::test]
    async fn test_log_transport_always_succeeds() {
        assert!(LogAlertTransport.dispatch(&report()).await.is_ok());
    }
}
