//! Shutdown coordination.
//!
//! One [`Shutdown`] lives in `main`. The server waits on [`Shutdown::signalled`]
//! and stops accepting connections once it resolves; `main` then gives the
//! server task [`Shutdown::drain`] time to finish in-flight requests before
//! exiting anyway.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use thiserror::Error;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

#[derive(Debug, Error)]
pub enum DrainError {
    #[error("in-flight requests did not drain within {0:?}")]
    TimedOut(Duration),

    #[error("server task failed: {0}")]
    Server(#[from] std::io::Error),

    #[error("server task panicked or was aborted: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Coordinator for graceful shutdown.
pub struct Shutdown {
    tx: broadcast::Sender<()>,
    triggered: AtomicBool,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self {
            tx,
            triggered: AtomicBool::new(false),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Trigger the shutdown signal. Only the first call has an effect; it
    /// returns `true`.
    pub fn trigger(&self) -> bool {
        if self.triggered.swap(true, Ordering::SeqCst) {
            return false;
        }
        let listeners = self.tx.send(()).unwrap_or(0);
        tracing::info!(listeners, "Shutdown triggered");
        true
    }

    pub fn is_triggered(&self) -> bool {
        self.triggered.load(Ordering::SeqCst)
    }

    /// Number of tasks still listening.
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Future resolving once shutdown is triggered, including when that
    /// already happened before the call.
    pub fn signalled(&self) -> impl Future<Output = ()> + Send + 'static {
        // Subscribe before reading the flag so a concurrent trigger is seen
        // through one or the other.
        let mut rx = self.tx.subscribe();
        let already = self.is_triggered();
        async move {
            if !already {
                let _ = rx.recv().await;
            }
        }
    }

    /// Wait for the server task to finish draining, up to `timeout`.
    pub async fn drain(
        &self,
        server: JoinHandle<Result<(), std::io::Error>>,
        timeout: Duration,
    ) -> Result<(), DrainError> {
        match tokio::time::timeout(timeout, server).await {
            Ok(joined) => Ok(joined??),
            Err(_) => {
                tracing::warn!(
                    timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                    "Forcing shutdown"
                );
                Err(DrainError::TimedOut(timeout))
            }
        }
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_trigger_reaches_every_subscriber() {
        let shutdown = Shutdown::new();
        let mut a = shutdown.subscribe();
        let mut b = shutdown.subscribe();
        assert_eq!(shutdown.receiver_count(), 2);

        assert!(shutdown.trigger());
        assert!(a.recv().await.is_ok());
        assert!(b.recv().await.is_ok());
    }

    #[tokio::test]
    async fn test_second_trigger_is_ignored() {
        let shutdown = Shutdown::new();
        let mut rx = shutdown.subscribe();

        assert!(shutdown.trigger());
        assert!(!shutdown.trigger());
        assert!(shutdown.is_triggered());

        assert!(rx.recv().await.is_ok());
        assert!(matches!(
            rx.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        ));
    }

    #[tokio::test]
    async fn test_late_waiter_sees_earlier_trigger() {
        let shutdown = Shutdown::new();
        shutdown.trigger();

        tokio::time::timeout(Duration::from_secs(1), shutdown.signalled())
            .await
            .expect("signalled should resolve immediately after trigger");
    }

    #[tokio::test]
    async fn test_drain_returns_server_result() {
        let shutdown = Shutdown::new();
        let server = tokio::spawn(async { Ok::<(), std::io::Error>(()) });
        assert!(shutdown.drain(server, Duration::from_secs(1)).await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_drain_gives_up_after_timeout() {
        let shutdown = Shutdown::new();
        let server = tokio::spawn(async {
            tokio::time::sleep(Duration::from_secs(3_600)).await;
            Ok::<(), std::io::Error>(())
        });

        let result = shutdown.drain(server, Duration::from_millis(100)).await;
        assert!(matches!(result, Err(DrainError::TimedOut(_))));
    }
}
