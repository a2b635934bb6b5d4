//! Access log coverage, including requests whose handler panicked.

use std::io;
use std::sync::{Arc, Mutex};

use axum::{http::StatusCode, routing, Router};
use tracing::Level;

mod common;
use common::*;

async fn explode() -> &'static str {
    panic!("template cache corrupted");
}

async fn ok() -> &'static str {
    "ok"
}

/// Log sink shared between the subscriber and the test.
#[derive(Clone, Default)]
struct Captured(Arc<Mutex<Vec<u8>>>);

impl Captured {
    fn lines(&self) -> Vec<String> {
        let bytes = self.0.lock().unwrap().clone();
        let text = String::from_utf8_lossy(&bytes).into_owned();
        text.lines().map(str::to_string).collect()
    }

    fn access_lines(&self, path: &str) -> Vec<String> {
        let span = format!("path={path} ");
        self.lines()
            .into_iter()
            .filter(|l| l.contains("finished processing request") && l.contains(&span))
            .collect()
    }
}

impl io::Write for Captured {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[tokio::test]
async fn test_every_request_gets_one_access_line_with_final_status() {
    let captured = Captured::default();
    let writer = captured.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(Level::DEBUG)
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();
    let _default = tracing::subscriber::set_default(subscriber);

    let public = Router::new()
        .route("/ok", routing::get(ok))
        .route("/explode", routing::get(explode));
    let app = build_app(&test_config(), Arc::new(RecordingAlerts::default()), public, Router::new());

    assert_eq!(send(&app, get("/ok")).await.status, StatusCode::OK);
    assert_eq!(send(&app, get("/explode")).await.status, StatusCode::INTERNAL_SERVER_ERROR);

    let ok_lines = captured.access_lines("/ok");
    assert_eq!(ok_lines.len(), 1, "{ok_lines:?}");
    assert!(ok_lines[0].contains("status=200"));

    let crash_lines = captured.access_lines("/explode");
    assert_eq!(crash_lines.len(), 1, "{crash_lines:?}");
    assert!(crash_lines[0].contains("status=500"));

    // The 500 also goes through the server-error classifier.
    assert!(captured
        .lines()
        .iter()
        .any(|l| l.contains("response failed") && l.contains("path=/explode ")));
}
