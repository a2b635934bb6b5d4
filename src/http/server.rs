//! HTTP server setup.
//!
//! # Responsibilities
//! - Assemble the public routes, the `/api/v1` protected group and the
//!   routes mounted by the embedding service
//! - Wrap everything in the admission [`Pipeline`]
//! - Serve on a listener until shutdown is signalled

use std::future::Future;

use axum::{routing::get, Router};
use tokio::net::TcpListener;

use crate::config::AppConfig;
use crate::http::handlers::{get_auth, healthz, not_found, post_auth, whoami};
use crate::http::pipeline::Pipeline;

/// Prefix of the route group that requires a bearer token.
pub const API_V1: &str = "/api/v1";

/// HTTP server for the service.
pub struct HttpServer {
    router: Router,
    config: AppConfig,
}

impl HttpServer {
    /// Server exposing only the built-in routes.
    pub fn new(config: AppConfig, pipeline: Pipeline) -> Self {
        Self::with_routes(config, pipeline, Router::new(), Router::new())
    }

    /// Server with extra `public` routes at the root and `protected` routes
    /// under [`API_V1`].
    pub fn with_routes(config: AppConfig, pipeline: Pipeline, public: Router, protected: Router) -> Self {
        let router = Self::build_router(&pipeline, public, protected);
        Self { router, config }
    }

    /// Build the Axum router with all middleware layers.
    pub fn build_router(pipeline: &Pipeline, public: Router, protected: Router) -> Router {
        let api_v1 = pipeline.protect(Router::new().route("/whoami", get(whoami)).merge(protected));

        let router = Router::new()
            .route("/healthz", get(healthz))
            .route("/auth", get(get_auth).post(post_auth))
            .with_state(pipeline.auth().clone())
            .merge(public)
            .nest(API_V1, api_v1)
            .fallback(not_found);

        pipeline.wrap(router)
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(
        self,
        listener: TcpListener,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                shutdown.await;
                tracing::info!("HTTP server draining connections");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}
