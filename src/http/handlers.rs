//! Routes owned by the admission layer itself.
//!
//! `/auth` turns an app key and secret into a bearer token, `/api/v1/whoami`
//! echoes the verified claims, `/healthz` is an unauthenticated liveness
//! probe. Content routes are mounted by the embedding service.

use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::http::response::ApiError;
use crate::observability::metrics;
use crate::resilience::deadline::RequestContext;
use crate::security::auth::{AuthValidator, Claims};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AuthRequest {
    #[serde(default)]
    pub app_key: String,
    #[serde(default)]
    pub app_secret: String,
}

impl AuthRequest {
    fn validate(&self) -> Result<(), ApiError> {
        let mut details = Vec::new();
        if self.app_key.trim().is_empty() {
            details.push("app_key is required".to_string());
        }
        if self.app_secret.trim().is_empty() {
            details.push("app_secret is required".to_string());
        }
        if details.is_empty() {
            Ok(())
        } else {
            Err(ApiError::InvalidParams(details))
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TokenResponse {
    pub token: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WhoAmI {
    pub issuer: String,
    pub app_key_hash: String,
    pub expires_at: u64,
}

async fn issue_token(auth: &AuthValidator, request: AuthRequest) -> Result<Json<TokenResponse>, ApiError> {
    request.validate()?;

    match auth.issue(&request.app_key, &request.app_secret).await {
        Ok(token) => {
            metrics::record_token_issued();
            Ok(Json(TokenResponse { token }))
        }
        Err(e) => {
            tracing::warn!(reason = e.reason(), error = %e, "Token issuance refused");
            metrics::record_auth_failure(e.reason());
            Err(e.into())
        }
    }
}

/// `GET /auth?app_key=..&app_secret=..`
pub async fn get_auth(
    State(auth): State<Arc<AuthValidator>>,
    query: Result<Query<AuthRequest>, QueryRejection>,
) -> Result<Json<TokenResponse>, ApiError> {
    let Query(request) = query.map_err(|e| ApiError::InvalidParams(vec![e.body_text()]))?;
    issue_token(&auth, request).await
}

/// `POST /auth` with a JSON body.
pub async fn post_auth(
    State(auth): State<Arc<AuthValidator>>,
    body: Result<Json<AuthRequest>, JsonRejection>,
) -> Result<Json<TokenResponse>, ApiError> {
    let Json(request) = body.map_err(|e| ApiError::InvalidParams(vec![e.body_text()]))?;
    issue_token(&auth, request).await
}

pub async fn whoami(
    Extension(claims): Extension<Claims>,
    Extension(ctx): Extension<RequestContext>,
) -> Result<Json<WhoAmI>, ApiError> {
    ctx.check()?;
    Ok(Json(WhoAmI {
        issuer: claims.iss,
        app_key_hash: claims.app_key,
        expires_at: claims.exp,
    }))
}

pub async fn healthz() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub async fn not_found() -> ApiError {
    ApiError::NotFound
}
