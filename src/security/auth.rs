//! Bearer token issuance and verification.
//!
//! Tokens are HS256 JWTs carrying SHA-256 hashes of the app key and secret,
//! the issuer and an absolute expiry. Verification is stateless: there is no
//! session table or revocation list, so a token stays valid for its whole TTL
//! even if the credential behind it is later disabled.
//!
//! The hashed identifiers are part of the token format. Switching the hash
//! invalidates every outstanding token.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use axum::{
    body::Body,
    extract::State,
    http::{header::AUTHORIZATION, HeaderMap, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use jsonwebtoken::{errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::config::AuthConfig;
use crate::http::response::ApiError;
use crate::observability::metrics;
use crate::security::credentials::CredentialStore;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("app key and secret not found")]
    NotFound,

    #[error("malformed token: {0}")]
    Malformed(String),

    #[error("token signature mismatch")]
    BadSignature,

    #[error("token expired")]
    Expired,

    #[error("token generation failed: {0}")]
    GenerationFailed(String),
}

impl AuthError {
    /// Metric label.
    pub fn reason(&self) -> &'static str {
        match self {
            AuthError::NotFound => "not_found",
            AuthError::Malformed(_) => "malformed",
            AuthError::BadSignature => "bad_signature",
            AuthError::Expired => "expired",
            AuthError::GenerationFailed(_) => "generation_failed",
        }
    }
}

/// Signed token payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    /// SHA-256 of the app key, lowercase hex.
    pub app_key: String,
    /// SHA-256 of the app secret, lowercase hex.
    pub app_secret: String,
    pub iss: String,
    /// Expiry, seconds since the unix epoch.
    pub exp: u64,
}

/// One-way hash used for the identifiers carried in claims.
pub fn hash_identifier(value: &str) -> String {
    format!("{:x}", Sha256::digest(value.as_bytes()))
}

pub(crate) fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Issues and verifies bearer tokens.
pub struct AuthValidator {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    issuer: String,
    ttl: Duration,
    store: Arc<dyn CredentialStore>,
}

impl AuthValidator {
    pub fn new(config: &AuthConfig, store: Arc<dyn CredentialStore>) -> Self {
        let secret = config.secret.as_bytes();

        // expiry and issuer are checked by hand so each maps to its own error
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.required_spec_claims = HashSet::new();

        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
            issuer: config.issuer.clone(),
            ttl: Duration::from_secs(config.expire_secs),
            store,
        }
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Check the credential pair with the store, then sign a fresh token.
    pub async fn issue(&self, app_key: &str, app_secret: &str) -> Result<String, AuthError> {
        match self.store.verify(app_key, app_secret).await {
            Ok(true) => {}
            Ok(false) => return Err(AuthError::NotFound),
            Err(e) => {
                tracing::error!(error = %e, "Credential store lookup failed");
                return Err(AuthError::NotFound);
            }
        }
        self.mint(app_key, app_secret, unix_now())
    }

    /// Sign a token as of `now` without consulting the credential store.
    pub fn mint(&self, app_key: &str, app_secret: &str, now: u64) -> Result<String, AuthError> {
        let claims = Claims {
            app_key: hash_identifier(app_key),
            app_secret: hash_identifier(app_secret),
            iss: self.issuer.clone(),
            exp: now.saturating_add(self.ttl.as_secs()),
        };

        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AuthError::GenerationFailed(e.to_string()))
    }

    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        self.verify_at(token, unix_now())
    }

    pub fn verify_at(&self, token: &str, now: u64) -> Result<Claims, AuthError> {
        let data = jsonwebtoken::decode::<Claims>(token, &self.decoding, &self.validation)
            .map_err(|e| match e.kind() {
                ErrorKind::InvalidSignature => AuthError::BadSignature,
                _ => AuthError::Malformed(e.to_string()),
            })?;

        let claims = data.claims;
        // a validly signed token from another issuer shares our secret but
        // was not minted by us
        if claims.iss != self.issuer {
            return Err(AuthError::BadSignature);
        }
        if claims.exp < now {
            return Err(AuthError::Expired);
        }
        Ok(claims)
    }
}

fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers
        .get(AUTHORIZATION)
        .ok_or_else(|| AuthError::Malformed("missing Authorization header".into()))?
        .to_str()
        .map_err(|_| AuthError::Malformed("non-ASCII Authorization header".into()))?;

    value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AuthError::Malformed("expected a Bearer token".into()))
}

/// Middleware guarding a route group with bearer tokens.
///
/// Verified [`Claims`] are attached to the request extensions.
pub async fn auth_middleware(
    State(validator): State<Arc<AuthValidator>>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let verified = bearer_token(request.headers()).and_then(|token| validator.verify(token));

    match verified {
        Ok(claims) => {
            request.extensions_mut().insert(claims);
            next.run(request).await
        }
        Err(e) => {
            tracing::warn!(
                path = %request.uri().path(),
                reason = e.reason(),
                error = %e,
                "Rejected unauthenticated request"
            );
            metrics::record_auth_failure(e.reason());
            ApiError::Auth(e).into_response()
        }
    }
}
