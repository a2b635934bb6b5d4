//! Error envelope returned to clients.
//!
//! Every failure leaving the pipeline is translated into an [`ApiError`],
//! rendered as `{"code": int, "msg": string, "details"?: [string]}`. The
//! message is fixed per code; internal error text only reaches the logs.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::security::auth::AuthError;

pub const CODE_SERVER_ERROR: i32 = 10_000_000;
pub const CODE_INVALID_PARAMS: i32 = 10_000_001;
pub const CODE_NOT_FOUND: i32 = 10_000_002;
pub const CODE_AUTH_NOT_EXIST: i32 = 10_000_003;
pub const CODE_TOKEN_ERROR: i32 = 10_000_004;
pub const CODE_TOKEN_TIMEOUT: i32 = 10_000_005;
pub const CODE_TOKEN_GENERATE: i32 = 10_000_006;
pub const CODE_TOO_MANY_REQUESTS: i32 = 10_000_007;
pub const CODE_DEADLINE_EXCEEDED: i32 = 10_000_008;

/// Body of every error response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorBody {
    pub code: i32,
    pub msg: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<String>,
}

/// Typed, user-safe error produced at the pipeline boundary.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid params: {}", .0.join("; "))]
    InvalidParams(Vec<String>),

    #[error("not found")]
    NotFound,

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("too many requests")]
    TooManyRequests,

    #[error("request deadline exceeded")]
    DeadlineExceeded,

    #[error("internal server error")]
    Internal,
}

impl ApiError {
    pub fn code(&self) -> i32 {
        match self {
            ApiError::InvalidParams(_) => CODE_INVALID_PARAMS,
            ApiError::NotFound => CODE_NOT_FOUND,
            ApiError::Auth(AuthError::NotFound) => CODE_AUTH_NOT_EXIST,
            ApiError::Auth(AuthError::Malformed(_) | AuthError::BadSignature) => CODE_TOKEN_ERROR,
            ApiError::Auth(AuthError::Expired) => CODE_TOKEN_TIMEOUT,
            ApiError::Auth(AuthError::GenerationFailed(_)) => CODE_TOKEN_GENERATE,
            ApiError::TooManyRequests => CODE_TOO_MANY_REQUESTS,
            ApiError::DeadlineExceeded => CODE_DEADLINE_EXCEEDED,
            ApiError::Internal => CODE_SERVER_ERROR,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidParams(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Auth(_) => StatusCode::UNAUTHORIZED,
            ApiError::TooManyRequests => StatusCode::TOO_MANY_REQUESTS,
            ApiError::DeadlineExceeded => StatusCode::GATEWAY_TIMEOUT,
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Client-facing message for this error's code.
    pub fn msg(&self) -> &'static str {
        match self.code() {
            CODE_INVALID_PARAMS => "invalid params",
            CODE_NOT_FOUND => "not found",
            CODE_AUTH_NOT_EXIST => "unauthorized: app key and secret not found",
            CODE_TOKEN_ERROR => "unauthorized: token error",
            CODE_TOKEN_TIMEOUT => "unauthorized: token timeout",
            CODE_TOKEN_GENERATE => "unauthorized: token generation failed",
            CODE_TOO_MANY_REQUESTS => "too many requests",
            CODE_DEADLINE_EXCEEDED => "request deadline exceeded",
            _ => "internal server error",
        }
    }

    pub fn body(&self) -> ErrorBody {
        let details = match self {
            ApiError::InvalidParams(details) => details.clone(),
            _ => Vec::new(),
        };
        ErrorBody {
            code: self.code(),
            msg: self.msg().to_string(),
            details,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(self.body())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(ApiError::InvalidParams(vec![]).status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::NotFound.status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::Auth(AuthError::Expired).status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::Auth(AuthError::NotFound).status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::TooManyRequests.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(ApiError::DeadlineExceeded.status(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(ApiError::Internal.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_internal_detail_never_reaches_body() {
        let err = ApiError::Auth(AuthError::GenerationFailed("hmac key rejected".into()));
        let body = err.body();
        assert_eq!(body.code, CODE_TOKEN_GENERATE);
        assert!(!body.msg.contains("hmac"));
        assert!(body.details.is_empty());
    }

    #[test]
    fn test_details_serialization() {
        let with = serde_json::to_value(ApiError::InvalidParams(vec!["app_key is required".into()]).body()).unwrap();
        assert_eq!(with["details"][0], "app_key is required");

        let without = serde_json::to_value(ApiError::TooManyRequests.body()).unwrap();
        assert_eq!(without["code"], CODE_TOO_MANY_REQUESTS);
        assert!(without.get("details").is_none());
    }
}
