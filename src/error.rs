//! Unified application error model and mapping helpers.
//! One enum covers both security chains; the HTTP mapping keeps failure bodies
//! free of internal detail, and credential failures carry a single merged
//! message so unknown-identifier and wrong-password are indistinguishable.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

#[derive(Debug, Clone, thiserror::Error)]
pub enum AuthError {
    /// Unknown identifier or hash mismatch. The two causes are merged on purpose.
    #[error("invalid credentials")]
    InvalidCredentials,
    /// Malformed token, bad signature, or wrong issuer.
    #[error("invalid token")]
    TokenInvalid,
    /// Structurally valid token past its expiry.
    #[error("token expired")]
    TokenExpired,
    /// Duplicate registration. The colliding field is not reported.
    #[error("registration conflict")]
    Conflict,
    /// No credential presented where one is required.
    #[error("unauthenticated")]
    Unauthenticated,
    /// Credential valid but role lacks the required permission.
    #[error("forbidden")]
    Unauthorized,
    /// Missing or mismatched CSRF token on a state-changing session request.
    #[error("invalid csrf token")]
    Csrf,
    #[error("internal error")]
    Internal,
}

impl AuthError {
    pub fn code_str(&self) -> &'static str {
        match self {
            AuthError::InvalidCredentials => "invalid_credentials",
            AuthError::TokenInvalid => "token_invalid",
            AuthError::TokenExpired => "token_expired",
            AuthError::Conflict => "conflict",
            AuthError::Unauthenticated => "unauthenticated",
            AuthError::Unauthorized => "forbidden",
            AuthError::Csrf => "csrf",
            AuthError::Internal => "internal",
        }
    }

    /// Map to HTTP status code.
    pub fn http_status(&self) -> StatusCode {
        match self {
            AuthError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            // Expired and invalid tokens are both unauthenticated to the caller.
            AuthError::TokenInvalid | AuthError::TokenExpired => StatusCode::UNAUTHORIZED,
            AuthError::Conflict => StatusCode::CONFLICT,
            AuthError::Unauthenticated => StatusCode::UNAUTHORIZED,
            AuthError::Unauthorized => StatusCode::FORBIDDEN,
            AuthError::Csrf => StatusCode::FORBIDDEN,
            AuthError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let body = Json(serde_json::json!({
            "status": "error",
            "code": self.code_str(),
            "message": self.to_string(),
        }));
        (self.http_status(), body).into_response()
    }
}

pub type AuthResult<T> = Result<T, AuthError>;
