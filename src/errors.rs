use crate::auth::AuthFailure;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::fmt;

/// Application-specific error types.
///
/// Every variant carries a stable machine-readable `reason` code in the
/// response body so clients can branch on the cause without parsing prose.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// Client exceeded its fixed-window request budget.
    RateLimitExceeded,
    /// Request lacked a usable identity; the specific cause is preserved.
    Unauthenticated(AuthFailure),
    /// Login requested for a phone with no matching person.
    UnknownPhone,
    /// Code confirmation without a pending code for that phone.
    NoPendingCode,
    /// Pending code passed its expiry; the record was deleted.
    CodeExpired,
    /// Attempt cap exhausted; the record was deleted.
    TooManyAttempts,
    /// Supplied code did not match; the record is retained.
    CodeMismatch,
    /// Resource not found error.
    NotFound(String),
    /// Bad request error (invalid input).
    BadRequest(String),
    /// Internal server error.
    Internal(String),
}

impl ApiError {
    /// Stable reason code reported to clients.
    pub fn reason(&self) -> &'static str {
        match self {
            ApiError::RateLimitExceeded => "rate_limited",
            ApiError::Unauthenticated(failure) => failure.reason(),
            ApiError::UnknownPhone => "unknown_phone",
            ApiError::NoPendingCode => "no_pending_code",
            ApiError::CodeExpired => "code_expired",
            ApiError::TooManyAttempts => "too_many_attempts",
            ApiError::CodeMismatch => "code_mismatch",
            ApiError::NotFound(_) => "not_found",
            ApiError::BadRequest(_) => "bad_request",
            ApiError::Internal(_) => "internal",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            ApiError::RateLimitExceeded | ApiError::TooManyAttempts => {
                StatusCode::TOO_MANY_REQUESTS
            }
            ApiError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            ApiError::UnknownPhone | ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::NoPendingCode | ApiError::CodeExpired | ApiError::CodeMismatch => {
                StatusCode::BAD_REQUEST
            }
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::RateLimitExceeded => {
                write!(f, "Rate limit exceeded. Try again later.")
            }
            ApiError::Unauthenticated(failure) => write!(f, "{}", failure),
            ApiError::UnknownPhone => write!(f, "Phone number is not registered"),
            ApiError::NoPendingCode => write!(f, "Request a login code first"),
            ApiError::CodeExpired => write!(f, "Verification code expired"),
            ApiError::TooManyAttempts => write!(f, "Too many verification attempts"),
            ApiError::CodeMismatch => write!(f, "Invalid verification code"),
            ApiError::NotFound(msg) => write!(f, "Not found: {}", msg),
            ApiError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            ApiError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    /// Converts the error into an HTTP response.
    ///
    /// Maps each variant to its status class and a JSON body carrying both a
    /// human-readable message and the machine-readable reason code.
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            ApiError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
            }
            ApiError::RateLimitExceeded => {
                tracing::warn!("Request rejected: rate limit exceeded");
            }
            ApiError::Unauthenticated(failure) => {
                tracing::debug!("Unauthenticated request: {}", failure.reason());
            }
            _ => {}
        }

        let body = Json(json!({
            "error": self.to_string(),
            "reason": self.reason(),
        }));

        (status, body).into_response()
    }
}
