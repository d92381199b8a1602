use std::sync::Arc;

use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

/// Errors surfaced by the API client.
///
/// `Clone` so that a single refresh failure can be handed to every request
/// that was queued behind it.
#[derive(Error, Debug, Clone)]
pub enum ApiError {
    #[error("Network error: {0}")]
    Network(Arc<reqwest::Error>),

    #[error("Session expired - please log in again")]
    AuthExpiredTerminal,

    #[error("Token refresh response was unusable: {0}")]
    RefreshProtocol(String),

    #[error("Token refresh was abandoned before it settled")]
    RefreshAbandoned,

    #[error("Login rejected: {0}")]
    LoginRejected(String),

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Rate limited - please wait before retrying")]
    RateLimited,

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Request failed with status {status}: {message}")]
    Application { status: StatusCode, message: String },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Credential store error: {0}")]
    Credentials(String),
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        ApiError::Network(Arc::new(err))
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::Credentials(format!("{:#}", err))
    }
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

/// Shown to the user when the server did not say what went wrong
pub const GENERIC_ERROR_MESSAGE: &str = "Something went wrong";

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: Option<String>,
    message: Option<String>,
}

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let mut end = MAX_ERROR_BODY_LENGTH;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
        }
    }

    /// Extract the human readable message the server put in an error body.
    ///
    /// Looks at `error` first, then `message`. Returns `None` for bodies that
    /// are not JSON or carry neither field.
    pub fn server_message(body: &str) -> Option<String> {
        let parsed: ErrorBody = serde_json::from_str(body).ok()?;
        parsed
            .error
            .or(parsed.message)
            .filter(|m| !m.trim().is_empty())
    }

    pub fn from_status(status: StatusCode, body: &str) -> Self {
        let detail = Self::server_message(body).unwrap_or_else(|| Self::truncate_body(body));
        match status.as_u16() {
            401 => ApiError::AuthExpiredTerminal,
            403 => ApiError::AccessDenied(detail),
            404 => ApiError::NotFound(detail),
            429 => ApiError::RateLimited,
            500..=599 => ApiError::ServerError(detail),
            _ => ApiError::Application {
                status,
                message: detail,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_message_prefers_error_field() {
        let body = r#"{"error": "Queue is closed", "message": "ignored"}"#;
        assert_eq!(ApiError::server_message(body).as_deref(), Some("Queue is closed"));

        let body = r#"{"message": "Client not found"}"#;
        assert_eq!(ApiError::server_message(body).as_deref(), Some("Client not found"));
    }

    #[test]
    fn test_server_message_missing() {
        assert_eq!(ApiError::server_message("<html>oops</html>"), None);
        assert_eq!(ApiError::server_message(r#"{"error": ""}"#), None);
        assert_eq!(ApiError::server_message(r#"{"status": 500}"#), None);
    }

    #[test]
    fn test_from_status_mapping() {
        assert!(matches!(
            ApiError::from_status(StatusCode::UNAUTHORIZED, ""),
            ApiError::AuthExpiredTerminal
        ));
        assert!(matches!(
            ApiError::from_status(StatusCode::TOO_MANY_REQUESTS, ""),
            ApiError::RateLimited
        ));
        match ApiError::from_status(StatusCode::NOT_FOUND, r#"{"error": "No such note"}"#) {
            ApiError::NotFound(msg) => assert_eq!(msg, "No such note"),
            other => panic!("unexpected error: {other:?}"),
        }
        match ApiError::from_status(StatusCode::UNPROCESSABLE_ENTITY, "bad phone") {
            ApiError::Application { status, message } => {
                assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
                assert_eq!(message, "bad phone");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_truncate_long_body() {
        let body = "x".repeat(MAX_ERROR_BODY_LENGTH + 20);
        let truncated = ApiError::truncate_body(&body);
        assert!(truncated.starts_with(&"x".repeat(MAX_ERROR_BODY_LENGTH)));
        assert!(truncated.ends_with("(truncated, 520 total bytes)"));
    }
}
