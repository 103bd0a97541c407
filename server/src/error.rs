//! HTTP error type bridging domain errors to responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use std::fmt;
use turnstile_inventory::ReserveError;

/// Application error rendered as a JSON `{code, message}` body.
///
/// Client-input problems stay at 4xx and are not logged at error level;
/// backend failures become 5xx and are, along with their source chain.
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    message: String,
    code: String,
    source: Option<anyhow::Error>,
}

impl AppError {
    /// Create an error with an explicit status and code.
    #[must_use]
    pub const fn new(status: StatusCode, message: String, code: String) -> Self {
        Self {
            status,
            message,
            code,
            source: None,
        }
    }

    /// Attach the underlying error for server-side logging.
    #[must_use]
    pub fn with_source(mut self, source: anyhow::Error) -> Self {
        self.source = Some(source);
        self
    }

    /// 400 Bad Request.
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            message.into(),
            "BAD_REQUEST".to_string(),
        )
    }

    /// 401 Unauthorized.
    #[must_use]
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::UNAUTHORIZED,
            message.into(),
            "UNAUTHORIZED".to_string(),
        )
    }

    /// 500 Internal Server Error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            message.into(),
            "INTERNAL_SERVER_ERROR".to_string(),
        )
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

/// JSON body of an error response.
#[derive(Debug, Serialize)]
struct ErrorBody {
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            match &self.source {
                Some(source) => tracing::error!(
                    status = %self.status,
                    code = %self.code,
                    message = %self.message,
                    error = %source,
                    "request failed"
                ),
                None => tracing::error!(
                    status = %self.status,
                    code = %self.code,
                    message = %self.message,
                    "request failed"
                ),
            }
        }

        let body = ErrorBody {
            code: self.code,
            message: self.message,
        };
        (self.status, Json(body)).into_response()
    }
}

/// Reservation outcomes map onto the public error contract: contention and
/// absent counters are the caller's problem (400), store trouble is ours
/// (500).
impl From<ReserveError> for AppError {
    fn from(err: ReserveError) -> Self {
        match err {
            ReserveError::EventNotFound
            | ReserveError::Insufficient { .. }
            | ReserveError::TooManyRetries { .. } => Self::bad_request(err.to_string()),
            ReserveError::Store(source) => {
                Self::internal("Error fetching tickets").with_source(source.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use turnstile_inventory::InventoryError;

    #[test]
    fn display_includes_code_and_message() {
        let err = AppError::bad_request("Invalid request body");
        assert_eq!(err.to_string(), "[BAD_REQUEST] Invalid request body");
    }

    #[test]
    fn reserve_errors_map_to_the_public_contract() {
        let not_found: AppError = ReserveError::EventNotFound.into();
        assert_eq!(not_found.status, StatusCode::BAD_REQUEST);
        assert_eq!(not_found.message, "concert not found");

        let insufficient: AppError = ReserveError::Insufficient {
            available: 1,
            requested: 2,
        }
        .into();
        assert_eq!(insufficient.status, StatusCode::BAD_REQUEST);
        assert_eq!(insufficient.message, "not enough tickets");

        let retries: AppError = ReserveError::TooManyRetries { attempts: 10 }.into();
        assert_eq!(retries.status, StatusCode::BAD_REQUEST);
        assert_eq!(retries.message, "too many retries");

        let store: AppError = ReserveError::Store(InventoryError::Timeout).into();
        assert_eq!(store.status, StatusCode::INTERNAL_SERVER_ERROR);
    }
}
