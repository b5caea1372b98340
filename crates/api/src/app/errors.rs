//! Operational errors and their rendering.
//!
//! Handlers return `Result<Response, AppError>`. `AppError::into_response`
//! renders a production-safe body and attaches an [`ErrorReport`];
//! `middleware::render_errors` swaps in the development rendering when the
//! server runs with `ENV=development`.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use tourbook_auth::{AuthzError, TokenValidationError};
use tourbook_core::DomainError;
use tourbook_infra::{Environment, ImageError};

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Expected, user-facing failure.
    #[error("{message}")]
    Operational { status: StatusCode, message: String },

    /// Defect or infrastructure failure; details are never shown in production.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self::Operational {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, message)
    }

    pub fn internal(message: impl std::fmt::Display) -> Self {
        Self::Internal(anyhow::anyhow!("{message}"))
    }

    /// 404 in the "No <resource> found with that ID" form.
    pub fn missing(resource: &str) -> Self {
        Self::not_found(format!("No {resource} found with that ID"))
    }

    /// Map a domain error, passing validation messages through unprefixed.
    pub fn verbatim(err: DomainError) -> Self {
        match err {
            DomainError::Validation(msg) => Self::bad_request(msg),
            other => other.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Operational { status, .. } => *status,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<DomainError> for AppError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::Validation(msg) => Self::bad_request(format!("Invalid input data. {msg}")),
            DomainError::InvalidId(_) => Self::bad_request("Invalid ID format"),
            DomainError::NotFound(resource) => Self::missing(&resource),
            DomainError::Conflict(msg) => {
                Self::bad_request(format!("Duplicate field value: {msg}. Please use another value!"))
            }
            DomainError::Unauthorized => {
                Self::unauthorized("You are not logged in! Please log in to get access.")
            }
            DomainError::Forbidden(msg) => Self::forbidden(msg),
            DomainError::InvariantViolation(msg) => Self::new(StatusCode::UNPROCESSABLE_ENTITY, msg),
        }
    }
}

impl From<TokenValidationError> for AppError {
    fn from(err: TokenValidationError) -> Self {
        match err {
            TokenValidationError::Expired => Self::unauthorized("Your token has expired! Please log in again!"),
            _ => Self::unauthorized("Invalid token. Please log in again!"),
        }
    }
}

impl From<AuthzError> for AppError {
    fn from(err: AuthzError) -> Self {
        Self::forbidden(err.to_string())
    }
}

impl From<ImageError> for AppError {
    fn from(err: ImageError) -> Self {
        Self::bad_request(err.to_string())
    }
}

fn status_word(status: StatusCode) -> &'static str {
    if status.is_client_error() { "fail" } else { "error" }
}

/// What went wrong, carried in response extensions for the render middleware.
#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub status: StatusCode,
    pub message: String,
    pub operational: bool,
    pub stack: String,
}

impl ErrorReport {
    fn from_error(err: &AppError) -> Self {
        Self {
            status: err.status(),
            message: err.to_string(),
            operational: matches!(err, AppError::Operational { .. }),
            stack: format!("{err:?}"),
        }
    }

    pub fn render(&self, env: Environment) -> Response {
        let status = status_word(self.status);
        let body = match env {
            Environment::Production if self.operational => json!({
                "status": status,
                "message": self.message,
            }),
            Environment::Production => json!({
                "status": "error",
                "message": "Something went very wrong!",
            }),
            Environment::Development => json!({
                "status": status,
                "error": {
                    "statusCode": self.status.as_u16(),
                    "status": status,
                    "isOperational": self.operational,
                },
                "message": self.message,
                "stack": self.stack,
            }),
        };
        (self.status, Json(body)).into_response()
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if let AppError::Internal(cause) = &self {
            tracing::error!(error = ?cause, "internal error");
        }
        let report = ErrorReport::from_error(&self);
        let mut response = report.render(Environment::Production);
        response.extensions_mut().insert(report);
        response
    }
}
