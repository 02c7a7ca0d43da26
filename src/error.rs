use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::metrics::{INTERNAL_ERRORS, RATE_LIMITED, VALIDATION_FAILURES};
use crate::models::ErrorBody;

/// Why a vitals submission was not accepted.
///
/// The `Display` text of every variant except `Internal` is sent to the
/// client verbatim. `Internal` keeps its cause for the server log only.
#[derive(Debug, thiserror::Error)]
pub enum VitalsError {
    #[error("Rate limit exceeded")]
    RateLimited,
    #[error("Content-Type must be application/json")]
    UnsupportedContentType,
    #[error("Missing required field: {0}")]
    MissingField(&'static str),
    #[error("Invalid metric name")]
    InvalidMetricName,
    #[error("Internal server error")]
    Internal(String),
}

impl VitalsError {
    pub fn status(&self) -> StatusCode {
        match self {
            VitalsError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            VitalsError::UnsupportedContentType
            | VitalsError::MissingField(_)
            | VitalsError::InvalidMetricName => StatusCode::BAD_REQUEST,
            VitalsError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn internal(cause: impl std::fmt::Display) -> Self {
        VitalsError::Internal(cause.to_string())
    }
}

impl IntoResponse for VitalsError {
    fn into_response(self) -> Response {
        match &self {
            VitalsError::RateLimited => RATE_LIMITED.inc(),
            VitalsError::Internal(cause) => {
                INTERNAL_ERRORS.inc();
                tracing::error!(%cause, "web vitals request failed");
            }
            _ => VALIDATION_FAILURES.inc(),
        }

        let body = ErrorBody { error: self.to_string() };
        (self.status(), Json(body)).into_response()
    }
}

// Failures delivering an error report to the monitoring backend
#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    #[error("invalid Sentry DSN: {0}")]
    InvalidDsn(String),
    #[error("error report transport failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("monitoring backend answered {0}")]
    Rejected(reqwest::StatusCode),
}
