use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;

use crate::error::{HistoryError, RefreshError};

#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub error: anyhow::Error,
}

impl AppError {
    pub fn with_status(status: StatusCode, error: impl Into<anyhow::Error>) -> Self {
        Self {
            status,
            error: error.into(),
        }
    }

    pub fn service_unavailable(error: impl Into<anyhow::Error>) -> Self {
        Self::with_status(StatusCode::SERVICE_UNAVAILABLE, error)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() && self.status != StatusCode::SERVICE_UNAVAILABLE {
            error!(error = ?self.error, "Request failed");
        }
        let body = Json(json!({ "error": self.error.to_string() }));
        (self.status, body).into_response()
    }
}

impl<E: Into<anyhow::Error>> From<E> for AppError {
    fn from(e: E) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            error: e.into(),
        }
    }
}

/// A refresh without an upstream is the caller's problem (503); storage
/// faults stay 500.
pub fn refresh_error(e: RefreshError) -> AppError {
    match e {
        RefreshError::NotConfigured => AppError::service_unavailable(e),
        RefreshError::Storage(fault) => fault.into(),
    }
}

pub fn history_error(e: HistoryError) -> AppError {
    match e {
        HistoryError::HoursOutOfRange { .. } => {
            AppError::with_status(StatusCode::UNPROCESSABLE_ENTITY, e)
        }
        HistoryError::Storage(fault) => fault.into(),
    }
}
