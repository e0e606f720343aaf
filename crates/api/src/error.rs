//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use monitor::{CancellationError, MonitorStopped, SubmissionError};

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Submitting an order failed.
    Submission(SubmissionError),
    /// Cancelling the tracked saga failed.
    Cancellation(CancellationError),
    /// Bad request from the client.
    BadRequest(String),
    /// The monitor task is gone.
    Unavailable,
}

impl ApiError {
    fn status_and_message(&self) -> (StatusCode, String) {
        match self {
            ApiError::Submission(err) => (submission_status(err), err.to_string()),
            ApiError::Cancellation(err) => (cancellation_status(err), err.to_string()),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::Unavailable => (
                StatusCode::SERVICE_UNAVAILABLE,
                MonitorStopped.to_string(),
            ),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = self.status_and_message();
        if status.is_server_error() {
            tracing::warn!(status = status.as_u16(), error = %message, "request failed");
        }

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

fn submission_status(err: &SubmissionError) -> StatusCode {
    match err {
        SubmissionError::InvalidOrder(_) => StatusCode::BAD_REQUEST,
        SubmissionError::SagaAlreadyActive { .. } | SubmissionError::Superseded => {
            StatusCode::CONFLICT
        }
        SubmissionError::Rejected { .. } | SubmissionError::Transport(_) => StatusCode::BAD_GATEWAY,
        SubmissionError::MonitorStopped => StatusCode::SERVICE_UNAVAILABLE,
    }
}

fn cancellation_status(err: &CancellationError) -> StatusCode {
    match err {
        CancellationError::NoActiveSaga | CancellationError::UnknownSaga(_) => {
            StatusCode::NOT_FOUND
        }
        CancellationError::AlreadyTerminal { .. } | CancellationError::TrackingReset => {
            StatusCode::CONFLICT
        }
        CancellationError::Rejected { .. } | CancellationError::Transport(_) => {
            StatusCode::BAD_GATEWAY
        }
        CancellationError::MonitorStopped => StatusCode::SERVICE_UNAVAILABLE,
    }
}

impl From<SubmissionError> for ApiError {
    fn from(err: SubmissionError) -> Self {
        ApiError::Submission(err)
    }
}

impl From<CancellationError> for ApiError {
    fn from(err: CancellationError) -> Self {
        ApiError::Cancellation(err)
    }
}

impl From<MonitorStopped> for ApiError {
    fn from(_: MonitorStopped) -> Self {
        ApiError::Unavailable
    }
}
