//! Monitor error types.
//!
//! Every fallible boundary of the engine funnels into one of three kinds:
//! submission (recoverable, the user retries), polling (terminal for the
//! saga) and cancellation (transient, tracking continues).

use common::SagaId;
use domain::{OrderError, SagaStatus};
use thiserror::Error;

use crate::backend::BackendError;

/// The monitor task has shut down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Monitor is not running")]
pub struct MonitorStopped;

/// Errors returned when starting a saga.
#[derive(Debug, Clone, Error)]
pub enum SubmissionError {
    /// The order failed local validation.
    #[error("Invalid order: {0}")]
    InvalidOrder(#[from] OrderError),

    /// A saga is already being tracked for the current selection.
    #[error("A saga is already active: {saga_id}")]
    SagaAlreadyActive { saga_id: String },

    /// The backend refused the order.
    #[error("Order rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// The submit request never produced a usable answer.
    #[error("Order submission failed: {0}")]
    Transport(String),

    /// Tracking was reset while the submit request was in flight.
    #[error("Submission superseded by a reset")]
    Superseded,

    /// The monitor task is gone.
    #[error("Monitor is not running")]
    MonitorStopped,
}

impl From<BackendError> for SubmissionError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Rejected { status, message } => {
                SubmissionError::Rejected { status, message }
            }
            BackendError::Transport(msg) | BackendError::Decode(msg) => {
                SubmissionError::Transport(msg)
            }
        }
    }
}

impl From<MonitorStopped> for SubmissionError {
    fn from(_: MonitorStopped) -> Self {
        SubmissionError::MonitorStopped
    }
}

/// Errors observed while polling an active saga. Always terminal for that
/// saga: its remote state may be inconsistent, so the poller does not retry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PollingError {
    /// Network failure.
    #[error("Status request failed: {0}")]
    Transport(String),

    /// The response body was not a saga snapshot.
    #[error("Malformed status response: {0}")]
    Decode(String),

    /// The backend answered with an error status.
    #[error("Status request rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// The backend answered for a different saga.
    #[error("Status response for {actual}, expected {expected}")]
    SagaMismatch { expected: SagaId, actual: SagaId },
}

impl From<BackendError> for PollingError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Transport(msg) => PollingError::Transport(msg),
            BackendError::Decode(msg) => PollingError::Decode(msg),
            BackendError::Rejected { status, message } => {
                PollingError::Rejected { status, message }
            }
        }
    }
}

/// Errors returned by a cancellation request. Never change saga state.
#[derive(Debug, Clone, Error)]
pub enum CancellationError {
    /// Nothing is being tracked.
    #[error("No saga is active")]
    NoActiveSaga,

    /// The id does not match the tracked saga.
    #[error("Saga {0} is not the active saga")]
    UnknownSaga(SagaId),

    /// Terminal sagas cannot be cancelled.
    #[error("Saga {saga_id} already finished with status {status}")]
    AlreadyTerminal { saga_id: SagaId, status: SagaStatus },

    /// The backend refused the cancellation.
    #[error("Cancellation rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// The cancel request never produced a usable answer.
    #[error("Cancellation failed: {0}")]
    Transport(String),

    /// Tracking was reset while the cancel request was in flight.
    #[error("Tracking was reset before the cancellation completed")]
    TrackingReset,

    /// The monitor task is gone.
    #[error("Monitor is not running")]
    MonitorStopped,
}

impl From<BackendError> for CancellationError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Rejected { status, message } => {
                CancellationError::Rejected { status, message }
            }
            BackendError::Transport(msg) | BackendError::Decode(msg) => {
                CancellationError::Transport(msg)
            }
        }
    }
}

impl From<MonitorStopped> for CancellationError {
    fn from(_: MonitorStopped) -> Self {
        CancellationError::MonitorStopped
    }
}
