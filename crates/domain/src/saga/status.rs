//! Saga status as reported by the backend.

use serde::{Deserialize, Serialize};

/// The status of a remote saga.
///
/// Transitions observed from the client:
/// ```text
/// Submitted ──► InProgress ──┬──► Completed
///                            ├──► Failed
///                            └──► Compensating ──► CompensationCompleted
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SagaStatus {
    /// Accepted by the orchestrator, no step has run yet.
    #[default]
    #[serde(alias = "STARTED")]
    Submitted,

    /// Forward steps are executing.
    InProgress,

    /// Every forward step finished (terminal state).
    Completed,

    /// The saga failed without a compensation run (terminal state).
    Failed,

    /// Compensating steps are undoing forward work.
    Compensating,

    /// Compensation finished (terminal state).
    CompensationCompleted,
}

impl SagaStatus {
    /// Returns true if no further transition can occur.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SagaStatus::Completed | SagaStatus::Failed | SagaStatus::CompensationCompleted
        )
    }

    /// Returns true once the compensation registry is authoritative.
    pub fn is_compensation_phase(&self) -> bool {
        matches!(
            self,
            SagaStatus::Compensating | SagaStatus::CompensationCompleted
        )
    }

    /// Returns true only for a successfully completed saga.
    pub fn is_success(&self) -> bool {
        matches!(self, SagaStatus::Completed)
    }

    /// Position in the observable lifecycle.
    ///
    /// A snapshot whose rank is lower than one already seen for the same saga
    /// was overtaken in flight and carries no new information.
    pub fn rank(&self) -> u8 {
        match self {
            SagaStatus::Submitted => 0,
            SagaStatus::InProgress => 1,
            SagaStatus::Compensating => 2,
            SagaStatus::Completed | SagaStatus::Failed | SagaStatus::CompensationCompleted => 3,
        }
    }

    /// Returns the wire name of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            SagaStatus::Submitted => "SUBMITTED",
            SagaStatus::InProgress => "IN_PROGRESS",
            SagaStatus::Completed => "COMPLETED",
            SagaStatus::Failed => "FAILED",
            SagaStatus::Compensating => "COMPENSATING",
            SagaStatus::CompensationCompleted => "COMPENSATION_COMPLETED",
        }
    }
}

impl std::fmt::Display for SagaStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
