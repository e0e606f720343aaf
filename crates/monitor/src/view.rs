//! What the presentation layer reads.

use common::SagaId;
use domain::{Money, OrderType, SagaStatus, StepId, StockSymbol};
use serde::{Deserialize, Serialize};

use crate::gate::Notification;

/// Lifecycle of the tracking session.
///
/// ```text
/// Idle ──► Submitting ──► Active ──┬──► Compensating ──► Terminal ──► Idle
///              │                   └──────────────────►┘
///              └──► Idle (submit failed)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    #[default]
    Idle,
    Submitting,
    Active,
    Compensating,
    Terminal,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Idle => "IDLE",
            Phase::Submitting => "SUBMITTING",
            Phase::Active => "ACTIVE",
            Phase::Compensating => "COMPENSATING",
            Phase::Terminal => "TERMINAL",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How a step is drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepState {
    Pending,
    Active,
    Completed,
    Failed,
}

/// One row of the step list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepView {
    pub id: StepId,
    pub display_name: String,
    pub state: StepState,
}

impl StepView {
    /// Derives the row state. A revealed step is completed; the current step
    /// of a failed saga is failed; the current step otherwise is active.
    pub fn state_for(
        id: &StepId,
        revealed: bool,
        current_step: Option<&StepId>,
        status: Option<SagaStatus>,
    ) -> StepState {
        let is_current = current_step == Some(id);
        if revealed {
            StepState::Completed
        } else if is_current && status == Some(SagaStatus::Failed) {
            StepState::Failed
        } else if is_current {
            StepState::Active
        } else {
            StepState::Pending
        }
    }
}

/// Where a transient error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BannerKind {
    Submission,
    Cancellation,
}

/// Transient inline error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Banner {
    pub kind: BannerKind,
    pub message: String,
}

impl Banner {
    pub fn submission(message: impl Into<String>) -> Self {
        Self {
            kind: BannerKind::Submission,
            message: message.into(),
        }
    }

    pub fn cancellation(message: impl Into<String>) -> Self {
        Self {
            kind: BannerKind::Cancellation,
            message: message.into(),
        }
    }
}

/// Everything the UI needs to draw the tracker.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressView {
    pub phase: Phase,
    pub saga_id: Option<SagaId>,
    pub selection: Option<StockSymbol>,
    pub status: Option<SagaStatus>,
    pub current_step: Option<StepId>,
    pub order_type: Option<OrderType>,
    pub required_funds: Option<Money>,
    pub visible_completed_steps: Vec<StepId>,
    pub steps_to_show: Vec<StepView>,
    pub failure_reason: Option<String>,
    pub cancel_in_flight: bool,
    pub banner: Option<Banner>,
    pub ready_to_notify: bool,
    pub notification: Option<Notification>,
}

/// Pushed to the UI as things happen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum UiEvent {
    StepRevealed { saga_id: SagaId, step: StepId },
    AllStepsAnimated { saga_id: SagaId, status: SagaStatus },
    Notified { notification: Notification },
    Banner { banner: Banner },
}
