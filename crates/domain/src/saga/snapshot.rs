//! The saga snapshot returned by every backend call.

use std::collections::BTreeSet;

use common::SagaId;
use serde::{Deserialize, Deserializer, Serialize};

use super::{SagaStatus, StepId};
use crate::order::{Money, OrderType};

/// Immutable view of a remote saga at the moment it was polled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SagaSnapshot {
    pub saga_id: SagaId,
    pub status: SagaStatus,
    /// Step presently executing, or the one that failed.
    #[serde(default)]
    pub current_step: Option<StepId>,
    /// Finished steps in arrival order; may repeat ids across polls.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub completed_steps: Vec<StepId>,
    #[serde(default)]
    pub failure_reason: Option<String>,
    #[serde(default)]
    pub order_type: Option<OrderType>,
    #[serde(default)]
    pub execution_price: Option<Money>,
}

impl SagaSnapshot {
    /// Creates a snapshot with no progress.
    pub fn new(saga_id: SagaId, status: SagaStatus) -> Self {
        Self {
            saga_id,
            status,
            current_step: None,
            completed_steps: Vec::new(),
            failure_reason: None,
            order_type: None,
            execution_price: None,
        }
    }

    /// Sets the current step.
    pub fn with_current_step(mut self, step: impl Into<StepId>) -> Self {
        self.current_step = Some(step.into());
        self
    }

    /// Sets the completed steps.
    pub fn with_completed<I, S>(mut self, steps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<StepId>,
    {
        self.completed_steps = steps.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the failure reason.
    pub fn with_failure_reason(mut self, reason: impl Into<String>) -> Self {
        self.failure_reason = Some(reason.into());
        self
    }

    /// Sets the order type.
    pub fn with_order_type(mut self, order_type: OrderType) -> Self {
        self.order_type = Some(order_type);
        self
    }

    /// Completed steps as a set.
    pub fn completed_set(&self) -> BTreeSet<StepId> {
        self.completed_steps.iter().cloned().collect()
    }

    /// Returns true if the snapshot carries a terminal status.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<StepId>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<StepId>>::deserialize(deserializer)?.unwrap_or_default())
}
