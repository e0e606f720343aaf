//! Exactly-once terminal notification.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use common::SagaId;
use domain::{Money, OrderType, SagaStatus, StockSymbol};
use serde::{Deserialize, Serialize};

/// What the terminal notification tells the user about the order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationDetails {
    /// Final saga status; `None` when polling failed before one was known.
    pub status: Option<SagaStatus>,
    pub stock_symbol: StockSymbol,
    pub order_type: OrderType,
    pub quantity: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit_price: Option<Money>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_price: Option<Money>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
}

/// The single success/failure notification of a saga.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub saga_id: SagaId,
    pub success: bool,
    pub details: NotificationDetails,
    pub notified_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct Awaiting {
    terminal: Option<(SagaStatus, NotificationDetails)>,
    animated: Option<SagaStatus>,
}

/// Fires once per saga id, when the poller has reported a terminal snapshot
/// and the sequencer has finished animating that same status.
#[derive(Debug, Default)]
pub struct NotificationGate {
    notified: HashSet<SagaId>,
    awaiting: HashMap<SagaId, Awaiting>,
}

impl NotificationGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a terminal snapshot.
    pub fn terminal_reported(
        &mut self,
        saga_id: &SagaId,
        status: SagaStatus,
        details: NotificationDetails,
    ) -> Option<Notification> {
        if self.notified.contains(saga_id) || !status.is_terminal() {
            return None;
        }
        let entry = self.awaiting.entry(saga_id.clone()).or_default();
        if entry.terminal.is_none() {
            entry.terminal = Some((status, details));
        }
        self.try_fire(saga_id)
    }

    /// Records that every step of `status` has been revealed.
    pub fn animation_finished(
        &mut self,
        saga_id: &SagaId,
        status: SagaStatus,
    ) -> Option<Notification> {
        if self.notified.contains(saga_id) {
            return None;
        }
        self.awaiting.entry(saga_id.clone()).or_default().animated = Some(status);
        self.try_fire(saga_id)
    }

    /// Fires a failure immediately, without waiting for the animation.
    pub fn polling_failed(
        &mut self,
        saga_id: &SagaId,
        details: NotificationDetails,
    ) -> Option<Notification> {
        if !self.notified.insert(saga_id.clone()) {
            return None;
        }
        self.awaiting.remove(saga_id);
        Some(Notification {
            saga_id: saga_id.clone(),
            success: false,
            details,
            notified_at: Utc::now(),
        })
    }

    pub fn is_notified(&self, saga_id: &SagaId) -> bool {
        self.notified.contains(saga_id)
    }

    /// True while a terminal status is known but its animation still runs.
    pub fn is_awaiting_animation(&self, saga_id: &SagaId) -> bool {
        self.awaiting
            .get(saga_id)
            .is_some_and(|a| a.terminal.is_some())
    }

    fn try_fire(&mut self, saga_id: &SagaId) -> Option<Notification> {
        let ready = self.awaiting.get(saga_id).is_some_and(|a| {
            matches!((&a.terminal, a.animated), (Some((status, _)), Some(animated)) if *status == animated)
        });
        if !ready {
            return None;
        }

        let (status, details) = self.awaiting.remove(saga_id)?.terminal?;
        self.notified.insert(saga_id.clone());
        Some(Notification {
            saga_id: saga_id.clone(),
            success: status.is_success(),
            details,
            notified_at: Utc::now(),
        })
    }
}
