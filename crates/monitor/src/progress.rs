//! Reconciled state of one tracked saga.
//!
//! Snapshots may arrive duplicated, out of order or overtaken by a later
//! answer. [`SagaProgress::apply`] folds them into a monotonic view: the
//! completed set is a union, and a snapshot whose status ranks below the
//! current one is discarded.

use std::collections::BTreeSet;

use common::SagaId;
use domain::{Money, OrderType, SagaSnapshot, SagaStatus, StepId, StepPath, StepRegistry};

/// Result of folding one snapshot into the progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciled {
    /// The snapshot was merged.
    Applied { status_changed: bool },
    /// The snapshot was older than what is already known.
    Stale,
    /// The snapshot belongs to another saga.
    ForeignSaga,
}

/// Monotonic, canonicalised view of a saga built from its snapshots.
#[derive(Debug, Clone)]
pub struct SagaProgress {
    saga_id: SagaId,
    status: SagaStatus,
    current_step: Option<StepId>,
    completed: BTreeSet<StepId>,
    failure_reason: Option<String>,
    order_type: Option<OrderType>,
    execution_price: Option<Money>,
    compensation_chain: Vec<StepId>,
}

impl SagaProgress {
    /// Starts tracking from the snapshot returned by the submit call.
    pub fn new(initial: &SagaSnapshot, registry: &StepRegistry) -> Self {
        let mut progress = Self {
            saga_id: initial.saga_id.clone(),
            status: initial.status,
            current_step: None,
            completed: BTreeSet::new(),
            failure_reason: None,
            order_type: None,
            execution_price: None,
            compensation_chain: Vec::new(),
        };
        progress.merge(initial, registry);
        progress
    }

    /// Folds a snapshot into the progress.
    pub fn apply(&mut self, snapshot: &SagaSnapshot, registry: &StepRegistry) -> Reconciled {
        if snapshot.saga_id != self.saga_id {
            return Reconciled::ForeignSaga;
        }
        if snapshot.status.rank() < self.status.rank()
            || (self.status.is_terminal() && snapshot.status != self.status)
        {
            return Reconciled::Stale;
        }

        let status_changed = snapshot.status != self.status;
        self.status = snapshot.status;
        self.merge(snapshot, registry);
        Reconciled::Applied { status_changed }
    }

    fn merge(&mut self, snapshot: &SagaSnapshot, registry: &StepRegistry) {
        self.completed
            .extend(registry.canonical_set(&snapshot.completed_steps));
        self.current_step = snapshot.current_step.as_ref().map(|step| {
            registry
                .canonicalize(step.as_str())
                .cloned()
                .unwrap_or_else(|| step.clone())
        });

        if snapshot.failure_reason.is_some() {
            self.failure_reason.clone_from(&snapshot.failure_reason);
        }
        if snapshot.order_type.is_some() {
            self.order_type = snapshot.order_type;
        }
        if snapshot.execution_price.is_some() {
            self.execution_price = snapshot.execution_price;
        }

        if self.status.is_compensation_phase() {
            let chain: Vec<StepId> = registry
                .compensation_chain(&self.completed)
                .into_iter()
                .map(|definition| definition.id.clone())
                .collect();
            // Completed steps only grow, but a stale chain must never replace
            // a longer one already on screen.
            if chain.len() >= self.compensation_chain.len() {
                self.compensation_chain = chain;
            }
        }
    }

    pub fn saga_id(&self) -> &SagaId {
        &self.saga_id
    }

    pub fn status(&self) -> SagaStatus {
        self.status
    }

    pub fn current_step(&self) -> Option<&StepId> {
        self.current_step.as_ref()
    }

    /// Every canonical step id reported as completed so far.
    pub fn completed(&self) -> &BTreeSet<StepId> {
        &self.completed
    }

    pub fn failure_reason(&self) -> Option<&str> {
        self.failure_reason.as_deref()
    }

    pub fn order_type(&self) -> Option<OrderType> {
        self.order_type
    }

    pub fn execution_price(&self) -> Option<Money> {
        self.execution_price
    }

    /// Compensation chain resolved from forward progress; empty outside the
    /// compensation phase.
    pub fn compensation_chain(&self) -> &[StepId] {
        &self.compensation_chain
    }

    /// The ordering the reveal follows right now and the steps of it that are
    /// done.
    ///
    /// Forward mode reveals the completed forward steps. Compensation mode
    /// reveals the chain steps the backend reports done, and the whole chain
    /// once compensation has completed.
    pub fn reveal_target(&self, registry: &StepRegistry) -> (Vec<StepId>, BTreeSet<StepId>) {
        if self.status.is_compensation_phase() {
            let order = self.compensation_chain.clone();
            let done = if self.status == SagaStatus::CompensationCompleted {
                order.iter().cloned().collect()
            } else {
                order
                    .iter()
                    .filter(|id| self.completed.contains(*id))
                    .cloned()
                    .collect()
            };
            (order, done)
        } else {
            let done = self
                .completed
                .iter()
                .filter(|id| registry.path_of(id.as_str()) == Some(StepPath::Forward))
                .cloned()
                .collect();
            (registry.forward_ids(), done)
        }
    }
}
