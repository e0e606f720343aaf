//! Derivation of the compensation chain from observed forward progress.

use std::collections::BTreeSet;

use crate::saga::{StepId, steps};

/// Milestones in priority order, each paired with the undo chain it implies.
///
/// Every milestone implies a strictly longer chain than the one below it, so
/// the first match is also the longest applicable chain. This mirrors the
/// orchestrator's own choice of first compensation step and must be kept in
/// step with it.
const DECISION_TABLE: &[(&[&str], &[&str])] = &[
    (
        &[steps::SETTLE_TRANSACTION],
        &[
            steps::REVERSE_SETTLEMENT,
            steps::REMOVE_POSITIONS,
            steps::CANCEL_BROKER_ORDER,
            steps::RELEASE_FUNDS,
            steps::CANCEL_ORDER,
        ],
    ),
    (
        &[steps::UPDATE_PORTFOLIO],
        &[
            steps::REMOVE_POSITIONS,
            steps::CANCEL_BROKER_ORDER,
            steps::RELEASE_FUNDS,
            steps::CANCEL_ORDER,
        ],
    ),
    (
        &[steps::UPDATE_ORDER_EXECUTED, steps::UPDATE_ORDER_VALIDATED],
        &[
            steps::CANCEL_BROKER_ORDER,
            steps::RELEASE_FUNDS,
            steps::CANCEL_ORDER,
        ],
    ),
    (
        &[steps::RESERVE_FUNDS],
        &[steps::RELEASE_FUNDS, steps::CANCEL_ORDER],
    ),
];

/// Chain used when no milestone has been reached.
const MINIMAL_CHAIN: &[&str] = &[steps::CANCEL_ORDER];

/// Pure resolver from completed forward steps to the ordered compensation
/// chain the backend runs (or ran).
#[derive(Debug, Clone, Copy, Default)]
pub struct CompensationPathResolver;

impl CompensationPathResolver {
    /// Resolves the compensation chain. Never fails: a set matching no
    /// milestone degrades to `[CANCEL_ORDER]`.
    pub fn resolve(completed: &BTreeSet<StepId>) -> Vec<StepId> {
        let chain = DECISION_TABLE
            .iter()
            .find(|(milestones, _)| milestones.iter().any(|m| completed.contains(*m)))
            .map_or(MINIMAL_CHAIN, |(_, chain)| *chain);

        chain.iter().copied().map(StepId::from).collect()
    }
}
