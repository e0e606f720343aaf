//! Paced reveal of completed steps.
//!
//! The sequencer decides *what* to show next and *how long* to wait; it owns
//! no timer. The service drives it through a single
//! [`RevealScheduler`](crate::scheduler::RevealScheduler), so at most one
//! reveal is ever outstanding no matter how often [`feed`] is called.
//!
//! [`feed`]: StepAnimationSequencer::feed

use std::collections::{BTreeSet, VecDeque};
use std::time::Duration;

use domain::{SagaStatus, StepId};

use crate::config::MonitorConfig;

/// Which catalog is authoritative for the reveal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RevealMode {
    #[default]
    Forward,
    Compensation,
}

impl RevealMode {
    /// Mode implied by a saga status.
    pub fn for_status(status: SagaStatus) -> Self {
        if status.is_compensation_phase() {
            RevealMode::Compensation
        } else {
            RevealMode::Forward
        }
    }
}

/// What one timer expiry produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RevealStep {
    /// A step became visible.
    Revealed(StepId),
    /// Every step of a terminal saga is visible.
    AllStepsAnimated(SagaStatus),
    /// Nothing to do.
    Idle,
}

/// Reveals newly completed steps one at a time in canonical order.
#[derive(Debug, Clone)]
pub struct StepAnimationSequencer {
    reveal_cadence: Duration,
    compensation_cadence: Duration,
    terminal_pause: Duration,
    mode: RevealMode,
    epoch: u64,
    order: Vec<StepId>,
    visible: Vec<StepId>,
    pending: VecDeque<StepId>,
    status: Option<SagaStatus>,
    announced: bool,
}

impl StepAnimationSequencer {
    pub fn new(config: &MonitorConfig) -> Self {
        Self {
            reveal_cadence: config.reveal_cadence,
            compensation_cadence: config.compensation_cadence,
            terminal_pause: config.terminal_pause,
            mode: RevealMode::Forward,
            epoch: 0,
            order: Vec::new(),
            visible: Vec::new(),
            pending: VecDeque::new(),
            status: None,
            announced: false,
        }
    }

    /// Feeds the latest status, the completed steps and the ordering that is
    /// authoritative for that status.
    ///
    /// Steps not in `order` are never revealed. Returns true if the call
    /// switched mode, which discards everything visible or queued.
    pub fn feed(
        &mut self,
        status: SagaStatus,
        completed: &BTreeSet<StepId>,
        order: &[StepId],
    ) -> bool {
        let mode = RevealMode::for_status(status);
        let switched = mode != self.mode;
        if switched {
            self.mode = mode;
            self.epoch += 1;
            self.visible.clear();
            self.pending.clear();
            self.announced = false;
        }

        self.order = order.to_vec();
        self.status = Some(status);

        for id in order {
            if completed.contains(id) && !self.visible.contains(id) && !self.pending.contains(id)
            {
                self.pending.push_back(id.clone());
            }
        }

        // The ordering may have grown a prefix (a longer compensation chain),
        // so both sequences are re-sorted against it.
        let mut pending = std::mem::take(&mut self.pending);
        pending.make_contiguous().sort_by_key(|id| self.position(id));
        self.pending = pending;
        let mut visible = std::mem::take(&mut self.visible);
        visible.sort_by_key(|id| self.position(id));
        self.visible = visible;

        switched
    }

    fn position(&self, id: &StepId) -> usize {
        self.order.iter().position(|o| o == id).unwrap_or(usize::MAX)
    }

    /// Delay before the next [`on_timer`](Self::on_timer) call, or `None` if
    /// there is nothing left to do.
    pub fn next_delay(&self) -> Option<Duration> {
        if !self.pending.is_empty() {
            return Some(match self.mode {
                RevealMode::Forward => self.reveal_cadence,
                RevealMode::Compensation => self.compensation_cadence,
            });
        }
        match self.status {
            Some(status) if status.is_terminal() && !self.announced => Some(self.terminal_pause),
            _ => None,
        }
    }

    /// Advances the reveal by one step.
    pub fn on_timer(&mut self) -> RevealStep {
        if let Some(id) = self.pending.pop_front() {
            let rank = self.position(&id);
            let at = self.visible.partition_point(|v| self.position(v) < rank);
            self.visible.insert(at, id.clone());
            return RevealStep::Revealed(id);
        }
        match self.status {
            Some(status) if status.is_terminal() && !self.announced => {
                self.announced = true;
                RevealStep::AllStepsAnimated(status)
            }
            _ => RevealStep::Idle,
        }
    }

    pub fn mode(&self) -> RevealMode {
        self.mode
    }

    /// Changes whenever the visible sequence is discarded.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Steps already shown, in canonical order.
    pub fn visible(&self) -> &[StepId] {
        &self.visible
    }

    /// Steps waiting to be shown, in canonical order.
    pub fn pending(&self) -> impl Iterator<Item = &StepId> {
        self.pending.iter()
    }

    /// True once `AllStepsAnimated` has been emitted for the current mode.
    pub fn is_finished(&self) -> bool {
        self.announced
    }
}
