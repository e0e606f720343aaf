//! Scripted in-memory backend for tests and local runs.
//!
//! Each submission consumes the next queued [`SagaScript`]; each status poll
//! replays the next [`ScriptFrame`] of that script, repeating the last
//! snapshot once the script runs out.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use async_trait::async_trait;
use common::SagaId;
use domain::{OrderRequest, OrderType, SagaSnapshot, SagaStatus, StepId, StepRegistry};

use super::{BackendError, SagaBackend};

/// One scripted backend answer.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptFrame {
    /// Answer with a snapshot.
    Snapshot {
        status: SagaStatus,
        current_step: Option<StepId>,
        completed: Vec<StepId>,
        failure_reason: Option<String>,
    },
    /// Fail the request.
    Error(BackendError),
}

impl ScriptFrame {
    /// A snapshot with the given status and completed steps.
    pub fn progress<I, S>(status: SagaStatus, completed: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<StepId>,
    {
        ScriptFrame::Snapshot {
            status,
            current_step: None,
            completed: completed.into_iter().map(Into::into).collect(),
            failure_reason: None,
        }
    }

    /// A snapshot with the given status and no progress.
    pub fn status(status: SagaStatus) -> Self {
        Self::progress(status, Vec::<StepId>::new())
    }

    /// A transport failure.
    pub fn transport_error(message: impl Into<String>) -> Self {
        ScriptFrame::Error(BackendError::Transport(message.into()))
    }

    /// Sets the current step of a snapshot frame.
    pub fn with_current_step(mut self, step: impl Into<StepId>) -> Self {
        if let ScriptFrame::Snapshot { current_step, .. } = &mut self {
            *current_step = Some(step.into());
        }
        self
    }

    /// Sets the failure reason of a snapshot frame.
    pub fn with_failure_reason(mut self, reason: impl Into<String>) -> Self {
        if let ScriptFrame::Snapshot { failure_reason, .. } = &mut self {
            *failure_reason = Some(reason.into());
        }
        self
    }

    fn materialize(
        self,
        saga_id: &SagaId,
        order_type: OrderType,
    ) -> Result<SagaSnapshot, BackendError> {
        match self {
            ScriptFrame::Snapshot {
                status,
                current_step,
                completed,
                failure_reason,
            } => Ok(SagaSnapshot {
                saga_id: saga_id.clone(),
                status,
                current_step,
                completed_steps: completed,
                failure_reason,
                order_type: Some(order_type),
                execution_price: None,
            }),
            ScriptFrame::Error(err) => Err(err),
        }
    }
}

/// The answers the backend gives for one submitted saga.
#[derive(Debug, Clone)]
pub struct SagaScript {
    saga_id: Option<SagaId>,
    initial: ScriptFrame,
    frames: VecDeque<ScriptFrame>,
    on_cancel: Option<Vec<ScriptFrame>>,
}

impl SagaScript {
    /// A script that answers the submit with `SUBMITTED` and has no polls yet.
    pub fn new() -> Self {
        Self {
            saga_id: None,
            initial: ScriptFrame::status(SagaStatus::Submitted),
            frames: VecDeque::new(),
            on_cancel: None,
        }
    }

    /// Uses a fixed saga id instead of a generated one.
    pub fn with_saga_id(mut self, saga_id: impl Into<SagaId>) -> Self {
        self.saga_id = Some(saga_id.into());
        self
    }

    /// Replaces the answer to the submit request.
    pub fn starting_with(mut self, frame: ScriptFrame) -> Self {
        self.initial = frame;
        self
    }

    /// Appends the answer to the next status poll.
    pub fn then(mut self, frame: ScriptFrame) -> Self {
        self.frames.push_back(frame);
        self
    }

    /// Frames that replace the remaining script once the saga is cancelled.
    /// The first one answers the cancel request itself.
    pub fn on_cancel(mut self, frames: Vec<ScriptFrame>) -> Self {
        self.on_cancel = Some(frames);
        self
    }

    /// Walks every forward step of the registry, `per_poll` at a time, and
    /// finishes with `COMPLETED`.
    pub fn completes_all_steps(registry: &StepRegistry, per_poll: usize) -> Self {
        let ids = registry.forward_ids();
        let mut script = Self::new();
        let mut done: Vec<StepId> = Vec::new();
        for chunk in ids.chunks(per_poll.max(1)) {
            done.extend(chunk.iter().cloned());
            let status = if done.len() == ids.len() {
                SagaStatus::Completed
            } else {
                SagaStatus::InProgress
            };
            script = script.then(ScriptFrame::progress(status, done.clone()));
        }
        script
    }
}

impl Default for SagaScript {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug)]
struct SagaRun {
    order_type: OrderType,
    frames: VecDeque<ScriptFrame>,
    on_cancel: Option<Vec<ScriptFrame>>,
    last: SagaSnapshot,
}

impl SagaRun {
    fn next(&mut self, saga_id: &SagaId) -> Result<SagaSnapshot, BackendError> {
        match self.frames.pop_front() {
            Some(frame) => {
                let snapshot = frame.materialize(saga_id, self.order_type)?;
                self.last = snapshot.clone();
                Ok(snapshot)
            }
            None => Ok(self.last.clone()),
        }
    }

    fn default_cancellation(&self) -> Vec<ScriptFrame> {
        vec![
            ScriptFrame::progress(SagaStatus::Compensating, self.last.completed_steps.clone()),
            ScriptFrame::progress(
                SagaStatus::CompensationCompleted,
                self.last.completed_steps.clone(),
            )
            .with_failure_reason("Order cancelled by user"),
        ]
    }
}

#[derive(Debug, Default)]
struct InMemoryBackendState {
    queued: VecDeque<SagaScript>,
    runs: HashMap<SagaId, SagaRun>,
    submitted: Vec<OrderRequest>,
    fail_on_submit: Option<BackendError>,
    fail_on_cancel: Option<BackendError>,
    latency: Duration,
    status_calls: usize,
    cancel_calls: usize,
}

/// In-memory saga backend for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemorySagaBackend {
    state: Arc<RwLock<InMemoryBackendState>>,
}

impl InMemorySagaBackend {
    /// Creates a backend with no scripts queued.
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, InMemoryBackendState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, InMemoryBackendState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queues the script for the next submission. Unscripted submissions get
    /// a saga that stays `SUBMITTED`.
    pub fn push_script(&self, script: SagaScript) {
        self.write().queued.push_back(script);
    }

    /// Makes every submit fail with `error` (or succeed again with `None`).
    pub fn set_fail_on_submit(&self, error: Option<BackendError>) {
        self.write().fail_on_submit = error;
    }

    /// Makes every cancel fail with `error` (or succeed again with `None`).
    pub fn set_fail_on_cancel(&self, error: Option<BackendError>) {
        self.write().fail_on_cancel = error;
    }

    /// Delays every answer, to simulate a slow backend.
    pub fn set_latency(&self, latency: Duration) {
        self.write().latency = latency;
    }

    async fn delay(&self) {
        let latency = self.read().latency;
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
    }

    /// Orders received so far.
    pub fn submitted(&self) -> Vec<OrderRequest> {
        self.read().submitted.clone()
    }

    /// Number of status requests served.
    pub fn status_calls(&self) -> usize {
        self.read().status_calls
    }

    /// Number of cancel requests served.
    pub fn cancel_calls(&self) -> usize {
        self.read().cancel_calls
    }
}

#[async_trait]
impl SagaBackend for InMemorySagaBackend {
    async fn submit(&self, request: &OrderRequest) -> Result<SagaSnapshot, BackendError> {
        self.delay().await;
        let mut state = self.write();

        if let Some(err) = state.fail_on_submit.clone() {
            return Err(err);
        }

        let script = state.queued.pop_front().unwrap_or_default();
        let saga_id = script.saga_id.unwrap_or_else(SagaId::generate);
        let last = script.initial.materialize(&saga_id, request.order_type)?;

        state.submitted.push(request.clone());
        state.runs.insert(
            saga_id,
            SagaRun {
                order_type: request.order_type,
                frames: script.frames,
                on_cancel: script.on_cancel,
                last: last.clone(),
            },
        );

        Ok(last)
    }

    async fn status(&self, saga_id: &SagaId) -> Result<SagaSnapshot, BackendError> {
        self.delay().await;
        let mut state = self.write();
        state.status_calls += 1;
        let run = state
            .runs
            .get_mut(saga_id)
            .ok_or_else(|| BackendError::Rejected {
                status: 404,
                message: format!("saga {saga_id} not found"),
            })?;
        run.next(saga_id)
    }

    async fn cancel(&self, saga_id: &SagaId) -> Result<SagaSnapshot, BackendError> {
        self.delay().await;
        let mut state = self.write();
        state.cancel_calls += 1;

        if let Some(err) = state.fail_on_cancel.clone() {
            return Err(err);
        }

        let run = state
            .runs
            .get_mut(saga_id)
            .ok_or_else(|| BackendError::Rejected {
                status: 404,
                message: format!("saga {saga_id} not found"),
            })?;

        if run.last.status.is_terminal() {
            return Err(BackendError::Rejected {
                status: 409,
                message: format!("saga {saga_id} already {}", run.last.status),
            });
        }

        let frames = run
            .on_cancel
            .take()
            .unwrap_or_else(|| run.default_cancellation());
        run.frames = frames.into();
        run.next(saga_id)
    }
}

#[cfg(test)]
mod tests {
    use domain::steps;

    use super::*;

    fn order() -> OrderRequest {
        OrderRequest::market("user-1", "acc-1", "AAPL", 5)
    }

    #[tokio::test]
    async fn test_script_is_replayed_then_last_snapshot_repeats() {
        let backend = InMemorySagaBackend::new();
        backend.push_script(
            SagaScript::new()
                .with_saga_id("saga-1")
                .then(ScriptFrame::progress(
                    SagaStatus::InProgress,
                    [steps::CREATE_ORDER],
                ))
                .then(ScriptFrame::progress(
                    SagaStatus::Completed,
                    [steps::CREATE_ORDER, steps::COMPLETE_SAGA],
                )),
        );

        let initial = backend.submit(&order()).await.unwrap();
        assert_eq!(initial.saga_id.as_str(), "saga-1");
        assert_eq!(initial.status, SagaStatus::Submitted);
        assert_eq!(initial.order_type, Some(OrderType::Market));

        let id = initial.saga_id;
        assert_eq!(backend.status(&id).await.unwrap().status, SagaStatus::InProgress);
        assert_eq!(backend.status(&id).await.unwrap().status, SagaStatus::Completed);
        assert_eq!(backend.status(&id).await.unwrap().status, SagaStatus::Completed);
        assert_eq!(backend.status_calls(), 3);
        assert_eq!(backend.submitted().len(), 1);
    }

    #[tokio::test]
    async fn test_scripted_transport_error() {
        let backend = InMemorySagaBackend::new();
        backend.push_script(SagaScript::new().then(ScriptFrame::transport_error("reset")));
        let id = backend.submit(&order()).await.unwrap().saga_id;

        assert_eq!(
            backend.status(&id).await,
            Err(BackendError::Transport("reset".to_string()))
        );
    }

    #[tokio::test]
    async fn test_default_cancellation_compensates() {
        let backend = InMemorySagaBackend::new();
        backend.push_script(SagaScript::new().then(ScriptFrame::progress(
            SagaStatus::InProgress,
            [steps::CREATE_ORDER, steps::RESERVE_FUNDS],
        )));
        let id = backend.submit(&order()).await.unwrap().saga_id;
        backend.status(&id).await.unwrap();

        let cancelled = backend.cancel(&id).await.unwrap();
        assert_eq!(cancelled.status, SagaStatus::Compensating);
        let finished = backend.status(&id).await.unwrap();
        assert_eq!(finished.status, SagaStatus::CompensationCompleted);
        assert!(finished.failure_reason.is_some());

        // Terminal sagas refuse cancellation.
        assert!(matches!(
            backend.cancel(&id).await,
            Err(BackendError::Rejected { status: 409, .. })
        ));
        assert_eq!(backend.cancel_calls(), 2);
    }

    #[tokio::test]
    async fn test_failure_toggles() {
        let backend = InMemorySagaBackend::new();
        backend.set_fail_on_submit(Some(BackendError::Rejected {
            status: 400,
            message: "market closed".into(),
        }));
        assert!(backend.submit(&order()).await.is_err());
        assert!(backend.submitted().is_empty());

        backend.set_fail_on_submit(None);
        let id = backend.submit(&order()).await.unwrap().saga_id;
        backend.set_fail_on_cancel(Some(BackendError::Transport("timeout".into())));
        assert!(backend.cancel(&id).await.is_err());
    }

    #[tokio::test]
    async fn test_unknown_saga_is_not_found() {
        let backend = InMemorySagaBackend::new();
        assert!(matches!(
            backend.status(&SagaId::new("nope")).await,
            Err(BackendError::Rejected { status: 404, .. })
        ));
    }

    #[test]
    fn test_completes_all_steps_script() {
        let registry = StepRegistry::default();
        let script = SagaScript::completes_all_steps(&registry, 5);
        assert_eq!(script.frames.len(), 3);
        match script.frames.back() {
            Some(ScriptFrame::Snapshot {
                status, completed, ..
            }) => {
                assert_eq!(*status, SagaStatus::Completed);
                assert_eq!(completed.len(), 14);
            }
            other => panic!("unexpected final frame: {other:?}"),
        }
    }
}
