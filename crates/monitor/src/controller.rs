//! Order submission and saga tracking state machine.

use std::sync::Arc;
use std::time::{Duration, Instant};

use common::SagaId;
use domain::{
    OrderRequest, OrderType, SagaSnapshot, SagaStatus, StepDefinition, StepRegistry, StockSymbol,
};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};

use crate::backend::{BackendError, SagaBackend};
use crate::config::MonitorConfig;
use crate::error::{CancellationError, PollingError, SubmissionError};
use crate::gate::{Notification, NotificationDetails, NotificationGate};
use crate::poller::{PollEvent, SagaStatusPoller};
use crate::progress::{Reconciled, SagaProgress};
use crate::scheduler::RevealKey;
use crate::sequencer::{RevealStep, StepAnimationSequencer};
use crate::view::{Banner, Phase, ProgressView, StepView, UiEvent};

/// Failure reason shown when neither the backend nor the transport gave one.
const GENERIC_FAILURE: &str = "Order processing failed";

pub(crate) type Reply<T, E> = oneshot::Sender<Result<T, E>>;

/// Returned once the backend has accepted an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SagaHandle {
    pub saga_id: SagaId,
    pub status: SagaStatus,
    pub order_type: OrderType,
}

/// Result of a cancel request that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CancelOutcome {
    /// The backend accepted the cancellation.
    Requested { status: SagaStatus },
    /// A cancellation is already in flight; nothing was sent.
    AlreadyInFlight,
    /// The saga is already compensating; nothing was sent.
    AlreadyCompensating,
}

/// Completions of the network work the controller spawned.
#[derive(Debug)]
pub(crate) enum Internal {
    Submitted {
        session: u64,
        result: Result<SagaSnapshot, BackendError>,
    },
    Poll {
        session: u64,
        event: PollEvent,
    },
    CancelResolved {
        session: u64,
        saga_id: SagaId,
        result: Result<SagaSnapshot, BackendError>,
    },
}

struct PendingSubmit {
    session: u64,
    request: OrderRequest,
    reply: Reply<SagaHandle, SubmissionError>,
}

/// Everything owned by one tracking session.
struct ActiveSaga {
    session: u64,
    request: OrderRequest,
    progress: SagaProgress,
    poller: Option<SagaStatusPoller>,
    sequencer: StepAnimationSequencer,
    gate: NotificationGate,
    cancel_reply: Option<Reply<CancelOutcome, CancellationError>>,
    polling_error: Option<PollingError>,
    notification: Option<Notification>,
    started_at: Instant,
}

impl ActiveSaga {
    fn saga_id(&self) -> &SagaId {
        self.progress.saga_id()
    }

    fn is_terminal(&self) -> bool {
        self.polling_error.is_some() || self.progress.status().is_terminal()
    }

    /// Status a terminal saga is reported with; a polling failure counts as
    /// `FAILED`.
    fn terminal_status(&self) -> SagaStatus {
        if self.polling_error.is_some() {
            SagaStatus::Failed
        } else {
            self.progress.status()
        }
    }

    /// True once nothing may change the saga any more.
    fn is_frozen(&self) -> bool {
        self.polling_error.is_some() || self.notification.is_some()
    }

    fn phase(&self) -> Phase {
        if self.is_terminal() {
            Phase::Terminal
        } else if self.progress.status().is_compensation_phase() {
            Phase::Compensating
        } else {
            Phase::Active
        }
    }

    fn stop_polling(&mut self) {
        if let Some(poller) = self.poller.take() {
            poller.stop();
        }
    }

    fn failure_reason(&self) -> Option<String> {
        if let Some(reason) = self.progress.failure_reason() {
            return Some(reason.to_string());
        }
        if let Some(error) = &self.polling_error {
            return Some(error.to_string());
        }
        let status = self.progress.status();
        (status.is_terminal() && !status.is_success()).then(|| GENERIC_FAILURE.to_string())
    }

    fn details(&self) -> NotificationDetails {
        NotificationDetails {
            status: self.polling_error.is_none().then(|| self.progress.status()),
            stock_symbol: self.request.stock_symbol.clone(),
            order_type: self.order_type(),
            quantity: self.request.quantity,
            limit_price: self.request.limit_price,
            execution_price: self.progress.execution_price(),
            failure_reason: self.failure_reason(),
        }
    }

    fn order_type(&self) -> OrderType {
        self.progress
            .order_type()
            .unwrap_or(self.request.order_type)
    }
}

/// Top-level orchestrator: submits orders, owns the poller and the sequencer
/// of the active saga, and forwards cancellations.
///
/// All methods run on the monitor's event loop; network work is spawned and
/// comes back as [`Internal`] events tagged with the session that issued it.
pub struct OrderSubmissionController<B> {
    backend: Arc<B>,
    registry: Arc<StepRegistry>,
    config: MonitorConfig,
    internal: mpsc::UnboundedSender<Internal>,
    ui: mpsc::UnboundedSender<UiEvent>,
    session: u64,
    selection: Option<StockSymbol>,
    submitting: Option<PendingSubmit>,
    active: Option<ActiveSaga>,
    banner: Option<Banner>,
}

impl<B> OrderSubmissionController<B>
where
    B: SagaBackend + 'static,
{
    pub(crate) fn new(
        backend: Arc<B>,
        registry: Arc<StepRegistry>,
        config: MonitorConfig,
        internal: mpsc::UnboundedSender<Internal>,
        ui: mpsc::UnboundedSender<UiEvent>,
    ) -> Self {
        Self {
            backend,
            registry,
            config,
            internal,
            ui,
            session: 0,
            selection: None,
            submitting: None,
            active: None,
            banner: None,
        }
    }

    pub fn phase(&self) -> Phase {
        if self.submitting.is_some() {
            return Phase::Submitting;
        }
        self.active.as_ref().map_or(Phase::Idle, ActiveSaga::phase)
    }

    /// Starts a saga for the order. The reply is sent once the backend has
    /// answered the submit request.
    pub(crate) fn submit(
        &mut self,
        request: OrderRequest,
        reply: Reply<SagaHandle, SubmissionError>,
    ) {
        if let Err(e) = request.validate() {
            self.fail_submission(reply, e.into());
            return;
        }
        // An order for another instrument abandons the current tracker.
        if self.selection.as_ref() != Some(&request.stock_symbol) {
            self.select_instrument(request.stock_symbol.clone());
        }

        match self.phase() {
            Phase::Submitting | Phase::Active | Phase::Compensating => {
                let saga_id = self.active.as_ref().map_or_else(
                    || "pending submission".to_string(),
                    |a| a.saga_id().to_string(),
                );
                self.fail_submission(reply, SubmissionError::SagaAlreadyActive { saga_id });
                return;
            }
            Phase::Terminal => self.reset_tracking("new order submitted"),
            Phase::Idle => {}
        }

        self.session += 1;
        let session = self.session;
        self.banner = None;

        metrics::counter!("saga_monitor_submissions_total").increment(1);
        tracing::info!(
            session,
            symbol = %request.stock_symbol,
            order_type = %request.order_type,
            quantity = request.quantity,
            "submitting order"
        );

        let backend = Arc::clone(&self.backend);
        let internal = self.internal.clone();
        let outgoing = request.clone();
        tokio::spawn(async move {
            let result = backend.submit(&outgoing).await;
            let _ = internal.send(Internal::Submitted { session, result });
        });

        self.submitting = Some(PendingSubmit {
            session,
            request,
            reply,
        });
    }

    /// Requests cancellation of the active saga.
    pub(crate) fn cancel(
        &mut self,
        saga_id: SagaId,
        reply: Reply<CancelOutcome, CancellationError>,
    ) {
        let Some(active) = self.active.as_mut() else {
            self.reject_cancel(reply, CancellationError::NoActiveSaga);
            return;
        };
        if active.saga_id() != &saga_id {
            self.reject_cancel(reply, CancellationError::UnknownSaga(saga_id));
            return;
        }
        if active.is_terminal() {
            let status = active.terminal_status();
            self.reject_cancel(reply, CancellationError::AlreadyTerminal { saga_id, status });
            return;
        }
        if active.cancel_reply.is_some() {
            let _ = reply.send(Ok(CancelOutcome::AlreadyInFlight));
            return;
        }
        if active.progress.status().is_compensation_phase() {
            let _ = reply.send(Ok(CancelOutcome::AlreadyCompensating));
            return;
        }

        metrics::counter!("saga_monitor_cancellations_total").increment(1);
        tracing::info!(saga_id = %saga_id, "cancelling saga");

        let session = active.session;
        let backend = Arc::clone(&self.backend);
        let internal = self.internal.clone();
        active.cancel_reply = Some(reply);
        tokio::spawn(async move {
            let result = backend.cancel(&saga_id).await;
            let _ = internal.send(Internal::CancelResolved {
                session,
                saga_id,
                result,
            });
        });
    }

    /// Stops tracking and returns to idle.
    pub(crate) fn reset(&mut self) {
        self.reset_tracking("reset requested");
        self.banner = None;
    }

    /// Clears the banner, and the tracker once its notification has fired.
    /// Returns true if the tracker was cleared.
    pub(crate) fn dismiss(&mut self) -> bool {
        self.banner = None;
        let notified = self
            .active
            .as_ref()
            .is_some_and(|active| active.notification.is_some());
        if notified {
            self.reset_tracking("notification dismissed");
        }
        notified
    }

    /// Selecting another instrument abandons whatever is being tracked.
    pub(crate) fn select_instrument(&mut self, symbol: StockSymbol) {
        if self.selection.as_ref() == Some(&symbol) {
            return;
        }
        if self.submitting.is_some() || self.active.is_some() {
            self.reset_tracking("instrument changed");
        }
        tracing::info!(symbol = %symbol, "instrument selected");
        self.selection = Some(symbol);
    }

    pub(crate) fn handle_internal(&mut self, event: Internal) {
        match event {
            Internal::Submitted { session, result } => self.on_submitted(session, result),
            Internal::Poll { session, event } => self.on_poll(session, event),
            Internal::CancelResolved {
                session,
                saga_id,
                result,
            } => self.on_cancel_resolved(session, saga_id, result),
        }
    }

    /// When and for what the reveal timer should fire next.
    pub(crate) fn reveal_deadline(&self) -> Option<(RevealKey, Duration)> {
        let active = self.active.as_ref()?;
        let delay = active.sequencer.next_delay()?;
        let key = RevealKey {
            session: active.session,
            epoch: active.sequencer.epoch(),
        };
        Some((key, delay))
    }

    pub(crate) fn on_reveal_timer(&mut self, key: RevealKey) {
        let Some(active) = self
            .active
            .as_mut()
            .filter(|a| a.session == key.session && a.sequencer.epoch() == key.epoch)
        else {
            tracing::debug!(?key, "reveal timer for an abandoned sequence");
            return;
        };

        let saga_id = active.saga_id().clone();
        match active.sequencer.on_timer() {
            RevealStep::Revealed(step) => {
                metrics::counter!("saga_monitor_steps_revealed_total").increment(1);
                tracing::debug!(saga_id = %saga_id, step = %step, "step revealed");
                self.emit(UiEvent::StepRevealed { saga_id, step });
            }
            RevealStep::AllStepsAnimated(status) => {
                tracing::debug!(saga_id = %saga_id, status = %status, "all steps animated");
                let notification = active.gate.animation_finished(&saga_id, status);
                self.emit(UiEvent::AllStepsAnimated { saga_id, status });
                if let Some(notification) = notification {
                    self.record_notification(notification);
                }
            }
            RevealStep::Idle => {}
        }
    }

    pub fn view(&self) -> ProgressView {
        let mut view = ProgressView {
            phase: self.phase(),
            selection: self.selection.clone(),
            banner: self.banner.clone(),
            ..ProgressView::default()
        };

        if let Some(pending) = &self.submitting {
            view.order_type = Some(pending.request.order_type);
            view.required_funds = pending.request.required_funds();
        }

        let Some(active) = &self.active else {
            return view;
        };

        let status = active.progress.status();
        let current = active.progress.current_step();
        let visible = active.sequencer.visible();
        let definitions: Vec<&StepDefinition> = if status.is_compensation_phase() {
            active
                .progress
                .compensation_chain()
                .iter()
                .filter_map(|id| self.registry.definition(id.as_str()))
                .collect()
        } else {
            self.registry.forward().iter().collect()
        };

        view.steps_to_show = definitions
            .into_iter()
            .map(|d| StepView {
                id: d.id.clone(),
                display_name: d.display_name.clone(),
                state: StepView::state_for(&d.id, visible.contains(&d.id), current, Some(status)),
            })
            .collect();
        view.saga_id = Some(active.saga_id().clone());
        view.status = Some(status);
        view.current_step = current.cloned();
        view.order_type = Some(active.order_type());
        view.required_funds = active.request.required_funds();
        view.visible_completed_steps = visible.to_vec();
        view.failure_reason = active.failure_reason();
        view.cancel_in_flight = active.cancel_reply.is_some();
        view.ready_to_notify = active.notification.is_some();
        view.notification = active.notification.clone();
        view
    }

    /// Abandons everything on shutdown.
    pub(crate) fn shutdown(&mut self) {
        self.reset_tracking("monitor stopped");
    }

    fn on_submitted(&mut self, session: u64, result: Result<SagaSnapshot, BackendError>) {
        let Some(PendingSubmit {
            session,
            request,
            reply,
        }) = self.submitting.take_if(|pending| pending.session == session)
        else {
            if let Ok(snapshot) = &result {
                tracing::warn!(
                    saga_id = %snapshot.saga_id,
                    "order accepted after tracking was abandoned; saga is not tracked"
                );
            }
            return;
        };

        let snapshot = match result.map_err(SubmissionError::from).and_then(|snapshot| {
            if snapshot.saga_id.is_empty() {
                Err(SubmissionError::Transport(
                    "backend returned no saga id".to_string(),
                ))
            } else {
                Ok(snapshot)
            }
        }) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                self.fail_submission(reply, e);
                return;
            }
        };

        let handle = SagaHandle {
            saga_id: snapshot.saga_id.clone(),
            status: snapshot.status,
            order_type: snapshot.order_type.unwrap_or(request.order_type),
        };
        let poller = (!snapshot.is_terminal())
            .then(|| self.start_poller(session, handle.saga_id.clone()));

        tracing::info!(
            session,
            saga_id = %handle.saga_id,
            status = %handle.status,
            "order accepted, tracking saga"
        );

        self.active = Some(ActiveSaga {
            session,
            request,
            progress: SagaProgress::new(&snapshot, &self.registry),
            poller,
            sequencer: StepAnimationSequencer::new(&self.config),
            gate: NotificationGate::new(),
            cancel_reply: None,
            polling_error: None,
            notification: None,
            started_at: Instant::now(),
        });
        self.sync_progress();
        let _ = reply.send(Ok(handle));
    }

    fn on_poll(&mut self, session: u64, event: PollEvent) {
        let Some(active) = self
            .active
            .as_mut()
            .filter(|a| a.session == session && a.saga_id() == event.saga_id())
        else {
            tracing::debug!(saga_id = %event.saga_id(), "dropping poll result for an abandoned saga");
            return;
        };
        if active.is_frozen() {
            return;
        }

        match event {
            PollEvent::Snapshot { snapshot, .. } => self.apply_snapshot(snapshot),
            PollEvent::Failed { saga_id, error } => {
                tracing::warn!(
                    saga_id = %saga_id,
                    error = %error,
                    "saga treated as failed after polling error"
                );
                active.stop_polling();
                active.polling_error = Some(error);
                let details = active.details();
                if let Some(notification) = active.gate.polling_failed(&saga_id, details) {
                    self.record_notification(notification);
                }
            }
        }
    }

    fn on_cancel_resolved(
        &mut self,
        session: u64,
        saga_id: SagaId,
        result: Result<SagaSnapshot, BackendError>,
    ) {
        let Some(active) = self
            .active
            .as_mut()
            .filter(|a| a.session == session && a.saga_id() == &saga_id)
        else {
            tracing::debug!(saga_id = %saga_id, "dropping cancel result for an abandoned saga");
            return;
        };
        let Some(reply) = active.cancel_reply.take() else {
            return;
        };
        if active.is_terminal() {
            let status = active.terminal_status();
            tracing::info!(
                saga_id = %saga_id,
                status = %status,
                "cancel result arrived after the saga finished; ignored"
            );
            let _ = reply.send(Err(CancellationError::AlreadyTerminal { saga_id, status }));
            return;
        }

        match result {
            Ok(snapshot) => {
                tracing::info!(saga_id = %saga_id, status = %snapshot.status, "cancellation accepted");
                let reported = snapshot.status;
                self.apply_snapshot(snapshot);
                let status = self
                    .active
                    .as_ref()
                    .map_or(reported, |a| a.progress.status());
                let _ = reply.send(Ok(CancelOutcome::Requested { status }));
            }
            Err(e) => {
                let error = CancellationError::from(e);
                tracing::warn!(saga_id = %saga_id, error = %error, "cancellation failed");
                self.show_banner(Banner::cancellation(error.to_string()));
                let _ = reply.send(Err(error));
            }
        }
    }

    fn apply_snapshot(&mut self, snapshot: SagaSnapshot) {
        let Some(active) = self.active.as_mut() else {
            return;
        };
        if active.is_frozen() {
            tracing::debug!(
                saga_id = %snapshot.saga_id,
                status = %snapshot.status,
                "ignoring snapshot for a finished saga"
            );
            return;
        }
        match active.progress.apply(&snapshot, &self.registry) {
            Reconciled::Applied { status_changed } => {
                if status_changed {
                    tracing::info!(
                        saga_id = %snapshot.saga_id,
                        status = %snapshot.status,
                        "saga status changed"
                    );
                }
                self.sync_progress();
            }
            Reconciled::Stale => {
                metrics::counter!("saga_monitor_stale_snapshots_total").increment(1);
                tracing::debug!(
                    saga_id = %snapshot.saga_id,
                    status = %snapshot.status,
                    current = %active.progress.status(),
                    "ignoring stale snapshot"
                );
            }
            Reconciled::ForeignSaga => {
                tracing::warn!(
                    saga_id = %snapshot.saga_id,
                    expected = %active.saga_id(),
                    "ignoring snapshot for another saga"
                );
            }
        }
    }

    /// Feeds reconciled progress to the sequencer and, once terminal, to the
    /// gate.
    fn sync_progress(&mut self) {
        let Some(active) = self.active.as_mut() else {
            return;
        };

        let status = active.progress.status();
        let (order, done) = active.progress.reveal_target(&self.registry);
        if active.sequencer.feed(status, &done, &order) {
            tracing::info!(
                saga_id = %active.saga_id(),
                chain_len = order.len(),
                "compensation started, revealing compensation chain"
            );
        }

        if status.is_terminal() {
            active.stop_polling();
            let saga_id = active.saga_id().clone();
            let details = active.details();
            if let Some(notification) = active.gate.terminal_reported(&saga_id, status, details) {
                self.record_notification(notification);
            }
        }
    }

    fn record_notification(&mut self, notification: Notification) {
        let Some(active) = self.active.as_mut() else {
            return;
        };
        active.stop_polling();

        let outcome = if notification.success { "success" } else { "failure" };
        metrics::counter!("saga_monitor_notifications_total", "outcome" => outcome).increment(1);
        metrics::histogram!("saga_monitor_tracking_duration_seconds")
            .record(active.started_at.elapsed().as_secs_f64());
        tracing::info!(
            saga_id = %notification.saga_id,
            success = notification.success,
            "saga finished, notifying"
        );

        active.notification = Some(notification.clone());
        self.emit(UiEvent::Notified { notification });
    }

    fn start_poller(&self, session: u64, saga_id: SagaId) -> SagaStatusPoller {
        let internal = self.internal.clone();
        SagaStatusPoller::start(
            Arc::clone(&self.backend),
            saga_id,
            self.config.poll_interval,
            move |event| {
                let _ = internal.send(Internal::Poll { session, event });
            },
        )
    }

    fn reset_tracking(&mut self, reason: &str) {
        if let Some(pending) = self.submitting.take() {
            tracing::info!(session = pending.session, reason, "abandoning pending submission");
            let _ = pending.reply.send(Err(SubmissionError::Superseded));
        }
        if let Some(mut active) = self.active.take() {
            active.stop_polling();
            if let Some(reply) = active.cancel_reply.take() {
                let _ = reply.send(Err(CancellationError::TrackingReset));
            }
            tracing::info!(saga_id = %active.saga_id(), reason, "tracking reset");
        }
    }

    fn fail_submission(
        &mut self,
        reply: Reply<SagaHandle, SubmissionError>,
        error: SubmissionError,
    ) {
        metrics::counter!("saga_monitor_submission_failures_total").increment(1);
        tracing::warn!(error = %error, "order submission failed");
        self.show_banner(Banner::submission(error.to_string()));
        let _ = reply.send(Err(error));
    }

    fn reject_cancel(
        &mut self,
        reply: Reply<CancelOutcome, CancellationError>,
        error: CancellationError,
    ) {
        tracing::warn!(error = %error, "cancellation rejected");
        self.show_banner(Banner::cancellation(error.to_string()));
        let _ = reply.send(Err(error));
    }

    fn show_banner(&mut self, banner: Banner) {
        self.banner = Some(banner.clone());
        self.emit(UiEvent::Banner { banner });
    }

    fn emit(&self, event: UiEvent) {
        // Nobody listening is fine; the view can still be read.
        let _ = self.ui.send(event);
    }
}
