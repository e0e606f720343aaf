//! Status polling for one saga.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use common::SagaId;
use domain::SagaSnapshot;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::backend::SagaBackend;
use crate::error::PollingError;

/// What the poller reports.
#[derive(Debug, Clone)]
pub enum PollEvent {
    /// A snapshot arrived. A terminal one is the last event.
    Snapshot {
        saga_id: SagaId,
        snapshot: SagaSnapshot,
    },
    /// Polling failed and has stopped.
    Failed { saga_id: SagaId, error: PollingError },
}

impl PollEvent {
    pub fn saga_id(&self) -> &SagaId {
        match self {
            PollEvent::Snapshot { saga_id, .. } | PollEvent::Failed { saga_id, .. } => saga_id,
        }
    }
}

/// Polls one saga at a fixed period until it is terminal, fails or is
/// stopped.
///
/// Requests are strictly sequential: the next tick is not taken before the
/// previous answer has been delivered. The terminal-processed flag is set
/// exactly once, by whichever of a terminal answer, an error or [`stop`]
/// comes first; nothing is delivered after that.
///
/// [`stop`]: SagaStatusPoller::stop
#[derive(Debug)]
pub struct SagaStatusPoller {
    saga_id: SagaId,
    terminal: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

impl SagaStatusPoller {
    /// Starts polling; the first request goes out one period from now.
    pub fn start<B, F>(backend: Arc<B>, saga_id: SagaId, period: Duration, sink: F) -> Self
    where
        B: SagaBackend + ?Sized + 'static,
        F: Fn(PollEvent) + Send + Sync + 'static,
    {
        let terminal = Arc::new(AtomicBool::new(false));
        let period = period.max(Duration::from_millis(1));

        let flag = Arc::clone(&terminal);
        let id = saga_id.clone();
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                if flag.load(Ordering::Acquire) {
                    break;
                }

                metrics::counter!("saga_monitor_polls_total").increment(1);
                let result = backend
                    .status(&id)
                    .await
                    .map_err(PollingError::from)
                    .and_then(|snapshot| {
                        if snapshot.saga_id == id {
                            Ok(snapshot)
                        } else {
                            Err(PollingError::SagaMismatch {
                                expected: id.clone(),
                                actual: snapshot.saga_id,
                            })
                        }
                    });

                match result {
                    Ok(snapshot) if snapshot.is_terminal() => {
                        if !flag.swap(true, Ordering::AcqRel) {
                            tracing::debug!(saga_id = %id, status = %snapshot.status, "terminal snapshot, polling stopped");
                            sink(PollEvent::Snapshot {
                                saga_id: id.clone(),
                                snapshot,
                            });
                        }
                        break;
                    }
                    Ok(snapshot) => {
                        if flag.load(Ordering::Acquire) {
                            break;
                        }
                        sink(PollEvent::Snapshot {
                            saga_id: id.clone(),
                            snapshot,
                        });
                    }
                    Err(error) => {
                        if !flag.swap(true, Ordering::AcqRel) {
                            metrics::counter!("saga_monitor_poll_errors_total").increment(1);
                            tracing::warn!(saga_id = %id, error = %error, "status poll failed, polling stopped");
                            sink(PollEvent::Failed {
                                saga_id: id.clone(),
                                error,
                            });
                        }
                        break;
                    }
                }
            }
        });

        Self {
            saga_id,
            terminal,
            task,
        }
    }

    pub fn saga_id(&self) -> &SagaId {
        &self.saga_id
    }

    /// True once a terminal answer, an error or a stop has been processed.
    pub fn is_terminal_processed(&self) -> bool {
        self.terminal.load(Ordering::Acquire)
    }

    /// Stops polling. Idempotent; an in-flight request is abandoned.
    pub fn stop(&self) {
        self.terminal.store(true, Ordering::Release);
        self.task.abort();
    }
}

impl Drop for SagaStatusPoller {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use domain::{OrderRequest, SagaStatus, steps};

    use super::*;
    use crate::backend::{BackendError, InMemorySagaBackend, SagaScript, ScriptFrame};

    type Events = Arc<Mutex<Vec<PollEvent>>>;

    fn collector() -> (Events, impl Fn(PollEvent) + Send + Sync + 'static) {
        let events: Events = Arc::default();
        let sink_events = Arc::clone(&events);
        (events, move |event| {
            sink_events.lock().unwrap().push(event)
        })
    }

    async fn submitted(backend: &InMemorySagaBackend, script: SagaScript) -> SagaId {
        backend.push_script(script);
        backend
            .submit(&OrderRequest::market("user-1", "acc-1", "AAPL", 1))
            .await
            .unwrap()
            .saga_id
    }

    #[tokio::test(start_paused = true)]
    async fn test_polls_until_terminal_then_stops() {
        let backend = Arc::new(InMemorySagaBackend::new());
        let saga_id = submitted(
            &backend,
            SagaScript::new()
                .then(ScriptFrame::progress(
                    SagaStatus::InProgress,
                    [steps::CREATE_ORDER],
                ))
                .then(ScriptFrame::progress(
                    SagaStatus::Completed,
                    [steps::CREATE_ORDER],
                )),
        )
        .await;

        let (events, sink) = collector();
        let poller = SagaStatusPoller::start(
            Arc::clone(&backend),
            saga_id,
            Duration::from_secs(1),
            sink,
        );

        tokio::time::sleep(Duration::from_millis(10_500)).await;

        assert_eq!(backend.status_calls(), 2);
        assert_eq!(events.lock().unwrap().len(), 2);
        assert!(poller.is_terminal_processed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_poll_waits_one_period() {
        let backend = Arc::new(InMemorySagaBackend::new());
        let saga_id = submitted(&backend, SagaScript::new()).await;
        let (_events, sink) = collector();
        let _poller =
            SagaStatusPoller::start(Arc::clone(&backend), saga_id, Duration::from_secs(1), sink);

        tokio::time::sleep(Duration::from_millis(900)).await;
        assert_eq!(backend.status_calls(), 0);
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(backend.status_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_error_stops_polling() {
        let backend = Arc::new(InMemorySagaBackend::new());
        let saga_id = submitted(
            &backend,
            SagaScript::new()
                .then(ScriptFrame::transport_error("connection reset"))
                .then(ScriptFrame::status(SagaStatus::InProgress)),
        )
        .await;

        let (events, sink) = collector();
        let poller =
            SagaStatusPoller::start(Arc::clone(&backend), saga_id, Duration::from_secs(1), sink);
        tokio::time::sleep(Duration::from_secs(5)).await;

        assert_eq!(backend.status_calls(), 1);
        let events = events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert!(matches!(
            &events[0],
            PollEvent::Failed {
                error: PollingError::Transport(_),
                ..
            }
        ));
        assert!(poller.is_terminal_processed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_responses_are_never_overlapped() {
        let backend = Arc::new(InMemorySagaBackend::new());
        let saga_id = submitted(&backend, SagaScript::new()).await;
        backend.set_latency(Duration::from_millis(2500));

        let (events, sink) = collector();
        let _poller =
            SagaStatusPoller::start(Arc::clone(&backend), saga_id, Duration::from_secs(1), sink);
        tokio::time::sleep(Duration::from_millis(7_200)).await;

        // 1s first tick, then each request takes 2.5s and the next tick is
        // only taken after it answered.
        let delivered = events.lock().unwrap().len();
        assert_eq!(delivered, 2);
        assert!(backend.status_calls() <= 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_is_idempotent_and_silences_late_answers() {
        let backend = Arc::new(InMemorySagaBackend::new());
        let saga_id = submitted(&backend, SagaScript::new()).await;
        backend.set_latency(Duration::from_millis(500));

        let (events, sink) = collector();
        let poller =
            SagaStatusPoller::start(Arc::clone(&backend), saga_id, Duration::from_secs(1), sink);
        tokio::time::sleep(Duration::from_millis(1200)).await;
        poller.stop();
        poller.stop();
        tokio::time::sleep(Duration::from_secs(5)).await;

        assert!(events.lock().unwrap().is_empty());
        assert!(poller.is_terminal_processed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_mismatched_saga_id_is_an_error() {
        let backend = Arc::new(InMemorySagaBackend::new());
        let _other = submitted(&backend, SagaScript::new().with_saga_id("other")).await;

        let (events, sink) = collector();
        let _poller = SagaStatusPoller::start(
            Arc::new(MismatchBackend(Arc::clone(&backend))),
            SagaId::new("expected"),
            Duration::from_secs(1),
            sink,
        );
        tokio::time::sleep(Duration::from_secs(3)).await;

        let events = events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert!(matches!(
            &events[0],
            PollEvent::Failed {
                error: PollingError::SagaMismatch { .. },
                ..
            }
        ));
    }

    /// Answers every status request with the snapshot of saga "other".
    struct MismatchBackend(Arc<InMemorySagaBackend>);

    #[async_trait::async_trait]
    impl SagaBackend for MismatchBackend {
        async fn submit(&self, request: &OrderRequest) -> Result<SagaSnapshot, BackendError> {
            self.0.submit(request).await
        }

        async fn status(&self, _saga_id: &SagaId) -> Result<SagaSnapshot, BackendError> {
            self.0.status(&SagaId::new("other")).await
        }

        async fn cancel(&self, saga_id: &SagaId) -> Result<SagaSnapshot, BackendError> {
            self.0.cancel(saga_id).await
        }
    }
}
