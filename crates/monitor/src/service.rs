//! The monitor's event loop and its handle.
//!
//! One task owns the [`OrderSubmissionController`] and serialises everything
//! that touches it: UI commands, completions of spawned network work and the
//! single reveal timer. Nothing about a saga is ever mutated concurrently.

use std::sync::Arc;

use common::SagaId;
use domain::{OrderRequest, StepRegistry, StockSymbol};
use tokio::sync::{mpsc, oneshot};

use crate::backend::SagaBackend;
use crate::config::MonitorConfig;
use crate::controller::{CancelOutcome, Internal, OrderSubmissionController, Reply, SagaHandle};
use crate::error::{CancellationError, MonitorStopped, SubmissionError};
use crate::scheduler::RevealScheduler;
use crate::view::{ProgressView, UiEvent};

/// Commands queued between a handle and the loop.
const COMMAND_BUFFER: usize = 64;

#[derive(Debug)]
enum Command {
    Submit {
        request: OrderRequest,
        reply: Reply<SagaHandle, SubmissionError>,
    },
    Cancel {
        saga_id: SagaId,
        reply: Reply<CancelOutcome, CancellationError>,
    },
    Reset {
        reply: oneshot::Sender<()>,
    },
    Dismiss {
        reply: oneshot::Sender<bool>,
    },
    SelectInstrument {
        symbol: StockSymbol,
        reply: oneshot::Sender<()>,
    },
    View {
        reply: oneshot::Sender<ProgressView>,
    },
}

/// Spawns the monitor.
pub struct MonitorService;

impl MonitorService {
    /// Starts the event loop. It runs until every [`MonitorHandle`] is
    /// dropped. UI events go to the returned receiver; dropping it is fine.
    pub fn spawn<B>(
        backend: Arc<B>,
        registry: Arc<StepRegistry>,
        config: MonitorConfig,
    ) -> (MonitorHandle, mpsc::UnboundedReceiver<UiEvent>)
    where
        B: SagaBackend + 'static,
    {
        let (commands_tx, commands_rx) = mpsc::channel(COMMAND_BUFFER);
        let (internal_tx, internal_rx) = mpsc::unbounded_channel();
        let (ui_tx, ui_rx) = mpsc::unbounded_channel();

        let controller =
            OrderSubmissionController::new(backend, registry, config, internal_tx, ui_tx);
        tokio::spawn(run(controller, commands_rx, internal_rx));

        (
            MonitorHandle {
                commands: commands_tx,
            },
            ui_rx,
        )
    }
}

async fn run<B>(
    mut controller: OrderSubmissionController<B>,
    mut commands: mpsc::Receiver<Command>,
    mut internal: mpsc::UnboundedReceiver<Internal>,
) where
    B: SagaBackend + 'static,
{
    let mut scheduler = RevealScheduler::new();
    tracing::info!("saga monitor started");

    loop {
        scheduler.sync(controller.reveal_deadline());

        tokio::select! {
            command = commands.recv() => match command {
                Some(command) => dispatch(&mut controller, command),
                None => break,
            },
            Some(event) = internal.recv() => controller.handle_internal(event),
            key = scheduler.fired() => controller.on_reveal_timer(key),
        }
    }

    controller.shutdown();
    tracing::info!("saga monitor stopped");
}

fn dispatch<B>(controller: &mut OrderSubmissionController<B>, command: Command)
where
    B: SagaBackend + 'static,
{
    match command {
        Command::Submit { request, reply } => controller.submit(request, reply),
        Command::Cancel { saga_id, reply } => controller.cancel(saga_id, reply),
        Command::Reset { reply } => {
            controller.reset();
            let _ = reply.send(());
        }
        Command::Dismiss { reply } => {
            let _ = reply.send(controller.dismiss());
        }
        Command::SelectInstrument { symbol, reply } => {
            controller.select_instrument(symbol);
            let _ = reply.send(());
        }
        Command::View { reply } => {
            let _ = reply.send(controller.view());
        }
    }
}

/// Cloneable front door to a running monitor.
#[derive(Debug, Clone)]
pub struct MonitorHandle {
    commands: mpsc::Sender<Command>,
}

impl MonitorHandle {
    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, MonitorStopped> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(command(reply))
            .await
            .map_err(|_| MonitorStopped)?;
        response.await.map_err(|_| MonitorStopped)
    }

    /// Submits an order and starts tracking its saga.
    pub async fn submit(&self, request: OrderRequest) -> Result<SagaHandle, SubmissionError> {
        self.request(|reply| Command::Submit { request, reply })
            .await?
    }

    /// Cancels the tracked saga. Tracking continues and observes the
    /// compensation.
    pub async fn cancel(&self, saga_id: SagaId) -> Result<CancelOutcome, CancellationError> {
        self.request(|reply| Command::Cancel { saga_id, reply })
            .await?
    }

    /// Stops tracking and returns to idle.
    pub async fn reset(&self) -> Result<(), MonitorStopped> {
        self.request(|reply| Command::Reset { reply }).await
    }

    /// Dismisses the notification (and the finished tracker with it).
    pub async fn dismiss(&self) -> Result<bool, MonitorStopped> {
        self.request(|reply| Command::Dismiss { reply }).await
    }

    /// Selects the instrument the order form is for.
    pub async fn select_instrument(
        &self,
        symbol: impl Into<StockSymbol>,
    ) -> Result<(), MonitorStopped> {
        let symbol = symbol.into();
        self.request(|reply| Command::SelectInstrument { symbol, reply })
            .await
    }

    /// Current presentation state.
    pub async fn view(&self) -> Result<ProgressView, MonitorStopped> {
        self.request(|reply| Command::View { reply }).await
    }
}
