//! Client-side saga progress monitor.
//!
//! Submits buy orders to the saga backend, polls the resulting saga, reveals
//! its forward or compensation steps at a steady pace and fires exactly one
//! notification when it is over. Everything runs on a single event loop
//! spawned by [`MonitorService::spawn`] and driven through a
//! [`MonitorHandle`].

pub mod backend;
pub mod config;
pub mod controller;
pub mod error;
pub mod gate;
pub mod poller;
pub mod progress;
pub mod scheduler;
pub mod sequencer;
pub mod service;
pub mod view;

pub use backend::{
    BackendError, HttpSagaBackend, InMemorySagaBackend, SagaBackend, SagaScript, ScriptFrame,
};
pub use config::MonitorConfig;
pub use controller::{CancelOutcome, OrderSubmissionController, SagaHandle};
pub use error::{CancellationError, MonitorStopped, PollingError, SubmissionError};
pub use gate::{Notification, NotificationDetails, NotificationGate};
pub use poller::{PollEvent, SagaStatusPoller};
pub use progress::{Reconciled, SagaProgress};
pub use scheduler::{RevealKey, RevealScheduler};
pub use sequencer::{RevealMode, RevealStep, StepAnimationSequencer};
pub use service::{MonitorHandle, MonitorService};
pub use view::{Banner, BannerKind, Phase, ProgressView, StepState, StepView, UiEvent};
