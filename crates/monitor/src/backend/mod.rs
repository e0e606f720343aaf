//! The remote order/saga backend as seen by the monitor.

pub mod http;
pub mod memory;

pub use http::HttpSagaBackend;
pub use memory::{InMemorySagaBackend, SagaScript, ScriptFrame};

use async_trait::async_trait;
use common::SagaId;
use domain::{OrderRequest, SagaSnapshot};
use thiserror::Error;

/// Failures talking to the backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    /// Connection, timeout or other transport failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// The response body could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),

    /// The backend answered with a non-success status.
    #[error("backend rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },
}

/// Submit, poll and cancel endpoints of the saga backend.
///
/// Every call answers with the saga's current snapshot.
#[async_trait]
pub trait SagaBackend: Send + Sync {
    /// Starts a saga for the order.
    async fn submit(&self, request: &OrderRequest) -> Result<SagaSnapshot, BackendError>;

    /// Fetches the current snapshot of a saga.
    async fn status(&self, saga_id: &SagaId) -> Result<SagaSnapshot, BackendError>;

    /// Asks the backend to cancel a saga; the answer reflects the transition
    /// into compensation.
    async fn cancel(&self, saga_id: &SagaId) -> Result<SagaSnapshot, BackendError>;
}
