//! Saga snapshot model.

mod snapshot;
mod status;
mod step;

pub use snapshot::SagaSnapshot;
pub use status::SagaStatus;
pub use step::{StepId, steps};
