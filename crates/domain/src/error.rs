//! Domain error types.

use thiserror::Error;

use crate::registry::StepPath;
use crate::saga::StepId;

/// Errors raised while building a step registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// A path has no steps.
    #[error("Step registry has no {0:?} steps")]
    EmptyPath(StepPath),

    /// The same id or alias appears twice.
    #[error("Duplicate step id or alias: {0}")]
    DuplicateId(StepId),

    /// The registry document could not be parsed.
    #[error("Invalid step registry document: {0}")]
    Parse(#[from] serde_json::Error),
}
