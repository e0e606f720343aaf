//! Identifier types shared across the saga progress monitor crates.

mod types;

pub use types::{AccountId, SagaId, UserId};
