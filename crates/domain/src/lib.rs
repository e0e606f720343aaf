//! Domain model for the saga progress monitor.
//!
//! This crate is pure and synchronous:
//! - the saga snapshot the backend returns on every call
//! - the ordered forward and compensation step catalogs
//! - the compensation path resolver
//! - the buy order request and its validation

pub mod compensation;
pub mod error;
pub mod order;
pub mod registry;
pub mod saga;

pub use compensation::CompensationPathResolver;
pub use error::RegistryError;
pub use order::{Money, OrderError, OrderRequest, OrderType, StockSymbol, TimeInForce};
pub use registry::{StepDefinition, StepPath, StepRegistry};
pub use saga::{SagaSnapshot, SagaStatus, StepId, steps};
