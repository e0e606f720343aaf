//! Step identifiers.

use std::borrow::Borrow;

use serde::{Deserialize, Serialize};

/// Identifier of one forward or compensation step, e.g. `RESERVE_FUNDS`.
///
/// The vocabulary is owned by the backend and loaded into a
/// [`StepRegistry`](crate::StepRegistry); the constants in [`steps`] are the
/// canonical ids of the built-in catalog.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StepId(String);

impl StepId {
    /// Creates a step id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for StepId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for StepId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for StepId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl Borrow<str> for StepId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for StepId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Canonical step ids of the order buy saga.
pub mod steps {
    pub const CREATE_ORDER: &str = "CREATE_ORDER";
    pub const VERIFY_TRADING_PERMISSION: &str = "VERIFY_TRADING_PERMISSION";
    pub const VERIFY_ACCOUNT_STATUS: &str = "VERIFY_ACCOUNT_STATUS";
    pub const VALIDATE_STOCK: &str = "VALIDATE_STOCK";
    pub const GET_MARKET_PRICE: &str = "GET_MARKET_PRICE";
    pub const CALCULATE_REQUIRED_FUNDS: &str = "CALCULATE_REQUIRED_FUNDS";
    pub const RESERVE_FUNDS: &str = "RESERVE_FUNDS";
    pub const UPDATE_ORDER_VALIDATED: &str = "UPDATE_ORDER_VALIDATED";
    pub const SUBMIT_ORDER: &str = "SUBMIT_ORDER";
    pub const UPDATE_ORDER_EXECUTED: &str = "UPDATE_ORDER_EXECUTED";
    pub const UPDATE_PORTFOLIO: &str = "UPDATE_PORTFOLIO";
    pub const SETTLE_TRANSACTION: &str = "SETTLE_TRANSACTION";
    pub const UPDATE_ORDER_COMPLETED: &str = "UPDATE_ORDER_COMPLETED";
    pub const COMPLETE_SAGA: &str = "COMPLETE_SAGA";

    pub const REVERSE_SETTLEMENT: &str = "REVERSE_SETTLEMENT";
    pub const REMOVE_POSITIONS: &str = "REMOVE_POSITIONS";
    pub const CANCEL_BROKER_ORDER: &str = "CANCEL_BROKER_ORDER";
    pub const RELEASE_FUNDS: &str = "RELEASE_FUNDS";
    pub const CANCEL_ORDER: &str = "CANCEL_ORDER";
}
