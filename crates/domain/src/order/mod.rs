//! Order request and related value objects.

mod request;
mod value_objects;

pub use request::OrderRequest;
pub use value_objects::{Money, OrderType, StockSymbol, TimeInForce};

use thiserror::Error;

/// Reasons an order is rejected before it reaches the backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderError {
    /// User ID is required.
    #[error("User ID is required")]
    UserIdRequired,

    /// An account must be selected.
    #[error("Account is required")]
    AccountRequired,

    /// A symbol must be selected.
    #[error("Symbol is required")]
    SymbolRequired,

    /// Symbol is not a plausible ticker.
    #[error("Invalid symbol: {symbol}")]
    InvalidSymbol { symbol: String },

    /// Invalid quantity.
    #[error("Invalid quantity: {quantity} (must be at least 1)")]
    InvalidQuantity { quantity: u32 },

    /// Limit orders need a limit price.
    #[error("Limit price is required for LIMIT orders")]
    LimitPriceRequired,

    /// Limit price below the minimum tick.
    #[error("Invalid limit price: {price} (must be at least $0.01)")]
    InvalidLimitPrice { price: Money },

    /// Market orders are priced by the backend.
    #[error("Limit price is only allowed on LIMIT orders")]
    UnexpectedLimitPrice,
}
