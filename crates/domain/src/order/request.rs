//! The buy order submitted to start a saga.

use common::{AccountId, UserId};
use serde::{Deserialize, Serialize};

use super::OrderError;
use super::value_objects::{Money, OrderType, StockSymbol, TimeInForce};

/// Smallest limit price the order form accepts.
const MIN_LIMIT_PRICE_CENTS: i64 = 1;

/// A buy order as sent to the backend's submit endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRequest {
    pub user_id: UserId,
    pub account_id: AccountId,
    pub stock_symbol: StockSymbol,
    #[serde(default)]
    pub order_type: OrderType,
    pub quantity: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit_price: Option<Money>,
    #[serde(default)]
    pub time_in_force: TimeInForce,
}

impl OrderRequest {
    /// Creates a market order for `quantity` shares of `symbol`.
    pub fn market(
        user_id: impl Into<UserId>,
        account_id: impl Into<AccountId>,
        symbol: impl Into<StockSymbol>,
        quantity: u32,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            account_id: account_id.into(),
            stock_symbol: symbol.into(),
            order_type: OrderType::Market,
            quantity,
            limit_price: None,
            time_in_force: TimeInForce::Day,
        }
    }

    /// Creates a day limit order for `quantity` shares of `symbol` at `limit_price`.
    pub fn limit(
        user_id: impl Into<UserId>,
        account_id: impl Into<AccountId>,
        symbol: impl Into<StockSymbol>,
        quantity: u32,
        limit_price: Money,
    ) -> Self {
        Self {
            order_type: OrderType::Limit,
            limit_price: Some(limit_price),
            ..Self::market(user_id, account_id, symbol, quantity)
        }
    }

    /// Sets the time in force.
    pub fn with_time_in_force(mut self, time_in_force: TimeInForce) -> Self {
        self.time_in_force = time_in_force;
        self
    }

    /// Checks the order before anything is sent to the backend.
    pub fn validate(&self) -> Result<(), OrderError> {
        if self.user_id.is_blank() {
            return Err(OrderError::UserIdRequired);
        }
        if self.account_id.is_blank() {
            return Err(OrderError::AccountRequired);
        }
        if self.stock_symbol.as_str().is_empty() {
            return Err(OrderError::SymbolRequired);
        }
        if !self.stock_symbol.is_well_formed() {
            return Err(OrderError::InvalidSymbol {
                symbol: self.stock_symbol.to_string(),
            });
        }
        if self.quantity == 0 {
            return Err(OrderError::InvalidQuantity {
                quantity: self.quantity,
            });
        }

        match (self.order_type, self.limit_price) {
            (OrderType::Limit, None) => Err(OrderError::LimitPriceRequired),
            (OrderType::Limit, Some(price)) if price.cents() < MIN_LIMIT_PRICE_CENTS => {
                Err(OrderError::InvalidLimitPrice { price })
            }
            (OrderType::Market, Some(_)) => Err(OrderError::UnexpectedLimitPrice),
            _ => Ok(()),
        }
    }

    /// Funds a limit order will reserve (`limit price × quantity`).
    ///
    /// Market orders are priced by the backend, so there is nothing to show
    /// up front.
    pub fn required_funds(&self) -> Option<Money> {
        match self.order_type {
            OrderType::Limit => self.limit_price.map(|price| price.multiply(self.quantity)),
            OrderType::Market => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn market(quantity: u32) -> OrderRequest {
        OrderRequest::market("user-1", "acc-1", "AAPL", quantity)
    }

    #[test]
    fn test_valid_market_order() {
        assert!(market(10).validate().is_ok());
        assert_eq!(market(10).required_funds(), None);
    }

    #[test]
    fn test_valid_limit_order_reports_required_funds() {
        let order = OrderRequest::limit("user-1", "acc-1", "msft", 4, Money::from_cents(41050))
            .with_time_in_force(TimeInForce::Gtc);
        assert!(order.validate().is_ok());
        assert_eq!(order.stock_symbol.as_str(), "MSFT");
        assert_eq!(order.required_funds(), Some(Money::from_cents(164200)));
    }

    #[test]
    fn test_zero_quantity_rejected() {
        assert!(matches!(
            market(0).validate(),
            Err(OrderError::InvalidQuantity { quantity: 0 })
        ));
    }

    #[test]
    fn test_missing_identity_rejected() {
        let mut order = market(1);
        order.user_id = UserId::new(" ");
        assert!(matches!(order.validate(), Err(OrderError::UserIdRequired)));

        let mut order = market(1);
        order.account_id = AccountId::new("");
        assert!(matches!(order.validate(), Err(OrderError::AccountRequired)));
    }

    #[test]
    fn test_symbol_checks() {
        let mut order = market(1);
        order.stock_symbol = StockSymbol::new("");
        assert!(matches!(order.validate(), Err(OrderError::SymbolRequired)));

        order.stock_symbol = StockSymbol::new("NOT A TICKER");
        assert!(matches!(
            order.validate(),
            Err(OrderError::InvalidSymbol { .. })
        ));
    }

    #[test]
    fn test_limit_price_rules() {
        let mut order = OrderRequest::limit("u", "a", "AAPL", 1, Money::zero());
        assert!(matches!(
            order.validate(),
            Err(OrderError::InvalidLimitPrice { .. })
        ));

        order.limit_price = None;
        assert!(matches!(order.validate(), Err(OrderError::LimitPriceRequired)));

        let mut order = market(1);
        order.limit_price = Some(Money::from_cents(100));
        assert!(matches!(
            order.validate(),
            Err(OrderError::UnexpectedLimitPrice)
        ));
    }

    #[test]
    fn test_wire_format_is_camel_case() {
        let order = OrderRequest::limit("user-1", "acc-1", "AAPL", 2, Money::from_cents(15000));
        let json = serde_json::to_value(&order).unwrap();
        assert_eq!(json["userId"], "user-1");
        assert_eq!(json["accountId"], "acc-1");
        assert_eq!(json["stockSymbol"], "AAPL");
        assert_eq!(json["orderType"], "LIMIT");
        assert_eq!(json["limitPrice"], 150.0);
        assert_eq!(json["timeInForce"], "DAY");

        let market = serde_json::to_value(market(1)).unwrap();
        assert!(market.get("limitPrice").is_none());
    }
}
