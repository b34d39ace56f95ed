//! Assertion oracle
//!
//! Pure comparison first, raising second: structural checks over snapshots
//! and balance comparisons produce structured verdicts, and thin wrappers
//! turn a failing verdict into an [`InvariantViolation`]. The checks read
//! only their snapshot argument, so re-running them against an unchanged
//! snapshot yields the same result.

use rust_decimal::Decimal;
use types::balance::{Asset, DepositedBalances};
use types::errors::InvariantViolation;
use types::order::{OrderbookSnapshot, Side};
use types::trade::TradeTape;

use crate::trader::TraderModel;

/// Aggregate view of a structurally valid order book.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderbookStats {
    pub bids: usize,
    pub asks: usize,
    pub total: usize,
    /// Number of individual structural checks that passed.
    pub checks: u64,
}

/// Aggregate view of a structurally valid trade tape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TradeStats {
    pub count: usize,
    /// Sum of trade quantities.
    pub volume: Decimal,
    /// Number of individual structural checks that passed.
    pub checks: u64,
}

/// One balance comparison: modeled vs. observed, per asset.
#[derive(Debug, Clone, PartialEq)]
pub struct BalanceVerdict {
    pub trader: String,
    pub asset: Asset,
    pub context: String,
    pub expected: Decimal,
    pub actual: Decimal,
    pub tolerance: Decimal,
}

impl BalanceVerdict {
    /// Absolute difference within tolerance.
    pub fn holds(&self) -> bool {
        (self.actual - self.expected).abs() <= self.tolerance
    }

    pub fn into_violation(self) -> InvariantViolation {
        InvariantViolation::BalanceMismatch {
            trader: self.trader,
            asset: self.asset,
            context: self.context,
            expected: self.expected,
            actual: self.actual,
            tolerance: self.tolerance,
        }
    }
}

/// Compare a trader's modeled deposited balances against an observed report.
pub fn compare_deposited(
    trader: &TraderModel,
    actual: &DepositedBalances,
    context: &str,
    tolerance: Decimal,
) -> [BalanceVerdict; 2] {
    [
        BalanceVerdict {
            trader: trader.name().to_string(),
            asset: Asset::Base,
            context: context.to_string(),
            expected: trader.deposited_base,
            actual: actual.base,
            tolerance,
        },
        BalanceVerdict {
            trader: trader.name().to_string(),
            asset: Asset::Quote,
            context: context.to_string(),
            expected: trader.deposited_quote,
            actual: actual.quote,
            tolerance,
        },
    ]
}

/// Raise the first failing verdict, if any.
pub fn assert_verdicts(verdicts: impl IntoIterator<Item = BalanceVerdict>) -> Result<(), InvariantViolation> {
    for verdict in verdicts {
        if !verdict.holds() {
            return Err(verdict.into_violation());
        }
    }
    Ok(())
}

/// Structural invariants over an order-book snapshot: every order carries an
/// identifier, price, quantity, and side; numerics parse; no resting order
/// has zero quantity.
pub fn check_orderbook(snapshot: &OrderbookSnapshot) -> Result<OrderbookStats, InvariantViolation> {
    let mut bids = 0usize;
    let mut asks = 0usize;
    let mut checks = 0u64;

    for (index, order) in snapshot.orders.iter().enumerate() {
        let order_id = order
            .order_id
            .as_deref()
            .ok_or(InvariantViolation::MissingOrderField {
                index,
                field: "orderId",
            })?;
        let price = require_order_field(index, "price", order.price.as_deref())?;
        let quantity = require_order_field(index, "quantity", order.quantity.as_deref())?;
        let side = order
            .side
            .as_deref()
            .ok_or(InvariantViolation::MissingOrderField { index, field: "side" })?;

        let _price: Decimal = parse_order_field(index, "price", price)?;
        let quantity: Decimal = parse_order_field(index, "quantity", quantity)?;
        let side = Side::from_wire(side).ok_or_else(|| InvariantViolation::MalformedOrderField {
            index,
            field: "side",
            value: side.to_string(),
        })?;

        if quantity == Decimal::ZERO {
            return Err(InvariantViolation::ZeroQuantityOrder {
                order_id: order_id.to_string(),
            });
        }

        match side {
            Side::Buy => bids += 1,
            Side::Sell => asks += 1,
        }
        // id/price/quantity/side presence plus the zero-quantity rule.
        checks += 5;
    }

    Ok(OrderbookStats {
        bids,
        asks,
        total: snapshot.orders.len(),
        checks: checks + 1,
    })
}

/// Structural invariants over a trade tape: every trade carries price,
/// quantity, and timestamp; price and quantity are strictly positive.
pub fn check_trades(tape: &TradeTape) -> Result<TradeStats, InvariantViolation> {
    let mut volume = Decimal::ZERO;
    let mut checks = 0u64;

    for (index, trade) in tape.trades.iter().enumerate() {
        let price = trade
            .price
            .as_deref()
            .ok_or(InvariantViolation::MissingTradeField { index, field: "price" })?;
        let qty = trade
            .qty
            .as_deref()
            .ok_or(InvariantViolation::MissingTradeField { index, field: "qty" })?;
        if trade.timestamp.is_none() {
            return Err(InvariantViolation::MissingTradeField {
                index,
                field: "timestamp",
            });
        }

        let price: Decimal = parse_trade_field(index, "price", price)?;
        let qty: Decimal = parse_trade_field(index, "qty", qty)?;

        if price <= Decimal::ZERO {
            return Err(InvariantViolation::NonPositiveTrade {
                index,
                field: "price",
                value: price,
            });
        }
        if qty <= Decimal::ZERO {
            return Err(InvariantViolation::NonPositiveTrade {
                index,
                field: "qty",
                value: qty,
            });
        }

        volume += qty;
        checks += 5;
    }

    Ok(TradeStats {
        count: tape.trades.len(),
        volume,
        checks: checks + 1,
    })
}

fn require_order_field<'a>(
    index: usize,
    field: &'static str,
    value: Option<&'a str>,
) -> Result<&'a str, InvariantViolation> {
    value.ok_or(InvariantViolation::MissingOrderField { index, field })
}

fn parse_order_field(
    index: usize,
    field: &'static str,
    value: &str,
) -> Result<Decimal, InvariantViolation> {
    value
        .trim()
        .parse()
        .map_err(|_| InvariantViolation::MalformedOrderField {
            index,
            field,
            value: value.to_string(),
        })
}

fn parse_trade_field(
    index: usize,
    field: &'static str,
    value: &str,
) -> Result<Decimal, InvariantViolation> {
    value
        .trim()
        .parse()
        .map_err(|_| InvariantViolation::MalformedTradeField {
            index,
            field,
            value: value.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trader::{SigningKey, TraderIdentity};
    use types::ids::MarketId;
    use types::order::OrderRow;
    use types::trade::TradeRow;

    fn order(id: &str, price: &str, qty: &str, side: &str) -> OrderRow {
        OrderRow {
            order_id: Some(id.to_string()),
            price: Some(price.to_string()),
            quantity: Some(qty.to_string()),
            side: Some(side.to_string()),
        }
    }

    fn trade(price: &str, qty: &str) -> TradeRow {
        TradeRow {
            price: Some(price.to_string()),
            qty: Some(qty.to_string()),
            timestamp: Some("1700000000".to_string()),
        }
    }

    fn model(deposited_base: u64, deposited_quote: u64) -> TraderModel {
        let mut m = TraderModel::with_wallet(
            TraderIdentity::new("Trader1", SigningKey::new("0xkey"), "0xaddr"),
            Decimal::ZERO,
            Decimal::ZERO,
        );
        m.deposited_base = Decimal::from(deposited_base);
        m.deposited_quote = Decimal::from(deposited_quote);
        m
    }

    #[test]
    fn test_valid_orderbook_counts_sides() {
        let snapshot = OrderbookSnapshot::new(
            MarketId::new("m-1"),
            vec![
                order("o-1", "100", "5", "BID"),
                order("o-2", "101", "3", "ASK"),
                order("o-3", "99", "2", "BID"),
            ],
        );
        let stats = check_orderbook(&snapshot).unwrap();
        assert_eq!(stats.bids, 2);
        assert_eq!(stats.asks, 1);
        assert_eq!(stats.total, 3);
    }

    #[test]
    fn test_orderbook_missing_field_is_violation() {
        let mut row = order("o-1", "100", "5", "BID");
        row.side = None;
        let snapshot = OrderbookSnapshot::new(MarketId::new("m-1"), vec![row]);
        assert!(matches!(
            check_orderbook(&snapshot),
            Err(InvariantViolation::MissingOrderField { field: "side", .. })
        ));
    }

    #[test]
    fn test_orderbook_zero_quantity_is_violation() {
        let snapshot =
            OrderbookSnapshot::new(MarketId::new("m-1"), vec![order("o-9", "100", "0", "ASK")]);
        assert!(matches!(
            check_orderbook(&snapshot),
            Err(InvariantViolation::ZeroQuantityOrder { order_id }) if order_id == "o-9"
        ));
    }

    #[test]
    fn test_orderbook_garbage_numeric_is_violation() {
        let snapshot =
            OrderbookSnapshot::new(MarketId::new("m-1"), vec![order("o-1", "abc", "5", "BID")]);
        assert!(matches!(
            check_orderbook(&snapshot),
            Err(InvariantViolation::MalformedOrderField { field: "price", .. })
        ));
    }

    #[test]
    fn test_structural_checks_are_idempotent() {
        let snapshot = OrderbookSnapshot::new(
            MarketId::new("m-1"),
            vec![order("o-1", "100", "5", "BID"), order("o-2", "abc", "5", "ASK")],
        );
        let first = check_orderbook(&snapshot);
        let second = check_orderbook(&snapshot);
        assert_eq!(first, second);

        let tape = TradeTape::new(MarketId::new("m-1"), vec![trade("100", "30")]);
        assert_eq!(check_trades(&tape), check_trades(&tape));
    }

    #[test]
    fn test_trades_sum_volume() {
        let tape = TradeTape::new(
            MarketId::new("m-1"),
            vec![trade("100", "100"), trade("100", "150"), trade("100", "80")],
        );
        let stats = check_trades(&tape).unwrap();
        assert_eq!(stats.count, 3);
        assert_eq!(stats.volume, Decimal::from(330));
    }

    #[test]
    fn test_trade_non_positive_price_is_violation() {
        let tape = TradeTape::new(MarketId::new("m-1"), vec![trade("0", "10")]);
        assert!(matches!(
            check_trades(&tape),
            Err(InvariantViolation::NonPositiveTrade { field: "price", .. })
        ));
    }

    #[test]
    fn test_trade_missing_timestamp_is_violation() {
        let mut row = trade("100", "10");
        row.timestamp = None;
        let tape = TradeTape::new(MarketId::new("m-1"), vec![row]);
        assert!(matches!(
            check_trades(&tape),
            Err(InvariantViolation::MissingTradeField { field: "timestamp", .. })
        ));
    }

    #[test]
    fn test_balance_off_by_one_passes() {
        let trader = model(1000, 17_000);
        let actual = DepositedBalances::new(Decimal::from(999), Decimal::from(17_001));
        let verdicts = compare_deposited(&trader, &actual, "After settlement", Decimal::ONE);
        assert!(verdicts.iter().all(BalanceVerdict::holds));
        assert!(assert_verdicts(verdicts).is_ok());
    }

    #[test]
    fn test_balance_off_by_two_fails_naming_trader_and_values() {
        let trader = model(1000, 17_000);
        let actual = DepositedBalances::new(Decimal::from(998), Decimal::from(17_000));
        let verdicts = compare_deposited(&trader, &actual, "After settlement", Decimal::ONE);
        let err = assert_verdicts(verdicts).unwrap_err();
        match err {
            InvariantViolation::BalanceMismatch {
                trader,
                expected,
                actual,
                ..
            } => {
                assert_eq!(trader, "Trader1");
                assert_eq!(expected, Decimal::from(1000));
                assert_eq!(actual, Decimal::from(998));
            }
            other => panic!("unexpected violation {other:?}"),
        }
    }
}
