//! Error taxonomy for the settlement oracle
//!
//! [`InvariantViolation`] is the fatal class: the exchange's observable state
//! contradicts the shadow model or the structural rules of its own market
//! data. Every variant carries the full expected/actual context so a failure
//! message identifies the trader, the operation, and both values. Operation
//! failures and transport problems are not in this taxonomy; they are
//! non-fatal and reported on the operation result instead.

use crate::balance::Asset;
use rust_decimal::Decimal;
use thiserror::Error;

/// A divergence between expected and observed exchange state.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InvariantViolation {
    #[error(
        "{context}: {asset} balance mismatch for {trader}: expected {expected}, got {actual} (tolerance {tolerance})"
    )]
    BalanceMismatch {
        trader: String,
        asset: Asset,
        context: String,
        expected: Decimal,
        actual: Decimal,
        tolerance: Decimal,
    },

    #[error("order at index {index} missing field `{field}`")]
    MissingOrderField { index: usize, field: &'static str },

    #[error("order at index {index} has unparseable {field}: {value:?}")]
    MalformedOrderField {
        index: usize,
        field: &'static str,
        value: String,
    },

    #[error("order {order_id} is resting with zero quantity")]
    ZeroQuantityOrder { order_id: String },

    #[error("trade at index {index} missing field `{field}`")]
    MissingTradeField { index: usize, field: &'static str },

    #[error("trade at index {index} has unparseable {field}: {value:?}")]
    MalformedTradeField {
        index: usize,
        field: &'static str,
        value: String,
    },

    #[error("trade at index {index} has non-positive {field}: {value}")]
    NonPositiveTrade {
        index: usize,
        field: &'static str,
        value: Decimal,
    },

    #[error("{scenario}: expected at least {expected} trades, observed {actual}")]
    TooFewTrades {
        scenario: String,
        expected: u64,
        actual: u64,
    },
}

/// A defect in the stack configuration fetched at startup.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("stack configuration contains no markets")]
    NoMarkets,

    #[error("market references unknown network {network}")]
    UnknownNetwork { network: String },

    #[error("chain {network} has no token {symbol}")]
    UnknownToken { network: String, symbol: String },
}
