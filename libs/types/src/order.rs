//! Order side and order-book snapshot rows
//!
//! Snapshot rows are deliberately loose: every field is optional and carried
//! as the raw wire string. The assertion oracle, not the deserializer, decides
//! whether a row is structurally sound, so a malformed row is reported as an
//! invariant violation instead of a transport error.

use crate::ids::MarketId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Order side.
///
/// Operations use BUY/SELL; the order-book stream reports resting orders as
/// BID/ASK. Both encodings parse to the same side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    #[serde(rename = "BUY", alias = "BID")]
    Buy,
    #[serde(rename = "SELL", alias = "ASK")]
    Sell,
}

impl Side {
    /// Parse a wire-level side code (BUY/SELL or BID/ASK).
    pub fn from_wire(code: &str) -> Option<Self> {
        match code {
            "BUY" | "BID" => Some(Self::Buy),
            "SELL" | "ASK" => Some(Self::Sell),
            _ => None,
        }
    }

    /// The opposite side.
    pub fn opposite(self) -> Self {
        match self {
            Self::Buy => Self::Sell,
            Self::Sell => Self::Buy,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buy => write!(f, "BUY"),
            Self::Sell => write!(f, "SELL"),
        }
    }
}

/// One resting order as reported by the order-book stream.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRow {
    #[serde(default)]
    pub order_id: Option<String>,
    #[serde(default)]
    pub price: Option<String>,
    #[serde(default)]
    pub quantity: Option<String>,
    #[serde(default)]
    pub side: Option<String>,
}

/// Snapshot of the open order book for one market.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderbookSnapshot {
    pub market_id: MarketId,
    pub count: usize,
    pub orders: Vec<OrderRow>,
}

impl OrderbookSnapshot {
    pub fn new(market_id: MarketId, orders: Vec<OrderRow>) -> Self {
        Self {
            market_id,
            count: orders.len(),
            orders,
        }
    }
}
