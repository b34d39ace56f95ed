//! Trade-tape snapshot rows
//!
//! Same wire discipline as the order-book rows: fields arrive as optional raw
//! strings and structural validation happens in the assertion oracle.

use crate::ids::MarketId;
use serde::{Deserialize, Serialize};

/// One executed trade as reported by the trade stream.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeRow {
    #[serde(default)]
    pub price: Option<String>,
    #[serde(default)]
    pub qty: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

/// Snapshot of the closed-trade history for one market.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeTape {
    pub market_id: MarketId,
    pub count: usize,
    pub trades: Vec<TradeRow>,
}

impl TradeTape {
    pub fn new(market_id: MarketId, trades: Vec<TradeRow>) -> Self {
        Self {
            market_id,
            count: trades.len(),
            trades,
        }
    }
}
