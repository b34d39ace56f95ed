//! In-memory exchange double
//!
//! Implements all three external surfaces over a mutex-held ledger so the
//! oracle can be exercised end-to-end without a running stack. Placement
//! locks the reserved amount and crosses against opposing resting orders at
//! compatible prices in arrival order; settled proceeds are credited to the
//! counterparty's wallet side, never back into escrow, matching the
//! exchange's cross-chain settlement behavior.
//!
//! Supports failure injection (refused operations, an offline stack) for
//! executor and transport tests.

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;
use types::balance::DepositedBalances;
use types::ids::{MarketId, OrderId};
use types::market::{ChainEntry, MarketContext, MarketEntry, StackConfig, TokenEntry};
use types::order::{OrderRow, OrderbookSnapshot, Side};
use types::trade::{TradeRow, TradeTape};

use super::{ChainSurface, ControlSurface, QuerySurface, SurfaceError};
use crate::trader::TraderIdentity;

#[derive(Debug, Clone, Copy, Default)]
struct Ledger {
    wallet_base: Decimal,
    wallet_quote: Decimal,
    deposited_base: Decimal,
    deposited_quote: Decimal,
}

#[derive(Debug, Clone)]
struct RestingOrder {
    id: OrderId,
    trader: String,
    side: Side,
    price: Decimal,
    remaining: Decimal,
    seq: u64,
}

#[derive(Debug, Clone)]
struct MockTrade {
    maker: String,
    taker: String,
    price: Decimal,
    qty: Decimal,
    timestamp: i64,
}

#[derive(Debug, Default)]
struct MockState {
    ledgers: HashMap<String, Ledger>,
    book: Vec<RestingOrder>,
    trades: Vec<MockTrade>,
    seq: u64,
}

/// The exchange double.
pub struct MockExchange {
    market: MarketContext,
    state: Mutex<MockState>,
    offline: AtomicBool,
    refuse_ops: AtomicBool,
    control_calls: AtomicU64,
}

impl MockExchange {
    pub fn new(market: MarketContext) -> Self {
        Self {
            market,
            state: Mutex::new(MockState::default()),
            offline: AtomicBool::new(false),
            refuse_ops: AtomicBool::new(false),
            control_calls: AtomicU64::new(0),
        }
    }

    /// A ready-made market context for tests.
    pub fn test_market() -> MarketContext {
        MarketContext {
            market_id: MarketId::new("84532::0xbase::114::0xquote"),
            base_network: "anvil-1".to_string(),
            quote_network: "anvil-2".to_string(),
            base_token: "TKA".to_string(),
            quote_token: "TKB".to_string(),
            base_token_address: "0xbase".to_string(),
            quote_token_address: "0xquote".to_string(),
            base_rpc_url: "http://localhost:8545".to_string(),
            quote_rpc_url: "http://localhost:8546".to_string(),
        }
    }

    /// Seed a trader's on-chain wallet.
    pub fn fund_wallet(&self, address: &str, base: Decimal, quote: Decimal) {
        let mut state = self.state.lock().unwrap();
        let ledger = state.ledgers.entry(address.to_string()).or_default();
        ledger.wallet_base = base;
        ledger.wallet_quote = quote;
    }

    /// Refuse every subsequent operation with a remote failure status.
    pub fn set_refuse_operations(&self, refuse: bool) {
        self.refuse_ops.store(refuse, Ordering::SeqCst);
    }

    /// Make every surface call time out, as if the stack were unreachable.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Number of control operations that actually reached the exchange.
    pub fn control_call_count(&self) -> u64 {
        self.control_calls.load(Ordering::SeqCst)
    }

    pub fn trade_count(&self) -> usize {
        self.state.lock().unwrap().trades.len()
    }

    pub fn open_order_count(&self) -> usize {
        self.state.lock().unwrap().book.len()
    }

    fn gate(&self, command: &str) -> Result<(), SurfaceError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(SurfaceError::Timeout {
                command: command.to_string(),
                timeout: std::time::Duration::from_secs(0),
            });
        }
        Ok(())
    }

    fn gate_operation(&self, command: &str) -> Result<(), SurfaceError> {
        self.gate(command)?;
        self.control_calls.fetch_add(1, Ordering::SeqCst);
        if self.refuse_ops.load(Ordering::SeqCst) {
            return Err(SurfaceError::Refused {
                reason: "injected refusal".to_string(),
            });
        }
        Ok(())
    }

    /// Which leg a (network, token) pair addresses, if it matches the market.
    fn leg(&self, network: &str, token: &str) -> Option<Leg> {
        if network == self.market.base_network && token == self.market.base_token {
            Some(Leg::Base)
        } else if network == self.market.quote_network && token == self.market.quote_token {
            Some(Leg::Quote)
        } else {
            None
        }
    }

    /// Cross an incoming order against the opposing side of the book.
    /// Returns the unfilled remainder.
    fn cross(
        state: &mut MockState,
        taker: &str,
        side: Side,
        limit_price: Decimal,
        mut remaining: Decimal,
        timestamp: i64,
    ) -> Decimal {
        // Candidate makers in price-time priority.
        let mut candidates: Vec<usize> = state
            .book
            .iter()
            .enumerate()
            .filter(|(_, order)| {
                order.side == side.opposite()
                    && match side {
                        Side::Buy => order.price <= limit_price,
                        Side::Sell => order.price >= limit_price,
                    }
            })
            .map(|(i, _)| i)
            .collect();
        candidates.sort_by_key(|&i| {
            let order = &state.book[i];
            let price_key = match side {
                Side::Buy => order.price,
                Side::Sell => -order.price,
            };
            (price_key, order.seq)
        });

        for index in candidates {
            if remaining <= Decimal::ZERO {
                break;
            }
            let (maker_addr, trade_price, fill) = {
                let maker = &mut state.book[index];
                let fill = remaining.min(maker.remaining);
                maker.remaining -= fill;
                (maker.trader.clone(), maker.price, fill)
            };
            remaining -= fill;

            // Settle both legs to the wallet side.
            let value = fill * trade_price;
            let (buyer, seller) = match side {
                Side::Buy => (taker.to_string(), maker_addr.clone()),
                Side::Sell => (maker_addr.clone(), taker.to_string()),
            };
            if let Some(ledger) = state.ledgers.get_mut(&buyer) {
                ledger.wallet_base += fill;
            }
            if let Some(ledger) = state.ledgers.get_mut(&seller) {
                ledger.wallet_quote += value;
            }

            state.trades.push(MockTrade {
                maker: maker_addr,
                taker: taker.to_string(),
                price: trade_price,
                qty: fill,
                timestamp,
            });
        }

        state.book.retain(|order| order.remaining > Decimal::ZERO);
        remaining
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Leg {
    Base,
    Quote,
}

#[async_trait]
impl ControlSurface for MockExchange {
    async fn status(&self) -> Result<(), SurfaceError> {
        self.gate("status")
    }

    async fn fetch_config(&self) -> Result<StackConfig, SurfaceError> {
        self.gate("config")?;
        let market = &self.market;
        Ok(StackConfig {
            markets: vec![MarketEntry {
                market_id: market.market_id.as_str().to_string(),
                name: Some(format!("{}/{}", market.base_token, market.quote_token)),
                base_chain_network: market.base_network.clone(),
                quote_chain_network: market.quote_network.clone(),
                base_chain_token_symbol: market.base_token.clone(),
                quote_chain_token_symbol: market.quote_token.clone(),
            }],
            chains: vec![
                ChainEntry {
                    network: market.base_network.clone(),
                    rpc_url: market.base_rpc_url.clone(),
                    tokens: HashMap::from([(
                        market.base_token.clone(),
                        TokenEntry {
                            address: market.base_token_address.clone(),
                        },
                    )]),
                },
                ChainEntry {
                    network: market.quote_network.clone(),
                    rpc_url: market.quote_rpc_url.clone(),
                    tokens: HashMap::from([(
                        market.quote_token.clone(),
                        TokenEntry {
                            address: market.quote_token_address.clone(),
                        },
                    )]),
                },
            ],
        })
    }

    async fn deposited_balances(
        &self,
        trader: &TraderIdentity,
        _market: &MarketContext,
    ) -> Result<DepositedBalances, SurfaceError> {
        self.gate("balance")?;
        let state = self.state.lock().unwrap();
        let ledger = state.ledgers.get(&trader.address).copied().unwrap_or_default();
        Ok(DepositedBalances::new(
            ledger.deposited_base,
            ledger.deposited_quote,
        ))
    }

    async fn deposit(
        &self,
        trader: &TraderIdentity,
        network: &str,
        token: &str,
        amount: Decimal,
    ) -> Result<(), SurfaceError> {
        self.gate_operation("deposit")?;
        let leg = self.leg(network, token).ok_or_else(|| SurfaceError::Refused {
            reason: format!("unknown leg {network}:{token}"),
        })?;
        let mut state = self.state.lock().unwrap();
        let ledger = state.ledgers.entry(trader.address.clone()).or_default();
        match leg {
            Leg::Base => {
                if ledger.wallet_base < amount {
                    return Err(SurfaceError::Refused {
                        reason: "insufficient wallet funds".to_string(),
                    });
                }
                ledger.wallet_base -= amount;
                ledger.deposited_base += amount;
            }
            Leg::Quote => {
                if ledger.wallet_quote < amount {
                    return Err(SurfaceError::Refused {
                        reason: "insufficient wallet funds".to_string(),
                    });
                }
                ledger.wallet_quote -= amount;
                ledger.deposited_quote += amount;
            }
        }
        Ok(())
    }

    async fn withdraw(
        &self,
        trader: &TraderIdentity,
        network: &str,
        token: &str,
        amount: Decimal,
    ) -> Result<(), SurfaceError> {
        self.gate_operation("withdraw")?;
        let leg = self.leg(network, token).ok_or_else(|| SurfaceError::Refused {
            reason: format!("unknown leg {network}:{token}"),
        })?;
        let mut state = self.state.lock().unwrap();
        let ledger = state.ledgers.entry(trader.address.clone()).or_default();
        match leg {
            Leg::Base => {
                if ledger.deposited_base < amount {
                    return Err(SurfaceError::Refused {
                        reason: "insufficient escrowed funds".to_string(),
                    });
                }
                ledger.deposited_base -= amount;
                ledger.wallet_base += amount;
            }
            Leg::Quote => {
                if ledger.deposited_quote < amount {
                    return Err(SurfaceError::Refused {
                        reason: "insufficient escrowed funds".to_string(),
                    });
                }
                ledger.deposited_quote -= amount;
                ledger.wallet_quote += amount;
            }
        }
        Ok(())
    }

    async fn place_order(
        &self,
        trader: &TraderIdentity,
        side: Side,
        _market: &MarketId,
        quantity: Decimal,
        price: Decimal,
    ) -> Result<Option<String>, SurfaceError> {
        self.gate_operation("place_order")?;
        let timestamp = Utc::now().timestamp_millis();
        let mut state = self.state.lock().unwrap();

        // Lock the full reserve. Surplus from better-priced fills stays
        // locked until an explicit cancel, like the settlement pipeline.
        let ledger = state.ledgers.entry(trader.address.clone()).or_default();
        match side {
            Side::Buy => {
                let reserve = quantity * price;
                if ledger.deposited_quote < reserve {
                    return Err(SurfaceError::Refused {
                        reason: "insufficient escrowed quote".to_string(),
                    });
                }
                ledger.deposited_quote -= reserve;
            }
            Side::Sell => {
                if ledger.deposited_base < quantity {
                    return Err(SurfaceError::Refused {
                        reason: "insufficient escrowed base".to_string(),
                    });
                }
                ledger.deposited_base -= quantity;
            }
        }

        let remaining = Self::cross(&mut state, &trader.address, side, price, quantity, timestamp);

        if remaining > Decimal::ZERO {
            let id = OrderId::new();
            state.seq += 1;
            let seq = state.seq;
            state.book.push(RestingOrder {
                id,
                trader: trader.address.clone(),
                side,
                price,
                remaining,
                seq,
            });
            Ok(Some(id.to_string()))
        } else {
            Ok(Some(OrderId::new().to_string()))
        }
    }
}

#[async_trait]
impl QuerySurface for MockExchange {
    async fn orderbook(
        &self,
        market: &MarketId,
        _historical: bool,
        trader_filter: Option<&str>,
    ) -> Result<OrderbookSnapshot, SurfaceError> {
        self.gate("orderbook")?;
        let state = self.state.lock().unwrap();
        let orders = state
            .book
            .iter()
            .filter(|order| trader_filter.map_or(true, |f| order.trader == f))
            .map(|order| OrderRow {
                order_id: Some(order.id.to_string()),
                price: Some(order.price.to_string()),
                quantity: Some(order.remaining.to_string()),
                side: Some(
                    match order.side {
                        Side::Buy => "BID",
                        Side::Sell => "ASK",
                    }
                    .to_string(),
                ),
            })
            .collect();
        Ok(OrderbookSnapshot::new(market.clone(), orders))
    }

    async fn trades(
        &self,
        market: &MarketId,
        _historical: bool,
        trader_filter: Option<&str>,
    ) -> Result<TradeTape, SurfaceError> {
        self.gate("trades")?;
        let state = self.state.lock().unwrap();
        let trades = state
            .trades
            .iter()
            .filter(|trade| trade_matches(trade, trader_filter))
            .map(|trade| TradeRow {
                price: Some(trade.price.to_string()),
                qty: Some(trade.qty.to_string()),
                timestamp: Some(trade.timestamp.to_string()),
            })
            .collect();
        Ok(TradeTape::new(market.clone(), trades))
    }
}

fn trade_matches(trade: &MockTrade, trader_filter: Option<&str>) -> bool {
    trader_filter.map_or(true, |f| trade.maker == f || trade.taker == f)
}

#[async_trait]
impl ChainSurface for MockExchange {
    async fn derive_address(&self, key: &str) -> Result<String, SurfaceError> {
        self.gate("derive_address")?;
        Ok(mock_address(key))
    }

    async fn token_balance(
        &self,
        address: &str,
        token_address: &str,
        _rpc_url: &str,
    ) -> Result<Decimal, SurfaceError> {
        self.gate("token_balance")?;
        let state = self.state.lock().unwrap();
        let ledger = state.ledgers.get(address).copied().unwrap_or_default();
        if token_address == self.market.base_token_address {
            Ok(ledger.wallet_base)
        } else if token_address == self.market.quote_token_address {
            Ok(ledger.wallet_quote)
        } else {
            Ok(Decimal::ZERO)
        }
    }
}

/// Deterministic address derivation for the double: the key material,
/// normalized to 40 lowercase hex-ish characters.
pub fn mock_address(key: &str) -> String {
    let normalized: String = key
        .trim_start_matches("0x")
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect();
    let padded = format!("{normalized:0>40}");
    format!("0x{}", &padded[padded.len() - 40..])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(name: &str) -> TraderIdentity {
        let key = format!("0xkey{name}");
        let address = mock_address(&key);
        TraderIdentity::new(name, crate::trader::SigningKey::new(key), address)
    }

    fn funded_exchange() -> (MockExchange, TraderIdentity, TraderIdentity) {
        let exchange = MockExchange::new(MockExchange::test_market());
        let buyer = identity("buyer");
        let seller = identity("seller");
        exchange.fund_wallet(&buyer.address, Decimal::ZERO, Decimal::from(100_000));
        exchange.fund_wallet(&seller.address, Decimal::from(1_000), Decimal::ZERO);
        (exchange, buyer, seller)
    }

    #[tokio::test]
    async fn test_deposit_moves_wallet_into_escrow() {
        let (exchange, buyer, _) = funded_exchange();
        exchange
            .deposit(&buyer, "anvil-2", "TKB", Decimal::from(50_000))
            .await
            .unwrap();
        let balances = exchange
            .deposited_balances(&buyer, &MockExchange::test_market())
            .await
            .unwrap();
        assert_eq!(balances.quote, Decimal::from(50_000));
    }

    #[tokio::test]
    async fn test_deposit_refused_without_wallet_funds() {
        let (exchange, _, seller) = funded_exchange();
        let err = exchange
            .deposit(&seller, "anvil-2", "TKB", Decimal::from(1))
            .await
            .unwrap_err();
        assert!(matches!(err, SurfaceError::Refused { .. }));
    }

    #[tokio::test]
    async fn test_matching_settles_to_wallets() {
        let (exchange, buyer, seller) = funded_exchange();
        let market = MockExchange::test_market();
        exchange
            .deposit(&buyer, "anvil-2", "TKB", Decimal::from(50_000))
            .await
            .unwrap();
        exchange
            .deposit(&seller, "anvil-1", "TKA", Decimal::from(1_000))
            .await
            .unwrap();

        exchange
            .place_order(
                &seller,
                Side::Sell,
                &market.market_id,
                Decimal::from(100),
                Decimal::from(100),
            )
            .await
            .unwrap();
        exchange
            .place_order(
                &buyer,
                Side::Buy,
                &market.market_id,
                Decimal::from(100),
                Decimal::from(100),
            )
            .await
            .unwrap();

        assert_eq!(exchange.trade_count(), 1);
        assert_eq!(exchange.open_order_count(), 0);

        // Escrow reflects only the locks; proceeds went to the wallets.
        let buyer_balances = exchange.deposited_balances(&buyer, &market).await.unwrap();
        assert_eq!(buyer_balances.quote, Decimal::from(40_000));
        assert_eq!(buyer_balances.base, Decimal::ZERO);
        let seller_balances = exchange.deposited_balances(&seller, &market).await.unwrap();
        assert_eq!(seller_balances.base, Decimal::from(900));
        assert_eq!(
            exchange
                .token_balance(&buyer.address, "0xbase", "")
                .await
                .unwrap(),
            Decimal::from(100)
        );
        assert_eq!(
            exchange
                .token_balance(&seller.address, "0xquote", "")
                .await
                .unwrap(),
            Decimal::from(10_000)
        );
    }

    #[tokio::test]
    async fn test_one_taker_splits_across_makers() {
        let (exchange, buyer, seller) = funded_exchange();
        let market = MockExchange::test_market();
        exchange
            .deposit(&buyer, "anvil-2", "TKB", Decimal::from(50_000))
            .await
            .unwrap();
        exchange
            .deposit(&seller, "anvil-1", "TKA", Decimal::from(1_000))
            .await
            .unwrap();

        for qty in [100u64, 150, 80] {
            exchange
                .place_order(
                    &seller,
                    Side::Sell,
                    &market.market_id,
                    Decimal::from(qty),
                    Decimal::from(100),
                )
                .await
                .unwrap();
        }
        exchange
            .place_order(
                &buyer,
                Side::Buy,
                &market.market_id,
                Decimal::from(330),
                Decimal::from(100),
            )
            .await
            .unwrap();

        assert_eq!(exchange.trade_count(), 3);
        assert_eq!(exchange.open_order_count(), 0);
    }

    #[tokio::test]
    async fn test_offline_surfaces_time_out() {
        let (exchange, buyer, _) = funded_exchange();
        exchange.set_offline(true);
        let err = exchange.status().await.unwrap_err();
        assert!(err.is_transport());
        let err = exchange
            .orderbook(&MockExchange::test_market().market_id, true, None)
            .await
            .unwrap_err();
        assert!(err.is_transport());
        let err = exchange
            .deposit(&buyer, "anvil-2", "TKB", Decimal::ONE)
            .await
            .unwrap_err();
        assert!(err.is_transport());
    }

    #[tokio::test]
    async fn test_orderbook_rows_are_structurally_complete() {
        let (exchange, buyer, _) = funded_exchange();
        let market = MockExchange::test_market();
        exchange
            .deposit(&buyer, "anvil-2", "TKB", Decimal::from(50_000))
            .await
            .unwrap();
        exchange
            .place_order(
                &buyer,
                Side::Buy,
                &market.market_id,
                Decimal::from(10),
                Decimal::from(95),
            )
            .await
            .unwrap();

        let snapshot = exchange.orderbook(&market.market_id, true, None).await.unwrap();
        assert_eq!(snapshot.count, 1);
        let row = &snapshot.orders[0];
        assert!(row.order_id.is_some());
        assert_eq!(row.side.as_deref(), Some("BID"));
        assert_eq!(row.quantity.as_deref(), Some("10"));
    }

    #[test]
    fn test_mock_address_is_deterministic_and_shaped() {
        let a = mock_address("0xABCdef");
        assert_eq!(a, mock_address("0xABCdef"));
        assert!(a.starts_with("0x"));
        assert_eq!(a.len(), 42);
    }
}
