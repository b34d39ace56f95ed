//! External collaborator surfaces
//!
//! The oracle talks to three interfaces it does not own: the exchange's
//! command-line control surface, its streaming query surface, and the chain
//! utility surface for address derivation and on-chain balances. Each is an
//! async trait so the orchestrator can run against the real process-backed
//! implementations or the in-memory exchange double interchangeably.
//!
//! # Modules
//! - `process` — Subprocess-backed implementations with bounded timeouts
//! - `mock` — In-memory exchange double for the test suite

pub mod mock;
pub mod process;

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::time::Duration;
use thiserror::Error;
use types::balance::DepositedBalances;
use types::ids::MarketId;
use types::market::{MarketContext, StackConfig};
use types::order::{OrderbookSnapshot, Side};
use types::trade::TradeTape;

use crate::trader::TraderIdentity;

/// Failure of an external surface call.
///
/// `Spawn` and `Timeout` are transport-class: the collaborator could not be
/// reached at all, and callers treat the round as missing data. `Refused`
/// and `Command` mean the collaborator answered with a failure status.
#[derive(Error, Debug)]
pub enum SurfaceError {
    #[error("failed to launch `{command}`: {source}")]
    Spawn {
        command: String,
        source: std::io::Error,
    },

    #[error("`{command}` timed out after {timeout:?}")]
    Timeout { command: String, timeout: Duration },

    #[error("`{command}` exited with status {status}: {stderr}")]
    Command {
        command: String,
        status: i32,
        stderr: String,
    },

    #[error("operation refused: {reason}")]
    Refused { reason: String },

    #[error("malformed response from `{command}`: {detail}")]
    Malformed { command: String, detail: String },
}

impl SurfaceError {
    /// Transport-class failures are treated as missing data, never as a
    /// defect signal.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Spawn { .. } | Self::Timeout { .. })
    }
}

/// Synchronous request/response operations against the exchange.
///
/// Every trader-scoped call carries the trader identity because the control
/// surface signs commands with the trader's key.
#[async_trait]
pub trait ControlSurface: Send + Sync {
    /// Connectivity preflight.
    async fn status(&self) -> Result<(), SurfaceError>;

    /// Fetch the stack configuration (markets and chains).
    async fn fetch_config(&self) -> Result<StackConfig, SurfaceError>;

    /// Query a trader's escrowed balances for the given market's legs.
    async fn deposited_balances(
        &self,
        trader: &TraderIdentity,
        market: &MarketContext,
    ) -> Result<DepositedBalances, SurfaceError>;

    async fn deposit(
        &self,
        trader: &TraderIdentity,
        network: &str,
        token: &str,
        amount: Decimal,
    ) -> Result<(), SurfaceError>;

    async fn withdraw(
        &self,
        trader: &TraderIdentity,
        network: &str,
        token: &str,
        amount: Decimal,
    ) -> Result<(), SurfaceError>;

    /// Place a limit order. Returns the exchange-assigned order id when the
    /// surface reports one.
    async fn place_order(
        &self,
        trader: &TraderIdentity,
        side: Side,
        market: &MarketId,
        quantity: Decimal,
        price: Decimal,
    ) -> Result<Option<String>, SurfaceError>;
}

/// Snapshot retrieval from the exchange's streaming interface.
///
/// Both calls tolerate partial results; a timeout surfaces as a
/// transport-class [`SurfaceError`] the caller downgrades to "no data".
#[async_trait]
pub trait QuerySurface: Send + Sync {
    async fn orderbook(
        &self,
        market: &MarketId,
        historical: bool,
        trader_filter: Option<&str>,
    ) -> Result<OrderbookSnapshot, SurfaceError>;

    async fn trades(
        &self,
        market: &MarketId,
        historical: bool,
        trader_filter: Option<&str>,
    ) -> Result<TradeTape, SurfaceError>;
}

/// Chain utilities: key-to-address derivation and on-chain token balances.
#[async_trait]
pub trait ChainSurface: Send + Sync {
    async fn derive_address(&self, key: &str) -> Result<String, SurfaceError>;

    async fn token_balance(
        &self,
        address: &str,
        token_address: &str,
        rpc_url: &str,
    ) -> Result<Decimal, SurfaceError>;
}
