//! Market context and exchange configuration payloads
//!
//! The exchange's `config` command returns the set of configured markets and
//! chains as JSON. The oracle resolves the first market against its chain
//! entries once at startup into an immutable [`MarketContext`] that every
//! component receives by reference.

use crate::errors::ConfigError;
use crate::ids::MarketId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Envelope around the stack configuration as returned on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigEnvelope {
    pub config: StackConfig,
}

/// Markets and chains configured on the exchange stack.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StackConfig {
    #[serde(default)]
    pub markets: Vec<MarketEntry>,
    #[serde(default)]
    pub chains: Vec<ChainEntry>,
}

/// One market as configured on the stack.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketEntry {
    pub market_id: String,
    #[serde(default)]
    pub name: Option<String>,
    pub base_chain_network: String,
    pub quote_chain_network: String,
    pub base_chain_token_symbol: String,
    pub quote_chain_token_symbol: String,
}

/// One chain as configured on the stack, with its token registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainEntry {
    pub network: String,
    pub rpc_url: String,
    #[serde(default)]
    pub tokens: HashMap<String, TokenEntry>,
}

/// Token registry entry: symbol maps to a contract address.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenEntry {
    pub address: String,
}

/// Immutable per-run market context.
///
/// Resolved once from [`StackConfig`] at startup; holds everything the
/// executors, oracle, and chain surface need to address the market's two
/// legs. No component mutates it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarketContext {
    pub market_id: MarketId,
    pub base_network: String,
    pub quote_network: String,
    pub base_token: String,
    pub quote_token: String,
    pub base_token_address: String,
    pub quote_token_address: String,
    pub base_rpc_url: String,
    pub quote_rpc_url: String,
}

impl MarketContext {
    /// Resolve the first configured market against the chain entries.
    pub fn resolve(config: &StackConfig) -> Result<Self, ConfigError> {
        let market = config.markets.first().ok_or(ConfigError::NoMarkets)?;

        let base_chain = find_chain(config, &market.base_chain_network)?;
        let quote_chain = find_chain(config, &market.quote_chain_network)?;

        let token = |chain: &ChainEntry, symbol: &str| -> Result<String, ConfigError> {
            chain
                .tokens
                .get(symbol)
                .map(|t| t.address.clone())
                .ok_or_else(|| ConfigError::UnknownToken {
                    network: chain.network.clone(),
                    symbol: symbol.to_string(),
                })
        };

        Ok(Self {
            market_id: MarketId::new(market.market_id.clone()),
            base_network: market.base_chain_network.clone(),
            quote_network: market.quote_chain_network.clone(),
            base_token: market.base_chain_token_symbol.clone(),
            quote_token: market.quote_chain_token_symbol.clone(),
            base_token_address: token(base_chain, &market.base_chain_token_symbol)?,
            quote_token_address: token(quote_chain, &market.quote_chain_token_symbol)?,
            base_rpc_url: base_chain.rpc_url.clone(),
            quote_rpc_url: quote_chain.rpc_url.clone(),
        })
    }
}

fn find_chain<'a>(config: &'a StackConfig, network: &str) -> Result<&'a ChainEntry, ConfigError> {
    config
        .chains
        .iter()
        .find(|c| c.network == network)
        .ok_or_else(|| ConfigError::UnknownNetwork {
            network: network.to_string(),
        })
}
