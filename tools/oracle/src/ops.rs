//! Operation executors
//!
//! Every executor follows the same protocol: evaluate the trader's predicate
//! gate, and on a local rejection return a failed result without contacting
//! the exchange; otherwise invoke the control surface and, on success, move
//! the shadow model to the post-operation state. A remote deposit failure
//! additionally zeroes the wallet-side mock balance for that asset, since it
//! signals the wallet holds no real funds behind the modeled amount.

use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::json;
use std::fmt;
use types::balance::Asset;
use types::order::Side;

use crate::context::RunContext;
use crate::surface::{ControlSurface, SurfaceError};
use crate::trader::TraderModel;

/// What was attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum OperationKind {
    DepositBase,
    DepositQuote,
    BuyOrder,
    SellOrder,
    WithdrawBase,
    WithdrawQuote,
    /// No candidate operation survived the generator's gates.
    NoOp,
}

impl OperationKind {
    pub fn deposit(asset: Asset) -> Self {
        match asset {
            Asset::Base => Self::DepositBase,
            Asset::Quote => Self::DepositQuote,
        }
    }

    pub fn withdraw(asset: Asset) -> Self {
        match asset {
            Asset::Base => Self::WithdrawBase,
            Asset::Quote => Self::WithdrawQuote,
        }
    }

    pub fn order(side: Side) -> Self {
        match side {
            Side::Buy => Self::BuyOrder,
            Side::Sell => Self::SellOrder,
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::DepositBase => "DEPOSIT_BASE",
            Self::DepositQuote => "DEPOSIT_QUOTE",
            Self::BuyOrder => "BUY_ORDER",
            Self::SellOrder => "SELL_ORDER",
            Self::WithdrawBase => "WITHDRAW_BASE",
            Self::WithdrawQuote => "WITHDRAW_QUOTE",
            Self::NoOp => "NONE",
        };
        write!(f, "{name}")
    }
}

/// How an attempt failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FailureKind {
    /// Predicate gate rejected the operation before any external call.
    Local,
    /// The exchange answered with a failure status.
    Remote,
    /// The control surface was unreachable or timed out.
    Transport,
}

impl FailureKind {
    fn from_surface(error: &SurfaceError) -> Self {
        if error.is_transport() {
            Self::Transport
        } else {
            Self::Remote
        }
    }
}

/// Immutable record of one attempted operation.
#[derive(Debug, Clone, Serialize)]
pub struct OperationResult {
    pub success: bool,
    pub kind: OperationKind,
    pub trader: String,
    pub details: serde_json::Value,
    pub error: Option<String>,
    pub failure: Option<FailureKind>,
}

impl OperationResult {
    pub fn ok(kind: OperationKind, trader: &str, details: serde_json::Value) -> Self {
        Self {
            success: true,
            kind,
            trader: trader.to_string(),
            details,
            error: None,
            failure: None,
        }
    }

    pub fn rejected(
        kind: OperationKind,
        trader: &str,
        details: serde_json::Value,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            success: false,
            kind,
            trader: trader.to_string(),
            details,
            error: Some(reason.into()),
            failure: Some(FailureKind::Local),
        }
    }

    pub fn failed(
        kind: OperationKind,
        trader: &str,
        details: serde_json::Value,
        error: &SurfaceError,
    ) -> Self {
        Self {
            success: false,
            kind,
            trader: trader.to_string(),
            details,
            error: Some(error.to_string()),
            failure: Some(FailureKind::from_surface(error)),
        }
    }

    /// A "no valid operation" marker for a fully gated-out trader.
    pub fn no_op(trader: &str) -> Self {
        Self {
            success: false,
            kind: OperationKind::NoOp,
            trader: trader.to_string(),
            details: json!({}),
            error: Some("no valid operations available".to_string()),
            failure: Some(FailureKind::Local),
        }
    }
}

/// Deposit wallet funds into exchange escrow.
pub async fn deposit(
    control: &dyn ControlSurface,
    ctx: &RunContext,
    trader: &mut TraderModel,
    asset: Asset,
    amount: Decimal,
) -> OperationResult {
    let kind = OperationKind::deposit(asset);
    let market = &ctx.market;
    let (network, token) = match asset {
        Asset::Base => (&market.base_network, &market.base_token),
        Asset::Quote => (&market.quote_network, &market.quote_token),
    };
    let details = json!({ "amount": amount.to_string(), "network": network });

    let allowed = match asset {
        Asset::Base => trader.can_deposit_base(amount),
        Asset::Quote => trader.can_deposit_quote(amount),
    };
    if !allowed {
        return OperationResult::rejected(
            kind,
            trader.name(),
            details,
            format!("insufficient wallet balance: {}", trader.wallet(asset)),
        );
    }

    match control
        .deposit(&trader.identity, network, token, amount)
        .await
    {
        Ok(()) => {
            trader.apply_deposit(asset, amount);
            OperationResult::ok(kind, trader.name(), details)
        }
        Err(error) => {
            // The mocked wallet balance was a lie; stop retrying against it.
            trader.zero_wallet(asset);
            OperationResult::failed(kind, trader.name(), details, &error)
        }
    }
}

/// Withdraw escrowed funds back to the wallet.
pub async fn withdraw(
    control: &dyn ControlSurface,
    ctx: &RunContext,
    trader: &mut TraderModel,
    asset: Asset,
    amount: Decimal,
) -> OperationResult {
    let kind = OperationKind::withdraw(asset);
    let market = &ctx.market;
    let (network, token) = match asset {
        Asset::Base => (&market.base_network, &market.base_token),
        Asset::Quote => (&market.quote_network, &market.quote_token),
    };
    let details = json!({ "amount": amount.to_string(), "network": network });

    let allowed = match asset {
        Asset::Base => trader.can_withdraw_base(amount),
        Asset::Quote => trader.can_withdraw_quote(amount),
    };
    if !allowed {
        return OperationResult::rejected(
            kind,
            trader.name(),
            details,
            format!("insufficient deposited balance: {}", trader.deposited(asset)),
        );
    }

    match control
        .withdraw(&trader.identity, network, token, amount)
        .await
    {
        Ok(()) => {
            trader.apply_withdrawal(asset, amount);
            OperationResult::ok(kind, trader.name(), details)
        }
        Err(error) => OperationResult::failed(kind, trader.name(), details, &error),
    }
}

/// Place a limit order, locking the full reserved amount in the model.
pub async fn place_order(
    control: &dyn ControlSurface,
    ctx: &RunContext,
    trader: &mut TraderModel,
    side: Side,
    quantity: Decimal,
    price: Decimal,
) -> OperationResult {
    let kind = OperationKind::order(side);
    let details = json!({ "qty": quantity.to_string(), "price": price.to_string() });

    let allowed = match side {
        Side::Buy => trader.can_buy(quantity, price),
        Side::Sell => trader.can_sell(quantity),
    };
    if !allowed {
        let (asset, available) = match side {
            Side::Buy => (Asset::Quote, trader.deposited_quote),
            Side::Sell => (Asset::Base, trader.deposited_base),
        };
        return OperationResult::rejected(
            kind,
            trader.name(),
            details,
            format!("insufficient {asset} balance: {available}"),
        );
    }

    match control
        .place_order(&trader.identity, side, &ctx.market.market_id, quantity, price)
        .await
    {
        Ok(order_id) => {
            match side {
                Side::Buy => trader.apply_order_lock(Asset::Quote, quantity * price),
                Side::Sell => trader.apply_order_lock(Asset::Base, quantity),
            }
            trader.record_order(order_id);
            OperationResult::ok(kind, trader.name(), details)
        }
        Err(error) => OperationResult::failed(kind, trader.name(), details, &error),
    }
}
