//! Random operation generator
//!
//! A declarative table maps each action kind to an eligibility gate, a
//! selection weight, and a parameter sampler. Generation is one weighted
//! draw over the gated table with a seeded RNG, so every action can be unit
//! tested in isolation and a full run replays from its seed.

use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use types::balance::Asset;
use types::order::Side;

use crate::trader::TraderModel;

/// Minimum wallet balance before a deposit becomes a candidate.
const DEPOSIT_FLOOR: u64 = 1_000;
/// Minimum deposited balance before an order becomes a candidate.
const TRADE_FLOOR: u64 = 100;
/// Minimum deposited balance before a withdrawal becomes a candidate.
const WITHDRAW_FLOOR: u64 = 500;

/// Limit price band for generated orders.
const PRICE_RANGE: std::ops::RangeInclusive<u64> = 95..=105;

/// A generated operation with its sampled parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlannedOperation {
    Deposit { asset: Asset, amount: Decimal },
    Order { side: Side, quantity: Decimal, price: Decimal },
    Withdraw { asset: Asset, amount: Decimal },
}

/// The selectable action kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    DepositBase,
    DepositQuote,
    Buy,
    Sell,
    WithdrawBase,
    WithdrawQuote,
}

/// One row of the dispatch table.
pub struct ActionSpec {
    pub kind: ActionKind,
    pub weight: u32,
    pub eligible: fn(&TraderModel) -> bool,
    pub sample: fn(&TraderModel, &mut ChaCha8Rng) -> PlannedOperation,
}

/// The full dispatch table. Trades are favored over deposits, withdrawals
/// are rare.
pub const ACTIONS: [ActionSpec; 6] = [
    ActionSpec {
        kind: ActionKind::DepositBase,
        weight: 3,
        eligible: |t| t.wallet_base > Decimal::from(DEPOSIT_FLOOR),
        sample: |t, rng| PlannedOperation::Deposit {
            asset: Asset::Base,
            amount: sample_deposit_amount(t.wallet_base, rng),
        },
    },
    ActionSpec {
        kind: ActionKind::DepositQuote,
        weight: 3,
        eligible: |t| t.wallet_quote > Decimal::from(DEPOSIT_FLOOR),
        sample: |t, rng| PlannedOperation::Deposit {
            asset: Asset::Quote,
            amount: sample_deposit_amount(t.wallet_quote, rng),
        },
    },
    ActionSpec {
        kind: ActionKind::Buy,
        weight: 5,
        eligible: |t| t.deposited_quote > Decimal::from(TRADE_FLOOR),
        sample: |t, rng| {
            let price = rng.gen_range(PRICE_RANGE);
            // Capacity at a nominal price of 100; the gate may still reject
            // the sampled pair, which counts as a local rejection.
            let max_qty = floor_u64(t.deposited_quote / Decimal::ONE_HUNDRED);
            PlannedOperation::Order {
                side: Side::Buy,
                quantity: Decimal::from(rng.gen_range(10..=max_qty.max(10))),
                price: Decimal::from(price),
            }
        },
    },
    ActionSpec {
        kind: ActionKind::Sell,
        weight: 5,
        eligible: |t| t.deposited_base > Decimal::from(TRADE_FLOOR),
        sample: |t, rng| {
            let price = rng.gen_range(PRICE_RANGE);
            let max_qty = floor_u64(t.deposited_base);
            PlannedOperation::Order {
                side: Side::Sell,
                quantity: Decimal::from(rng.gen_range(10..=max_qty.max(10))),
                price: Decimal::from(price),
            }
        },
    },
    ActionSpec {
        kind: ActionKind::WithdrawBase,
        weight: 1,
        eligible: |t| t.deposited_base > Decimal::from(WITHDRAW_FLOOR),
        sample: |t, rng| PlannedOperation::Withdraw {
            asset: Asset::Base,
            amount: sample_withdraw_amount(t.deposited_base, rng),
        },
    },
    ActionSpec {
        kind: ActionKind::WithdrawQuote,
        weight: 1,
        eligible: |t| t.deposited_quote > Decimal::from(WITHDRAW_FLOOR),
        sample: |t, rng| PlannedOperation::Withdraw {
            asset: Asset::Quote,
            amount: sample_withdraw_amount(t.deposited_quote, rng),
        },
    },
];

/// Deposit amount in `[min(1000, wallet), min(10000, wallet)]`.
fn sample_deposit_amount(wallet: Decimal, rng: &mut ChaCha8Rng) -> Decimal {
    let wallet = floor_u64(wallet);
    let low = wallet.min(1_000);
    let high = wallet.min(10_000);
    Decimal::from(rng.gen_range(low..=high.max(low)))
}

/// Withdrawal amount in `[min(100, deposited), min(5000, deposited)]`.
fn sample_withdraw_amount(deposited: Decimal, rng: &mut ChaCha8Rng) -> Decimal {
    let deposited = floor_u64(deposited);
    let low = deposited.min(100);
    let high = deposited.min(5_000);
    Decimal::from(rng.gen_range(low..=high.max(low)))
}

fn floor_u64(value: Decimal) -> u64 {
    value.floor().to_u64().unwrap_or(0)
}

/// One weighted draw over the gated table.
///
/// `None` means no candidate survived the gates. That is the expected
/// terminal state of an exhausted trader, not an error.
pub fn next_operation(trader: &TraderModel, rng: &mut ChaCha8Rng) -> Option<PlannedOperation> {
    let candidates: Vec<&ActionSpec> = ACTIONS
        .iter()
        .filter(|spec| (spec.eligible)(trader))
        .collect();
    if candidates.is_empty() {
        return None;
    }

    let weights: Vec<u32> = candidates.iter().map(|spec| spec.weight).collect();
    let index = WeightedIndex::new(&weights)
        .expect("weights are positive")
        .sample(rng);
    Some((candidates[index].sample)(trader, rng))
}
