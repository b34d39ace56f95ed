//! Executor round-trip on a single trader
//!
//! Deposits on both legs, rests three buys below three sells so nothing can
//! cross, withdraws half of each deposit, and verifies balances at every
//! step. Exercises every executor against the live stack without requiring
//! any matching; the minimum trade count is therefore zero.

use types::balance::Asset;
use types::order::Side;

use super::{Pace, Scenario, Step};

const DEPOSIT: u64 = 1_000_000;
const WITHDRAWAL: u64 = DEPOSIT / 2;

const STEPS: &[Step] = &[
    Step::Deposit {
        trader: 0,
        asset: Asset::Base,
        amount: DEPOSIT,
    },
    Step::Deposit {
        trader: 0,
        asset: Asset::Quote,
        amount: DEPOSIT,
    },
    Step::Pause(Pace::Long),
    // Resting buys below the sells: the book stays uncrossed.
    Step::Place {
        trader: 0,
        side: Side::Buy,
        quantity: 100,
        price: 99,
        verify: true,
    },
    Step::Pause(Pace::Short),
    Step::Place {
        trader: 0,
        side: Side::Buy,
        quantity: 150,
        price: 98,
        verify: true,
    },
    Step::Pause(Pace::Short),
    Step::Place {
        trader: 0,
        side: Side::Buy,
        quantity: 200,
        price: 97,
        verify: true,
    },
    Step::Pause(Pace::Short),
    Step::Place {
        trader: 0,
        side: Side::Sell,
        quantity: 100,
        price: 101,
        verify: true,
    },
    Step::Pause(Pace::Short),
    Step::Place {
        trader: 0,
        side: Side::Sell,
        quantity: 150,
        price: 102,
        verify: true,
    },
    Step::Pause(Pace::Short),
    Step::Place {
        trader: 0,
        side: Side::Sell,
        quantity: 200,
        price: 103,
        verify: true,
    },
    Step::Pause(Pace::Long),
    Step::Withdraw {
        trader: 0,
        asset: Asset::Base,
        amount: WITHDRAWAL,
    },
    Step::Withdraw {
        trader: 0,
        asset: Asset::Quote,
        amount: WITHDRAWAL,
    },
    Step::Settle,
];

pub fn scenario() -> Scenario {
    Scenario {
        name: "smoke",
        participants: 1,
        min_trades: 0,
        steps: STEPS,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_book_cannot_cross() {
        let best_bid = STEPS
            .iter()
            .filter_map(|s| match s {
                Step::Place {
                    side: Side::Buy,
                    price,
                    ..
                } => Some(*price),
                _ => None,
            })
            .max()
            .unwrap();
        let best_ask = STEPS
            .iter()
            .filter_map(|s| match s {
                Step::Place {
                    side: Side::Sell,
                    price,
                    ..
                } => Some(*price),
                _ => None,
            })
            .min()
            .unwrap();
        assert!(best_bid < best_ask);
    }

    #[test]
    fn test_withdrawals_fit_after_order_locks() {
        // Base locks: 100 + 150 + 200. Quote locks: 100*99 + 150*98 + 200*97.
        let base_locked = 100 + 150 + 200;
        let quote_locked = 100 * 99 + 150 * 98 + 200 * 97;
        assert!(WITHDRAWAL <= DEPOSIT - base_locked);
        assert!(WITHDRAWAL <= DEPOSIT - quote_locked);
    }
}
