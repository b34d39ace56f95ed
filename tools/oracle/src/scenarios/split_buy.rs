//! Split settlement: one seller against three buyers
//!
//! The mirror of `split_sell`: three buyers rest buy orders at a common
//! price and a single aggregate sell sized to their sum must split across
//! all of them.

use types::balance::Asset;
use types::order::Side;

use super::{Pace, Scenario, Step};

const STEPS: &[Step] = &[
    Step::Deposit {
        trader: 0,
        asset: Asset::Base,
        amount: 10_000,
    },
    Step::Deposit {
        trader: 1,
        asset: Asset::Quote,
        amount: 20_000,
    },
    Step::Deposit {
        trader: 2,
        asset: Asset::Quote,
        amount: 20_000,
    },
    Step::Deposit {
        trader: 3,
        asset: Asset::Quote,
        amount: 20_000,
    },
    Step::Pause(Pace::Long),
    Step::Place {
        trader: 1,
        side: Side::Buy,
        quantity: 120,
        price: 100,
        verify: true,
    },
    Step::Pause(Pace::Short),
    Step::Place {
        trader: 2,
        side: Side::Buy,
        quantity: 90,
        price: 100,
        verify: true,
    },
    Step::Pause(Pace::Short),
    Step::Place {
        trader: 3,
        side: Side::Buy,
        quantity: 140,
        price: 100,
        verify: true,
    },
    Step::Pause(Pace::Long),
    // The aggregate: 350 = 120 + 90 + 140.
    Step::Place {
        trader: 0,
        side: Side::Sell,
        quantity: 350,
        price: 100,
        verify: false,
    },
    Step::Settle,
];

pub fn scenario() -> Scenario {
    Scenario {
        name: "split-buy",
        participants: 4,
        min_trades: 3,
        steps: STEPS,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aggregate_sell_matches_resting_buys_exactly() {
        let buys: u64 = STEPS
            .iter()
            .filter_map(|s| match s {
                Step::Place {
                    side: Side::Buy,
                    quantity,
                    ..
                } => Some(*quantity),
                _ => None,
            })
            .sum();
        assert_eq!(buys, 350);
    }

    #[test]
    fn test_every_lock_fits_its_deposit() {
        assert!(super::super::locks_fit_deposits(STEPS));
    }
}
