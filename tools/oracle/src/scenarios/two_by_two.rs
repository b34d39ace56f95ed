//! 2:2 settlement at a single price
//!
//! Two sellers rest asymmetric sizes at one price; two buyers then submit
//! asymmetric sizes at the same price. Total supply equals total demand
//! (400 against 400), and at least two trades must result.

use types::balance::Asset;
use types::order::Side;

use super::{Pace, Scenario, Step};

const STEPS: &[Step] = &[
    Step::Deposit {
        trader: 0,
        asset: Asset::Quote,
        amount: 30_000,
    },
    Step::Deposit {
        trader: 1,
        asset: Asset::Quote,
        amount: 30_000,
    },
    Step::Deposit {
        trader: 2,
        asset: Asset::Base,
        amount: 15_000,
    },
    Step::Deposit {
        trader: 3,
        asset: Asset::Base,
        amount: 15_000,
    },
    Step::Pause(Pace::Long),
    Step::Place {
        trader: 2,
        side: Side::Sell,
        quantity: 180,
        price: 100,
        verify: true,
    },
    Step::Pause(Pace::Short),
    Step::Place {
        trader: 3,
        side: Side::Sell,
        quantity: 220,
        price: 100,
        verify: true,
    },
    Step::Pause(Pace::Long),
    Step::Place {
        trader: 0,
        side: Side::Buy,
        quantity: 150,
        price: 100,
        verify: true,
    },
    Step::Pause(Pace::Short),
    Step::Place {
        trader: 1,
        side: Side::Buy,
        quantity: 250,
        price: 100,
        verify: true,
    },
    Step::Settle,
];

pub fn scenario() -> Scenario {
    Scenario {
        name: "two-by-two",
        participants: 4,
        min_trades: 2,
        steps: STEPS,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supply_equals_demand() {
        let total = |side: Side| -> u64 {
            STEPS
                .iter()
                .filter_map(|s| match s {
                    Step::Place {
                        side: s, quantity, ..
                    } if *s == side => Some(*quantity),
                    _ => None,
                })
                .sum()
        };
        assert_eq!(total(Side::Buy), 400);
        assert_eq!(total(Side::Sell), 400);
    }

    #[test]
    fn test_every_lock_fits_its_deposit() {
        assert!(super::super::locks_fit_deposits(STEPS));
    }
}
