//! Split settlement: one buyer against three sellers
//!
//! Three sellers rest sell orders of different sizes at a common price; the
//! buyer then submits a single buy sized to exactly their sum. The matching
//! engine must split the buy across all three counter-orders, so the oracle
//! requires at least three resulting trades.

use types::balance::Asset;
use types::order::Side;

use super::{Pace, Scenario, Step};

const STEPS: &[Step] = &[
    Step::Deposit {
        trader: 0,
        asset: Asset::Quote,
        amount: 50_000,
    },
    Step::Deposit {
        trader: 1,
        asset: Asset::Base,
        amount: 10_000,
    },
    Step::Deposit {
        trader: 2,
        asset: Asset::Base,
        amount: 10_000,
    },
    Step::Deposit {
        trader: 3,
        asset: Asset::Base,
        amount: 10_000,
    },
    Step::Pause(Pace::Long),
    Step::Place {
        trader: 1,
        side: Side::Sell,
        quantity: 100,
        price: 100,
        verify: true,
    },
    Step::Pause(Pace::Short),
    Step::Place {
        trader: 2,
        side: Side::Sell,
        quantity: 150,
        price: 100,
        verify: true,
    },
    Step::Pause(Pace::Short),
    Step::Place {
        trader: 3,
        side: Side::Sell,
        quantity: 80,
        price: 100,
        verify: true,
    },
    Step::Pause(Pace::Long),
    // The aggregate: 330 = 100 + 150 + 80.
    Step::Place {
        trader: 0,
        side: Side::Buy,
        quantity: 330,
        price: 100,
        verify: false,
    },
    Step::Settle,
];

pub fn scenario() -> Scenario {
    Scenario {
        name: "split-sell",
        participants: 4,
        min_trades: 3,
        steps: STEPS,
    }
}
