//! Immutable per-run context
//!
//! Replaces the environment-derived globals of a typical test harness: every
//! component receives the context by reference at construction and nothing
//! in the run mutates it.

use rust_decimal::Decimal;
use std::time::Duration;
use types::market::MarketContext;

/// Pacing delays between externally visible steps.
///
/// `short` separates counter-order placements inside a scenario, `long`
/// separates scenario phases, and `loop_delay` paces the random-operation
/// loop. These bound races against the exchange's asynchronous matching
/// pipeline; the settlement window itself lives in [`crate::settlement`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pacing {
    pub short: Duration,
    pub long: Duration,
    pub loop_delay: Duration,
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            short: Duration::from_millis(300),
            long: Duration::from_secs(1),
            loop_delay: Duration::from_millis(500),
        }
    }
}

impl Pacing {
    /// Zero delays, for driving the in-memory exchange double in tests.
    pub fn immediate() -> Self {
        Self {
            short: Duration::ZERO,
            long: Duration::ZERO,
            loop_delay: Duration::ZERO,
        }
    }
}

/// Everything a component needs to know about the run, fixed at startup.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub market: MarketContext,
    /// Absolute per-asset tolerance for balance comparisons. Accounts for
    /// integer rounding in settlement, not for systematic drift.
    pub tolerance: Decimal,
    pub pacing: Pacing,
    /// Consecutive failures after which a trader is excluded from the run.
    pub max_consecutive_failures: u32,
}

impl RunContext {
    pub fn new(market: MarketContext) -> Self {
        Self {
            market,
            tolerance: Decimal::ONE,
            pacing: Pacing::default(),
            max_consecutive_failures: 3,
        }
    }

    /// Context with zero pacing, for tests.
    pub fn immediate(market: MarketContext) -> Self {
        Self {
            pacing: Pacing::immediate(),
            ..Self::new(market)
        }
    }
}
