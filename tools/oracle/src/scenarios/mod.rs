//! Deterministic settlement scenarios
//!
//! Each scenario is a fixed choreography over the run's traders, declared as
//! an ordered step list and executed by one interpreter. Counter-orders are
//! placed first with short settle-pauses between them to bound races against
//! the asynchronous matching engine; the aggregating order goes last,
//! followed by the settlement window and the final assertions. A scenario
//! aborts on its first assertion failure and never retries a step.
//!
//! # Modules
//! - `split_sell` — One aggregate buy settles against three resting sells
//! - `split_buy` — One aggregate sell settles against three resting buys
//! - `two_by_two` — Two buyers and two sellers at one price, asymmetric sizes
//! - `smoke` — Full executor round-trip on a single trader, no matching

pub mod smoke;
pub mod split_buy;
pub mod split_sell;
pub mod two_by_two;

use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{info, warn};
use types::balance::Asset;
use types::errors::InvariantViolation;
use types::order::Side;

use crate::error::OracleError;
use crate::oracle;
use crate::orchestrator::Orchestrator;

/// Pause length between steps, resolved against the run's pacing profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pace {
    Short,
    Long,
}

/// One step of a choreography. Trader indices are positions in the
/// orchestrator's trader list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Deposit into escrow and verify the trader's balances.
    Deposit {
        trader: usize,
        asset: Asset,
        amount: u64,
    },
    /// Place a limit order; `verify` checks the trader's balances afterward.
    Place {
        trader: usize,
        side: Side,
        quantity: u64,
        price: u64,
        verify: bool,
    },
    /// Withdraw from escrow and verify the trader's balances.
    Withdraw {
        trader: usize,
        asset: Asset,
        amount: u64,
    },
    Pause(Pace),
    /// Wait for settlement quiescence, then assert the minimum trade count
    /// and every participant's final balances.
    Settle,
}

/// A fixed multi-trader choreography with its expected settlement shape.
#[derive(Debug, Clone, Copy)]
pub struct Scenario {
    pub name: &'static str,
    pub participants: usize,
    pub min_trades: u64,
    pub steps: &'static [Step],
}

/// What a completed scenario observed.
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioReport {
    pub name: &'static str,
    pub trades_observed: u64,
    pub volume: Decimal,
}

/// The canonical library, in execution order.
pub fn library() -> Vec<Scenario> {
    vec![
        split_sell::scenario(),
        split_buy::scenario(),
        two_by_two::scenario(),
        smoke::scenario(),
    ]
}

/// Interpret one scenario against the orchestrator's traders.
pub async fn run_scenario(
    orch: &mut Orchestrator,
    scenario: &Scenario,
) -> Result<ScenarioReport, OracleError> {
    if orch.traders().len() < scenario.participants {
        return Err(OracleError::Scenario {
            scenario: scenario.name.to_string(),
            detail: format!(
                "needs {} traders, have {}",
                scenario.participants,
                orch.traders().len()
            ),
        });
    }

    info!(scenario = scenario.name, "running scenario");
    let pacing = orch.context().pacing;
    let mut report = ScenarioReport {
        name: scenario.name,
        trades_observed: 0,
        volume: Decimal::ZERO,
    };

    for step in scenario.steps {
        match *step {
            Step::Deposit {
                trader,
                asset,
                amount,
            } => {
                let result = orch.deposit(trader, asset, Decimal::from(amount)).await;
                orch.log_operation(&result);
                if result.success {
                    orch.verify_balances(trader, "After deposit").await?;
                } else {
                    warn!(scenario = scenario.name, "setup deposit failed, continuing");
                }
            }
            Step::Place {
                trader,
                side,
                quantity,
                price,
                verify,
            } => {
                let result = orch
                    .place_order(trader, side, Decimal::from(quantity), Decimal::from(price))
                    .await;
                orch.log_operation(&result);
                if result.success && verify {
                    let context = match side {
                        Side::Buy => "After buy order",
                        Side::Sell => "After sell order",
                    };
                    orch.verify_balances(trader, context).await?;
                } else if !result.success {
                    warn!(scenario = scenario.name, "order placement failed, continuing");
                }
            }
            Step::Withdraw {
                trader,
                asset,
                amount,
            } => {
                let result = orch.withdraw(trader, asset, Decimal::from(amount)).await;
                orch.log_operation(&result);
                if result.success {
                    orch.verify_balances(trader, "After withdrawal").await?;
                }
            }
            Step::Pause(pace) => {
                let duration = match pace {
                    Pace::Short => pacing.short,
                    Pace::Long => pacing.long,
                };
                orch.pause(duration).await;
            }
            Step::Settle => {
                orch.settle().await;
                settle_assertions(orch, scenario, &mut report).await?;
            }
        }
    }

    Ok(report)
}

/// Post-settlement assertions: trade-tape structure, the minimum trade
/// count, and every participant's final balances.
async fn settle_assertions(
    orch: &mut Orchestrator,
    scenario: &Scenario,
    report: &mut ScenarioReport,
) -> Result<(), OracleError> {
    let market = orch.context().market.market_id.clone();
    let query = orch.query_surface();

    match query.trades(&market, true, None).await {
        Ok(tape) => {
            let stats = oracle::check_trades(&tape)?;
            orch.bump_assertions(stats.checks);
            report.trades_observed = stats.count as u64;
            report.volume = stats.volume;
            info!(
                scenario = scenario.name,
                trades = stats.count,
                volume = %stats.volume,
                "settlement observed"
            );
            if (stats.count as u64) < scenario.min_trades {
                return Err(InvariantViolation::TooFewTrades {
                    scenario: scenario.name.to_string(),
                    expected: scenario.min_trades,
                    actual: stats.count as u64,
                }
                .into());
            }
            orch.bump_assertions(1);
        }
        Err(error) => warn!(
            scenario = scenario.name,
            %error,
            "trade tape unavailable, skipping trade-count assertion"
        ),
    }

    match query.orderbook(&market, true, None).await {
        Ok(snapshot) => {
            let stats = oracle::check_orderbook(&snapshot)?;
            orch.bump_assertions(stats.checks);
        }
        Err(error) => warn!(
            scenario = scenario.name,
            %error,
            "orderbook unavailable, skipping structural check"
        ),
    }

    for trader in 0..scenario.participants {
        orch.verify_balances(trader, "After trade settlement").await?;
    }
    Ok(())
}

/// Every order lock in a step list fits inside the collateral its trader
/// deposited earlier in the same list. Used by the scenario shape tests.
#[cfg(test)]
pub(crate) fn locks_fit_deposits(steps: &[Step]) -> bool {
    use std::collections::HashMap;

    let mut deposited: HashMap<(usize, Asset), u64> = HashMap::new();
    let mut locked: HashMap<(usize, Asset), u64> = HashMap::new();
    for step in steps {
        match *step {
            Step::Deposit {
                trader,
                asset,
                amount,
            } => *deposited.entry((trader, asset)).or_default() += amount,
            Step::Place {
                trader,
                side,
                quantity,
                price,
                ..
            } => {
                let (asset, amount) = match side {
                    Side::Buy => (Asset::Quote, quantity * price),
                    Side::Sell => (Asset::Base, quantity),
                };
                *locked.entry((trader, asset)).or_default() += amount;
            }
            _ => {}
        }
    }
    locked
        .iter()
        .all(|(key, amount)| amount <= deposited.get(key).unwrap_or(&0))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Sum of resting quantities on one side of a step list.
    fn resting_quantity(steps: &[Step], side: Side) -> u64 {
        steps
            .iter()
            .filter_map(|step| match step {
                Step::Place {
                    side: s, quantity, ..
                } if *s == side => Some(*quantity),
                _ => None,
            })
            .sum()
    }

    #[test]
    fn test_every_scenario_lock_fits_its_deposits() {
        for scenario in library() {
            assert!(
                locks_fit_deposits(scenario.steps),
                "{} over-locks a deposit",
                scenario.name
            );
        }
    }

    #[test]
    fn test_library_order_and_shapes() {
        let library = library();
        let names: Vec<&str> = library.iter().map(|s| s.name).collect();
        assert_eq!(
            names,
            vec!["split-sell", "split-buy", "two-by-two", "smoke"]
        );
        for scenario in &library {
            assert!(scenario.participants >= 1);
            assert!(!scenario.steps.is_empty());
            // Every choreography ends in a settlement assertion.
            assert_eq!(scenario.steps.last(), Some(&Step::Settle));
        }
    }

    #[test]
    fn test_split_scenarios_balance_both_sides() {
        let split_sell = split_sell::scenario();
        assert_eq!(
            resting_quantity(split_sell.steps, Side::Buy),
            resting_quantity(split_sell.steps, Side::Sell)
        );
        let split_buy = split_buy::scenario();
        assert_eq!(
            resting_quantity(split_buy.steps, Side::Buy),
            resting_quantity(split_buy.steps, Side::Sell)
        );
    }
}
