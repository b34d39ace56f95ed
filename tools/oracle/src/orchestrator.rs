//! Run orchestration
//!
//! Issues one operation at a time and drives the assertion oracle after each
//! one, so every check is evaluated against a settlement quiescence point.
//! No operations run in parallel across traders; each trader model is owned
//! here and mutated only through the executors.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rust_decimal::Decimal;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::{error, info, warn};
use types::balance::Asset;
use types::order::Side;

use crate::context::RunContext;
use crate::error::OracleError;
use crate::generator::{self, PlannedOperation};
use crate::ops::{self, OperationResult};
use crate::oracle;
use crate::settlement::Settlement;
use crate::surface::{ControlSurface, QuerySurface};
use crate::trader::TraderModel;

/// Outcome of a run, for the caller's report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub operations_attempted: u64,
    pub successes: u64,
    pub assertions_passed: u64,
    pub active_traders: usize,
    pub inactive_traders: usize,
    /// Operations not executed because every trader went inactive.
    pub operations_skipped: u64,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Total Operations: {}", self.operations_attempted)?;
        writeln!(f, "Successful: {}", self.successes)?;
        writeln!(f, "Assertions Passed: {}", self.assertions_passed)?;
        writeln!(f, "Active Traders: {}", self.active_traders)?;
        write!(f, "Inactive Traders: {}", self.inactive_traders)?;
        if self.operations_skipped > 0 {
            write!(f, "\nOperations Not Executed: {}", self.operations_skipped)?;
        }
        Ok(())
    }
}

/// Sequences operations across traders and cross-checks after each one.
pub struct Orchestrator {
    ctx: RunContext,
    control: Arc<dyn ControlSurface>,
    query: Arc<dyn QuerySurface>,
    settlement: Arc<dyn Settlement>,
    traders: Vec<TraderModel>,
    rng: ChaCha8Rng,
    operations_attempted: u64,
    successes: u64,
    assertions_passed: u64,
    operations_skipped: u64,
}

impl Orchestrator {
    pub fn new(
        ctx: RunContext,
        control: Arc<dyn ControlSurface>,
        query: Arc<dyn QuerySurface>,
        settlement: Arc<dyn Settlement>,
        traders: Vec<TraderModel>,
        seed: u64,
    ) -> Self {
        Self {
            ctx,
            control,
            query,
            settlement,
            traders,
            rng: ChaCha8Rng::seed_from_u64(seed),
            operations_attempted: 0,
            successes: 0,
            assertions_passed: 0,
            operations_skipped: 0,
        }
    }

    pub fn context(&self) -> &RunContext {
        &self.ctx
    }

    pub fn traders(&self) -> &[TraderModel] {
        &self.traders
    }

    pub fn summary(&self) -> RunSummary {
        let max = self.ctx.max_consecutive_failures;
        let active = self.traders.iter().filter(|t| t.is_active(max)).count();
        RunSummary {
            operations_attempted: self.operations_attempted,
            successes: self.successes,
            assertions_passed: self.assertions_passed,
            active_traders: active,
            inactive_traders: self.traders.len() - active,
            operations_skipped: self.operations_skipped,
        }
    }

    /// Random mode: weighted random operations across active traders, with a
    /// structural validation round after every success.
    pub async fn run_random(&mut self, operations: u64) -> Result<RunSummary, OracleError> {
        info!(
            market = %self.ctx.market.market_id,
            traders = self.traders.len(),
            operations,
            "starting random simulation"
        );
        for trader in &self.traders {
            info!(name = trader.name(), address = %trader.identity.address, "participant");
        }

        for issued in 0..operations {
            let max = self.ctx.max_consecutive_failures;
            let active: Vec<usize> = (0..self.traders.len())
                .filter(|&i| self.traders[i].is_active(max))
                .collect();
            if active.is_empty() {
                self.operations_skipped = operations - issued;
                error!(
                    skipped = self.operations_skipped,
                    "all traders inactive, stopping simulation early"
                );
                break;
            }

            let idx = active[self.rng.gen_range(0..active.len())];
            self.operations_attempted += 1;
            {
                let trader = &self.traders[idx];
                info!(
                    operation = issued + 1,
                    of = operations,
                    trader = trader.name(),
                    base = %trader.deposited_base,
                    quote = %trader.deposited_quote,
                    streak = trader.consecutive_failures,
                    "selecting operation"
                );
            }

            let planned = generator::next_operation(&self.traders[idx], &mut self.rng);
            let result = match planned {
                Some(planned) => self.execute_planned(idx, planned).await,
                None => ops::OperationResult::no_op(self.traders[idx].name()),
            };
            self.log_operation(&result);

            if result.success {
                self.successes += 1;
                self.traders[idx].record_success();
                self.validation_round().await?;
            } else {
                self.traders[idx].record_failure();
                let trader = &self.traders[idx];
                if !trader.is_active(max) {
                    error!(
                        trader = trader.name(),
                        "three consecutive failures, marking inactive"
                    );
                }
            }

            tokio::time::sleep(self.ctx.pacing.loop_delay).await;
        }

        self.final_state_report().await;
        let summary = self.summary();
        info!("simulation complete\n{}", summary);
        Ok(summary)
    }

    /// Scenario mode: the deterministic settlement choreographies, in order.
    /// The first failing scenario aborts the run.
    pub async fn run_scenarios(&mut self) -> Result<RunSummary, OracleError> {
        for scenario in crate::scenarios::library() {
            let report = crate::scenarios::run_scenario(self, &scenario).await?;
            info!(
                scenario = report.name,
                trades = report.trades_observed,
                volume = %report.volume,
                "scenario passed"
            );
            tokio::time::sleep(self.ctx.pacing.long).await;
        }
        let summary = self.summary();
        info!("all scenarios complete\n{}", summary);
        Ok(summary)
    }

    pub(crate) async fn execute_planned(
        &mut self,
        idx: usize,
        planned: PlannedOperation,
    ) -> OperationResult {
        let control = Arc::clone(&self.control);
        let trader = &mut self.traders[idx];
        match planned {
            PlannedOperation::Deposit { asset, amount } => {
                ops::deposit(control.as_ref(), &self.ctx, trader, asset, amount).await
            }
            PlannedOperation::Withdraw { asset, amount } => {
                ops::withdraw(control.as_ref(), &self.ctx, trader, asset, amount).await
            }
            PlannedOperation::Order {
                side,
                quantity,
                price,
            } => ops::place_order(control.as_ref(), &self.ctx, trader, side, quantity, price).await,
        }
    }

    pub(crate) async fn deposit(
        &mut self,
        idx: usize,
        asset: Asset,
        amount: Decimal,
    ) -> OperationResult {
        self.execute_planned(idx, PlannedOperation::Deposit { asset, amount })
            .await
    }

    pub(crate) async fn withdraw(
        &mut self,
        idx: usize,
        asset: Asset,
        amount: Decimal,
    ) -> OperationResult {
        self.execute_planned(idx, PlannedOperation::Withdraw { asset, amount })
            .await
    }

    pub(crate) async fn place_order(
        &mut self,
        idx: usize,
        side: Side,
        quantity: Decimal,
        price: Decimal,
    ) -> OperationResult {
        self.execute_planned(
            idx,
            PlannedOperation::Order {
                side,
                quantity,
                price,
            },
        )
        .await
    }

    pub(crate) fn log_operation(&self, result: &OperationResult) {
        if result.success {
            info!(
                trader = %result.trader,
                op = %result.kind,
                details = %result.details,
                "operation succeeded"
            );
        } else {
            warn!(
                trader = %result.trader,
                op = %result.kind,
                details = %result.details,
                error = result.error.as_deref().unwrap_or("unknown"),
                "operation failed"
            );
        }
    }

    /// Structural validation of the live order book and trade tape. A
    /// transport failure skips the round; a structural fault is fatal.
    pub(crate) async fn validation_round(&mut self) -> Result<(), OracleError> {
        let market = self.ctx.market.market_id.clone();

        match self.query.orderbook(&market, true, None).await {
            Ok(snapshot) => {
                let stats = oracle::check_orderbook(&snapshot)?;
                self.assertions_passed += stats.checks;
                info!(
                    bids = stats.bids,
                    asks = stats.asks,
                    total = stats.total,
                    "orderbook validated"
                );
            }
            Err(error) => warn!(%error, "orderbook unavailable, skipping round"),
        }

        match self.query.trades(&market, true, None).await {
            Ok(tape) => {
                let stats = oracle::check_trades(&tape)?;
                self.assertions_passed += stats.checks;
                info!(trades = stats.count, volume = %stats.volume, "trade tape validated");
            }
            Err(error) => warn!(%error, "trade tape unavailable, skipping round"),
        }

        Ok(())
    }

    /// Compare one trader's modeled deposited balances against the exchange.
    /// A transport failure skips the check; a mismatch beyond tolerance is
    /// fatal.
    pub(crate) async fn verify_balances(
        &mut self,
        idx: usize,
        context: &str,
    ) -> Result<(), OracleError> {
        let trader = &self.traders[idx];
        let actual = match self
            .control
            .deposited_balances(&trader.identity, &self.ctx.market)
            .await
        {
            Ok(balances) => balances,
            Err(error) => {
                warn!(
                    trader = trader.name(),
                    %error,
                    "balance report unavailable, skipping check"
                );
                return Ok(());
            }
        };

        info!(
            trader = trader.name(),
            context,
            expected_base = %trader.deposited_base,
            expected_quote = %trader.deposited_quote,
            actual_base = %actual.base,
            actual_quote = %actual.quote,
            "balance check"
        );

        let verdicts = oracle::compare_deposited(trader, &actual, context, self.ctx.tolerance);
        oracle::assert_verdicts(verdicts)?;
        self.assertions_passed += 2;
        Ok(())
    }

    pub(crate) fn bump_assertions(&mut self, count: u64) {
        self.assertions_passed += count;
    }

    pub(crate) async fn settle(&self) {
        self.settlement.await_settlement().await;
    }

    pub(crate) async fn pause(&self, duration: std::time::Duration) {
        tokio::time::sleep(duration).await;
    }

    pub(crate) fn query_surface(&self) -> Arc<dyn QuerySurface> {
        Arc::clone(&self.query)
    }

    /// Final snapshot counts, logged for the run report.
    async fn final_state_report(&self) {
        let market = self.ctx.market.market_id.clone();
        if let Ok(snapshot) = self.query.orderbook(&market, true, None).await {
            info!(open_orders = snapshot.count, "final orderbook");
        }
        if let Ok(tape) = self.query.trades(&market, true, None).await {
            info!(total_trades = tape.count, "final trade tape");
        }
    }
}
