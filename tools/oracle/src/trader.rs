//! Per-trader shadow ledger
//!
//! The oracle's independent belief about one participant: wallet balances
//! (funds not yet deposited into the exchange), deposited balances (escrowed
//! and available for trading), recorded open-order ids, and a consecutive
//! failure streak. Mutated exclusively by the operation executors; predicates
//! are advisory gates evaluated before any external call.
//!
//! Deposited balances only ever decrease by the exact amount locked into an
//! order at placement time and only ever increase through confirmed deposits.
//! Settled proceeds land in the on-chain wallet, never back in escrow, so the
//! model needs no fill reconciliation.

use rust_decimal::Decimal;
use std::fmt;
use types::balance::Asset;

/// A signing key carried opaquely; redacted in debug output.
#[derive(Clone, PartialEq, Eq)]
pub struct SigningKey(String);

impl SigningKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// The raw key material, for handing to the control surface.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SigningKey(…)")
    }
}

/// Who a trader is on the wire: display name, signing key, derived address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraderIdentity {
    pub name: String,
    pub key: SigningKey,
    pub address: String,
}

impl TraderIdentity {
    pub fn new(name: impl Into<String>, key: SigningKey, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            key,
            address: address.into(),
        }
    }
}

/// Shadow model of one trader's expected state.
#[derive(Debug, Clone)]
pub struct TraderModel {
    pub identity: TraderIdentity,
    pub wallet_base: Decimal,
    pub wallet_quote: Decimal,
    pub deposited_base: Decimal,
    pub deposited_quote: Decimal,
    /// Order ids reported by the control surface at placement. Recorded for
    /// diagnostics only; never reconciled against the live book.
    pub open_orders: Vec<String>,
    pub consecutive_failures: u32,
}

impl TraderModel {
    /// Model seeded from queried on-chain wallet balances.
    pub fn with_wallet(identity: TraderIdentity, base: Decimal, quote: Decimal) -> Self {
        Self {
            identity,
            wallet_base: base,
            wallet_quote: quote,
            deposited_base: Decimal::ZERO,
            deposited_quote: Decimal::ZERO,
            open_orders: Vec::new(),
            consecutive_failures: 0,
        }
    }

    /// Model seeded with the mock balance used in scenario mode.
    pub fn with_mock_balances(identity: TraderIdentity, amount: Decimal) -> Self {
        Self::with_wallet(identity, amount, amount)
    }

    pub fn name(&self) -> &str {
        &self.identity.name
    }

    // ---- predicate gates -------------------------------------------------

    pub fn can_deposit_base(&self, amount: Decimal) -> bool {
        self.wallet_base >= amount
    }

    pub fn can_deposit_quote(&self, amount: Decimal) -> bool {
        self.wallet_quote >= amount
    }

    /// Reserve check at order placement, assuming fill at the stated limit
    /// price. Conservative for partial or better-price fills.
    pub fn can_buy(&self, quantity: Decimal, price: Decimal) -> bool {
        self.deposited_quote >= quantity * price
    }

    pub fn can_sell(&self, quantity: Decimal) -> bool {
        self.deposited_base >= quantity
    }

    pub fn can_withdraw_base(&self, amount: Decimal) -> bool {
        self.deposited_base >= amount
    }

    pub fn can_withdraw_quote(&self, amount: Decimal) -> bool {
        self.deposited_quote >= amount
    }

    // ---- state transitions (executor-only) -------------------------------

    pub fn wallet(&self, asset: Asset) -> Decimal {
        match asset {
            Asset::Base => self.wallet_base,
            Asset::Quote => self.wallet_quote,
        }
    }

    pub fn deposited(&self, asset: Asset) -> Decimal {
        match asset {
            Asset::Base => self.deposited_base,
            Asset::Quote => self.deposited_quote,
        }
    }

    /// Confirmed deposit: wallet down, escrow up.
    pub fn apply_deposit(&mut self, asset: Asset, amount: Decimal) {
        match asset {
            Asset::Base => {
                self.wallet_base -= amount;
                self.deposited_base += amount;
            }
            Asset::Quote => {
                self.wallet_quote -= amount;
                self.deposited_quote += amount;
            }
        }
    }

    /// Confirmed withdrawal: escrow down, wallet up.
    pub fn apply_withdrawal(&mut self, asset: Asset, amount: Decimal) {
        match asset {
            Asset::Base => {
                self.deposited_base -= amount;
                self.wallet_base += amount;
            }
            Asset::Quote => {
                self.deposited_quote -= amount;
                self.wallet_quote += amount;
            }
        }
    }

    /// Lock the full reserved amount at order placement, regardless of the
    /// eventual fill ratio. The model tracks reserved, not filled, capital.
    pub fn apply_order_lock(&mut self, asset: Asset, amount: Decimal) {
        match asset {
            Asset::Base => self.deposited_base -= amount,
            Asset::Quote => self.deposited_quote -= amount,
        }
    }

    /// A deposit refused by the exchange means the wallet has no real funds
    /// behind the mocked balance; zero it so the trader stops retrying.
    pub fn zero_wallet(&mut self, asset: Asset) {
        match asset {
            Asset::Base => self.wallet_base = Decimal::ZERO,
            Asset::Quote => self.wallet_quote = Decimal::ZERO,
        }
    }

    pub fn record_order(&mut self, order_id: Option<String>) {
        if let Some(id) = order_id {
            self.open_orders.push(id);
        }
    }

    // ---- failure streak --------------------------------------------------

    pub fn record_success(&mut self) {
        self.consecutive_failures = 0;
    }

    pub fn record_failure(&mut self) {
        self.consecutive_failures += 1;
    }

    pub fn is_active(&self, max_consecutive_failures: u32) -> bool {
        self.consecutive_failures < max_consecutive_failures
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trader(wallet: u64, deposited: u64) -> TraderModel {
        let mut model = TraderModel::with_wallet(
            TraderIdentity::new("Trader1", SigningKey::new("0xkey"), "0xaddr"),
            Decimal::from(wallet),
            Decimal::from(wallet),
        );
        model.deposited_base = Decimal::from(deposited);
        model.deposited_quote = Decimal::from(deposited);
        model
    }

    #[test]
    fn test_deposit_predicates() {
        let model = trader(1000, 0);
        assert!(model.can_deposit_base(Decimal::from(1000)));
        assert!(!model.can_deposit_base(Decimal::from(1001)));
        assert!(model.can_deposit_quote(Decimal::from(500)));
    }

    #[test]
    fn test_buy_predicate_reserves_at_limit_price() {
        let model = trader(0, 1000);
        assert!(model.can_buy(Decimal::from(10), Decimal::from(100)));
        assert!(!model.can_buy(Decimal::from(11), Decimal::from(100)));
    }

    #[test]
    fn test_sell_and_withdraw_predicates() {
        let model = trader(0, 500);
        assert!(model.can_sell(Decimal::from(500)));
        assert!(!model.can_sell(Decimal::from(501)));
        assert!(model.can_withdraw_base(Decimal::from(500)));
        assert!(!model.can_withdraw_quote(Decimal::from(501)));
    }

    #[test]
    fn test_deposit_moves_wallet_to_escrow() {
        let mut model = trader(5000, 0);
        model.apply_deposit(Asset::Quote, Decimal::from(3000));
        assert_eq!(model.wallet_quote, Decimal::from(2000));
        assert_eq!(model.deposited_quote, Decimal::from(3000));
        assert_eq!(model.deposited_base, Decimal::ZERO);
    }

    #[test]
    fn test_withdrawal_is_inverse_of_deposit() {
        let mut model = trader(5000, 0);
        model.apply_deposit(Asset::Base, Decimal::from(3000));
        model.apply_withdrawal(Asset::Base, Decimal::from(3000));
        assert_eq!(model.wallet_base, Decimal::from(5000));
        assert_eq!(model.deposited_base, Decimal::ZERO);
    }

    #[test]
    fn test_order_lock_reduces_escrow_only() {
        let mut model = trader(0, 1000);
        model.apply_order_lock(Asset::Quote, Decimal::from(950));
        assert_eq!(model.deposited_quote, Decimal::from(50));
        assert_eq!(model.wallet_quote, Decimal::ZERO);
    }

    #[test]
    fn test_balances_stay_non_negative_under_gated_operations() {
        // Every mutation is gated by its predicate; a full drain lands on
        // exactly zero, never below.
        let mut model = trader(1000, 0);
        assert!(model.can_deposit_base(Decimal::from(1000)));
        model.apply_deposit(Asset::Base, Decimal::from(1000));
        assert!(model.can_sell(Decimal::from(1000)));
        model.apply_order_lock(Asset::Base, Decimal::from(1000));
        assert_eq!(model.wallet_base, Decimal::ZERO);
        assert_eq!(model.deposited_base, Decimal::ZERO);
    }

    #[test]
    fn test_failure_streak_reset_and_exclusion() {
        let mut model = trader(0, 0);
        model.record_failure();
        model.record_failure();
        assert!(model.is_active(3));
        model.record_success();
        assert_eq!(model.consecutive_failures, 0);
        model.record_failure();
        model.record_failure();
        model.record_failure();
        assert!(!model.is_active(3));
    }

    #[test]
    fn test_zero_wallet_targets_one_asset() {
        let mut model = trader(5000, 0);
        model.zero_wallet(Asset::Quote);
        assert_eq!(model.wallet_quote, Decimal::ZERO);
        assert_eq!(model.wallet_base, Decimal::from(5000));
    }

    #[test]
    fn test_signing_key_debug_is_redacted() {
        let key = SigningKey::new("0xdeadbeef");
        assert_eq!(format!("{key:?}"), "SigningKey(…)");
        assert_eq!(key.expose(), "0xdeadbeef");
    }

    #[test]
    fn test_record_order_ignores_missing_ids() {
        let mut model = trader(0, 0);
        model.record_order(None);
        model.record_order(Some("o-1".to_string()));
        assert_eq!(model.open_orders, vec!["o-1".to_string()]);
    }
}
