//! Asset selector and deposited-balance records

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which leg of the market an amount belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Asset {
    Base,
    Quote,
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Base => write!(f, "base"),
            Self::Quote => write!(f, "quote"),
        }
    }
}

/// A trader's escrowed balances on the exchange, one amount per leg.
///
/// Amounts are integer token units carried as Decimal so comparisons share
/// the arithmetic used everywhere else in the oracle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositedBalances {
    pub base: Decimal,
    pub quote: Decimal,
}

impl DepositedBalances {
    pub fn new(base: Decimal, quote: Decimal) -> Self {
        Self { base, quote }
    }

    /// The amount for one leg.
    pub fn get(&self, asset: Asset) -> Decimal {
        match asset {
            Asset::Base => self.base,
            Asset::Quote => self.quote,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_asset_display() {
        assert_eq!(Asset::Base.to_string(), "base");
        assert_eq!(Asset::Quote.to_string(), "quote");
    }

    #[test]
    fn test_get_by_asset() {
        let balances = DepositedBalances::new(Decimal::from(10), Decimal::from(20));
        assert_eq!(balances.get(Asset::Base), Decimal::from(10));
        assert_eq!(balances.get(Asset::Quote), Decimal::from(20));
    }
}
