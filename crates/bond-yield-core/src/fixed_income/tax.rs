//! Capital gains tax on coupons and on the realized gain at exit.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::types::{Money, Percent};

/// Applies a flat capital gains tax rate. A zero rate leaves every amount
/// untouched, so net figures equal gross figures exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TaxAdjuster {
    rate_pct: Percent,
}

impl TaxAdjuster {
    pub fn new(rate_pct: Percent) -> Self {
        Self { rate_pct }
    }

    /// No tax: the gross computation.
    pub fn gross() -> Self {
        Self::default()
    }

    /// The bond's tax rate when `net`, otherwise no tax.
    pub fn select(net: bool, rate_pct: Percent) -> Self {
        if net {
            Self::new(rate_pct)
        } else {
            Self::gross()
        }
    }

    pub fn rate_pct(&self) -> Percent {
        self.rate_pct
    }

    pub fn is_untaxed(&self) -> bool {
        self.rate_pct.is_zero()
    }

    /// Coupon after tax: `gross − gross × τ / 100`.
    pub fn coupon(&self, gross: Money) -> Money {
        if self.is_untaxed() {
            return gross;
        }
        gross - gross * self.rate_pct / dec!(100)
    }

    /// Tax owed on a realized gain. A loss yields a negative tax (a credit).
    pub fn gain_tax(&self, gain: Money) -> Money {
        if self.is_untaxed() {
            return Decimal::ZERO;
        }
        gain * self.rate_pct / dec!(100)
    }

    /// Exit proceeds after tax on `gain`.
    pub fn exit_amount(&self, gross_proceeds: Money, gain: Money) -> Money {
        if self.is_untaxed() {
            return gross_proceeds;
        }
        gross_proceeds - self.gain_tax(gain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coupon_net_of_tax() {
        let tax = TaxAdjuster::new(dec!(12.5));
        assert_eq!(tax.coupon(dec!(1.075)), dec!(0.940625));
    }

    #[test]
    fn test_zero_rate_is_identity() {
        let tax = TaxAdjuster::new(Decimal::ZERO);
        assert!(tax.is_untaxed());
        assert_eq!(tax.coupon(dec!(1.075)), dec!(1.075));
        assert_eq!(tax.exit_amount(dec!(100.3), dec!(42.5)), dec!(100.3));
        assert_eq!(tax.gain_tax(dec!(42.5)), Decimal::ZERO);
    }

    #[test]
    fn test_gross_ignores_rate() {
        let tax = TaxAdjuster::select(false, dec!(26));
        assert_eq!(tax, TaxAdjuster::gross());
        assert_eq!(TaxAdjuster::select(true, dec!(26)).rate_pct(), dec!(26));
    }

    #[test]
    fn test_exit_taxes_gain_not_proceeds() {
        let tax = TaxAdjuster::new(dec!(12.5));
        // Bought at 92, sold at 100 with 0.5 accrued: gain 8.5, tax 1.0625
        let gain = dec!(100) + dec!(0.5) - dec!(92);
        assert_eq!(tax.gain_tax(gain), dec!(1.0625));
        assert_eq!(tax.exit_amount(dec!(100.5), gain), dec!(99.4375));
    }

    #[test]
    fn test_loss_produces_tax_credit() {
        let tax = TaxAdjuster::new(dec!(12.5));
        let gain = dec!(95) - dec!(103);
        assert_eq!(tax.gain_tax(gain), dec!(-1));
        assert_eq!(tax.exit_amount(dec!(95), gain), dec!(96));
    }
}
