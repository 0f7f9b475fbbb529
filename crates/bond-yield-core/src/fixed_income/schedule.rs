//! Coupon schedule generation.
//!
//! Coupon dates are laid out backwards from maturity, one period at a time,
//! until the schedule's start date is passed. The result is an immutable,
//! ascending [`CouponSchedule`].

use chrono::NaiveDate;
use serde::Serialize;
use tracing::trace;

use crate::calendar::step_months;
use crate::fixed_income::bond::Bond;
use crate::types::{CashFlow, CashFlowKind};
use crate::BondYieldResult;

/// The coupons a bond pays, sorted ascending by date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CouponSchedule {
    coupons: Vec<CashFlow>,
    maturity_date: NaiveDate,
    months_per_period: Option<i32>,
}

impl CouponSchedule {
    /// Generate the coupon schedule of `bond`.
    ///
    /// Every coupon dated on or after the start date (issuing date, else
    /// settlement date) is included. Without an explicit issuing date one
    /// further coupon before the settlement date is kept as an accrual anchor.
    /// Zero-coupon bonds produce an empty schedule.
    pub fn generate(bond: &Bond) -> BondYieldResult<Self> {
        let months_per_period = bond.months_per_period();
        let Some(step) = months_per_period else {
            return Ok(Self {
                coupons: Vec::new(),
                maturity_date: bond.maturity_date,
                months_per_period,
            });
        };

        let start = bond.effective_issuing_date();
        let keep_anchor = bond.issuing_date.is_none();
        let amount = bond.coupon_amount();

        let mut coupons = Vec::new();
        let mut date = bond.maturity_date;
        loop {
            if date >= start {
                coupons.push(CashFlow::new(date, amount, CashFlowKind::Coupon));
            } else {
                if keep_anchor {
                    coupons.push(CashFlow::new(date, amount, CashFlowKind::Coupon));
                }
                break;
            }
            date = step_months(date, -step)?;
        }

        coupons.sort_by_key(|cf| cf.date);
        trace!(
            coupons = coupons.len(),
            first = ?coupons.first().map(|cf| cf.date),
            "generated coupon schedule"
        );

        Ok(Self {
            coupons,
            maturity_date: bond.maturity_date,
            months_per_period,
        })
    }

    pub fn coupons(&self) -> &[CashFlow] {
        &self.coupons
    }

    pub fn len(&self) -> usize {
        self.coupons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coupons.is_empty()
    }

    pub fn maturity_date(&self) -> NaiveDate {
        self.maturity_date
    }

    /// Months between coupons; `None` for zero-coupon schedules.
    pub fn months_per_period(&self) -> Option<i32> {
        self.months_per_period
    }

    pub fn iter(&self) -> std::slice::Iter<'_, CashFlow> {
        self.coupons.iter()
    }

    pub fn into_cashflows(self) -> Vec<CashFlow> {
        self.coupons
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn btp_2028() -> Bond {
        Bond::new(d(2025, 3, 7), d(2028, 7, 15), dec!(0.5), dec!(92.81), dec!(100), 2)
    }

    fn dates(schedule: &CouponSchedule) -> Vec<NaiveDate> {
        schedule.iter().map(|cf| cf.date).collect()
    }

    #[test]
    fn test_semiannual_schedule_with_anchor() {
        let schedule = CouponSchedule::generate(&btp_2028()).unwrap();
        assert_eq!(
            dates(&schedule),
            vec![
                d(2025, 1, 15),
                d(2025, 7, 15),
                d(2026, 1, 15),
                d(2026, 7, 15),
                d(2027, 1, 15),
                d(2027, 7, 15),
                d(2028, 1, 15),
                d(2028, 7, 15),
            ]
        );
        assert!(schedule.iter().all(|cf| cf.amount == dec!(0.25)));
        assert!(schedule.iter().all(|cf| cf.kind == CashFlowKind::Coupon));
    }

    #[test]
    fn test_explicit_issuing_date_drops_anchor() {
        let bond = btp_2028().with_issuing_date(d(2025, 3, 7));
        let schedule = CouponSchedule::generate(&bond).unwrap();
        assert_eq!(schedule.len(), 7);
        assert_eq!(schedule.coupons()[0].date, d(2025, 7, 15));
    }

    #[test]
    fn test_issuing_date_on_coupon_date_is_included() {
        let bond = btp_2028().with_issuing_date(d(2026, 7, 15));
        let schedule = CouponSchedule::generate(&bond).unwrap();
        assert_eq!(schedule.coupons()[0].date, d(2026, 7, 15));
        assert_eq!(schedule.len(), 5);
    }

    #[test]
    fn test_zero_coupon_schedule_is_empty() {
        let mut bond = btp_2028();
        bond.yearly_frequency = 0;
        let schedule = CouponSchedule::generate(&bond).unwrap();
        assert!(schedule.is_empty());
        assert_eq!(schedule.months_per_period(), None);
        assert_eq!(schedule.maturity_date(), d(2028, 7, 15));
    }

    #[test]
    fn test_month_end_maturity_drifts_like_calendar_stepping() {
        // 31 Mar - 6 months = "31 Sep" = 1 Oct, then 1 Apr, 1 Oct, ...
        let bond = Bond::new(d(2024, 1, 10), d(2025, 3, 31), dec!(4), dec!(100), dec!(100), 2);
        let schedule = CouponSchedule::generate(&bond).unwrap();
        assert_eq!(
            dates(&schedule),
            vec![d(2023, 10, 1), d(2024, 4, 1), d(2024, 10, 1), d(2025, 3, 31)]
        );
    }

    #[test]
    fn test_monthly_and_annual_frequencies() {
        let mut bond = btp_2028();
        bond.yearly_frequency = 12;
        let monthly = CouponSchedule::generate(&bond).unwrap();
        // Jul 2028 back to Mar 2025 inclusive of the Feb 2025 anchor
        assert_eq!(monthly.len(), 42);
        assert_eq!(monthly.coupons()[0].date, d(2025, 2, 15));

        bond.yearly_frequency = 1;
        let annual = CouponSchedule::generate(&bond).unwrap();
        assert_eq!(
            dates(&annual),
            vec![d(2024, 7, 15), d(2025, 7, 15), d(2026, 7, 15), d(2027, 7, 15), d(2028, 7, 15)]
        );
        assert_eq!(annual.coupons()[0].amount, dec!(0.5));
    }

    #[test]
    fn test_regeneration_is_identical() {
        let bond = btp_2028();
        let first = CouponSchedule::generate(&bond).unwrap();
        let second = CouponSchedule::generate(&bond).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_zero_rate_coupons_are_still_dated() {
        let mut bond = btp_2028();
        bond.coupon_rate_pct = Decimal::ZERO;
        let schedule = CouponSchedule::generate(&bond).unwrap();
        assert_eq!(schedule.len(), 8);
        assert!(schedule.iter().all(|cf| cf.amount.is_zero()));
    }

    #[test]
    fn test_iterates_backwards_from_maturity() {
        let schedule = CouponSchedule::generate(&btp_2028()).unwrap();
        let last = schedule.iter().next_back().unwrap();
        assert_eq!(last.date, schedule.maturity_date());

        let before = schedule.iter().rev().find(|cf| cf.date <= d(2026, 3, 1)).unwrap();
        assert_eq!(before.date, d(2026, 1, 15));
        assert_eq!(schedule.iter().len(), 8);
    }
}
