//! Accrued interest on a simple actual/365 basis.
//!
//! Accrual is `coupon rate (percent) × elapsed days / 365`, quoted per 100
//! of nominal. The denominator is always 365, leap years included.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::calendar::{days_between, step_months};
use crate::fixed_income::schedule::CouponSchedule;
use crate::types::{Money, Percent};
use crate::BondYieldResult;

const DAYS_PER_YEAR: Decimal = dec!(365);

/// Latest coupon date on or before `reference_date`.
///
/// When every coupon is later, the date one period before the earliest
/// coupon (or before maturity for an empty schedule) is used. A zero-coupon
/// schedule has no period, so the reference date itself is returned and no
/// interest accrues.
pub fn find_last_coupon(
    schedule: &CouponSchedule,
    reference_date: NaiveDate,
) -> BondYieldResult<NaiveDate> {
    if let Some(last) = schedule
        .iter()
        .rev()
        .find(|cf| cf.date <= reference_date)
    {
        return Ok(last.date);
    }

    let Some(step) = schedule.months_per_period() else {
        return Ok(reference_date);
    };
    let next = schedule
        .coupons()
        .first()
        .map(|cf| cf.date)
        .unwrap_or_else(|| schedule.maturity_date());
    step_months(next, -step)
}

/// Interest accrued between `last_coupon_date` and `reference_date`.
pub fn accrued_interest(
    reference_date: NaiveDate,
    last_coupon_date: NaiveDate,
    coupon_rate_pct: Percent,
) -> Money {
    let days = days_between(last_coupon_date, reference_date);
    coupon_rate_pct * Decimal::from(days) / DAYS_PER_YEAR
}

/// Accrued interest at `reference_date` measured from the schedule's last coupon.
pub fn accrued_since_last_coupon(
    schedule: &CouponSchedule,
    reference_date: NaiveDate,
    coupon_rate_pct: Percent,
) -> BondYieldResult<Money> {
    let last_coupon = find_last_coupon(schedule, reference_date)?;
    Ok(accrued_interest(reference_date, last_coupon, coupon_rate_pct))
}
