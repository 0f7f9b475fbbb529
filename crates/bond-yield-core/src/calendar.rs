//! Month-based date arithmetic used to lay out coupon dates.
//!
//! Stepping follows ordinary Gregorian overflow rather than end-of-month
//! clamping: 31 May stepped back one month is "31 April", which rolls to
//! 1 May. Repeated stepping therefore drifts exactly like a calendar that is
//! mutated one month at a time.

use chrono::{Datelike, Days, NaiveDate};

use crate::error::BondYieldError;
use crate::BondYieldResult;

/// Move `date` by `delta_months` whole months (negative steps backwards).
///
/// The day-of-month is kept when the target month has it; otherwise the
/// surplus days spill into the following month.
pub fn step_months(date: NaiveDate, delta_months: i32) -> BondYieldResult<NaiveDate> {
    let total_months = date.year() * 12 + date.month0() as i32 + delta_months;
    let year = total_months.div_euclid(12);
    let month = total_months.rem_euclid(12) as u32 + 1;

    let out_of_range = || {
        BondYieldError::DateError(format!(
            "stepping {date} by {delta_months} months leaves the supported calendar range"
        ))
    };

    NaiveDate::from_ymd_opt(year, month, 1)
        .and_then(|first| first.checked_add_days(Days::new(u64::from(date.day() - 1))))
        .ok_or_else(out_of_range)
}

/// Absolute number of whole days between two dates.
pub fn days_between(d1: NaiveDate, d2: NaiveDate) -> i64 {
    d2.signed_duration_since(d1).num_days().abs()
}
