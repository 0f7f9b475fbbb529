//! Annualized internal rate of return for dated cash flows (XIRR).
//!
//! Solves `Σ amount_i × (1 + r)^(−t_i) = 0` where `t_i` is the number of days
//! from the earliest flow divided by 365. Newton-Raphson runs first; when it
//! cannot converge the solver brackets a sign change on a fixed rate grid and
//! bisects. All arithmetic is in `Decimal`, with range-reduced series for
//! `ln` and `exp` so results do not depend on a float library.

use chrono::NaiveDate;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::BondYieldError;
use crate::types::{CashFlow, Money, Rate};
use crate::BondYieldResult;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

const DAYS_PER_YEAR: Decimal = dec!(365);

const LN_2: Decimal = dec!(0.6931471805599453094172321215);

/// Largest |x| passed to the exp series before giving up (e^64 ≈ 6.2e27).
const EXP_ARG_LIMIT: Decimal = dec!(64);

const SERIES_TERMS: u32 = 40;

/// Derivatives smaller than this are treated as flat.
const DERIVATIVE_FLOOR: Decimal = dec!(0.000000000001);

/// Bisection stops once the bracket is narrower than this.
const BRACKET_WIDTH_FLOOR: Decimal = dec!(0.000000000001);

/// Rates tried, in order, when looking for a sign change to bisect.
const BRACKET_GRID: [Decimal; 19] = [
    dec!(-0.9),
    dec!(-0.75),
    dec!(-0.5),
    dec!(-0.25),
    dec!(-0.1),
    dec!(0),
    dec!(0.025),
    dec!(0.05),
    dec!(0.1),
    dec!(0.15),
    dec!(0.25),
    dec!(0.5),
    dec!(0.75),
    dec!(1),
    dec!(1.5),
    dec!(2),
    dec!(3),
    dec!(5),
    dec!(7.5),
];

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Solver parameters. Defaults: guess 10%, tolerance 1e-7, 100 iterations,
/// bracket [-99%, 1000%].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    /// Starting rate for Newton-Raphson
    pub initial_guess: Rate,
    /// Maximum |NPV| accepted as a root
    pub tolerance: Decimal,
    /// Iteration cap for each of the Newton and bisection phases
    pub max_iterations: u32,
    /// Lowest rate considered
    pub lower_bound: Rate,
    /// Highest rate considered
    pub upper_bound: Rate,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            initial_guess: dec!(0.1),
            tolerance: dec!(0.0000001),
            max_iterations: 100,
            lower_bound: dec!(-0.99),
            upper_bound: dec!(10),
        }
    }
}

impl SolverConfig {
    fn validate(&self) -> BondYieldResult<()> {
        if self.lower_bound <= dec!(-1) {
            return Err(BondYieldError::InvalidInput {
                field: "solver.lower_bound".into(),
                reason: "Rates must stay above -100%".into(),
            });
        }
        if self.lower_bound >= self.upper_bound {
            return Err(BondYieldError::InvalidInput {
                field: "solver.upper_bound".into(),
                reason: "Upper bound must exceed lower bound".into(),
            });
        }
        if self.tolerance <= Decimal::ZERO {
            return Err(BondYieldError::InvalidInput {
                field: "solver.tolerance".into(),
                reason: "Tolerance must be positive".into(),
            });
        }
        if self.max_iterations == 0 {
            return Err(BondYieldError::InvalidInput {
                field: "solver.max_iterations".into(),
                reason: "At least one iteration is required".into(),
            });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Annualized effective rate of `cashflows` with the default solver settings.
pub fn solve_annual_yield(cashflows: &[CashFlow]) -> BondYieldResult<Rate> {
    solve_annual_yield_with(cashflows, &SolverConfig::default())
}

/// Annualized effective rate of `cashflows`.
///
/// Errors with `DegenerateInput` when the flows cannot have a root (fewer
/// than two flows, or all of one sign) and with `NoConvergence` when neither
/// Newton-Raphson nor bisection finds one.
pub fn solve_annual_yield_with(
    cashflows: &[CashFlow],
    config: &SolverConfig,
) -> BondYieldResult<Rate> {
    config.validate()?;
    let terms = year_fractions(cashflows)?;

    if let Some(rate) = newton_raphson(&terms, config) {
        return Ok(rate);
    }
    warn!(
        flows = terms.len(),
        guess = %config.initial_guess,
        "Newton-Raphson did not converge, falling back to bisection"
    );
    bisection(&terms, config)
}

/// Net present value of dated flows at `rate`, discounting from the earliest date.
pub fn xnpv(rate: Rate, cashflows: &[CashFlow]) -> BondYieldResult<Money> {
    if rate <= dec!(-1) {
        return Err(BondYieldError::InvalidInput {
            field: "rate".into(),
            reason: "Discount rate must be greater than -100%".into(),
        });
    }
    let Some(base) = cashflows.iter().map(|cf| cf.date).min() else {
        return Ok(Decimal::ZERO);
    };
    let terms: Vec<(Decimal, Money)> = cashflows
        .iter()
        .map(|cf| (years_between(base, cf.date), cf.amount))
        .collect();
    evaluate(&terms, rate)
        .map(|(npv, _)| npv)
        .ok_or_else(|| BondYieldError::InvalidInput {
            field: "rate".into(),
            reason: format!("NPV at {rate} exceeds decimal range"),
        })
}

// ---------------------------------------------------------------------------
// Solver phases
// ---------------------------------------------------------------------------

fn year_fractions(cashflows: &[CashFlow]) -> BondYieldResult<Vec<(Decimal, Money)>> {
    if cashflows.len() < 2 {
        return Err(BondYieldError::DegenerateInput(
            "a yield requires at least 2 cash flows".into(),
        ));
    }
    let has_outflow = cashflows.iter().any(|cf| cf.amount < Decimal::ZERO);
    let has_inflow = cashflows.iter().any(|cf| cf.amount > Decimal::ZERO);
    if !(has_outflow && has_inflow) {
        return Err(BondYieldError::DegenerateInput(
            "cash flows must include both an outflow and an inflow".into(),
        ));
    }

    let base = cashflows
        .iter()
        .map(|cf| cf.date)
        .min()
        .unwrap_or(cashflows[0].date);
    Ok(cashflows
        .iter()
        .map(|cf| (years_between(base, cf.date), cf.amount))
        .collect())
}

fn years_between(base: NaiveDate, date: NaiveDate) -> Decimal {
    Decimal::from(date.signed_duration_since(base).num_days()) / DAYS_PER_YEAR
}

fn newton_raphson(terms: &[(Decimal, Money)], config: &SolverConfig) -> Option<Rate> {
    let mut rate = config.initial_guess;

    for i in 0..config.max_iterations {
        let Some((npv, dnpv)) = evaluate(terms, rate) else {
            debug!(iteration = i, %rate, "NPV not representable");
            return None;
        };

        if npv.abs() < config.tolerance {
            debug!(iterations = i, %rate, "Newton-Raphson converged");
            return Some(rate);
        }

        if dnpv.abs() < DERIVATIVE_FLOOR {
            debug!(iteration = i, %rate, "flat derivative");
            return None;
        }

        rate = rate.checked_sub(npv.checked_div(dnpv)?)?;

        // Guard against divergence
        if rate < config.lower_bound {
            rate = config.lower_bound;
        } else if rate > config.upper_bound {
            rate = config.upper_bound;
        }
    }

    debug!(iterations = config.max_iterations, %rate, "Newton-Raphson hit the iteration cap");
    None
}

fn bisection(terms: &[(Decimal, Money)], config: &SolverConfig) -> BondYieldResult<Rate> {
    let (mut lo, mut hi, mut npv_lo) =
        find_bracket(terms, config).ok_or_else(|| BondYieldError::NoConvergence {
            function: "solve_annual_yield".into(),
            iterations: 0,
            last_delta: Decimal::ZERO,
        })?;
    debug!(%lo, %hi, "bracketed a sign change");

    let mut last_delta = npv_lo.abs();
    for i in 0..config.max_iterations {
        let mid = (lo + hi) / dec!(2);
        let npv_mid = evaluate(terms, mid)
            .map(|(npv, _)| npv)
            .ok_or_else(|| BondYieldError::NoConvergence {
                function: "solve_annual_yield".into(),
                iterations: i,
                last_delta,
            })?;
        last_delta = npv_mid.abs();

        if last_delta < config.tolerance || hi - lo < BRACKET_WIDTH_FLOOR {
            debug!(iterations = i, rate = %mid, "bisection converged");
            return Ok(mid);
        }

        if npv_mid.is_sign_negative() == npv_lo.is_sign_negative() {
            lo = mid;
            npv_lo = npv_mid;
        } else {
            hi = mid;
        }
    }

    Err(BondYieldError::NoConvergence {
        function: "solve_annual_yield".into(),
        iterations: config.max_iterations,
        last_delta,
    })
}

/// First adjacent pair of grid rates whose NPVs differ in sign, with the
/// NPV at the lower rate. Rates where the NPV is not representable are skipped.
fn find_bracket(terms: &[(Decimal, Money)], config: &SolverConfig) -> Option<(Rate, Rate, Money)> {
    let candidates = std::iter::once(config.lower_bound)
        .chain(
            BRACKET_GRID
                .iter()
                .copied()
                .filter(|r| *r > config.lower_bound && *r < config.upper_bound),
        )
        .chain(std::iter::once(config.upper_bound));

    let mut previous: Option<(Rate, Money)> = None;
    for rate in candidates {
        let Some((npv, _)) = evaluate(terms, rate) else {
            continue;
        };
        if npv.abs() < config.tolerance {
            return Some((rate, rate, npv));
        }
        if let Some((prev_rate, prev_npv)) = previous {
            if prev_npv.is_sign_negative() != npv.is_sign_negative() {
                return Some((prev_rate, rate, prev_npv));
            }
        }
        previous = Some((rate, npv));
    }
    None
}

/// NPV and its derivative with respect to the rate, or `None` when either
/// leaves the decimal range.
fn evaluate(terms: &[(Decimal, Money)], rate: Rate) -> Option<(Money, Decimal)> {
    let base = Decimal::ONE.checked_add(rate)?;
    if base <= Decimal::ZERO {
        return None;
    }
    let ln_base = ln_checked(base)?;

    let mut npv = Decimal::ZERO;
    let mut dnpv = Decimal::ZERO;
    for &(t, amount) in terms {
        if t.is_zero() {
            npv = npv.checked_add(amount)?;
            continue;
        }
        let discount = exp_checked(-(t.checked_mul(ln_base)?))?;
        let pv = amount.checked_mul(discount)?;
        npv = npv.checked_add(pv)?;
        dnpv = dnpv.checked_sub(t.checked_mul(pv)?.checked_div(base)?)?;
    }
    Some((npv, dnpv))
}

// ---------------------------------------------------------------------------
// Decimal transcendental helpers
// ---------------------------------------------------------------------------

/// e^x via range reduction to |r| ≤ ln2/2 and a Taylor series.
fn exp_checked(x: Decimal) -> Option<Decimal> {
    if x > EXP_ARG_LIMIT {
        return None;
    }
    if x < -EXP_ARG_LIMIT {
        return Some(Decimal::ZERO);
    }

    let k = (x / LN_2).round();
    let r = x - k * LN_2;

    let mut term = Decimal::ONE;
    let mut sum = Decimal::ONE;
    for n in 1..SERIES_TERMS {
        term = term * r / Decimal::from(n);
        if term.is_zero() {
            break;
        }
        sum += term;
    }

    let shift = k.to_i32()?;
    let mut scale = Decimal::ONE;
    for _ in 0..shift.unsigned_abs() {
        scale = scale.checked_mul(dec!(2))?;
    }
    if shift >= 0 {
        sum.checked_mul(scale)
    } else {
        sum.checked_div(scale)
    }
}

/// ln(x) for x > 0 via reduction into [0.5, 2] and the atanh series.
fn ln_checked(x: Decimal) -> Option<Decimal> {
    if x <= Decimal::ZERO {
        return None;
    }
    if x == Decimal::ONE {
        return Some(Decimal::ZERO);
    }

    let mut val = x;
    let mut k: i32 = 0;
    while val > dec!(2) {
        val /= dec!(2);
        k += 1;
    }
    while val < dec!(0.5) {
        val *= dec!(2);
        k -= 1;
    }

    // ln(val) = 2 * Σ u^(2n+1) / (2n+1), u = (val - 1) / (val + 1)
    let u = (val - Decimal::ONE) / (val + Decimal::ONE);
    let u_sq = u * u;
    let mut power = u;
    let mut sum = u;
    for n in 1..SERIES_TERMS {
        power *= u_sq;
        if power.is_zero() {
            break;
        }
        sum += power / Decimal::from(2 * n + 1);
    }

    Some(dec!(2) * sum + Decimal::from(k) * LN_2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CashFlowKind;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn flow(date: NaiveDate, amount: Decimal) -> CashFlow {
        let kind = if amount < Decimal::ZERO {
            CashFlowKind::Settlement
        } else {
            CashFlowKind::Coupon
        };
        CashFlow::new(date, amount, kind)
    }

    #[test]
    fn test_exp_and_ln_known_values() {
        assert!((exp_checked(Decimal::ONE).unwrap() - dec!(2.718281828459045235)).abs() < dec!(0.000000000000000001));
        assert!((exp_checked(dec!(-1)).unwrap() - dec!(0.367879441171442321)).abs() < dec!(0.000000000000000001));
        assert!((ln_checked(dec!(10)).unwrap() - dec!(2.302585092994045684)).abs() < dec!(0.000000000000000001));
        assert!((ln_checked(dec!(0.01)).unwrap() + dec!(4.605170185988091368)).abs() < dec!(0.000000000000000001));
        assert_eq!(exp_checked(Decimal::ZERO), Some(Decimal::ONE));
        assert_eq!(ln_checked(Decimal::ONE), Some(Decimal::ZERO));
    }

    #[test]
    fn test_exp_limits() {
        assert_eq!(exp_checked(dec!(65)), None);
        assert_eq!(exp_checked(dec!(-65)), Some(Decimal::ZERO));
        assert!(exp_checked(dec!(60)).is_some());
        assert_eq!(ln_checked(Decimal::ZERO), None);
    }

    #[test]
    fn test_one_year_exact_rate() {
        // -100 today, +110 in 365 days: exactly 10%
        let flows = vec![flow(d(2023, 1, 1), dec!(-100)), flow(d(2024, 1, 1), dec!(110))];
        let rate = solve_annual_yield(&flows).unwrap();
        assert!((rate - dec!(0.10)).abs() < dec!(0.0000001), "got {rate}");
    }

    #[test]
    fn test_solution_zeroes_npv() {
        let flows = vec![
            flow(d(2025, 3, 7), dec!(-92.88)),
            flow(d(2025, 7, 15), dec!(0.25)),
            flow(d(2026, 1, 15), dec!(0.25)),
            flow(d(2026, 7, 15), dec!(0.25)),
            flow(d(2027, 1, 15), dec!(0.25)),
            flow(d(2027, 7, 15), dec!(0.25)),
            flow(d(2028, 1, 15), dec!(0.25)),
            flow(d(2028, 7, 15), dec!(100.25)),
        ];
        let rate = solve_annual_yield(&flows).unwrap();
        assert!(xnpv(rate, &flows).unwrap().abs() < dec!(0.0000001));
        assert!(rate > dec!(0.02) && rate < dec!(0.04), "got {rate}");
    }

    #[test]
    fn test_negative_yield() {
        // Lose 10% over a year
        let flows = vec![flow(d(2023, 1, 1), dec!(-100)), flow(d(2024, 1, 1), dec!(90))];
        let rate = solve_annual_yield(&flows).unwrap();
        assert!((rate - dec!(-0.10)).abs() < dec!(0.0000001), "got {rate}");
    }

    #[test]
    fn test_bisection_fallback_when_newton_cannot_start() {
        // A guess at the lower bound makes the first NPV unrepresentable over 40 years
        let flows = vec![flow(d(2025, 1, 1), dec!(-100)), flow(d(2065, 1, 1), dec!(400))];
        let config = SolverConfig {
            initial_guess: dec!(-0.99),
            ..SolverConfig::default()
        };
        let rate = solve_annual_yield_with(&flows, &config).unwrap();
        let expected = dec!(0.03524); // 4^(365/14610) - 1
        assert!((rate - expected).abs() < dec!(0.0001), "got {rate}");
    }

    #[test]
    fn test_same_signed_flows_are_degenerate() {
        let flows = vec![flow(d(2025, 1, 1), dec!(100)), flow(d(2026, 1, 1), dec!(5))];
        assert!(matches!(
            solve_annual_yield(&flows),
            Err(BondYieldError::DegenerateInput(_))
        ));
        let single = vec![flow(d(2025, 1, 1), dec!(-100))];
        assert!(matches!(
            solve_annual_yield(&single),
            Err(BondYieldError::DegenerateInput(_))
        ));
    }

    #[test]
    fn test_root_outside_bracket_does_not_converge() {
        // 100x in one day: annualized rate far above 1000%
        let flows = vec![flow(d(2025, 1, 1), dec!(-1)), flow(d(2025, 1, 2), dec!(100))];
        assert!(matches!(
            solve_annual_yield(&flows),
            Err(BondYieldError::NoConvergence { .. })
        ));
    }

    #[test]
    fn test_iteration_cap_is_enforced() {
        let flows = vec![flow(d(2023, 1, 1), dec!(-100)), flow(d(2024, 1, 1), dec!(140))];
        let config = SolverConfig {
            max_iterations: 1,
            ..SolverConfig::default()
        };
        assert!(matches!(
            solve_annual_yield_with(&flows, &config),
            Err(BondYieldError::NoConvergence { .. })
        ));
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let flows = vec![flow(d(2023, 1, 1), dec!(-100)), flow(d(2024, 1, 1), dec!(110))];
        let config = SolverConfig {
            lower_bound: dec!(-1),
            ..SolverConfig::default()
        };
        assert!(matches!(
            solve_annual_yield_with(&flows, &config),
            Err(BondYieldError::InvalidInput { .. })
        ));
    }

    #[test]
    fn test_deterministic() {
        let flows = vec![
            flow(d(2025, 3, 5), dec!(-58.2)),
            flow(d(2025, 9, 1), dec!(1.075)),
            flow(d(2026, 3, 1), dec!(101.075)),
        ];
        let a = solve_annual_yield(&flows).unwrap();
        let b = solve_annual_yield(&flows).unwrap();
        assert_eq!(a.to_string(), b.to_string());
    }

    #[test]
    fn test_xnpv_at_zero_rate_is_sum() {
        let flows = vec![flow(d(2023, 1, 1), dec!(-100)), flow(d(2024, 6, 1), dec!(110))];
        assert_eq!(xnpv(Decimal::ZERO, &flows).unwrap(), dec!(10));
        assert!(xnpv(dec!(-1), &flows).is_err());
    }
}
