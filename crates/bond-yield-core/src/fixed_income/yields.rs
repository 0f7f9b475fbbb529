use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::debug;

use crate::error::BondYieldError;
use crate::fixed_income::assembler::{
    assemble_early_exit, assemble_from_schedule, assemble_full_life, InvestorStream,
};
use crate::fixed_income::bond::{Bond, BondRecord};
use crate::fixed_income::schedule::CouponSchedule;
use crate::normalize::NumberInput;
use crate::time_value::{solve_annual_yield_with, SolverConfig};
use crate::types::{with_metadata, CashFlow, ComputationOutput, Money, Percent};
use crate::BondYieldResult;

// ---------------------------------------------------------------------------
// Input / Output types
// ---------------------------------------------------------------------------

/// A sale before maturity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExitScenario {
    /// Date the position is sold
    pub exit_date: NaiveDate,
    /// Clean sale price; required to compute an exit yield
    #[serde(default)]
    pub exit_price: Option<Money>,
}

/// Input for the full yield report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BondYieldInput {
    pub bond: Bond,
    /// Optional early sale to evaluate alongside the hold-to-maturity yields.
    #[serde(default)]
    pub exit: Option<ExitScenario>,
    #[serde(default)]
    pub solver: SolverConfig,
}

/// Yields of an early sale.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExitYieldOutput {
    pub exit_date: NaiveDate,
    pub exit_price: Money,
    pub gross_yield_pct: Percent,
    pub net_yield_pct: Percent,
    /// Gross investor cashflows up to the sale
    pub cashflows: Vec<CashFlow>,
}

/// Output of the full yield report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BondYieldOutput {
    /// Annualized yield to maturity before tax, in percent
    pub gross_yield_pct: Percent,
    /// Annualized yield to maturity after capital gains tax, in percent
    pub net_yield_pct: Percent,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit: Option<ExitYieldOutput>,
    pub coupon_schedule: Vec<CashFlow>,
    pub gross_cashflows: Vec<CashFlow>,
    pub net_cashflows: Vec<CashFlow>,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Annualized hold-to-maturity yield before tax, in percent.
pub fn compute_gross_yield(bond: &Bond) -> BondYieldResult<Percent> {
    let stream = assemble_full_life(bond, false)?;
    stream_yield_pct(&stream, &SolverConfig::default())
}

/// Annualized hold-to-maturity yield after capital gains tax, in percent.
pub fn compute_net_yield(bond: &Bond) -> BondYieldResult<Percent> {
    let stream = assemble_full_life(bond, true)?;
    stream_yield_pct(&stream, &SolverConfig::default())
}

/// Annualized yield, in percent, of buying `bond` at settlement and selling
/// it on `exit_date` at `exit_price`.
pub fn compute_exit_yield(
    bond: &Bond,
    exit_date: NaiveDate,
    exit_price: Option<Money>,
    net: bool,
) -> BondYieldResult<Percent> {
    let stream = exit_stream(bond, exit_date, exit_price, net)?;
    stream_yield_pct(&stream, &SolverConfig::default())
}

/// The coupons `bond` pays.
pub fn coupon_schedule(bond: &Bond) -> BondYieldResult<CouponSchedule> {
    bond.validate()?;
    CouponSchedule::generate(bond)
}

/// Gross and net yields, optional early-exit yields, the coupon schedule and
/// the investor cashflows, wrapped with computation metadata.
pub fn calculate_bond_yields(
    input: &BondYieldInput,
) -> BondYieldResult<ComputationOutput<BondYieldOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();
    let bond = &input.bond;

    bond.validate()?;
    let schedule = CouponSchedule::generate(bond)?;

    let gross_stream = assemble_from_schedule(bond, &schedule, false)?;
    let net_stream = assemble_from_schedule(bond, &schedule, true)?;
    let gross_yield_pct = stream_yield_pct(&gross_stream, &input.solver)?;
    let net_yield_pct = stream_yield_pct(&net_stream, &input.solver)?;

    if bond.is_zero_coupon() {
        warnings.push("Zero-coupon bond: no coupons and no accrued interest".into());
    }
    if gross_yield_pct < Decimal::ZERO {
        warnings.push(format!(
            "Negative yield to maturity ({gross_yield_pct:.4}%): price exceeds total proceeds"
        ));
    }

    let exit = match &input.exit {
        Some(scenario) => {
            let price = required_exit_price(scenario.exit_price)?;
            let gross = assemble_early_exit(
                &gross_stream,
                scenario.exit_date,
                price,
                bond.settlement_price,
                bond.coupon_rate_pct,
                false,
                bond.capital_gain_tax_pct,
            )?;
            let net = assemble_early_exit(
                &net_stream,
                scenario.exit_date,
                price,
                bond.settlement_price,
                bond.coupon_rate_pct,
                true,
                bond.capital_gain_tax_pct,
            )?;
            if price < bond.settlement_price && !bond.capital_gain_tax_pct.is_zero() {
                warnings.push(format!(
                    "Sale at {price} below purchase price {}: the loss is credited against tax",
                    bond.settlement_price
                ));
            }
            Some(ExitYieldOutput {
                exit_date: scenario.exit_date,
                exit_price: price,
                gross_yield_pct: stream_yield_pct(&gross, &input.solver)?,
                net_yield_pct: stream_yield_pct(&net, &input.solver)?,
                cashflows: gross.cashflows().to_vec(),
            })
        }
        None => None,
    };

    let output = BondYieldOutput {
        gross_yield_pct,
        net_yield_pct,
        exit,
        coupon_schedule: schedule.into_cashflows(),
        gross_cashflows: gross_stream.cashflows().to_vec(),
        net_cashflows: net_stream.cashflows().to_vec(),
    };

    let elapsed = start.elapsed().as_micros() as u64;
    let assumptions = serde_json::json!({
        "day_count": "Actual/365 (fixed)",
        "accrual": "coupon rate x days since last coupon / 365",
        "yield_method": "XIRR: Newton-Raphson with bisection fallback",
        "tolerance": input.solver.tolerance.to_string(),
        "max_iterations": input.solver.max_iterations,
        "capital_gain_tax_pct": bond.capital_gain_tax_pct.to_string(),
    });

    Ok(with_metadata(
        "Bond yield to maturity (annualized IRR of dated cashflows)",
        &assumptions,
        warnings,
        elapsed,
        output,
    ))
}

/// Recompute the yields stored on a record.
///
/// Hold-to-maturity yields are always refreshed. The sell-today yields are
/// refreshed from the record's market price when `today` falls after
/// settlement and no later than maturity, and cleared otherwise.
pub fn refresh_record_yields(record: &BondRecord, today: NaiveDate) -> BondYieldResult<BondRecord> {
    let bond = Bond::from_record(record)?;
    let mut refreshed = record.clone();
    refreshed.annual_yield_gross = Some(NumberInput::from(compute_gross_yield(&bond)?));
    refreshed.annual_yield_net = Some(NumberInput::from(compute_net_yield(&bond)?));

    let sellable = today > bond.settlement_date && today <= bond.maturity_date;
    let (gross_today, net_today) = match record.today_price()? {
        Some(price) if sellable => (
            Some(NumberInput::from(compute_exit_yield(&bond, today, Some(price), false)?)),
            Some(NumberInput::from(compute_exit_yield(&bond, today, Some(price), true)?)),
        ),
        _ => (None, None),
    };
    refreshed.annual_yield_gross_today = gross_today;
    refreshed.annual_yield_net_today = net_today;

    debug!(
        isin = %record.isin,
        today = %today,
        priced = refreshed.annual_yield_gross_today.is_some(),
        "refreshed record yields"
    );
    Ok(refreshed)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn exit_stream(
    bond: &Bond,
    exit_date: NaiveDate,
    exit_price: Option<Money>,
    net: bool,
) -> BondYieldResult<InvestorStream> {
    let price = required_exit_price(exit_price)?;
    let full = assemble_full_life(bond, net)?;
    assemble_early_exit(
        &full,
        exit_date,
        price,
        bond.settlement_price,
        bond.coupon_rate_pct,
        net,
        bond.capital_gain_tax_pct,
    )
}

fn required_exit_price(exit_price: Option<Money>) -> BondYieldResult<Money> {
    exit_price.ok_or_else(|| BondYieldError::MissingData("exit price is required to compute an exit yield".into()))
}

fn stream_yield_pct(stream: &InvestorStream, config: &SolverConfig) -> BondYieldResult<Percent> {
    let rate = solve_annual_yield_with(stream.cashflows(), config)?;
    debug!(flows = stream.len(), %rate, "solved stream yield");
    Ok(rate * dec!(100))
}
