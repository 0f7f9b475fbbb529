use chrono::NaiveDate;
use clap::Args;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::Value;
use tracing::debug;

use bond_yield_core::fixed_income::assembler::{assemble_early_exit, assemble_full_life};
use bond_yield_core::fixed_income::bond::Bond;
use bond_yield_core::fixed_income::yields::{
    calculate_bond_yields, coupon_schedule, BondYieldInput, ExitScenario,
};
use bond_yield_core::normalize::normalize_number;
use bond_yield_core::time_value::SolverConfig;

use crate::input;

/// Bond terms given as flags. Numbers accept either decimal separator.
#[derive(Args)]
pub struct BondArgs {
    /// Path to a JSON or YAML input file (overrides individual flags)
    #[arg(long)]
    pub input: Option<String>,

    /// Security identifier, carried through to the output
    #[arg(long)]
    pub isin: Option<String>,

    /// Purchase date (YYYY-MM-DD)
    #[arg(long)]
    pub settlement_date: Option<NaiveDate>,

    /// Issue date (YYYY-MM-DD); defaults to the settlement date
    #[arg(long)]
    pub issuing_date: Option<NaiveDate>,

    /// Maturity date (YYYY-MM-DD)
    #[arg(long)]
    pub maturity_date: Option<NaiveDate>,

    /// Annual coupon rate in percent (e.g. "2,15")
    #[arg(long)]
    pub coupon: Option<String>,

    /// Clean price paid at settlement
    #[arg(long)]
    pub price: Option<String>,

    /// Price repaid at maturity
    #[arg(long, default_value = "100")]
    pub redemption: String,

    /// Coupons per year (0 for zero-coupon)
    #[arg(long, default_value_t = 2)]
    pub frequency: i32,

    /// Capital gains tax in percent
    #[arg(long)]
    pub tax: Option<String>,
}

/// Solver overrides applied on top of any `solver` section in the input.
#[derive(Args)]
pub struct SolverArgs {
    /// Initial rate guess for Newton-Raphson (0.1 = 10%)
    #[arg(long, allow_hyphen_values = true)]
    pub guess: Option<Decimal>,

    /// Largest NPV accepted as a root
    #[arg(long)]
    pub tolerance: Option<Decimal>,

    /// Iteration cap for each solver phase
    #[arg(long)]
    pub max_iterations: Option<u32>,
}

/// Arguments for the yield report
#[derive(Args)]
pub struct YieldArgs {
    #[command(flatten)]
    pub bond: BondArgs,

    /// Sale date for a sell-before-maturity yield (YYYY-MM-DD)
    #[arg(long)]
    pub exit_date: Option<NaiveDate>,

    /// Clean sale price on the exit date
    #[arg(long)]
    pub exit_price: Option<String>,

    #[command(flatten)]
    pub solver: SolverArgs,
}

/// Arguments for the coupon schedule
#[derive(Args)]
pub struct ScheduleArgs {
    #[command(flatten)]
    pub bond: BondArgs,
}

/// Arguments for the investor cashflow stream
#[derive(Args)]
pub struct CashflowsArgs {
    #[command(flatten)]
    pub bond: BondArgs,

    /// Cut the stream at this sale date (YYYY-MM-DD)
    #[arg(long)]
    pub exit_date: Option<NaiveDate>,

    /// Clean sale price on the exit date
    #[arg(long)]
    pub exit_price: Option<String>,

    /// Apply capital gains tax to coupons and the final flow
    #[arg(long)]
    pub net: bool,
}

pub fn run_yield(args: YieldArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let mut yield_input = read_yield_input(&args.bond, args.exit_date, args.exit_price.as_deref())?;
    apply_solver_overrides(&mut yield_input.solver, &args.solver);

    let result = calculate_bond_yields(&yield_input)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_schedule(args: ScheduleArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let yield_input = read_yield_input(&args.bond, None, None)?;
    let schedule = coupon_schedule(&yield_input.bond)?;
    Ok(serde_json::to_value(schedule.coupons())?)
}

pub fn run_cashflows(args: CashflowsArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let yield_input = read_yield_input(&args.bond, args.exit_date, args.exit_price.as_deref())?;
    let bond = &yield_input.bond;
    let full = assemble_full_life(bond, args.net)?;

    let stream = match yield_input.exit {
        Some(ExitScenario {
            exit_date,
            exit_price: Some(price),
        }) => assemble_early_exit(
            &full,
            exit_date,
            price,
            bond.settlement_price,
            bond.coupon_rate_pct,
            args.net,
            bond.capital_gain_tax_pct,
        )?,
        Some(ExitScenario {
            exit_price: None, ..
        }) => return Err("--exit-price is required with --exit-date".into()),
        None => full,
    };
    Ok(serde_json::to_value(stream.cashflows())?)
}

// ---------------------------------------------------------------------------
// Input assembly
// ---------------------------------------------------------------------------

fn read_yield_input(
    args: &BondArgs,
    exit_date: Option<NaiveDate>,
    exit_price: Option<&str>,
) -> Result<BondYieldInput, Box<dyn std::error::Error>> {
    let mut yield_input: BondYieldInput = if let Some(ref path) = args.input {
        input::file::read_input(path)?
    } else if let Some(data) = input::stdin::read_stdin()? {
        serde_json::from_value(data)?
    } else {
        BondYieldInput {
            bond: bond_from_flags(args)?,
            exit: None,
            solver: SolverConfig::default(),
        }
    };

    // Flags override any exit scenario carried by the input document
    if let Some(date) = exit_date {
        let price = exit_price.map(parse_number).transpose()?;
        yield_input.exit = Some(ExitScenario {
            exit_date: date,
            exit_price: price,
        });
    } else if exit_price.is_some() {
        return Err("--exit-price requires --exit-date".into());
    }

    debug!(
        isin = yield_input.bond.isin.as_deref().unwrap_or(""),
        exit = yield_input.exit.is_some(),
        "resolved yield input"
    );
    Ok(yield_input)
}

fn bond_from_flags(args: &BondArgs) -> Result<Bond, Box<dyn std::error::Error>> {
    let settlement = args
        .settlement_date
        .ok_or("--settlement-date is required (or provide --input)")?;
    let maturity = args
        .maturity_date
        .ok_or("--maturity-date is required (or provide --input)")?;
    let coupon = args
        .coupon
        .as_deref()
        .ok_or("--coupon is required (or provide --input)")?;
    let price = args
        .price
        .as_deref()
        .ok_or("--price is required (or provide --input)")?;

    let mut bond = Bond::new(
        settlement,
        maturity,
        parse_number(coupon)?,
        parse_number(price)?,
        parse_number(&args.redemption)?,
        args.frequency,
    );
    if let Some(ref isin) = args.isin {
        bond = bond.with_isin(isin.trim());
    }
    if let Some(issuing) = args.issuing_date {
        bond = bond.with_issuing_date(issuing);
    }
    let tax = args.tax.as_deref().map(parse_number).transpose()?;
    Ok(bond.with_capital_gain_tax(tax.unwrap_or(dec!(0))))
}

fn apply_solver_overrides(config: &mut SolverConfig, args: &SolverArgs) {
    if let Some(guess) = args.guess {
        config.initial_guess = guess;
    }
    if let Some(tolerance) = args.tolerance {
        config.tolerance = tolerance;
    }
    if let Some(max_iterations) = args.max_iterations {
        config.max_iterations = max_iterations;
    }
}

fn parse_number(raw: &str) -> Result<Decimal, Box<dyn std::error::Error>> {
    Ok(normalize_number(raw)?)
}
