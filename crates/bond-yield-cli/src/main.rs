mod commands;
mod input;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::process;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use commands::normalize::NormalizeArgs;
use commands::yields::{CashflowsArgs, ScheduleArgs, YieldArgs};

/// Gross, net and sell-today yields of fixed-coupon bonds
#[derive(Parser)]
#[command(
    name = "byc",
    version,
    about = "Gross, net and sell-today yields of fixed-coupon bonds",
    long_about = "A CLI for computing the annualized yield of a bond position with decimal \
                  precision: hold to maturity before and after capital gains tax, or sell \
                  early at a given price. Also prints coupon schedules and investor cashflows, \
                  and normalizes locale-formatted numbers and scraped bond metadata."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, default_value = "json", global = true)]
    output: OutputFormat,

    /// Log solver progress to stderr (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Gross and net yield to maturity, plus an optional early-exit yield
    Yield(YieldArgs),
    /// Coupon schedule of a bond
    Schedule(ScheduleArgs),
    /// Investor cashflows for a full holding period or an early exit
    Cashflows(CashflowsArgs),
    /// Normalize locale-formatted numbers or scraped bond metadata
    Normalize(NormalizeArgs),
    /// Print version information
    Version,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Csv,
    Minimal,
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result: Result<serde_json::Value, Box<dyn std::error::Error>> = match cli.command {
        Commands::Yield(args) => commands::yields::run_yield(args),
        Commands::Schedule(args) => commands::yields::run_schedule(args),
        Commands::Cashflows(args) => commands::yields::run_cashflows(args),
        Commands::Normalize(args) => commands::normalize::run_normalize(args),
        Commands::Version => {
            println!("byc {}", env!("CARGO_PKG_VERSION"));
            return;
        }
    };

    match result {
        Ok(value) => {
            output::format_output(&cli.output, &value);
            process::exit(0);
        }
        Err(e) => {
            tracing::debug!(error = %e, "command failed");
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(1);
        }
    }
}
