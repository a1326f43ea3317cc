mod commands;
mod input;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::process;
use tracing_subscriber::EnvFilter;

use bond_valuation_core::Precision;
use commands::bond::{EvaluateArgs, ScheduleArgs, SweepArgs};

/// French-method bond valuation
#[derive(Parser)]
#[command(
    name = "bondval",
    version,
    about = "French-method bond valuation",
    long_about = "Builds the constant-installment amortization schedule of a bond, \
                  allocates issuance costs and derives the issuer TCEA (with and \
                  without tax shield), the bondholder TREA, present value, duration \
                  and convexity with decimal precision."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, default_value = "json", global = true)]
    output: OutputFormat,

    /// Fractional digits kept while computing
    #[arg(long, default_value_t = 12, global = true)]
    scale: u32,

    /// Fractional digits shown in the output
    #[arg(long, default_value_t = 2, global = true)]
    display_dp: u32,
}

#[derive(Subcommand)]
enum Commands {
    /// Full valuation: schedule, costs, TCEA, TREA, duration, convexity
    Evaluate(EvaluateArgs),
    /// Amortization schedule only
    Schedule(ScheduleArgs),
    /// Revalue the bondholder flows across a range of discount rates
    Sweep(SweepArgs),
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

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let precision = Precision::new(cli.scale, cli.display_dp);
    tracing::debug!(scale = precision.scale, display_dp = precision.display_scale, "precision");

    let result: Result<serde_json::Value, Box<dyn std::error::Error>> = match cli.command {
        Commands::Evaluate(args) => commands::bond::run_evaluate(args, &precision),
        Commands::Schedule(args) => commands::bond::run_schedule(args, &precision),
        Commands::Sweep(args) => commands::bond::run_sweep(args, &precision),
        Commands::Version => {
            println!("bondval {}", env!("CARGO_PKG_VERSION"));
            return;
        }
    };

    match result {
        Ok(value) => {
            output::format_output(&cli.output, &value);
            process::exit(0);
        }
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(1);
        }
    }
}
