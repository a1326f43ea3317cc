use clap::Args;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde_json::Value;

use bond_valuation_core::rates;
use bond_valuation_core::schedule::{self, CashFlowPeriod};
use bond_valuation_core::sensitivity::{self, SweepInput, SweepRange};
use bond_valuation_core::{value_bond, BondTerms, Precision};

use crate::input;

/// Arguments for a full bond valuation
#[derive(Args)]
pub struct EvaluateArgs {
    /// Path to a JSON or YAML bond terms document
    #[arg(long)]
    pub input: Option<String>,
}

pub fn run_evaluate(args: EvaluateArgs, precision: &Precision) -> Result<Value, Box<dyn std::error::Error>> {
    let terms: BondTerms = load(args.input.as_deref(), "evaluate")?;
    let mut output = value_bond(&terms, precision)?;
    output.result = output.result.rounded(precision.display_scale);
    Ok(serde_json::to_value(output)?)
}

/// Arguments for printing the amortization schedule only
#[derive(Args)]
pub struct ScheduleArgs {
    /// Path to a JSON or YAML bond terms document
    #[arg(long)]
    pub input: Option<String>,
}

pub fn run_schedule(args: ScheduleArgs, precision: &Precision) -> Result<Value, Box<dyn std::error::Error>> {
    let terms: BondTerms = load(args.input.as_deref(), "schedule")?;
    terms.validate()?;
    let coupon_rate = rates::periodic_rate(
        terms.coupon_rate,
        terms.rate_kind,
        terms.compounding_frequency,
        terms.periods_per_year,
        precision,
    )?;
    let rows: Vec<CashFlowPeriod> = schedule::generate(&terms, coupon_rate, precision)?
        .into_iter()
        .map(|p| p.rounded(precision.display_scale))
        .collect();
    Ok(serde_json::to_value(rows)?)
}

/// Arguments for a discount-rate sweep
#[derive(Args)]
pub struct SweepArgs {
    /// Path to a JSON or YAML bond terms document
    #[arg(long)]
    pub input: Option<String>,

    /// Lowest annual discount rate (percent)
    #[arg(long, default_value = "0")]
    pub min: Decimal,

    /// Highest annual discount rate (percent)
    #[arg(long, default_value = "20")]
    pub max: Decimal,

    /// Increment between rates (percent)
    #[arg(long, default_value = "1")]
    pub step: Decimal,
}

pub fn run_sweep(args: SweepArgs, precision: &Precision) -> Result<Value, Box<dyn std::error::Error>> {
    let terms: BondTerms = load(args.input.as_deref(), "sweep")?;
    let sweep_input = SweepInput {
        terms,
        range: SweepRange {
            min: args.min,
            max: args.max,
            step: args.step,
        },
    };
    let mut output = sensitivity::run_sweep(&sweep_input, precision)?;
    for point in output.result.points.iter_mut() {
        point.present_value = precision.display(point.present_value);
        point.bondholder_npv = precision.display(point.bondholder_npv);
        point.macaulay_duration = precision.display(point.macaulay_duration);
        point.modified_duration = precision.display(point.modified_duration);
        point.convexity = precision.display(point.convexity);
    }
    Ok(serde_json::to_value(output)?)
}

/// Read the terms from `--input`, falling back to piped stdin.
fn load<T: DeserializeOwned>(path: Option<&str>, command: &str) -> Result<T, Box<dyn std::error::Error>> {
    if let Some(path) = path {
        input::file::read_document(path)
    } else if let Some(data) = input::stdin::read_stdin()? {
        Ok(serde_json::from_value(data)?)
    } else {
        Err(format!("--input <terms.json|terms.yaml> or stdin required for {command}").into())
    }
}
