use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::costs::allocate;
use crate::error::BondValuationError;
use crate::rates::{effective_annual_rate, periodic_rate};
use crate::risk::duration_convexity;
use crate::schedule::generate;
use crate::terms::{BondTerms, RateKind};
use crate::time_value::PeriodFlow;
use crate::types::{with_metadata, ComputationOutput, Money, Percent, Precision, Years};
use crate::BondValuationResult;

const MAX_SWEEP_POINTS: usize = 10_000;

/// Annual discount rates (percent) to revalue at, from `min` to `max`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepRange {
    pub min: Percent,
    pub max: Percent,
    pub step: Percent,
}

/// Input document for a discount-rate sweep.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepInput {
    pub terms: BondTerms,
    pub range: SweepRange,
}

/// Bondholder valuation at one discount rate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepPoint {
    pub discount_rate: Percent,
    pub periodic_discount_rate: Percent,
    pub present_value: Money,
    pub bondholder_npv: Money,
    pub macaulay_duration: Years,
    pub modified_duration: Years,
    pub convexity: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepOutput {
    pub points: Vec<SweepPoint>,
    /// True when every step up in the discount rate lowered the present value
    pub strictly_decreasing: bool,
}

/// Generate the sweep values from min to max with step, max included.
pub fn sweep_values(range: &SweepRange) -> BondValuationResult<Vec<Percent>> {
    if range.step <= Decimal::ZERO {
        return Err(BondValuationError::InvalidInput {
            field: "range.step".into(),
            reason: "Step must be positive".into(),
        });
    }
    if range.min > range.max {
        return Err(BondValuationError::InvalidInput {
            field: "range.min".into(),
            reason: "Min must be <= max".into(),
        });
    }
    if range.min < Decimal::ZERO {
        return Err(BondValuationError::InvalidRate {
            field: "range.min".into(),
            reason: "Discount rates must be non-negative".into(),
        });
    }

    let mut values = Vec::new();
    let mut current = range.min;
    while current <= range.max {
        if values.len() >= MAX_SWEEP_POINTS {
            return Err(BondValuationError::InvalidInput {
                field: "range.step".into(),
                reason: format!("Sweep exceeds {MAX_SWEEP_POINTS} points"),
            });
        }
        values.push(current);
        current += range.step;
    }
    if let Some(&last) = values.last() {
        if last < range.max {
            values.push(range.max);
        }
    }
    Ok(values)
}

/// Revalue the bondholder's flows across discount rates.
///
/// The schedule does not depend on the discount rate, so it is built once.
pub fn discount_rate_sweep(
    terms: &BondTerms,
    range: &SweepRange,
    precision: &Precision,
) -> BondValuationResult<Vec<SweepPoint>> {
    terms.validate()?;
    let rates = sweep_values(range)?;

    let coupon_rate = periodic_rate(
        terms.coupon_rate,
        terms.rate_kind,
        terms.compounding_frequency,
        terms.periods_per_year,
        precision,
    )?;
    let schedule = generate(terms, coupon_rate, precision)?;
    let receipts: Vec<PeriodFlow> = schedule
        .iter()
        .map(|p| (p.period, p.gross_payment()))
        .collect();
    let bondholder_costs = allocate(&terms.costs.items(), terms.market_value).bondholder_total;

    rates
        .into_iter()
        .map(|annual| {
            let periodic = periodic_rate(
                annual,
                RateKind::Effective,
                None,
                terms.periods_per_year,
                precision,
            )?;
            let risk = duration_convexity(&receipts, periodic, terms.periods_per_year)?;
            let pv = precision.round(risk.present_value);
            Ok(SweepPoint {
                discount_rate: annual,
                periodic_discount_rate: precision.round(periodic * dec!(100)),
                present_value: pv,
                bondholder_npv: precision.round(pv - terms.market_value - bondholder_costs),
                macaulay_duration: precision.round(risk.macaulay_duration),
                modified_duration: precision.round(risk.modified_duration),
                convexity: precision.round(risk.convexity),
            })
        })
        .collect()
}

/// Run a sweep and wrap it in the standard output envelope.
pub fn run_sweep(
    input: &SweepInput,
    precision: &Precision,
) -> BondValuationResult<ComputationOutput<SweepOutput>> {
    let start = Instant::now();
    let mut warnings = Vec::new();

    let points = discount_rate_sweep(&input.terms, &input.range, precision)?;
    let strictly_decreasing = points
        .windows(2)
        .all(|w| w[1].present_value < w[0].present_value);

    let coupon_tea = effective_annual_rate(
        input.terms.coupon_rate,
        input.terms.rate_kind,
        input.terms.compounding_frequency,
    )? * dec!(100);
    if input.range.min <= coupon_tea && coupon_tea <= input.range.max {
        warnings.push(format!(
            "Sweep crosses the coupon TEA ({}%): present value passes through par there",
            coupon_tea.round_dp(4)
        ));
    }

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Discount-Rate Sensitivity of Bondholder Present Value",
        &serde_json::json!({
            "min": input.range.min.to_string(),
            "max": input.range.max.to_string(),
            "step": input.range.step.to_string(),
            "discount_rate": "effective annual",
        }),
        warnings,
        elapsed,
        precision,
        SweepOutput {
            points,
            strictly_decreasing,
        },
    ))
}
