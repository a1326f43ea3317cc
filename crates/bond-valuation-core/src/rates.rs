use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::error::BondValuationError;
use crate::terms::RateKind;
use crate::types::{Percent, Precision, Rate};
use crate::BondValuationResult;

const ROOT_TOLERANCE: Decimal = dec!(0.0000000000000000000001);
const MAX_ROOT_ITERATIONS: u32 = 100;

/// Effective annual rate (fraction) implied by a stated annual rate.
///
/// Nominal: `(1 + r/m)^m - 1`. Effective: the rate itself.
pub fn effective_annual_rate(
    annual_rate_pct: Percent,
    rate_kind: RateKind,
    compounding_frequency: Option<u32>,
) -> BondValuationResult<Rate> {
    check_annual_rate(annual_rate_pct)?;
    let r = annual_rate_pct / dec!(100);
    match rate_kind {
        RateKind::Effective => Ok(r),
        RateKind::Nominal => {
            let m = nominal_compounding(compounding_frequency)?;
            let per_capitalization = r / Decimal::from(m);
            Ok(growth_factor(Decimal::ONE + per_capitalization, m, "annual_rate")? - Decimal::ONE)
        }
    }
}

/// Effective rate for one coupon period (fraction), rounded to the working scale.
pub fn periodic_rate(
    annual_rate_pct: Percent,
    rate_kind: RateKind,
    compounding_frequency: Option<u32>,
    periods_per_year: u32,
    precision: &Precision,
) -> BondValuationResult<Rate> {
    check_annual_rate(annual_rate_pct)?;
    if periods_per_year == 0 {
        return Err(BondValuationError::InvalidRate {
            field: "periods_per_year".into(),
            reason: "Periods per year must be positive".into(),
        });
    }

    // Capitalizing once per coupon period: a straight division, no root needed.
    if rate_kind == RateKind::Nominal {
        let m = nominal_compounding(compounding_frequency)?;
        if m == periods_per_year {
            let r = annual_rate_pct / dec!(100) / Decimal::from(periods_per_year);
            return Ok(precision.round(r));
        }
    }

    let tea = effective_annual_rate(annual_rate_pct, rate_kind, compounding_frequency)?;
    let growth = nth_root(Decimal::ONE + tea, periods_per_year)?;
    Ok(precision.round(growth - Decimal::ONE))
}

/// Annualize a periodic rate: `(1 + r)^n - 1`.
pub fn annualize(periodic: Rate, periods_per_year: u32) -> BondValuationResult<Rate> {
    Ok(growth_factor(Decimal::ONE + periodic, periods_per_year, "periodic_rate")? - Decimal::ONE)
}

/// `base^n` by repeated multiplication, or `None` once it leaves the decimal range.
pub(crate) fn compound(base: Decimal, n: u32) -> Option<Decimal> {
    let mut acc = Decimal::ONE;
    for _ in 0..n {
        acc = acc.checked_mul(base)?;
    }
    Some(acc)
}

/// `compound` for callers that need the exact factor.
fn growth_factor(base: Decimal, n: u32, field: &str) -> BondValuationResult<Decimal> {
    compound(base, n).ok_or_else(|| BondValuationError::InvalidRate {
        field: field.into(),
        reason: format!("({base})^{n} exceeds the decimal range"),
    })
}

/// Principal n-th root of a positive value by Newton iteration.
pub(crate) fn nth_root(value: Decimal, n: u32) -> BondValuationResult<Decimal> {
    newton_root(value, n, MAX_ROOT_ITERATIONS)
}

fn newton_root(value: Decimal, n: u32, max_iterations: u32) -> BondValuationResult<Decimal> {
    if value <= Decimal::ZERO {
        return Err(BondValuationError::InvalidRate {
            field: "growth_factor".into(),
            reason: format!("Cannot take root of non-positive value {value}"),
        });
    }
    if n <= 1 {
        return Ok(value);
    }

    let n_dec = Decimal::from(n);
    let n_minus_one = Decimal::from(n - 1);
    let mut y = Decimal::ONE + (value - Decimal::ONE) / n_dec;

    for _ in 0..max_iterations {
        let denom = growth_factor(y, n - 1, "growth_factor")?;
        if denom.is_zero() {
            return Err(BondValuationError::DivisionByZero {
                context: "n-th root iteration".into(),
            });
        }
        let next = (n_minus_one * y + value / denom) / n_dec;
        if (next - y).abs() < ROOT_TOLERANCE {
            return Ok(next);
        }
        y = next;
    }

    let residual = growth_factor(y, n, "growth_factor")? - value;
    Err(BondValuationError::NonConvergent {
        function: format!("{n}-th root"),
        iterations: max_iterations,
        last_npv: residual,
    })
}

fn check_annual_rate(annual_rate_pct: Percent) -> BondValuationResult<()> {
    if annual_rate_pct < Decimal::ZERO {
        return Err(BondValuationError::InvalidRate {
            field: "annual_rate".into(),
            reason: format!("Annual rate must be non-negative, got {annual_rate_pct}%"),
        });
    }
    Ok(())
}

fn nominal_compounding(compounding_frequency: Option<u32>) -> BondValuationResult<u32> {
    match compounding_frequency {
        Some(m) if m > 0 => Ok(m),
        _ => Err(BondValuationError::InvalidRate {
            field: "compounding_frequency".into(),
            reason: "Nominal rates need a positive compounding frequency".into(),
        }),
    }
}
