use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::trace;

use crate::error::BondValuationError;
use crate::rates::compound;
use crate::types::{Money, Rate};
use crate::BondValuationResult;

const NPV_TOLERANCE: Decimal = dec!(0.0000000001);
const STEP_TOLERANCE: Decimal = dec!(0.0000000001);
const MIN_RATE: Rate = dec!(-0.99);
const MAX_RATE: Rate = dec!(100);
pub const MAX_IRR_ITERATIONS: u32 = 100;
pub const DEFAULT_IRR_GUESS: Rate = dec!(0.10);

/// A cash amount falling due at the end of coupon period `.0`.
pub type PeriodFlow = (u32, Money);

/// Present value of dated flows: `sum amount_t / (1+r)^t`.
pub fn present_value(flows: &[PeriodFlow], rate: Rate) -> BondValuationResult<Money> {
    let one_plus_r = discount_base(rate)?;
    let mut pv = Decimal::ZERO;
    for &(t, amount) in flows {
        // Past the decimal range the discounted term rounds to zero
        if let Some(growth) = compound(one_plus_r, t) {
            pv += amount / growth;
        }
    }
    Ok(pv)
}

/// Net Present Value of a flow series whose first element falls at t = 0.
pub fn npv(rate: Rate, cash_flows: &[Money]) -> BondValuationResult<Money> {
    discount_base(rate)?;
    npv_and_derivative(cash_flows, rate)
        .map(|(value, _)| value)
        .ok_or_else(|| BondValuationError::DivisionByZero {
            context: format!("NPV discounting at rate {rate}"),
        })
}

/// Periodic internal rate of return by Newton-Raphson from the default guess.
pub fn solve_irr(cash_flows: &[Money]) -> BondValuationResult<Rate> {
    irr(cash_flows, DEFAULT_IRR_GUESS)
}

/// Internal Rate of Return using Newton-Raphson.
///
/// Stops once `|npv| < 1e-10` or the step shrinks below `1e-10` strictly
/// inside [-0.99, 100]. A flat NPV curve aborts with `DivisionByZero`. Running
/// out of iterations, or settling on a bound because no root lies inside, is
/// `NonConvergent`.
pub fn irr(cash_flows: &[Money], guess: Rate) -> BondValuationResult<Rate> {
    newton_irr(cash_flows, guess, MAX_IRR_ITERATIONS)
}

fn newton_irr(cash_flows: &[Money], guess: Rate, max_iterations: u32) -> BondValuationResult<Rate> {
    if cash_flows.len() < 2 {
        return Err(BondValuationError::InvalidInput {
            field: "cash_flows".into(),
            reason: "IRR requires at least 2 cash flows".into(),
        });
    }

    let mut rate = guess;
    let mut last_npv = Decimal::ZERO;

    for i in 0..max_iterations {
        let Some((npv_val, dnpv)) = npv_and_derivative(cash_flows, rate) else {
            return Err(BondValuationError::NonConvergent {
                function: "IRR".into(),
                iterations: i,
                last_npv,
            });
        };
        last_npv = npv_val;
        trace!(iteration = i, rate = %rate, npv = %npv_val, "newton step");

        if npv_val.abs() < NPV_TOLERANCE {
            return Ok(rate);
        }
        if dnpv.is_zero() {
            return Err(BondValuationError::DivisionByZero {
                context: format!("IRR derivative at iteration {i}"),
            });
        }

        let Some(next) = npv_val.checked_div(dnpv).and_then(|step| rate.checked_sub(step)) else {
            return Err(BondValuationError::NonConvergent {
                function: "IRR".into(),
                iterations: i + 1,
                last_npv,
            });
        };
        let next = next.clamp(MIN_RATE, MAX_RATE);

        if (next - rate).abs() < STEP_TOLERANCE {
            if next <= MIN_RATE || next >= MAX_RATE {
                // Pinned to a bound: the NPV has no root inside the range
                return Err(BondValuationError::NonConvergent {
                    function: "IRR".into(),
                    iterations: i + 1,
                    last_npv,
                });
            }
            return Ok(next);
        }
        rate = next;
    }

    Err(BondValuationError::NonConvergent {
        function: "IRR".into(),
        iterations: max_iterations,
        last_npv,
    })
}

/// NPV and dNPV/dr, or `None` when discounting leaves the decimal range.
fn npv_and_derivative(cash_flows: &[Money], rate: Rate) -> Option<(Money, Decimal)> {
    let one_plus_r = Decimal::ONE + rate;
    let mut value = Decimal::ZERO;
    let mut derivative = Decimal::ZERO;
    let mut growth = Decimal::ONE;

    for (t, cf) in cash_flows.iter().enumerate() {
        if t > 0 {
            match growth.checked_mul(one_plus_r) {
                Some(g) => growth = g,
                // Remaining terms are below decimal resolution
                None => break,
            }
        }
        value = value.checked_add(cf.checked_div(growth)?)?;
        if t > 0 {
            let t_dec = Decimal::from(t as u64);
            let term = (t_dec * cf).checked_div(growth)?.checked_div(one_plus_r)?;
            derivative = derivative.checked_sub(term)?;
        }
    }

    Some((value, derivative))
}

fn discount_base(rate: Rate) -> BondValuationResult<Decimal> {
    if rate <= dec!(-1) {
        return Err(BondValuationError::InvalidRate {
            field: "discount_rate".into(),
            reason: "Discount rate must be greater than -100%".into(),
        });
    }
    Ok(Decimal::ONE + rate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_npv_basic() {
        let cfs = vec![dec!(-1000), dec!(300), dec!(400), dec!(500)];
        let result = npv(dec!(0.10), &cfs).unwrap();
        // -1000 + 300/1.1 + 400/1.21 + 500/1.331 ≈ -21.04
        assert!((result - dec!(-21.04)).abs() < dec!(0.01));
    }

    #[test]
    fn test_npv_zero_rate() {
        let cfs = vec![dec!(-100), dec!(50), dec!(50), dec!(50)];
        assert_eq!(npv(Decimal::ZERO, &cfs).unwrap(), dec!(50));
    }

    #[test]
    fn test_present_value_dated() {
        let flows = vec![(1, dec!(110)), (2, dec!(121))];
        let pv = present_value(&flows, dec!(0.10)).unwrap();
        assert_eq!(pv, dec!(200));
    }

    #[test]
    fn test_present_value_rejects_rate_below_minus_one() {
        let err = present_value(&[(1, dec!(1))], dec!(-1)).unwrap_err();
        assert!(matches!(err, BondValuationError::InvalidRate { .. }));
    }

    #[test]
    fn test_irr_single_period() {
        let r = solve_irr(&[dec!(-100), dec!(110)]).unwrap();
        assert!((r - dec!(0.10)).abs() < dec!(0.00000001));
    }

    #[test]
    fn test_irr_annuity() {
        let cfs = vec![dec!(-1000), dec!(400), dec!(400), dec!(400)];
        let r = solve_irr(&cfs).unwrap();
        // IRR ≈ 9.70%
        assert!((r - dec!(0.0970)).abs() < dec!(0.0001));
        assert!(npv(r, &cfs).unwrap().abs() < dec!(0.000001));
    }

    #[test]
    fn test_irr_issuer_sign_convention() {
        // Receive 1000 today, repay 1100 next period => cost of 10%
        let r = solve_irr(&[dec!(1000), dec!(-1100)]).unwrap();
        assert!((r - dec!(0.10)).abs() < dec!(0.00000001));
    }

    #[test]
    fn test_irr_flat_curve_is_division_by_zero() {
        // Only a t=0 flow has any weight: dNPV/dr is exactly zero
        let err = solve_irr(&[dec!(-100), Decimal::ZERO]).unwrap_err();
        assert!(matches!(err, BondValuationError::DivisionByZero { .. }));
    }

    #[test]
    fn test_irr_requires_two_flows() {
        assert!(solve_irr(&[dec!(-100)]).is_err());
    }

    #[test]
    fn test_irr_without_root_is_non_convergent() {
        // NPV = -100 - 10/(1+r) stays negative for every rate
        let err = solve_irr(&[dec!(-100), dec!(-10)]).unwrap_err();
        match err {
            BondValuationError::NonConvergent { function, last_npv, .. } => {
                assert_eq!(function, "IRR");
                // Evaluated at the upper bound: -100 - 10/101
                assert!(last_npv < dec!(-100.09) && last_npv > dec!(-100.1));
            }
            other => panic!("expected NonConvergent, got {other:?}"),
        }
    }

    #[test]
    fn test_irr_positive_flows_do_not_report_a_rate() {
        let err = solve_irr(&[dec!(100), dec!(10), dec!(10)]).unwrap_err();
        assert!(matches!(err, BondValuationError::NonConvergent { .. }));
    }

    #[test]
    fn test_irr_out_of_iterations() {
        let cfs = vec![dec!(-1000), dec!(400), dec!(400), dec!(400)];
        let err = newton_irr(&cfs, DEFAULT_IRR_GUESS, 1).unwrap_err();
        match err {
            BondValuationError::NonConvergent {
                iterations,
                last_npv,
                ..
            } => {
                assert_eq!(iterations, 1);
                assert_eq!(last_npv, npv(DEFAULT_IRR_GUESS, &cfs).unwrap());
            }
            other => panic!("expected NonConvergent, got {other:?}"),
        }
    }

    #[test]
    fn test_present_value_skips_terms_beyond_decimal_range() {
        // 2^100 overflows; that term is far below a cent
        let pv = present_value(&[(1, dec!(2)), (100, dec!(1))], Decimal::ONE).unwrap();
        assert_eq!(pv, Decimal::ONE);
    }
}
