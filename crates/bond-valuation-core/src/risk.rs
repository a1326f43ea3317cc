use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::BondValuationError;
use crate::time_value::PeriodFlow;
use crate::types::{Money, Rate, Years};
use crate::BondValuationResult;

/// Price sensitivity measures of a discounted flow series.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskMetrics {
    /// Sum of discounted flows
    pub present_value: Money,
    /// Weighted-average time of discounted flows, in years
    pub macaulay_duration: Years,
    /// Macaulay duration / (1 + r)
    pub modified_duration: Years,
    /// Second-order sensitivity, in years squared
    pub convexity: Decimal,
}

/// Macaulay duration, modified duration and convexity at a periodic rate.
///
/// Each flow is discounted once; the same `vp_t` feeds all three sums.
/// Period-based results are converted to years with `periods_per_year`.
pub fn duration_convexity(
    flows: &[PeriodFlow],
    periodic_rate: Rate,
    periods_per_year: u32,
) -> BondValuationResult<RiskMetrics> {
    if periods_per_year == 0 {
        return Err(BondValuationError::InvalidInput {
            field: "periods_per_year".into(),
            reason: "Periods per year must be positive".into(),
        });
    }
    let one_plus_r = Decimal::ONE + periodic_rate;
    if one_plus_r <= Decimal::ZERO {
        return Err(BondValuationError::InvalidRate {
            field: "discount_rate".into(),
            reason: "Discount rate must be greater than -100%".into(),
        });
    }

    let mut pv_total = Decimal::ZERO;
    let mut time_weighted = Decimal::ZERO;
    let mut convexity_weighted = Decimal::ZERO;
    let mut df = Decimal::ONE;
    let mut df_period = 0u32;

    let mut sorted: Vec<PeriodFlow> = flows.to_vec();
    sorted.sort_by_key(|&(t, _)| t);

    'flows: for (t, amount) in sorted {
        while df_period < t {
            match df.checked_mul(one_plus_r) {
                Some(next) => df = next,
                // Later flows discount to below decimal resolution
                None => break 'flows,
            }
            df_period += 1;
        }
        let vp = amount / df;
        let t_dec = Decimal::from(t);
        pv_total += vp;
        time_weighted += t_dec * vp;
        convexity_weighted += t_dec * (t_dec + Decimal::ONE) * vp;
    }

    if pv_total.is_zero() {
        return Err(BondValuationError::ZeroPresentValue {
            context: "duration and convexity".into(),
        });
    }

    let freq = Decimal::from(periods_per_year);
    let macaulay_duration = time_weighted / pv_total / freq;
    let modified_duration = macaulay_duration / one_plus_r;
    let convexity = convexity_weighted / (pv_total * one_plus_r * one_plus_r) / (freq * freq);

    Ok(RiskMetrics {
        present_value: pv_total,
        macaulay_duration,
        modified_duration,
        convexity,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn assert_close(actual: Decimal, expected: Decimal, tolerance: Decimal, label: &str) {
        assert!(
            (actual - expected).abs() < tolerance,
            "{label}: expected ~{expected}, got {actual}"
        );
    }

    #[test]
    fn test_zero_coupon_macaulay_equals_maturity() {
        // Single flow at period 10 of a semiannual bond => 5 years
        let m = duration_convexity(&[(10, dec!(1000))], dec!(0.04), 2).unwrap();
        assert_close(m.macaulay_duration, dec!(5), dec!(0.0000001), "macaulay");
        assert_close(m.modified_duration, dec!(5) / dec!(1.04), dec!(0.0000001), "modified");
        // t(t+1) / (1+r)^2 / f^2 = 110 / 1.0816 / 4
        assert_close(m.convexity, dec!(110) / dec!(1.0816) / dec!(4), dec!(0.0000001), "convexity");
    }

    #[test]
    fn test_coupon_flows_shorter_than_maturity() {
        let flows: Vec<PeriodFlow> = (1..=5).map(|t| (t, dec!(250))).collect();
        let m = duration_convexity(&flows, dec!(0.08), 1).unwrap();
        assert!(m.macaulay_duration < dec!(5));
        assert!(m.macaulay_duration > dec!(1));
        assert!(m.convexity > Decimal::ZERO);
    }

    #[test]
    fn test_higher_rate_lower_duration() {
        let flows: Vec<PeriodFlow> = (1..=10).map(|t| (t, dec!(130))).collect();
        let low = duration_convexity(&flows, dec!(0.02), 2).unwrap();
        let high = duration_convexity(&flows, dec!(0.06), 2).unwrap();
        assert!(high.macaulay_duration < low.macaulay_duration);
        assert!(high.present_value < low.present_value);
    }

    #[test]
    fn test_unsorted_input_matches_sorted() {
        let sorted = vec![(1, dec!(50)), (2, dec!(50)), (3, dec!(1050))];
        let shuffled = vec![(3, dec!(1050)), (1, dec!(50)), (2, dec!(50))];
        let a = duration_convexity(&sorted, dec!(0.05), 1).unwrap();
        let b = duration_convexity(&shuffled, dec!(0.05), 1).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_zero_flows_error() {
        let err = duration_convexity(&[(1, Decimal::ZERO), (2, Decimal::ZERO)], dec!(0.05), 2)
            .unwrap_err();
        assert!(matches!(err, BondValuationError::ZeroPresentValue { .. }));
    }

    #[test]
    fn test_long_high_rate_series_does_not_overflow() {
        // (1.5)^t leaves the decimal range well before period 300
        let flows: Vec<PeriodFlow> = (1..=300).map(|t| (t, dec!(100))).collect();
        let m = duration_convexity(&flows, dec!(0.5), 1).unwrap();
        // Perpetuity value 100 / 0.5
        assert_close(m.present_value, dec!(200), dec!(0.000001), "pv");
        // Perpetuity duration (1+r)/r
        assert_close(m.macaulay_duration, dec!(3), dec!(0.000001), "macaulay");
    }
}
