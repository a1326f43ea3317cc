use bond_valuation_core::rates::{annualize, periodic_rate};
use bond_valuation_core::schedule::generate;
use bond_valuation_core::terms::{BondTerms, GraceKind, GracePeriod, IssuanceCosts, RateKind};
use bond_valuation_core::time_value::{present_value, solve_irr, PeriodFlow};
use bond_valuation_core::Precision;
use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

const FREQUENCIES: [u32; 6] = [1, 2, 3, 4, 6, 12];

fn terms_strategy() -> impl Strategy<Value = BondTerms> {
    (
        1u32..=1_000_000,
        1u32..=10,
        0usize..FREQUENCIES.len(),
        1u32..=300,
        prop_oneof![
            Just(GraceKind::None),
            Just(GraceKind::Partial),
            Just(GraceKind::Total)
        ],
        0u32..=6,
    )
        .prop_map(|(face, years, freq_idx, rate_tenths, kind, grace)| {
            let periods_per_year = FREQUENCIES[freq_idx];
            let total = years * periods_per_year;
            BondTerms {
                face_value: Decimal::from(face),
                market_value: Decimal::from(face),
                years,
                periods_per_year,
                day_basis: 360,
                rate_kind: RateKind::Effective,
                coupon_rate: Decimal::new(rate_tenths as i64, 1),
                compounding_frequency: None,
                discount_rate: dec!(8),
                income_tax_rate: dec!(30),
                redemption_premium_pct: Decimal::ZERO,
                costs: IssuanceCosts::default(),
                grace: GracePeriod::new(kind, grace.min(total - 1)),
                issue_date: None,
            }
        })
}

fn coupon_rate(terms: &BondTerms) -> Decimal {
    periodic_rate(
        terms.coupon_rate,
        terms.rate_kind,
        terms.compounding_frequency,
        terms.periods_per_year,
        &Precision::default(),
    )
    .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn schedule_closes_at_zero(terms in terms_strategy()) {
        let sched = generate(&terms, coupon_rate(&terms), &Precision::default()).unwrap();
        prop_assert_eq!(sched.len() as u32, terms.total_periods());
        prop_assert_eq!(sched.last().unwrap().balance_after, Decimal::ZERO);
        prop_assert!(sched.iter().all(|p| p.balance_after >= Decimal::ZERO));
    }

    #[test]
    fn amortization_foots_to_principal(terms in terms_strategy()) {
        let sched = generate(&terms, coupon_rate(&terms), &Precision::default()).unwrap();
        let amortized: Decimal = sched.iter().map(|p| p.amortization).sum();
        let capitalized: Decimal = sched.iter().map(|p| p.capitalized_interest).sum();
        match terms.grace.kind {
            GraceKind::Total => prop_assert_eq!(amortized, terms.face_value + capitalized),
            _ => {
                prop_assert_eq!(capitalized, Decimal::ZERO);
                prop_assert_eq!(amortized, terms.face_value);
            }
        }
    }

    #[test]
    fn present_value_falls_as_discount_rate_rises(
        terms in terms_strategy(),
        low in 0u32..=150,
        gap in 1u32..=150,
    ) {
        let sched = generate(&terms, coupon_rate(&terms), &Precision::default()).unwrap();
        let flows: Vec<PeriodFlow> = sched.iter().map(|p| (p.period, p.gross_payment())).collect();
        let p = Precision::default();
        let r_low = periodic_rate(Decimal::new(low as i64, 1), RateKind::Effective, None, terms.periods_per_year, &p).unwrap();
        let r_high = periodic_rate(Decimal::new((low + gap) as i64, 1), RateKind::Effective, None, terms.periods_per_year, &p).unwrap();
        prop_assert!(present_value(&flows, r_high).unwrap() < present_value(&flows, r_low).unwrap());
    }

    #[test]
    fn effective_rate_round_trip(tenths in 0u32..=500, idx in 0usize..FREQUENCIES.len()) {
        let freq = FREQUENCIES[idx];
        let annual = Decimal::new(tenths as i64, 1);
        let r = periodic_rate(annual, RateKind::Effective, None, freq, &Precision::default()).unwrap();
        let back = annualize(r, freq).unwrap();
        prop_assert!((back - annual / dec!(100)).abs() < dec!(0.000000001));
    }

    #[test]
    fn irr_recovers_single_period_rate(pct in 1u32..=50) {
        let r = Decimal::from(pct) / dec!(100);
        let solved = solve_irr(&[dec!(-100), dec!(100) * (Decimal::ONE + r)]).unwrap();
        prop_assert!((solved - r).abs() < dec!(0.00000001));
    }
}
