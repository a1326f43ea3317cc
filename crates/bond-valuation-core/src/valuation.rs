use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::debug;

use crate::costs::{allocate, CostLine};
use crate::rates::{annualize, effective_annual_rate, periodic_rate};
use crate::risk::duration_convexity;
use crate::schedule::{generate, CashFlowPeriod};
use crate::terms::{BondTerms, GraceKind, RateKind, Responsibility};
use crate::time_value::{present_value, solve_irr, PeriodFlow};
use crate::types::{with_metadata, ComputationOutput, Money, Percent, Precision, Years};
use crate::BondValuationResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Cash exchanged on one date, seen from each side. Period 0 is issuance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodFlows {
    pub period: u32,
    /// Net proceeds at issuance, then minus coupon and premium
    pub issuer_flow: Money,
    /// Income tax saved on the period's interest
    pub tax_shield: Money,
    pub issuer_flow_with_shield: Money,
    /// Minus price and costs at issuance, then coupon and premium
    pub bondholder_flow: Money,
}

/// Everything derived from one set of bond terms.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValuationReport {
    pub total_periods: u32,
    pub days_per_period: Decimal,
    /// Effective annual coupon rate (percent)
    pub tea: Percent,
    /// Effective coupon rate per period (percent)
    pub periodic_coupon_rate: Percent,
    /// Effective discount rate per period (percent)
    pub periodic_discount_rate: Percent,
    pub issuer_upfront_costs: Money,
    pub bondholder_upfront_costs: Money,
    pub cost_breakdown: Vec<CostLine>,
    /// PV of the bondholder's coupons and premium at the discount rate
    pub present_value: Money,
    /// Highest price a bondholder requiring the discount rate would pay
    pub max_market_price: Money,
    /// present_value - market_value - bondholder_upfront_costs
    pub bondholder_npv: Money,
    pub macaulay_duration: Years,
    pub modified_duration: Years,
    pub convexity: Decimal,
    /// Issuer's effective annual cost (percent)
    pub tcea_issuer: Percent,
    pub tcea_issuer_with_tax_shield: Percent,
    /// Bondholder's effective annual return (percent)
    pub trea_bondholder: Percent,
    pub schedule: Vec<CashFlowPeriod>,
    pub flows: Vec<PeriodFlows>,
}

impl ValuationReport {
    /// Copy with every amount and rate rounded to `dp` fractional digits.
    pub fn rounded(&self, dp: u32) -> ValuationReport {
        let p = Precision::new(dp, dp);
        let r = |v: Decimal| p.display(v);
        ValuationReport {
            total_periods: self.total_periods,
            days_per_period: r(self.days_per_period),
            tea: r(self.tea),
            periodic_coupon_rate: r(self.periodic_coupon_rate),
            periodic_discount_rate: r(self.periodic_discount_rate),
            issuer_upfront_costs: r(self.issuer_upfront_costs),
            bondholder_upfront_costs: r(self.bondholder_upfront_costs),
            cost_breakdown: self
                .cost_breakdown
                .iter()
                .map(|line| CostLine {
                    amount: r(line.amount),
                    ..line.clone()
                })
                .collect(),
            present_value: r(self.present_value),
            max_market_price: r(self.max_market_price),
            bondholder_npv: r(self.bondholder_npv),
            macaulay_duration: r(self.macaulay_duration),
            modified_duration: r(self.modified_duration),
            convexity: r(self.convexity),
            tcea_issuer: r(self.tcea_issuer),
            tcea_issuer_with_tax_shield: r(self.tcea_issuer_with_tax_shield),
            trea_bondholder: r(self.trea_bondholder),
            schedule: self.schedule.iter().map(|c| c.rounded(dp)).collect(),
            flows: self
                .flows
                .iter()
                .map(|f| PeriodFlows {
                    period: f.period,
                    issuer_flow: r(f.issuer_flow),
                    tax_shield: r(f.tax_shield),
                    issuer_flow_with_shield: r(f.issuer_flow_with_shield),
                    bondholder_flow: r(f.bondholder_flow),
                })
                .collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Value a bond with the default precision.
pub fn evaluate(terms: &BondTerms) -> BondValuationResult<ValuationReport> {
    evaluate_with(terms, &Precision::default())
}

/// Value a bond: schedule, costs, present value, risk and the three yields.
///
/// TCEA and TREA are all solved by Newton-Raphson over the respective flow
/// series and annualized as `(1 + irr)^periods_per_year - 1`.
pub fn evaluate_with(
    terms: &BondTerms,
    precision: &Precision,
) -> BondValuationResult<ValuationReport> {
    terms.validate()?;

    let freq = terms.periods_per_year;
    let tea = effective_annual_rate(terms.coupon_rate, terms.rate_kind, terms.compounding_frequency)?;
    let coupon_rate = periodic_rate(
        terms.coupon_rate,
        terms.rate_kind,
        terms.compounding_frequency,
        freq,
        precision,
    )?;
    let discount_rate = periodic_rate(terms.discount_rate, RateKind::Effective, None, freq, precision)?;
    debug!(%tea, %coupon_rate, %discount_rate, "periodic rates");

    let costs = allocate(&terms.costs.items(), terms.market_value);
    let schedule = generate(terms, coupon_rate, precision)?;
    let flows = build_flows(terms, &schedule, costs.issuer_total, costs.bondholder_total, precision);

    let receipts: Vec<PeriodFlow> = schedule
        .iter()
        .map(|p| (p.period, p.gross_payment()))
        .collect();
    let pv = precision.round(present_value(&receipts, discount_rate)?);
    let risk = duration_convexity(&receipts, discount_rate, freq)?;

    let issuer: Vec<Money> = flows.iter().map(|f| f.issuer_flow).collect();
    let issuer_shielded: Vec<Money> = flows.iter().map(|f| f.issuer_flow_with_shield).collect();
    let bondholder: Vec<Money> = flows.iter().map(|f| f.bondholder_flow).collect();

    let irr_issuer = solve_irr(&issuer)?;
    let irr_issuer_shielded = solve_irr(&issuer_shielded)?;
    let irr_bondholder = solve_irr(&bondholder)?;
    debug!(
        %irr_issuer,
        %irr_issuer_shielded,
        %irr_bondholder,
        "periodic internal rates of return"
    );

    let as_pct = |r: Decimal| precision.round(r * dec!(100));

    Ok(ValuationReport {
        total_periods: terms.total_periods(),
        days_per_period: terms.days_per_period(),
        tea: as_pct(tea),
        periodic_coupon_rate: as_pct(coupon_rate),
        periodic_discount_rate: as_pct(discount_rate),
        issuer_upfront_costs: precision.round(costs.issuer_total),
        bondholder_upfront_costs: precision.round(costs.bondholder_total),
        cost_breakdown: costs.lines,
        present_value: pv,
        max_market_price: pv,
        bondholder_npv: precision.round(pv - terms.market_value - costs.bondholder_total),
        macaulay_duration: precision.round(risk.macaulay_duration),
        modified_duration: precision.round(risk.modified_duration),
        convexity: precision.round(risk.convexity),
        tcea_issuer: as_pct(annualize(irr_issuer, freq)?),
        tcea_issuer_with_tax_shield: as_pct(annualize(irr_issuer_shielded, freq)?),
        trea_bondholder: as_pct(annualize(irr_bondholder, freq)?),
        schedule,
        flows,
    })
}

/// Value a bond and wrap the report in the standard output envelope.
pub fn value_bond(
    terms: &BondTerms,
    precision: &Precision,
) -> BondValuationResult<ComputationOutput<ValuationReport>> {
    let start = Instant::now();
    let report = evaluate_with(terms, precision)?;
    let warnings = collect_warnings(terms, &report);

    let elapsed = start.elapsed().as_micros() as u64;
    let assumptions = serde_json::json!({
        "amortization": "French (constant installment)",
        "rate_kind": terms.rate_kind,
        "periods_per_year": terms.periods_per_year,
        "day_basis": terms.day_basis,
        "discount_rate": "effective annual",
        "grace": terms.grace,
        "trea_convention": "IRR of bondholder flows",
        "both_responsibility": "full amount charged to each side",
    });

    Ok(with_metadata(
        "French-Method Bond Valuation (TCEA, TREA, Duration, Convexity)",
        &assumptions,
        warnings,
        elapsed,
        precision,
        report,
    ))
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

fn build_flows(
    terms: &BondTerms,
    schedule: &[CashFlowPeriod],
    issuer_costs: Money,
    bondholder_costs: Money,
    precision: &Precision,
) -> Vec<PeriodFlows> {
    let tax = terms.income_tax_rate / dec!(100);
    let issuance = PeriodFlows {
        period: 0,
        issuer_flow: terms.market_value - issuer_costs,
        tax_shield: Decimal::ZERO,
        issuer_flow_with_shield: terms.market_value - issuer_costs,
        bondholder_flow: -(terms.market_value + bondholder_costs),
    };

    std::iter::once(issuance)
        .chain(schedule.iter().map(|p| {
            let gross = p.gross_payment();
            let tax_shield = precision.round(p.interest * tax);
            PeriodFlows {
                period: p.period,
                issuer_flow: -gross,
                tax_shield,
                issuer_flow_with_shield: tax_shield - gross,
                bondholder_flow: gross,
            }
        }))
        .collect()
}

fn collect_warnings(terms: &BondTerms, report: &ValuationReport) -> Vec<String> {
    let mut warnings = Vec::new();

    if terms.grace.kind == GraceKind::Total && terms.grace_periods() > 0 {
        let capitalized: Money = report.schedule.iter().map(|p| p.capitalized_interest).sum();
        warnings.push(format!(
            "Total grace over {} periods capitalized {} of interest into the balance",
            terms.grace_periods(),
            capitalized.round_dp(2)
        ));
    }

    let shared: Vec<&str> = terms
        .costs
        .items()
        .iter()
        .filter(|i| i.responsibility == Responsibility::Both && !i.percentage.is_zero())
        .map(|i| i.kind.name())
        .collect();
    if !shared.is_empty() {
        warnings.push(format!(
            "Cost items charged in full to both issuer and bondholder: {}",
            shared.join(", ")
        ));
    }

    if report.bondholder_npv < Decimal::ZERO {
        warnings.push(format!(
            "Bondholder NPV is negative ({}): the market value exceeds the price justified by the discount rate",
            report.bondholder_npv.round_dp(2)
        ));
    }

    warnings
}
