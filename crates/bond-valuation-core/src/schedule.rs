use chrono::{Days, NaiveDate};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::BondValuationError;
use crate::rates::compound;
use crate::terms::{BondTerms, GraceKind};
use crate::types::{Money, Precision, Rate};
use crate::BondValuationResult;

/// A single coupon period of the amortization schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CashFlowPeriod {
    /// 1-based period index
    pub period: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_date: Option<NaiveDate>,
    pub opening_balance: Money,
    /// Cash paid to the bondholder, excluding the redemption premium
    pub coupon: Money,
    pub interest: Money,
    pub amortization: Money,
    /// Interest added to the balance instead of being paid (Total grace only)
    pub capitalized_interest: Money,
    /// Redemption premium, nonzero only on the final period
    pub premium: Money,
    pub balance_after: Money,
    pub in_grace: bool,
}

impl CashFlowPeriod {
    /// Total cash received by the bondholder on this date.
    pub fn gross_payment(&self) -> Money {
        self.coupon + self.premium
    }

    /// Presentation copy with every amount rounded to `dp` places.
    pub fn rounded(&self, dp: u32) -> CashFlowPeriod {
        let p = Precision::new(dp, dp);
        let r = |v: Decimal| p.display(v);
        CashFlowPeriod {
            opening_balance: r(self.opening_balance),
            coupon: r(self.coupon),
            interest: r(self.interest),
            amortization: r(self.amortization),
            capitalized_interest: r(self.capitalized_interest),
            premium: r(self.premium),
            balance_after: r(self.balance_after),
            ..self.clone()
        }
    }
}

/// Constant French-method installment: `P * r / (1 - (1+r)^-n)`.
pub fn constant_installment(principal: Money, rate: Rate, periods: u32) -> BondValuationResult<Money> {
    if periods == 0 {
        return Err(BondValuationError::DegenerateSchedule(
            "no payable periods left to amortize the principal".into(),
        ));
    }
    if rate <= Decimal::ZERO {
        return Err(BondValuationError::DegenerateSchedule(format!(
            "annuity factor is undefined for a periodic rate of {rate}"
        )));
    }

    // A growth factor past the decimal range leaves (1+r)^-n below resolution
    let annuity = match compound(Decimal::ONE + rate, periods) {
        Some(growth) => Decimal::ONE - Decimal::ONE / growth,
        None => Decimal::ONE,
    };
    if annuity.is_zero() {
        return Err(BondValuationError::DivisionByZero {
            context: "French annuity factor".into(),
        });
    }
    principal
        .checked_mul(rate)
        .and_then(|payment| payment.checked_div(annuity))
        .ok_or_else(|| {
            BondValuationError::DegenerateSchedule("installment exceeds the decimal range".into())
        })
}

fn overflow(amount: &str, period: u32) -> BondValuationError {
    BondValuationError::DegenerateSchedule(format!(
        "{amount} for period {period} exceeds the decimal range"
    ))
}

/// Build the full period-by-period schedule under the French method.
///
/// The installment is sized on the balance outstanding when grace ends and
/// spread over the periods left after the grace window. The final period
/// absorbs any rounding residue so the balance closes at exactly zero.
pub fn generate(
    terms: &BondTerms,
    periodic_coupon_rate: Rate,
    precision: &Precision,
) -> BondValuationResult<Vec<CashFlowPeriod>> {
    let total_periods = terms.total_periods();
    let grace_periods = terms.grace_periods();
    let payable_periods = total_periods.saturating_sub(grace_periods);

    if payable_periods == 0 || periodic_coupon_rate <= Decimal::ZERO {
        return Err(BondValuationError::DegenerateSchedule(format!(
            "{payable_periods} payable periods at a periodic rate of {periodic_coupon_rate}"
        )));
    }

    let r = periodic_coupon_rate;
    let premium = precision.round(terms.redemption_premium_pct / dec!(100) * terms.face_value);

    let mut schedule = Vec::with_capacity(total_periods as usize);
    let mut balance = terms.face_value;
    let mut installment: Option<Money> = None;

    for period in 1..=total_periods {
        let opening_balance = balance;
        let in_grace = period <= grace_periods;
        let is_final = period == total_periods;

        let mut interest = Decimal::ZERO;
        let mut capitalized_interest = Decimal::ZERO;
        let mut amortization = Decimal::ZERO;
        let coupon;

        if in_grace {
            match terms.grace.kind {
                GraceKind::Total => {
                    capitalized_interest = period_interest(balance, r, period, precision)?;
                    balance = balance
                        .checked_add(capitalized_interest)
                        .ok_or_else(|| overflow("capitalized balance", period))?;
                    coupon = Decimal::ZERO;
                }
                _ => {
                    interest = period_interest(balance, r, period, precision)?;
                    coupon = interest;
                }
            }
        } else {
            let fixed = match installment {
                Some(value) => value,
                None => {
                    let value = precision.round(constant_installment(balance, r, payable_periods)?);
                    debug!(
                        period,
                        principal = %balance,
                        installment = %value,
                        payable_periods,
                        "sized constant installment"
                    );
                    installment = Some(value);
                    value
                }
            };
            interest = period_interest(balance, r, period, precision)?;
            coupon = fixed;
            amortization = if is_final { balance } else { fixed - interest };
            balance = (balance - amortization).max(Decimal::ZERO);
        }

        schedule.push(CashFlowPeriod {
            period,
            payment_date: payment_date(terms, period)?,
            opening_balance,
            coupon,
            interest,
            amortization,
            capitalized_interest,
            premium: if is_final { premium } else { Decimal::ZERO },
            balance_after: balance,
            in_grace,
        });
    }

    Ok(schedule)
}

fn period_interest(balance: Money, rate: Rate, period: u32, precision: &Precision) -> BondValuationResult<Money> {
    balance
        .checked_mul(rate)
        .map(|interest| precision.round(interest))
        .ok_or_else(|| overflow("interest", period))
}

/// Coupon date `issue_date + round(period * day_basis / periods_per_year)` days.
fn payment_date(terms: &BondTerms, period: u32) -> BondValuationResult<Option<NaiveDate>> {
    let Some(issue_date) = terms.issue_date else {
        return Ok(None);
    };
    let offset = (Decimal::from(period) * terms.days_per_period())
        .round()
        .to_u64()
        .unwrap_or(0);
    issue_date
        .checked_add_days(Days::new(offset))
        .map(Some)
        .ok_or_else(|| BondValuationError::InvalidInput {
            field: "issue_date".into(),
            reason: format!("coupon date for period {period} is out of range"),
        })
}
