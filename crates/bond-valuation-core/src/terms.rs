use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::BondValuationError;
use crate::types::{Money, Percent};
use crate::BondValuationResult;

/// Coupon frequencies accepted for `periods_per_year`.
pub const SUPPORTED_FREQUENCIES: [u32; 6] = [1, 2, 3, 4, 6, 12];

/// Day-count bases accepted for `day_basis`.
pub const SUPPORTED_DAY_BASES: [u32; 2] = [360, 365];

/// How the stated coupon rate is quoted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RateKind {
    /// Nominal annual rate, capitalized `compounding_frequency` times a year
    Nominal,
    /// Effective annual rate
    Effective,
}

/// Which party bears an issuance cost item.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Responsibility {
    #[default]
    Issuer,
    Bondholder,
    /// Each side bears the full stated amount.
    Both,
}

impl Responsibility {
    pub fn charges_issuer(self) -> bool {
        matches!(self, Responsibility::Issuer | Responsibility::Both)
    }

    pub fn charges_bondholder(self) -> bool {
        matches!(self, Responsibility::Bondholder | Responsibility::Both)
    }
}

/// A single percentage-based cost as written in the bond terms.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostTerm {
    /// Percent of market value (0.45 = 0.45%)
    #[serde(default)]
    pub percentage: Percent,
    #[serde(default)]
    pub responsibility: Responsibility,
}

impl CostTerm {
    pub fn new(percentage: Percent, responsibility: Responsibility) -> Self {
        Self {
            percentage,
            responsibility,
        }
    }
}

/// Identifies an issuance cost item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CostKind {
    Structuring,
    Placement,
    Flotation,
    Cavali,
    Premium,
}

impl CostKind {
    pub fn name(self) -> &'static str {
        match self {
            CostKind::Structuring => "structuring",
            CostKind::Placement => "placement",
            CostKind::Flotation => "flotation",
            CostKind::Cavali => "cavali",
            CostKind::Premium => "premium",
        }
    }
}

/// A cost term tagged with the item it belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostItem {
    pub kind: CostKind,
    pub percentage: Percent,
    pub responsibility: Responsibility,
}

/// The upfront cost items charged at issuance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuanceCosts {
    #[serde(default)]
    pub structuring: CostTerm,
    #[serde(default)]
    pub placement: CostTerm,
    #[serde(default)]
    pub flotation: CostTerm,
    /// CAVALI custody and settlement fee
    #[serde(default)]
    pub cavali: CostTerm,
    /// Upfront premium, when quoted as an issuance cost
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub premium: Option<CostTerm>,
}

impl IssuanceCosts {
    /// Flatten into tagged items, in a fixed order.
    pub fn items(&self) -> Vec<CostItem> {
        let mut items = vec![
            tag(CostKind::Structuring, self.structuring),
            tag(CostKind::Placement, self.placement),
            tag(CostKind::Flotation, self.flotation),
            tag(CostKind::Cavali, self.cavali),
        ];
        if let Some(premium) = self.premium {
            items.push(tag(CostKind::Premium, premium));
        }
        items
    }
}

fn tag(kind: CostKind, term: CostTerm) -> CostItem {
    CostItem {
        kind,
        percentage: term.percentage,
        responsibility: term.responsibility,
    }
}

/// Grace treatment applied to the first `period_count` coupon periods.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GraceKind {
    #[default]
    None,
    /// Nothing is paid; interest capitalizes into the balance
    Total,
    /// Interest only; principal untouched
    Partial,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GracePeriod {
    #[serde(default)]
    pub kind: GraceKind,
    #[serde(default)]
    pub period_count: u32,
}

impl GracePeriod {
    pub fn new(kind: GraceKind, period_count: u32) -> Self {
        Self { kind, period_count }
    }

    /// Number of periods actually under grace. Zero when the kind is `None`.
    pub fn active_periods(&self) -> u32 {
        match self.kind {
            GraceKind::None => 0,
            GraceKind::Total | GraceKind::Partial => self.period_count,
        }
    }
}

/// Issuance terms of a bond amortized under the French method.
///
/// Owned by the caller; every engine function borrows it read-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BondTerms {
    /// Principal amortized over the life of the bond
    pub face_value: Money,
    /// Price paid at issuance
    pub market_value: Money,
    pub years: u32,
    /// Coupon frequency: 1, 2, 3, 4, 6 or 12
    pub periods_per_year: u32,
    /// 360 or 365
    pub day_basis: u32,
    pub rate_kind: RateKind,
    /// Annual coupon rate in percent
    pub coupon_rate: Percent,
    /// Capitalizations per year; required for nominal rates
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compounding_frequency: Option<u32>,
    /// Annual effective opportunity rate in percent, used to discount bondholder flows
    pub discount_rate: Percent,
    /// Income tax rate in percent
    pub income_tax_rate: Percent,
    /// Percent of face value paid once with the final coupon
    #[serde(default)]
    pub redemption_premium_pct: Percent,
    #[serde(default)]
    pub costs: IssuanceCosts,
    #[serde(default)]
    pub grace: GracePeriod,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issue_date: Option<NaiveDate>,
}

impl BondTerms {
    pub fn total_periods(&self) -> u32 {
        self.years * self.periods_per_year
    }

    /// Number of periods under grace (0 when grace is disabled).
    pub fn grace_periods(&self) -> u32 {
        self.grace.active_periods()
    }

    /// Days in one coupon period under the day basis.
    pub fn days_per_period(&self) -> Decimal {
        Decimal::from(self.day_basis) / Decimal::from(self.periods_per_year)
    }

    /// Check every structural invariant of the terms.
    pub fn validate(&self) -> BondValuationResult<()> {
        if self.face_value <= Decimal::ZERO {
            return Err(invalid("face_value", "Face value must be positive"));
        }
        if self.market_value <= Decimal::ZERO {
            return Err(invalid("market_value", "Market value must be positive"));
        }
        if self.years == 0 {
            return Err(invalid("years", "Bond must run for at least one year"));
        }
        if !SUPPORTED_FREQUENCIES.contains(&self.periods_per_year) {
            return Err(invalid(
                "periods_per_year",
                "Coupon frequency must be 1, 2, 3, 4, 6 or 12",
            ));
        }
        if !SUPPORTED_DAY_BASES.contains(&self.day_basis) {
            return Err(invalid("day_basis", "Day basis must be 360 or 365"));
        }
        if self.coupon_rate < Decimal::ZERO {
            return Err(BondValuationError::InvalidRate {
                field: "coupon_rate".into(),
                reason: format!("Coupon rate must be non-negative, got {}", self.coupon_rate),
            });
        }
        if self.discount_rate < Decimal::ZERO {
            return Err(BondValuationError::InvalidRate {
                field: "discount_rate".into(),
                reason: format!(
                    "Discount rate must be non-negative, got {}",
                    self.discount_rate
                ),
            });
        }
        if self.rate_kind == RateKind::Nominal {
            match self.compounding_frequency {
                Some(m) if m > 0 => {}
                _ => {
                    return Err(invalid(
                        "compounding_frequency",
                        "A positive compounding frequency is required for nominal rates",
                    ))
                }
            }
        }
        if self.income_tax_rate < Decimal::ZERO || self.income_tax_rate > dec!(100) {
            return Err(invalid(
                "income_tax_rate",
                "Income tax rate must lie in [0, 100]",
            ));
        }
        if self.redemption_premium_pct < Decimal::ZERO {
            return Err(invalid(
                "redemption_premium_pct",
                "Redemption premium must be non-negative",
            ));
        }
        for item in self.costs.items() {
            if item.percentage < Decimal::ZERO {
                return Err(BondValuationError::InvalidCostPercentage {
                    item: item.kind.name().into(),
                    percentage: item.percentage,
                });
            }
        }
        if self.grace.kind != GraceKind::None && self.grace.period_count >= self.total_periods() {
            return Err(invalid(
                "grace.period_count",
                "Grace window must be shorter than the life of the bond",
            ));
        }
        Ok(())
    }
}

fn invalid(field: &str, reason: &str) -> BondValuationError {
    BondValuationError::InvalidInput {
        field: field.into(),
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_terms() -> BondTerms {
        BondTerms {
            face_value: dec!(1000),
            market_value: dec!(1050),
            years: 5,
            periods_per_year: 2,
            day_basis: 360,
            rate_kind: RateKind::Effective,
            coupon_rate: dec!(10),
            compounding_frequency: None,
            discount_rate: dec!(8),
            income_tax_rate: dec!(30),
            redemption_premium_pct: dec!(1),
            costs: IssuanceCosts::default(),
            grace: GracePeriod::default(),
            issue_date: None,
        }
    }

    #[test]
    fn test_valid_terms() {
        let t = sample_terms();
        assert!(t.validate().is_ok());
        assert_eq!(t.total_periods(), 10);
        assert_eq!(t.days_per_period(), dec!(180));
    }

    #[test]
    fn test_unsupported_frequency() {
        let mut t = sample_terms();
        t.periods_per_year = 5;
        match t.validate().unwrap_err() {
            BondValuationError::InvalidInput { field, .. } => assert_eq!(field, "periods_per_year"),
            other => panic!("Expected InvalidInput, got {other:?}"),
        }
    }

    #[test]
    fn test_nominal_requires_compounding() {
        let mut t = sample_terms();
        t.rate_kind = RateKind::Nominal;
        assert!(t.validate().is_err());
        t.compounding_frequency = Some(12);
        assert!(t.validate().is_ok());
    }

    #[test]
    fn test_negative_cost_rejected() {
        let mut t = sample_terms();
        t.costs.cavali = CostTerm::new(dec!(-0.1), Responsibility::Both);
        match t.validate().unwrap_err() {
            BondValuationError::InvalidCostPercentage { item, percentage } => {
                assert_eq!(item, "cavali");
                assert_eq!(percentage, dec!(-0.1));
            }
            other => panic!("Expected InvalidCostPercentage, got {other:?}"),
        }
    }

    #[test]
    fn test_negative_coupon_is_invalid_rate() {
        let mut t = sample_terms();
        t.coupon_rate = dec!(-1);
        assert!(matches!(
            t.validate(),
            Err(BondValuationError::InvalidRate { .. })
        ));
    }

    #[test]
    fn test_grace_must_be_shorter_than_bond() {
        let mut t = sample_terms();
        t.grace = GracePeriod::new(GraceKind::Partial, 10);
        assert!(t.validate().is_err());
        t.grace = GracePeriod::new(GraceKind::Partial, 9);
        assert!(t.validate().is_ok());
        // Count is ignored when grace is disabled
        t.grace = GracePeriod::new(GraceKind::None, 50);
        assert!(t.validate().is_ok());
        assert_eq!(t.grace_periods(), 0);
    }

    #[test]
    fn test_deserialize_minimal_document() {
        let json = r#"{
            "face_value": "1000",
            "market_value": "1000",
            "years": 3,
            "periods_per_year": 4,
            "day_basis": 360,
            "rate_kind": "nominal",
            "coupon_rate": "12",
            "compounding_frequency": 4,
            "discount_rate": "9",
            "income_tax_rate": "29.5",
            "grace": { "kind": "partial", "period_count": 2 },
            "costs": { "placement": { "percentage": "0.25", "responsibility": "both" } }
        }"#;
        let t: BondTerms = serde_json::from_str(json).unwrap();
        assert_eq!(t.rate_kind, RateKind::Nominal);
        assert_eq!(t.grace_periods(), 2);
        assert_eq!(t.redemption_premium_pct, Decimal::ZERO);
        assert_eq!(t.costs.placement.responsibility, Responsibility::Both);
        assert_eq!(t.costs.items().len(), 4);
        assert!(t.validate().is_ok());
    }
}
