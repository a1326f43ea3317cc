use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::terms::{CostItem, CostKind, Responsibility};
use crate::types::{Money, Percent};

/// One cost item converted to an amount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostLine {
    pub kind: CostKind,
    pub percentage: Percent,
    pub amount: Money,
    pub responsibility: Responsibility,
}

/// Upfront costs borne by each side at issuance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostAllocation {
    pub issuer_total: Money,
    pub bondholder_total: Money,
    pub lines: Vec<CostLine>,
}

/// Split cost items between issuer and bondholder.
///
/// Each amount is `percentage / 100 * market_value`. Items flagged `Both`
/// are counted in full on each side, not halved.
pub fn allocate(items: &[CostItem], market_value: Money) -> CostAllocation {
    let mut issuer_total = Decimal::ZERO;
    let mut bondholder_total = Decimal::ZERO;
    let mut lines = Vec::with_capacity(items.len());

    for item in items {
        let amount = item.percentage / dec!(100) * market_value;
        if item.responsibility.charges_issuer() {
            issuer_total += amount;
        }
        if item.responsibility.charges_bondholder() {
            bondholder_total += amount;
        }
        lines.push(CostLine {
            kind: item.kind,
            percentage: item.percentage,
            amount,
            responsibility: item.responsibility,
        });
    }

    CostAllocation {
        issuer_total,
        bondholder_total,
        lines,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(kind: CostKind, pct: Decimal, r: Responsibility) -> CostItem {
        CostItem {
            kind,
            percentage: pct,
            responsibility: r,
        }
    }

    #[test]
    fn test_split_by_responsibility() {
        let items = vec![
            item(CostKind::Structuring, dec!(1), Responsibility::Issuer),
            item(CostKind::Placement, dec!(0.5), Responsibility::Issuer),
            item(CostKind::Flotation, dec!(0.2), Responsibility::Bondholder),
            item(CostKind::Cavali, dec!(0.1), Responsibility::Both),
        ];
        let alloc = allocate(&items, dec!(2000));
        // 20 + 10 + 2 = 32
        assert_eq!(alloc.issuer_total, dec!(32));
        // 4 + 2 = 6
        assert_eq!(alloc.bondholder_total, dec!(6));
        assert_eq!(alloc.lines.len(), 4);
        assert_eq!(alloc.lines[2].amount, dec!(4));
    }

    #[test]
    fn test_all_both_counts_in_full_on_each_side() {
        let items = vec![
            item(CostKind::Structuring, dec!(0.45), Responsibility::Both),
            item(CostKind::Placement, dec!(0.25), Responsibility::Both),
            item(CostKind::Flotation, dec!(0.15), Responsibility::Both),
            item(CostKind::Cavali, dec!(0.5), Responsibility::Both),
            item(CostKind::Premium, dec!(1), Responsibility::Both),
        ];
        let alloc = allocate(&items, dec!(1050));
        let expected = dec!(2.35) / dec!(100) * dec!(1050);
        assert_eq!(alloc.issuer_total, expected);
        assert_eq!(alloc.bondholder_total, expected);
    }

    #[test]
    fn test_no_items() {
        let alloc = allocate(&[], dec!(1000));
        assert_eq!(alloc.issuer_total, Decimal::ZERO);
        assert_eq!(alloc.bondholder_total, Decimal::ZERO);
        assert!(alloc.lines.is_empty());
    }
}
