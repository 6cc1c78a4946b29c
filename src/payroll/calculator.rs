use std::collections::BTreeMap;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;
use utoipa::ToSchema;

use super::component::{ComponentDefinition, ComponentKind, ComponentRule};
use super::error::SalaryStructureError;
use super::structure::SalaryStructure;

const MONTHS_PER_YEAR: Decimal = Decimal::from_parts(12, 0, 0, false, 0);

/// One resolved component of a breakup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct BreakupLine {
    #[schema(example = "Basic")]
    pub name: String,
    pub kind: ComponentKind,
    #[schema(value_type = String, example = "20000")]
    pub amount: Decimal,
    pub is_balancing: bool,
}

/// A fully resolved salary breakup. Lines keep the order of the structure the
/// breakup was computed from; totals are fixed when the breakup is computed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct SalaryBreakup {
    #[schema(value_type = String, example = "50000")]
    pub ctc: Decimal,
    pub lines: Vec<BreakupLine>,
    #[schema(value_type = String, example = "50000")]
    gross_earnings: Decimal,
    #[schema(value_type = String, example = "2600")]
    total_deductions: Decimal,
    #[schema(value_type = String, example = "47400")]
    net_pay: Decimal,
}

impl SalaryBreakup {
    pub fn amount(&self, name: &str) -> Option<Decimal> {
        self.lines.iter().find(|l| l.name == name).map(|l| l.amount)
    }

    pub fn earnings(&self) -> impl Iterator<Item = &BreakupLine> {
        self.lines.iter().filter(|l| l.kind == ComponentKind::Earning)
    }

    pub fn deductions(&self) -> impl Iterator<Item = &BreakupLine> {
        self.lines.iter().filter(|l| l.kind == ComponentKind::Deduction)
    }

    pub fn gross_earnings(&self) -> Decimal {
        self.gross_earnings
    }

    pub fn total_deductions(&self) -> Decimal {
        self.total_deductions
    }

    pub fn net_pay(&self) -> Decimal {
        self.net_pay
    }

    pub fn to_map(&self) -> BTreeMap<String, Decimal> {
        self.lines
            .iter()
            .map(|l| (l.name.clone(), l.amount))
            .collect()
    }
}

/// Decomposes a CTC figure into the components of a salary structure.
///
/// Components are resolved in the structure's dependency order. Each
/// non-balancing earning takes its resolved amount out of the remaining CTC
/// exactly once; deductions never touch it. The balancing component, resolved
/// after every other earning, receives the remainder, so with a balancing
/// component present the earnings always add up to the CTC exactly.
///
/// The calculation is period-agnostic: `ctc` and every fixed amount in the
/// structure must be expressed for the same period.
pub struct SalaryBreakupCalculator;

impl SalaryBreakupCalculator {
    pub fn compute(
        ctc: Decimal,
        structure: &SalaryStructure,
    ) -> Result<SalaryBreakup, SalaryStructureError> {
        if ctc <= Decimal::ZERO {
            return Err(SalaryStructureError::InvalidCtc { ctc });
        }

        let components = structure.components();
        let mut resolved = vec![Decimal::ZERO; components.len()];
        // non-balancing earnings only; never negative
        let mut allocated = Decimal::ZERO;
        let mut gross_earnings = Decimal::ZERO;
        let mut total_deductions = Decimal::ZERO;

        for &idx in structure.resolution_order() {
            let component = &components[idx];
            let overflow = || SalaryStructureError::AmountOverflow {
                component: component.name().to_string(),
            };

            let amount = match component.rule() {
                ComponentRule::Balancing => {
                    if allocated > ctc {
                        return Err(over_allocated(ctc, allocated));
                    }
                    ctc - allocated
                }
                ComponentRule::Fixed { amount } => *amount,
                ComponentRule::Percentage { rate, .. } => {
                    let base = match structure.base_index(idx) {
                        Some(base_idx) => resolved[base_idx],
                        None => ctc,
                    };
                    percentage_of(base, *rate).ok_or_else(overflow)?
                }
            };

            if component.is_earning() {
                if !component.is_balancing() {
                    allocated = allocated.checked_add(amount).ok_or_else(overflow)?;
                }
                gross_earnings = gross_earnings.checked_add(amount).ok_or_else(overflow)?;
            } else {
                total_deductions = total_deductions.checked_add(amount).ok_or_else(overflow)?;
            }
            resolved[idx] = amount;
        }

        if allocated > ctc {
            return Err(over_allocated(ctc, allocated));
        }

        let net_pay = gross_earnings.checked_sub(total_deductions).ok_or_else(|| {
            SalaryStructureError::AmountOverflow {
                component: "net pay".to_string(),
            }
        })?;

        let lines = components
            .iter()
            .zip(resolved)
            .map(|(component, amount)| BreakupLine {
                name: component.name().to_string(),
                kind: component.kind(),
                amount,
                is_balancing: component.is_balancing(),
            })
            .collect();

        Ok(SalaryBreakup {
            ctc,
            lines,
            gross_earnings,
            total_deductions,
            net_pay,
        })
    }
}

/// Validates `definitions` and computes their breakup against `ctc`.
pub fn compute_breakup(
    ctc: Decimal,
    definitions: &[ComponentDefinition],
) -> Result<SalaryBreakup, SalaryStructureError> {
    let structure = SalaryStructure::from_definitions(definitions)?;
    SalaryBreakupCalculator::compute(ctc, &structure)
}

/// Monthly share of an annual CTC, in currency units with two decimals.
pub fn monthly_ctc(annual_ctc: Decimal) -> Decimal {
    (annual_ctc / MONTHS_PER_YEAR).round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// `rate` percent of `base`, rounded half-up to a whole currency unit.
fn percentage_of(base: Decimal, rate: Decimal) -> Option<Decimal> {
    let raw = base.checked_mul(rate)?.checked_div(Decimal::ONE_HUNDRED)?;
    Some(raw.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero))
}

fn over_allocated(ctc: Decimal, allocated: Decimal) -> SalaryStructureError {
    SalaryStructureError::OverAllocatedStructure { ctc, allocated }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payroll::component::ComponentKind::{Deduction, Earning};
    use crate::payroll::component::SalaryComponent;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    fn structure(components: Vec<SalaryComponent>) -> SalaryStructure {
        SalaryStructure::new(components).unwrap()
    }

    #[test]
    fn hra_on_basic_is_not_taken_from_ctc_twice() {
        let s = structure(vec![
            SalaryComponent::percentage_of_ctc("Basic", Earning, dec!(40)),
            SalaryComponent::percentage_of("HRA", Earning, dec!(50), "Basic"),
            SalaryComponent::balancing("Special Allowance"),
        ]);

        let breakup = SalaryBreakupCalculator::compute(dec!(1200000), &s).unwrap();

        assert_eq!(breakup.amount("Basic"), Some(dec!(480000)));
        assert_eq!(breakup.amount("HRA"), Some(dec!(240000)));
        assert_eq!(breakup.amount("Special Allowance"), Some(dec!(480000)));
        assert_eq!(breakup.gross_earnings(), dec!(1200000));
    }

    #[test]
    fn resolves_fixed_basic_with_pf_and_balancing() {
        let s = structure(vec![
            SalaryComponent::fixed("Basic", Earning, dec!(240000)),
            SalaryComponent::percentage_of("HRA", Earning, dec!(50), "Basic"),
            SalaryComponent::percentage_of("PF", Deduction, dec!(12), "Basic"),
            SalaryComponent::balancing("Special Allowance"),
        ]);

        let breakup = SalaryBreakupCalculator::compute(dec!(600000), &s).unwrap();

        let expected: BTreeMap<String, Decimal> = [
            ("Basic", dec!(240000)),
            ("HRA", dec!(120000)),
            ("PF", dec!(28800)),
            ("Special Allowance", dec!(240000)),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();

        assert_eq!(breakup.to_map(), expected);
        assert_eq!(breakup.gross_earnings(), dec!(600000));
        assert_eq!(breakup.total_deductions(), dec!(28800));
        assert_eq!(breakup.net_pay(), dec!(571200));
    }

    #[test]
    fn deductions_do_not_change_earnings() {
        let earnings_only = vec![
            SalaryComponent::percentage_of_ctc("Basic", Earning, dec!(40)),
            SalaryComponent::percentage_of("HRA", Earning, dec!(50), "Basic"),
            SalaryComponent::balancing("Special Allowance"),
        ];
        let mut with_pf = earnings_only.clone();
        with_pf.push(SalaryComponent::percentage_of(
            "PF",
            Deduction,
            dec!(12),
            "Basic",
        ));

        let before = SalaryBreakupCalculator::compute(dec!(900000), &structure(earnings_only)).unwrap();
        let after = SalaryBreakupCalculator::compute(dec!(900000), &structure(with_pf)).unwrap();

        assert_eq!(before.gross_earnings(), after.gross_earnings());
        assert_eq!(
            before.amount("Special Allowance"),
            after.amount("Special Allowance")
        );
        assert_eq!(after.amount("PF"), Some(dec!(43200)));
    }

    #[test]
    fn balancing_position_does_not_matter() {
        let last = structure(vec![
            SalaryComponent::percentage_of_ctc("Basic", Earning, dec!(40)),
            SalaryComponent::fixed("LTA", Earning, dec!(3500)),
            SalaryComponent::balancing("Special Allowance"),
        ]);
        let first = structure(vec![
            SalaryComponent::balancing("Special Allowance"),
            SalaryComponent::percentage_of_ctc("Basic", Earning, dec!(40)),
            SalaryComponent::fixed("LTA", Earning, dec!(3500)),
        ]);

        let a = SalaryBreakupCalculator::compute(dec!(50000), &last).unwrap();
        let b = SalaryBreakupCalculator::compute(dec!(50000), &first).unwrap();

        assert_eq!(a.to_map(), b.to_map());
        assert_eq!(a.amount("Special Allowance"), Some(dec!(26500)));
        // lines follow input order
        assert_eq!(b.lines[0].name, "Special Allowance");
        assert!(b.lines[0].is_balancing);
    }

    #[test]
    fn rounding_drift_lands_in_balancing_component() {
        let s = structure(vec![
            SalaryComponent::percentage_of_ctc("Basic", Earning, dec!(50)),
            SalaryComponent::percentage_of_ctc("Conveyance", Earning, dec!(12.5)),
            SalaryComponent::balancing("Special Allowance"),
        ]);

        let breakup = SalaryBreakupCalculator::compute(dec!(1001), &s).unwrap();

        // 500.5 and 125.125 round half-up to whole units
        assert_eq!(breakup.amount("Basic"), Some(dec!(501)));
        assert_eq!(breakup.amount("Conveyance"), Some(dec!(125)));
        assert_eq!(breakup.amount("Special Allowance"), Some(dec!(375)));
        assert_eq!(breakup.gross_earnings(), dec!(1001));
    }

    #[test]
    fn fixed_amounts_are_used_as_given() {
        let s = structure(vec![
            SalaryComponent::fixed("Meal Card", Earning, dec!(2200.75)),
            SalaryComponent::balancing("Special Allowance"),
        ]);

        let breakup = SalaryBreakupCalculator::compute(dec!(10000), &s).unwrap();
        assert_eq!(breakup.amount("Meal Card"), Some(dec!(2200.75)));
        assert_eq!(breakup.amount("Special Allowance"), Some(dec!(7799.25)));
    }

    #[test]
    fn over_allocation_without_balancing_is_an_error() {
        let s = structure(vec![
            SalaryComponent::fixed("Basic", Earning, dec!(30000)),
            SalaryComponent::fixed("Bonus", Earning, dec!(25000)),
        ]);

        let err = SalaryBreakupCalculator::compute(dec!(50000), &s).unwrap_err();
        assert_eq!(
            err,
            SalaryStructureError::OverAllocatedStructure {
                ctc: dec!(50000),
                allocated: dec!(55000)
            }
        );
    }

    #[test]
    fn over_allocation_with_balancing_is_not_clamped() {
        let s = structure(vec![
            SalaryComponent::percentage_of_ctc("Basic", Earning, dec!(80)),
            SalaryComponent::percentage_of("HRA", Earning, dec!(50), "Basic"),
            SalaryComponent::balancing("Special Allowance"),
        ]);

        let err = SalaryBreakupCalculator::compute(dec!(100000), &s).unwrap_err();
        assert_eq!(err.code(), "over_allocated_structure");
    }

    #[test]
    fn underallocated_structure_without_balancing_is_allowed() {
        let s = structure(vec![
            SalaryComponent::percentage_of_ctc("Basic", Earning, dec!(40)),
            SalaryComponent::fixed("Professional Tax", Deduction, dec!(200)),
        ]);

        let breakup = SalaryBreakupCalculator::compute(dec!(50000), &s).unwrap();
        assert_eq!(breakup.gross_earnings(), dec!(20000));
        assert!(breakup.gross_earnings() < breakup.ctc);
    }

    #[test]
    fn deduction_can_be_based_on_balancing_component() {
        let s = structure(vec![
            SalaryComponent::fixed("Basic", Earning, dec!(20000)),
            SalaryComponent::percentage_of("Welfare", Deduction, dec!(1), "Special Allowance"),
            SalaryComponent::balancing("Special Allowance"),
        ]);

        let breakup = SalaryBreakupCalculator::compute(dec!(50000), &s).unwrap();
        assert_eq!(breakup.amount("Special Allowance"), Some(dec!(30000)));
        assert_eq!(breakup.amount("Welfare"), Some(dec!(300)));
    }

    fn position(s: &SalaryStructure, name: &str) -> usize {
        s.resolution_order()
            .iter()
            .position(|&idx| s.components()[idx].name() == name)
            .unwrap()
    }

    #[test]
    fn deduction_can_be_based_on_another_deduction() {
        let s = structure(vec![
            SalaryComponent::percentage_of("Cess", Deduction, dec!(4), "PF"),
            SalaryComponent::percentage_of("PF", Deduction, dec!(12), "Basic"),
            SalaryComponent::fixed("Basic", Earning, dec!(20000)),
            SalaryComponent::balancing("Special Allowance"),
        ]);
        assert!(position(&s, "Basic") < position(&s, "PF"));
        assert!(position(&s, "PF") < position(&s, "Cess"));

        let breakup = SalaryBreakupCalculator::compute(dec!(50000), &s).unwrap();

        assert_eq!(breakup.amount("PF"), Some(dec!(2400)));
        assert_eq!(breakup.amount("Cess"), Some(dec!(96)));
        assert_eq!(breakup.amount("Special Allowance"), Some(dec!(30000)));
        assert_eq!(breakup.gross_earnings(), dec!(50000));
        assert_eq!(breakup.total_deductions(), dec!(2496));
        assert_eq!(breakup.net_pay(), dec!(47504));
    }

    #[test]
    fn earning_can_be_based_on_a_deduction() {
        let s = structure(vec![
            SalaryComponent::percentage_of("Employer PF", Earning, dec!(100), "PF"),
            SalaryComponent::percentage_of("PF", Deduction, dec!(12), "Basic"),
            SalaryComponent::fixed("Basic", Earning, dec!(20000)),
            SalaryComponent::balancing("Special Allowance"),
        ]);
        assert!(position(&s, "PF") < position(&s, "Employer PF"));
        assert!(position(&s, "Employer PF") < position(&s, "Special Allowance"));

        let breakup = SalaryBreakupCalculator::compute(dec!(50000), &s).unwrap();

        // PF itself leaves the CTC alone, only the matching earning is taken out
        assert_eq!(breakup.amount("Employer PF"), Some(dec!(2400)));
        assert_eq!(breakup.amount("Special Allowance"), Some(dec!(27600)));
        assert_eq!(breakup.gross_earnings(), dec!(50000));
        assert_eq!(breakup.total_deductions(), dec!(2400));
    }

    #[test]
    fn oversized_deductions_overflow_instead_of_panicking() {
        let s = structure(vec![
            SalaryComponent::fixed("Basic", Earning, dec!(100)),
            SalaryComponent::fixed("Loan Recovery", Deduction, Decimal::MAX),
            SalaryComponent::fixed("Advance Recovery", Deduction, Decimal::MAX),
            SalaryComponent::balancing("Special Allowance"),
        ]);

        let err = SalaryBreakupCalculator::compute(dec!(1000), &s).unwrap_err();
        assert_eq!(err.code(), "amount_overflow");
    }

    #[test]
    fn oversized_earnings_overflow_instead_of_panicking() {
        let s = structure(vec![
            SalaryComponent::fixed("A", Earning, Decimal::MAX),
            SalaryComponent::fixed("B", Earning, Decimal::MAX),
        ]);

        let err = SalaryBreakupCalculator::compute(Decimal::MAX, &s).unwrap_err();
        assert_eq!(err, SalaryStructureError::AmountOverflow { component: "B".to_string() });
    }

    #[test]
    fn over_allocation_reports_allocated_total_near_the_limit() {
        let s = structure(vec![
            SalaryComponent::fixed("A", Earning, Decimal::MAX),
            SalaryComponent::fixed("B", Earning, dec!(1)),
        ]);

        let err = SalaryBreakupCalculator::compute(Decimal::MAX - dec!(1), &s).unwrap_err();
        assert_eq!(err.code(), "amount_overflow");

        let err = SalaryBreakupCalculator::compute(dec!(10), &structure(vec![
            SalaryComponent::fixed("A", Earning, Decimal::MAX - dec!(1)),
            SalaryComponent::fixed("B", Earning, dec!(1)),
        ]))
        .unwrap_err();
        assert_eq!(
            err,
            SalaryStructureError::OverAllocatedStructure {
                ctc: dec!(10),
                allocated: Decimal::MAX
            }
        );
    }

    #[test]
    fn rejects_non_positive_ctc() {
        let s = structure(vec![SalaryComponent::balancing("Special Allowance")]);

        assert_eq!(
            SalaryBreakupCalculator::compute(Decimal::ZERO, &s).unwrap_err(),
            SalaryStructureError::InvalidCtc { ctc: Decimal::ZERO }
        );
        assert!(SalaryBreakupCalculator::compute(dec!(-1), &s).is_err());
    }

    #[test]
    fn compute_is_idempotent() {
        let s = structure(vec![
            SalaryComponent::percentage_of_ctc("Basic", Earning, dec!(40)),
            SalaryComponent::percentage_of("HRA", Earning, dec!(50), "Basic"),
            SalaryComponent::balancing("Special Allowance"),
        ]);

        let first = SalaryBreakupCalculator::compute(dec!(777777), &s).unwrap();
        let second = SalaryBreakupCalculator::compute(dec!(777777), &s).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn compute_breakup_validates_definitions_first() {
        let definitions: Vec<ComponentDefinition> = serde_json::from_value(serde_json::json!([
            { "name": "A", "kind": "earning", "calculation_type": "percentage", "value": 10, "base_component": "B" },
            { "name": "B", "kind": "earning", "calculation_type": "percentage", "value": 10, "base_component": "A" }
        ]))
        .unwrap();

        let err = compute_breakup(dec!(100000), &definitions).unwrap_err();
        assert_eq!(err.code(), "cyclic_reference");
    }

    #[test]
    fn monthly_ctc_rounds_to_two_decimals() {
        assert_eq!(monthly_ctc(dec!(1200000)), dec!(100000));
        assert_eq!(monthly_ctc(dec!(1000000)), dec!(83333.33));
        assert_eq!(monthly_ctc(dec!(100)), dec!(8.33));
        assert_eq!(monthly_ctc(dec!(0.3)), dec!(0.03));
    }

    proptest! {
        #[test]
        fn earnings_always_sum_to_ctc(
            ctc_cents in 100_000i64..100_000_000_000,
            basic_rate in 0u32..=60,
            hra_rate in 0u32..=50,
            lta_share in 0u32..=5,
        ) {
            let ctc = Decimal::new(ctc_cents, 2);
            let lta = (ctc * Decimal::from(lta_share) / Decimal::ONE_HUNDRED).trunc();
            let s = structure(vec![
                SalaryComponent::percentage_of_ctc("Basic", Earning, Decimal::from(basic_rate)),
                SalaryComponent::percentage_of("HRA", Earning, Decimal::from(hra_rate), "Basic"),
                SalaryComponent::fixed("LTA", Earning, lta),
                SalaryComponent::percentage_of("PF", Deduction, dec!(12), "Basic"),
                SalaryComponent::balancing("Special Allowance"),
            ]);

            let breakup = SalaryBreakupCalculator::compute(ctc, &s).unwrap();
            prop_assert_eq!(breakup.gross_earnings(), ctc);
            prop_assert!(breakup.amount("Special Allowance").unwrap() >= Decimal::ZERO);
        }
    }
}
