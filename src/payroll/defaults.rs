use rust_decimal::Decimal;

use super::component::ComponentKind::{Deduction, Earning};
use super::component::{ComponentDefinition, SalaryComponent};

pub const BALANCING_COMPONENT: &str = "Special Allowance";

/// Structure applied to employees who have no compensation assigned yet.
/// Fixed amounts are monthly.
pub fn default_components() -> Vec<SalaryComponent> {
    vec![
        SalaryComponent::percentage_of_ctc("Basic", Earning, Decimal::from(40)),
        SalaryComponent::percentage_of("HRA", Earning, Decimal::from(50), "Basic"),
        SalaryComponent::balancing(BALANCING_COMPONENT),
        SalaryComponent::fixed("LTA", Earning, Decimal::from(3500)),
        SalaryComponent::percentage_of("PF", Deduction, Decimal::from(12), "Basic"),
        SalaryComponent::fixed("Professional Tax", Deduction, Decimal::from(200)),
    ]
}

pub fn default_definitions() -> Vec<ComponentDefinition> {
    default_components()
        .iter()
        .map(ComponentDefinition::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payroll::calculator::{SalaryBreakupCalculator, monthly_ctc};
    use crate::payroll::structure::SalaryStructure;
    use rust_decimal_macros::dec;

    #[test]
    fn default_structure_is_valid() {
        let structure = SalaryStructure::new(default_components()).unwrap();
        assert_eq!(structure.balancing().unwrap().name(), BALANCING_COMPONENT);
        assert_eq!(SalaryStructure::from_definitions(&default_definitions()).unwrap(), structure);
    }

    #[test]
    fn default_monthly_breakup() {
        let structure = SalaryStructure::new(default_components()).unwrap();
        let breakup =
            SalaryBreakupCalculator::compute(monthly_ctc(dec!(1200000)), &structure).unwrap();

        assert_eq!(breakup.amount("Basic"), Some(dec!(40000)));
        assert_eq!(breakup.amount("HRA"), Some(dec!(20000)));
        assert_eq!(breakup.amount("LTA"), Some(dec!(3500)));
        assert_eq!(breakup.amount("Special Allowance"), Some(dec!(36500)));
        assert_eq!(breakup.amount("PF"), Some(dec!(4800)));
        assert_eq!(breakup.amount("Professional Tax"), Some(dec!(200)));
        assert_eq!(breakup.gross_earnings(), dec!(100000));
        assert_eq!(breakup.net_pay(), dec!(95000));
    }
}
