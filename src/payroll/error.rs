use derive_more::{Display, Error};
use rust_decimal::Decimal;

/// Every way a salary structure can fail validation or resolution.
///
/// None of these are retryable: the structure (or the CTC handed in with it)
/// has to be corrected by the caller before the breakup can be produced.
#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
pub enum SalaryStructureError {
    #[display(fmt = "component name `{}` is used more than once", name)]
    DuplicateComponentName { name: String },

    #[display(
        fmt = "only one balancing component is allowed, found `{}` and `{}`",
        first,
        second
    )]
    MultipleBalancingComponents { first: String, second: String },

    #[display(
        fmt = "component `{}` is based on `{}`, which is not part of the structure",
        component,
        base
    )]
    UnknownBaseComponent { component: String, base: String },

    #[display(fmt = "base components form a cycle: {}", path)]
    CyclicReference { path: String },

    #[display(
        fmt = "earnings allocate {} which exceeds the CTC of {}",
        allocated,
        ctc
    )]
    OverAllocatedStructure { ctc: Decimal, allocated: Decimal },

    #[display(fmt = "component `{}` is invalid: {}", name, reason)]
    InvalidComponent { name: String, reason: String },

    #[display(fmt = "CTC must be a positive amount with at most two decimals, got {}", ctc)]
    InvalidCtc { ctc: Decimal },

    #[display(fmt = "amount for component `{}` is out of range", component)]
    AmountOverflow { component: String },
}

impl SalaryStructureError {
    /// Stable machine-readable code, surfaced to API clients.
    pub fn code(&self) -> &'static str {
        match self {
            Self::DuplicateComponentName { .. } => "duplicate_component_name",
            Self::MultipleBalancingComponents { .. } => "multiple_balancing_components",
            Self::UnknownBaseComponent { .. } => "unknown_base_component",
            Self::CyclicReference { .. } => "cyclic_reference",
            Self::OverAllocatedStructure { .. } => "over_allocated_structure",
            Self::InvalidComponent { .. } => "invalid_component",
            Self::InvalidCtc { .. } => "invalid_ctc",
            Self::AmountOverflow { .. } => "amount_overflow",
        }
    }

    pub(crate) fn invalid(name: &str, reason: impl Into<String>) -> Self {
        Self::InvalidComponent {
            name: name.to_string(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn messages_name_the_offending_components() {
        let err = SalaryStructureError::UnknownBaseComponent {
            component: "HRA".into(),
            base: "Basic".into(),
        };
        assert_eq!(
            err.to_string(),
            "component `HRA` is based on `Basic`, which is not part of the structure"
        );

        let err = SalaryStructureError::OverAllocatedStructure {
            ctc: dec!(1000),
            allocated: dec!(1200),
        };
        assert_eq!(err.to_string(), "earnings allocate 1200 which exceeds the CTC of 1000");
        assert_eq!(err.code(), "over_allocated_structure");
    }
}
