use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

use super::error::SalaryStructureError;

#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, ToSchema, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ComponentKind {
    Earning,
    Deduction,
}

#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, ToSchema, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum CalculationType {
    Fixed,
    Percentage,
}

/// A component as it is submitted by the compensation form and stored with a
/// salary revision. Nothing about it is trusted until it is converted into a
/// [`SalaryComponent`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "name": "HRA",
    "kind": "earning",
    "calculation_type": "percentage",
    "value": "50",
    "base_component": "Basic",
    "is_balancing": false
}))]
pub struct ComponentDefinition {
    #[schema(example = "HRA")]
    pub name: String,

    pub kind: ComponentKind,

    pub calculation_type: CalculationType,

    /// Currency amount for `fixed`, percentage points (0-100) for `percentage`.
    /// Ignored for the balancing component.
    #[serde(default)]
    #[schema(value_type = String, example = "50")]
    pub value: Decimal,

    /// Component the percentage is taken of. Absent means the whole CTC.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(example = "Basic", nullable = true)]
    pub base_component: Option<String>,

    #[serde(default)]
    pub is_balancing: bool,
}

/// How a component's amount is obtained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComponentRule {
    Fixed { amount: Decimal },
    /// `rate` is in percentage points; `base: None` means "of CTC".
    Percentage { rate: Decimal, base: Option<String> },
    /// Receives whatever is left of the CTC once every other earning is resolved.
    Balancing,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SalaryComponent {
    name: String,
    kind: ComponentKind,
    rule: ComponentRule,
}

impl SalaryComponent {
    pub fn fixed(name: impl Into<String>, kind: ComponentKind, amount: Decimal) -> Self {
        Self {
            name: name.into(),
            kind,
            rule: ComponentRule::Fixed { amount },
        }
    }

    pub fn percentage_of_ctc(name: impl Into<String>, kind: ComponentKind, rate: Decimal) -> Self {
        Self {
            name: name.into(),
            kind,
            rule: ComponentRule::Percentage { rate, base: None },
        }
    }

    pub fn percentage_of(
        name: impl Into<String>,
        kind: ComponentKind,
        rate: Decimal,
        base: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            rule: ComponentRule::Percentage {
                rate,
                base: Some(base.into()),
            },
        }
    }

    /// Balancing components are always earnings.
    pub fn balancing(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ComponentKind::Earning,
            rule: ComponentRule::Balancing,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ComponentKind {
        self.kind
    }

    pub fn rule(&self) -> &ComponentRule {
        &self.rule
    }

    pub fn is_balancing(&self) -> bool {
        matches!(self.rule, ComponentRule::Balancing)
    }

    pub fn is_earning(&self) -> bool {
        self.kind == ComponentKind::Earning
    }

    pub fn base_component(&self) -> Option<&str> {
        match &self.rule {
            ComponentRule::Percentage { base, .. } => base.as_deref(),
            _ => None,
        }
    }

    /// Field-level checks that need no knowledge of the rest of the structure.
    pub(crate) fn validate(&self) -> Result<(), SalaryStructureError> {
        if self.name.trim().is_empty() {
            return Err(SalaryStructureError::invalid(&self.name, "name must not be empty"));
        }

        match &self.rule {
            ComponentRule::Fixed { amount } if *amount < Decimal::ZERO => Err(
                SalaryStructureError::invalid(&self.name, "fixed amount must not be negative"),
            ),
            ComponentRule::Percentage { rate, .. }
                if *rate < Decimal::ZERO || *rate > Decimal::ONE_HUNDRED =>
            {
                Err(SalaryStructureError::invalid(
                    &self.name,
                    "percentage must be between 0 and 100",
                ))
            }
            ComponentRule::Balancing if self.kind == ComponentKind::Deduction => Err(
                SalaryStructureError::invalid(&self.name, "a deduction cannot be the balancing component"),
            ),
            _ => Ok(()),
        }
    }
}

impl TryFrom<ComponentDefinition> for SalaryComponent {
    type Error = SalaryStructureError;

    fn try_from(def: ComponentDefinition) -> Result<Self, Self::Error> {
        // a cleared base selector arrives as an empty string
        let base = def
            .base_component
            .map(|b| b.trim().to_string())
            .filter(|b| !b.is_empty());

        let rule = if def.is_balancing {
            ComponentRule::Balancing
        } else {
            match def.calculation_type {
                CalculationType::Fixed => {
                    if base.is_some() {
                        return Err(SalaryStructureError::invalid(
                            &def.name,
                            "base_component only applies to percentage components",
                        ));
                    }
                    ComponentRule::Fixed { amount: def.value }
                }
                CalculationType::Percentage => ComponentRule::Percentage {
                    rate: def.value,
                    base,
                },
            }
        };

        let component = SalaryComponent {
            name: def.name.trim().to_string(),
            kind: def.kind,
            rule,
        };
        component.validate()?;
        Ok(component)
    }
}

impl From<&SalaryComponent> for ComponentDefinition {
    fn from(component: &SalaryComponent) -> Self {
        let (calculation_type, value, base_component) = match &component.rule {
            ComponentRule::Fixed { amount } => (CalculationType::Fixed, *amount, None),
            ComponentRule::Percentage { rate, base } => {
                (CalculationType::Percentage, *rate, base.clone())
            }
            ComponentRule::Balancing => (CalculationType::Fixed, Decimal::ZERO, None),
        };

        ComponentDefinition {
            name: component.name.clone(),
            kind: component.kind,
            calculation_type,
            value,
            base_component,
            is_balancing: component.is_balancing(),
        }
    }
}
