use chrono::{Datelike, NaiveDate};
use derive_more::{Display, Error};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::calculator::{SalaryBreakup, SalaryBreakupCalculator, monthly_ctc};
use super::component::{ComponentDefinition, ComponentRule};
use super::error::SalaryStructureError;
use super::structure::SalaryStructure;

/// One compensation assignment for an employee. Revisions are never edited;
/// a change in pay is a new revision with a later effective date.
///
/// `annual_ctc` is yearly while fixed component amounts are monthly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SalaryRevision {
    #[schema(example = 1)]
    pub id: u64,
    #[schema(example = 1001)]
    pub employee_id: u64,
    #[schema(example = "2026-04-01", value_type = String, format = "date")]
    pub effective_date: NaiveDate,
    #[schema(example = "1200000", value_type = String)]
    pub annual_ctc: Decimal,
    pub components: Vec<ComponentDefinition>,
}

impl SalaryRevision {
    pub fn structure(&self) -> Result<SalaryStructure, SalaryStructureError> {
        SalaryStructure::from_definitions(&self.components)
    }

    pub fn monthly_ctc(&self) -> Decimal {
        monthly_ctc(self.annual_ctc)
    }

    pub fn monthly_breakup(&self) -> Result<SalaryBreakup, SalaryStructureError> {
        SalaryBreakupCalculator::compute(self.monthly_ctc(), &self.structure()?)
    }
}

/// Largest amount a `DECIMAL(15, 2)` column holds.
pub const MAX_STORED_AMOUNT: Decimal = Decimal::from_parts(0xA4C6_7FFF, 0x0003_8D7E, 0, false, 2);
const STORED_SCALE: u32 = 2;

fn storable(amount: Decimal) -> bool {
    amount.normalize().scale() <= STORED_SCALE && amount.abs() <= MAX_STORED_AMOUNT
}

/// Validates a revision about to be stored and returns its monthly breakup.
///
/// Stored CTCs and payroll totals are two-decimal columns, so anything that
/// would be rounded or rejected on insert is refused up front.
pub fn validate_for_storage(
    annual_ctc: Decimal,
    structure: &SalaryStructure,
) -> Result<SalaryBreakup, SalaryStructureError> {
    if !storable(annual_ctc) {
        return Err(SalaryStructureError::InvalidCtc { ctc: annual_ctc });
    }
    for component in structure.components() {
        if let ComponentRule::Fixed { amount } = component.rule() {
            if !storable(*amount) {
                return Err(SalaryStructureError::invalid(
                    component.name(),
                    "fixed amount must have at most two decimals and stay below 10^13",
                ));
            }
        }
    }

    let breakup = SalaryBreakupCalculator::compute(monthly_ctc(annual_ctc), structure)?;
    for (total, amount) in [
        ("gross earnings", breakup.gross_earnings()),
        ("total deductions", breakup.total_deductions()),
        ("net pay", breakup.net_pay()),
    ] {
        if !storable(amount) {
            return Err(SalaryStructureError::AmountOverflow {
                component: total.to_string(),
            });
        }
    }
    Ok(breakup)
}

#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
pub enum RevisionError {
    #[display(
        fmt = "effective date {} must be after the latest revision's effective date {}",
        proposed,
        latest
    )]
    StaleEffectiveDate {
        latest: NaiveDate,
        proposed: NaiveDate,
    },
}

/// All revisions of one employee, oldest first.
#[derive(Debug, Clone, PartialEq)]
pub struct RevisionHistory {
    employee_id: u64,
    revisions: Vec<SalaryRevision>,
}

impl RevisionHistory {
    pub fn new(employee_id: u64, mut revisions: Vec<SalaryRevision>) -> Self {
        revisions.retain(|r| r.employee_id == employee_id);
        revisions.sort_by_key(|r| r.effective_date);
        Self {
            employee_id,
            revisions,
        }
    }

    pub fn employee_id(&self) -> u64 {
        self.employee_id
    }

    pub fn revisions(&self) -> &[SalaryRevision] {
        &self.revisions
    }

    pub fn is_empty(&self) -> bool {
        self.revisions.is_empty()
    }

    pub fn latest(&self) -> Option<&SalaryRevision> {
        self.revisions.last()
    }

    /// The revision in force on `date`, if any.
    pub fn effective_on(&self, date: NaiveDate) -> Option<&SalaryRevision> {
        self.revisions
            .iter()
            .rev()
            .find(|r| r.effective_date <= date)
    }

    /// A new revision must take effect strictly after the latest one.
    pub fn check_supersedes(&self, effective_date: NaiveDate) -> Result<(), RevisionError> {
        match self.latest() {
            Some(latest) if effective_date <= latest.effective_date => {
                Err(RevisionError::StaleEffectiveDate {
                    latest: latest.effective_date,
                    proposed: effective_date,
                })
            }
            _ => Ok(()),
        }
    }
}

/// Groups revisions (in any order) into one history per employee, ordered by
/// employee id.
pub fn group_by_employee(revisions: Vec<SalaryRevision>) -> Vec<RevisionHistory> {
    let mut grouped: std::collections::BTreeMap<u64, Vec<SalaryRevision>> = Default::default();
    for revision in revisions {
        grouped.entry(revision.employee_id).or_default().push(revision);
    }
    grouped
        .into_iter()
        .map(|(employee_id, revisions)| RevisionHistory::new(employee_id, revisions))
        .collect()
}

pub fn month_start(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

pub fn month_end(date: NaiveDate) -> NaiveDate {
    let (year, month) = if date.month() == 12 {
        (date.year() + 1, 1)
    } else {
        (date.year(), date.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1)
        .and_then(|next| next.pred_opt())
        .unwrap_or(date)
}
