use chrono::NaiveDate;
use derive_more::{Display, Error};
use rust_decimal::Decimal;
use serde::Serialize;
use utoipa::ToSchema;

use super::calculator::BreakupLine;
use super::error::SalaryStructureError;
use super::revision::{RevisionHistory, month_end, month_start};

#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
pub enum PayslipError {
    #[display(
        fmt = "employee {} has no salary structure in effect for {}",
        employee_id,
        month
    )]
    NoStructureInEffect { employee_id: u64, month: NaiveDate },

    #[display(fmt = "salary structure of employee {} is invalid: {}", employee_id, error)]
    InvalidStructure {
        employee_id: u64,
        error: SalaryStructureError,
    },
}

impl PayslipError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::NoStructureInEffect { .. } => "no_structure_in_effect",
            Self::InvalidStructure { error, .. } => error.code(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct Payslip {
    #[schema(example = 1001)]
    pub employee_id: u64,
    /// First day of the pay month.
    #[schema(example = "2026-04-01", value_type = String, format = "date")]
    pub month: NaiveDate,
    #[schema(example = 1)]
    pub structure_id: u64,
    #[schema(example = "2026-04-01", value_type = String, format = "date")]
    pub effective_date: NaiveDate,
    #[schema(example = "1200000", value_type = String)]
    pub annual_ctc: Decimal,
    #[schema(example = "100000", value_type = String)]
    pub monthly_ctc: Decimal,
    pub earnings: Vec<BreakupLine>,
    pub deductions: Vec<BreakupLine>,
    #[schema(example = "100000", value_type = String)]
    pub gross_earnings: Decimal,
    #[schema(example = "5000", value_type = String)]
    pub total_deductions: Decimal,
    #[schema(example = "95000", value_type = String)]
    pub net_pay: Decimal,
}

impl Payslip {
    /// Payslip for `month` (any day within it), using the revision in force on
    /// the last day of that month.
    pub fn generate(history: &RevisionHistory, month: NaiveDate) -> Result<Self, PayslipError> {
        let employee_id = history.employee_id();
        let month = month_start(month);

        let revision = history
            .effective_on(month_end(month))
            .ok_or(PayslipError::NoStructureInEffect { employee_id, month })?;

        let breakup = revision
            .monthly_breakup()
            .map_err(|error| PayslipError::InvalidStructure { employee_id, error })?;

        Ok(Self {
            employee_id,
            month,
            structure_id: revision.id,
            effective_date: revision.effective_date,
            annual_ctc: revision.annual_ctc,
            monthly_ctc: breakup.ctc,
            earnings: breakup.earnings().cloned().collect(),
            deductions: breakup.deductions().cloned().collect(),
            gross_earnings: breakup.gross_earnings(),
            total_deductions: breakup.total_deductions(),
            net_pay: breakup.net_pay(),
        })
    }
}
