use chrono::NaiveDate;
use serde::Serialize;
use tracing::{debug, warn};
use utoipa::ToSchema;

use super::payslip::{Payslip, PayslipError};
use super::revision::{RevisionHistory, month_start};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct PayrollFailure {
    #[schema(example = 1002)]
    pub employee_id: u64,
    #[schema(example = "over_allocated_structure")]
    pub code: String,
    pub message: String,
}

impl From<&PayslipError> for PayrollFailure {
    fn from(err: &PayslipError) -> Self {
        let employee_id = match err {
            PayslipError::NoStructureInEffect { employee_id, .. }
            | PayslipError::InvalidStructure { employee_id, .. } => *employee_id,
        };
        Self {
            employee_id,
            code: err.code().to_string(),
            message: err.to_string(),
        }
    }
}

/// Outcome of computing one month's payroll. Every employee lands in exactly
/// one of `payslips`, `failures` or `skipped`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PayrollRun {
    pub month: NaiveDate,
    pub payslips: Vec<Payslip>,
    pub failures: Vec<PayrollFailure>,
    /// Employees whose first revision takes effect after the month.
    pub skipped: Vec<u64>,
}

/// Computes payslips for every employee independently.
pub fn run_payroll(histories: &[RevisionHistory], month: NaiveDate) -> PayrollRun {
    let month = month_start(month);
    let mut run = PayrollRun {
        month,
        payslips: Vec::with_capacity(histories.len()),
        failures: Vec::new(),
        skipped: Vec::new(),
    };

    for history in histories {
        match Payslip::generate(history, month) {
            Ok(payslip) => {
                debug!(employee_id = payslip.employee_id, net_pay = %payslip.net_pay, "Payslip computed");
                run.payslips.push(payslip);
            }
            Err(PayslipError::NoStructureInEffect { employee_id, .. }) => {
                run.skipped.push(employee_id);
            }
            Err(err) => {
                warn!(error = %err, "Payslip computation failed");
                run.failures.push(PayrollFailure::from(&err));
            }
        }
    }

    run
}
