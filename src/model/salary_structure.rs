use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::types::Json;

use crate::payroll::{ComponentDefinition, SalaryRevision};

/// Row of the `salary_structures` table.
#[derive(Debug, sqlx::FromRow)]
pub struct SalaryStructureRow {
    pub id: u64,
    pub employee_id: u64,
    pub effective_date: NaiveDate,
    pub annual_ctc: Decimal,
    pub components: Json<Vec<ComponentDefinition>>,
}

impl From<SalaryStructureRow> for SalaryRevision {
    fn from(row: SalaryStructureRow) -> Self {
        SalaryRevision {
            id: row.id,
            employee_id: row.employee_id,
            effective_date: row.effective_date,
            annual_ctc: row.annual_ctc,
            components: row.components.0,
        }
    }
}
