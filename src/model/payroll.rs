use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Row of the `payroll` table: the stored result of a payroll run for one
/// employee and month.
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Payroll {
    #[schema(example = 1)]
    pub id: u64,
    #[schema(example = 1001)]
    pub employee_id: u64,
    #[schema(example = "2026-04-01", value_type = String, format = "date")]
    pub month: NaiveDate,
    #[schema(example = 1)]
    pub structure_id: u64,
    #[schema(example = "100000", value_type = String)]
    pub gross_earnings: Decimal,
    #[schema(example = "5000", value_type = String)]
    pub total_deductions: Decimal,
    #[schema(example = "95000", value_type = String)]
    pub net_salary: Decimal,
}
