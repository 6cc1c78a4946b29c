use crate::api::payroll::{PaginatedPayrollResponse, PayrollQuery, PayrollRunResponse, RunPayroll};
use crate::api::salary_structure::{
    BreakupRequest, BreakupResponse, ReviseStructure, StructureResponse,
};
use crate::model::payroll::Payroll;
use crate::payroll::{
    BreakupLine, CalculationType, ComponentDefinition, ComponentKind, PayrollFailure, Payslip,
    SalaryRevision,
};
use utoipa::Modify;
use utoipa::OpenApi;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "HRM Compensation API",
        version = "1.0.0",
        description = r#"
## Compensation & Payroll

Salary structures, salary breakups and monthly payroll for the HRM system.

### 🔹 Key Features
- **Salary Structures**
  - Earning and deduction components, fixed or percentage based
  - One balancing component (usually *Special Allowance*) absorbs the remainder of the CTC
  - Revisions are never edited; a new revision with a later effective date supersedes the old one
- **Breakups**
  - Preview a breakup for any CTC, or view the monthly breakup of an employee's structure
- **Payroll**
  - Payslips per employee and month, monthly payroll runs, stored payroll records

### 🔐 Security
Every endpoint requires a **JWT Bearer** access token.
HR and Admin users manage compensation; employees can view their own structure and payslips.

### 📦 Amounts
Monetary amounts are exact decimals serialized as strings. Percentage
components are rounded to whole currency units.
"#,
    ),
    paths(
        crate::api::salary_structure::preview_breakup,
        crate::api::salary_structure::get_structure,
        crate::api::salary_structure::structure_history,
        crate::api::salary_structure::revise_structure,
        crate::api::salary_structure::employee_breakup,

        crate::api::payroll::run_monthly_payroll,
        crate::api::payroll::get_payslip,
        crate::api::payroll::get_payroll,
        crate::api::payroll::list_payrolls
    ),
    components(
        schemas(
            ComponentKind,
            CalculationType,
            ComponentDefinition,
            BreakupLine,
            BreakupRequest,
            BreakupResponse,
            StructureResponse,
            ReviseStructure,
            SalaryRevision,
            Payslip,
            PayrollFailure,
            RunPayroll,
            PayrollRunResponse,
            Payroll,
            PaginatedPayrollResponse,
            PayrollQuery
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Salary Structure", description = "Salary structure and breakup APIs"),
        (name = "Payroll", description = "Payslip and payroll run APIs"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}
