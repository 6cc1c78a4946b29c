use actix_web::{HttpResponse, Responder, web};
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::MySqlPool;
use sqlx::types::Json;
use tracing::{error, info, instrument};
use utoipa::{IntoParams, ToSchema};

use crate::auth::auth::AuthUser;
use crate::payroll::{
    BreakupLine, ComponentDefinition, SalaryBreakup, SalaryRevision, SalaryStructure,
    compute_breakup, defaults::default_definitions, validate_for_storage,
};
use crate::utils::structure_cache;

#[derive(Deserialize, ToSchema)]
#[schema(example = json!({
    "ctc": "600000",
    "components": [
        { "name": "Basic", "kind": "earning", "calculation_type": "fixed", "value": "240000" },
        { "name": "HRA", "kind": "earning", "calculation_type": "percentage", "value": "50", "base_component": "Basic" },
        { "name": "PF", "kind": "deduction", "calculation_type": "percentage", "value": "12", "base_component": "Basic" },
        { "name": "Special Allowance", "kind": "earning", "calculation_type": "fixed", "is_balancing": true }
    ]
}))]
pub struct BreakupRequest {
    /// CTC for the period the fixed amounts are expressed in
    #[schema(value_type = String, example = "600000")]
    pub ctc: Decimal,
    /// Defaults to the standard structure when omitted
    #[serde(default)]
    pub components: Option<Vec<ComponentDefinition>>,
}

#[derive(Serialize, ToSchema)]
pub struct BreakupResponse {
    #[schema(value_type = String, example = "600000")]
    pub ctc: Decimal,
    pub lines: Vec<BreakupLine>,
    #[schema(value_type = String, example = "600000")]
    pub gross_earnings: Decimal,
    #[schema(value_type = String, example = "28800")]
    pub total_deductions: Decimal,
    #[schema(value_type = String, example = "571200")]
    pub net_pay: Decimal,
}

impl From<SalaryBreakup> for BreakupResponse {
    fn from(breakup: SalaryBreakup) -> Self {
        Self {
            gross_earnings: breakup.gross_earnings(),
            total_deductions: breakup.total_deductions(),
            net_pay: breakup.net_pay(),
            ctc: breakup.ctc,
            lines: breakup.lines,
        }
    }
}

#[derive(Deserialize, IntoParams)]
pub struct AsOfQuery {
    /// Date the structure must be in effect on (defaults to today)
    #[param(example = "2026-04-01", value_type = Option<String>, format = "date")]
    pub as_of: Option<NaiveDate>,
}

#[derive(Serialize, ToSchema)]
pub struct StructureResponse {
    #[schema(example = 1001)]
    pub employee_id: u64,
    #[schema(example = 1, nullable = true)]
    pub id: Option<u64>,
    #[schema(example = "2026-04-01", value_type = Option<String>, format = "date", nullable = true)]
    pub effective_date: Option<NaiveDate>,
    #[schema(example = "1200000", value_type = Option<String>, nullable = true)]
    pub annual_ctc: Option<Decimal>,
    pub components: Vec<ComponentDefinition>,
    /// True when the employee has no structure and the standard one is shown
    pub is_default: bool,
}

#[derive(Deserialize, ToSchema)]
pub struct ReviseStructure {
    #[schema(example = "2026-04-01", value_type = String, format = "date")]
    pub effective_date: NaiveDate,
    #[schema(example = "1200000", value_type = String)]
    pub annual_ctc: Decimal,
    /// Fixed amounts are monthly
    pub components: Vec<ComponentDefinition>,
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

/// Compute a breakup without storing anything
#[utoipa::path(
    post,
    path = "/api/payroll/breakup",
    request_body = BreakupRequest,
    responses(
        (status = 200, description = "Resolved breakup", body = BreakupResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 422, description = "Invalid structure or over-allocated CTC", body = Object, example = json!({
            "error": "cyclic_reference",
            "message": "base components form a cycle: A -> B -> A"
        }))
    ),
    security(("bearer_auth" = [])),
    tag = "Salary Structure"
)]
pub async fn preview_breakup(
    auth: AuthUser,
    body: web::Json<BreakupRequest>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    let body = body.into_inner();
    let definitions = body.components.unwrap_or_else(default_definitions);
    let breakup = compute_breakup(body.ctc, &definitions)?;

    Ok(HttpResponse::Ok().json(BreakupResponse::from(breakup)))
}

/// Structure in effect for an employee
#[utoipa::path(
    get,
    path = "/api/payroll/structure/{employee_id}",
    params(
        ("employee_id", description = "Employee ID"),
        AsOfQuery
    ),
    responses(
        (status = 200, body = StructureResponse),
        (status = 401),
        (status = 403)
    ),
    security(("bearer_auth" = [])),
    tag = "Salary Structure"
)]
pub async fn get_structure(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    query: web::Query<AsOfQuery>,
) -> actix_web::Result<impl Responder> {
    let employee_id = path.into_inner();
    auth.require_self_or_hr(employee_id)?;

    let as_of = query.as_of.unwrap_or_else(today);
    let history = structure_cache::history(pool.get_ref(), employee_id)
        .await
        .map_err(|e| {
            error!(error = %e, employee_id, "Failed to fetch salary structure");
            actix_web::error::ErrorInternalServerError("Internal Server Error")
        })?;

    let response = match history.effective_on(as_of) {
        Some(revision) => StructureResponse {
            employee_id,
            id: Some(revision.id),
            effective_date: Some(revision.effective_date),
            annual_ctc: Some(revision.annual_ctc),
            components: revision.components.clone(),
            is_default: false,
        },
        None => StructureResponse {
            employee_id,
            id: None,
            effective_date: None,
            annual_ctc: None,
            components: default_definitions(),
            is_default: true,
        },
    };

    Ok(HttpResponse::Ok().json(response))
}

/// Every salary revision of an employee, oldest first
#[utoipa::path(
    get,
    path = "/api/payroll/structure/{employee_id}/history",
    params(("employee_id", description = "Employee ID")),
    responses(
        (status = 200, body = Vec<SalaryRevision>),
        (status = 401),
        (status = 403)
    ),
    security(("bearer_auth" = [])),
    tag = "Salary Structure"
)]
pub async fn structure_history(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    let employee_id = path.into_inner();
    let history = structure_cache::history(pool.get_ref(), employee_id)
        .await
        .map_err(|e| {
            error!(error = %e, employee_id, "Failed to fetch salary history");
            actix_web::error::ErrorInternalServerError("Internal Server Error")
        })?;

    Ok(HttpResponse::Ok().json(history.revisions()))
}

/// Submit a new salary revision
///
/// The structure is validated and its monthly breakup computed before it is
/// stored, so structures that do not fit within the CTC are rejected here.
#[utoipa::path(
    put,
    path = "/api/payroll/structure/{employee_id}",
    params(("employee_id", description = "Employee ID")),
    request_body = ReviseStructure,
    responses(
        (status = 201, description = "Revision stored", body = SalaryRevision),
        (status = 401),
        (status = 403),
        (status = 409, description = "Effective date is not after the latest revision"),
        (status = 422, description = "Invalid structure, or amounts that do not fit two-decimal storage")
    ),
    security(("bearer_auth" = [])),
    tag = "Salary Structure"
)]
#[instrument(
    name = "revise_structure",
    skip(auth, pool, body),
    fields(user_id = auth.user_id)
)]
pub async fn revise_structure(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    body: web::Json<ReviseStructure>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    let employee_id = path.into_inner();
    let body = body.into_inner();

    let structure = SalaryStructure::from_definitions(&body.components)?;
    validate_for_storage(body.annual_ctc, &structure)?;

    let history = structure_cache::load_history(pool.get_ref(), employee_id)
        .await
        .map_err(|e| {
            error!(error = %e, employee_id, "Failed to load salary history");
            actix_web::error::ErrorInternalServerError("Internal Server Error")
        })?;
    history.check_supersedes(body.effective_date)?;

    let components = structure.definitions();
    let result = sqlx::query(
        r#"
        INSERT INTO salary_structures
            (employee_id, effective_date, annual_ctc, components, created_by)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(employee_id)
    .bind(body.effective_date)
    .bind(body.annual_ctc)
    .bind(Json(&components))
    .bind(auth.user_id)
    .execute(pool.get_ref())
    .await;

    let result = match result {
        Ok(r) => r,
        Err(e) => {
            // a concurrent revision took the same effective date
            if let sqlx::Error::Database(db_err) = &e {
                if db_err.code().as_deref() == Some("23000") {
                    return Ok(HttpResponse::Conflict().json(serde_json::json!({
                        "error": "stale_effective_date",
                        "message": "A revision with this effective date already exists"
                    })));
                }
            }

            error!(error = %e, employee_id, "Failed to store salary revision");
            return Err(actix_web::error::ErrorInternalServerError(
                "Internal Server Error",
            ));
        }
    };

    structure_cache::invalidate(employee_id).await;

    let revision = SalaryRevision {
        id: result.last_insert_id(),
        employee_id,
        effective_date: body.effective_date,
        annual_ctc: body.annual_ctc,
        components,
    };
    info!(employee_id, revision_id = revision.id, effective_date = %revision.effective_date, "Salary revision stored");

    Ok(HttpResponse::Created().json(revision))
}

/// Monthly breakup of the structure in effect for an employee
#[utoipa::path(
    get,
    path = "/api/payroll/structure/{employee_id}/breakup",
    params(
        ("employee_id", description = "Employee ID"),
        AsOfQuery
    ),
    responses(
        (status = 200, body = BreakupResponse),
        (status = 404, description = "No structure in effect"),
        (status = 422, description = "Stored structure no longer resolves")
    ),
    security(("bearer_auth" = [])),
    tag = "Salary Structure"
)]
pub async fn employee_breakup(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    query: web::Query<AsOfQuery>,
) -> actix_web::Result<impl Responder> {
    let employee_id = path.into_inner();
    auth.require_self_or_hr(employee_id)?;

    let as_of = query.as_of.unwrap_or_else(today);
    let history = structure_cache::history(pool.get_ref(), employee_id)
        .await
        .map_err(|e| {
            error!(error = %e, employee_id, "Failed to fetch salary structure");
            actix_web::error::ErrorInternalServerError("Internal Server Error")
        })?;

    let Some(revision) = history.effective_on(as_of) else {
        return Ok(HttpResponse::NotFound().json(serde_json::json!({
            "error": "no_structure_in_effect",
            "message": format!("no salary structure in effect for employee {employee_id} on {as_of}")
        })));
    };

    let breakup = revision.monthly_breakup()?;
    Ok(HttpResponse::Ok().json(BreakupResponse::from(breakup)))
}
