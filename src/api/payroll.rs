use actix_web::{HttpResponse, Responder, web};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::MySqlPool;
use sqlx::types::Json;
use tracing::{error, info, instrument};
use utoipa::{IntoParams, ToSchema};

use crate::auth::auth::AuthUser;
use crate::model::payroll::Payroll;
use crate::payroll::{Payslip, PayrollFailure, run_payroll};
use crate::utils::structure_cache;

/// Accepts `YYYY-MM` or any `YYYY-MM-DD` within the month.
pub fn parse_month(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(&format!("{raw}-01"), "%Y-%m-%d"))
        .ok()
}

fn bad_month(raw: &str) -> HttpResponse {
    HttpResponse::BadRequest().json(serde_json::json!({
        "message": format!("Invalid month `{raw}`, expected YYYY-MM")
    }))
}

#[derive(Deserialize, ToSchema)]
pub struct RunPayroll {
    #[schema(example = "2026-04")]
    pub month: String,
}

#[derive(Serialize, ToSchema)]
pub struct PayrollRunResponse {
    #[schema(example = "2026-04-01", value_type = String, format = "date")]
    pub month: NaiveDate,
    #[schema(example = 120)]
    pub processed: usize,
    /// Employees whose first structure starts after the month
    pub skipped: Vec<u64>,
    pub failures: Vec<PayrollFailure>,
}

#[derive(Deserialize, IntoParams, ToSchema)]
pub struct PayrollQuery {
    #[schema(example = 1)]
    pub page: Option<u32>,

    #[schema(example = 10)]
    pub per_page: Option<u32>,

    #[schema(example = 1001)]
    pub employee_id: Option<u64>,
}

#[derive(Serialize, ToSchema)]
pub struct PaginatedPayrollResponse {
    pub data: Vec<Payroll>,
    pub page: u32,
    pub per_page: u32,
    pub total: i64,
}

/// Compute and store payroll for every employee for one month
///
/// Re-running a month replaces its stored rows.
#[utoipa::path(
    post,
    path = "/api/payroll/run",
    request_body = RunPayroll,
    responses(
        (status = 200, description = "Payroll computed", body = PayrollRunResponse),
        (status = 400, description = "Invalid month"),
        (status = 401),
        (status = 403)
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
#[instrument(name = "payroll_run", skip_all, fields(month = %payload.month))]
pub async fn run_monthly_payroll(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<RunPayroll>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;

    let Some(month) = parse_month(&payload.month) else {
        return Ok(bad_month(&payload.month));
    };

    let histories = structure_cache::load_all_histories(pool.get_ref())
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to load salary structures");
            actix_web::error::ErrorInternalServerError("Internal Server Error")
        })?;

    let run = run_payroll(&histories, month);

    let mut tx = pool.begin().await.map_err(|e| {
        error!(error = %e, "Failed to open payroll transaction");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;

    for payslip in &run.payslips {
        sqlx::query(
            r#"
            INSERT INTO payroll
                (employee_id, month, structure_id, gross_earnings, total_deductions, net_salary, breakup)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON DUPLICATE KEY UPDATE
                structure_id = VALUES(structure_id),
                gross_earnings = VALUES(gross_earnings),
                total_deductions = VALUES(total_deductions),
                net_salary = VALUES(net_salary),
                breakup = VALUES(breakup)
            "#,
        )
        .bind(payslip.employee_id)
        .bind(payslip.month)
        .bind(payslip.structure_id)
        .bind(payslip.gross_earnings)
        .bind(payslip.total_deductions)
        .bind(payslip.net_pay)
        .bind(Json(payslip))
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            error!(error = %e, employee_id = payslip.employee_id, "Failed to store payroll");
            actix_web::error::ErrorInternalServerError("Internal Server Error")
        })?;
    }

    tx.commit().await.map_err(|e| {
        error!(error = %e, "Failed to commit payroll run");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;

    info!(
        processed = run.payslips.len(),
        skipped = run.skipped.len(),
        failed = run.failures.len(),
        "Payroll run complete"
    );

    Ok(HttpResponse::Ok().json(PayrollRunResponse {
        month: run.month,
        processed: run.payslips.len(),
        skipped: run.skipped,
        failures: run.failures,
    }))
}

/// Payslip of an employee for a month
#[utoipa::path(
    get,
    path = "/api/payroll/payslip/{employee_id}/{month}",
    params(
        ("employee_id", description = "Employee ID"),
        ("month", description = "Pay month, YYYY-MM")
    ),
    responses(
        (status = 200, body = Payslip),
        (status = 400, description = "Invalid month"),
        (status = 404, description = "No structure in effect for the month"),
        (status = 422, description = "Stored structure no longer resolves")
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn get_payslip(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<(u64, String)>,
) -> actix_web::Result<impl Responder> {
    let (employee_id, raw_month) = path.into_inner();
    auth.require_self_or_hr(employee_id)?;

    let Some(month) = parse_month(&raw_month) else {
        return Ok(bad_month(&raw_month));
    };

    let history = structure_cache::history(pool.get_ref(), employee_id)
        .await
        .map_err(|e| {
            error!(error = %e, employee_id, "Failed to fetch salary structure");
            actix_web::error::ErrorInternalServerError("Internal Server Error")
        })?;

    let payslip = Payslip::generate(&history, month)?;
    Ok(HttpResponse::Ok().json(payslip))
}

#[utoipa::path(
    get,
    path = "/api/payroll/{payroll_id}",
    params(
        ("payroll_id", description = "Payroll ID")
    ),
    responses(
        (status = 200, body = Payroll),
        (status = 404)
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn get_payroll(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    let payroll_id = path.into_inner();

    let payroll = sqlx::query_as::<_, Payroll>(
        r#"
        SELECT id, employee_id, month, structure_id, gross_earnings, total_deductions, net_salary
        FROM payroll
        WHERE id = ?
        "#,
    )
    .bind(payroll_id)
    .fetch_optional(pool.get_ref())
    .await
    .map_err(|e| {
        error!(error = %e, payroll_id, "Failed to fetch payroll");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;

    match payroll {
        Some(p) => Ok(HttpResponse::Ok().json(p)),
        None => Ok(HttpResponse::NotFound().json(serde_json::json!({
            "message": "Payroll not found"
        }))),
    }
}

#[utoipa::path(
    get,
    path = "/api/payroll",
    params(PayrollQuery),
    responses(
        (status = 200, body = PaginatedPayrollResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn list_payrolls(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<PayrollQuery>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    let page = query.page.unwrap_or(1).max(1);
    let per_page = query.per_page.unwrap_or(10).clamp(1, 100);
    let offset = (page - 1) * per_page;

    let total = sqlx::query_scalar::<_, i64>(
        r#"SELECT COUNT(*) FROM payroll WHERE (? IS NULL OR employee_id = ?)"#,
    )
    .bind(query.employee_id)
    .bind(query.employee_id)
    .fetch_one(pool.get_ref())
    .await
    .map_err(|e| {
        error!(error = %e, "Failed to count payrolls");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;

    let data = sqlx::query_as::<_, Payroll>(
        r#"
        SELECT id, employee_id, month, structure_id, gross_earnings, total_deductions, net_salary
        FROM payroll
        WHERE (? IS NULL OR employee_id = ?)
        ORDER BY month DESC, employee_id
        LIMIT ? OFFSET ?
        "#,
    )
    .bind(query.employee_id)
    .bind(query.employee_id)
    .bind(per_page as i64)
    .bind(offset as i64)
    .fetch_all(pool.get_ref())
    .await
    .map_err(|e| {
        error!(error = %e, "Failed to fetch payroll list");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;

    Ok(HttpResponse::Ok().json(PaginatedPayrollResponse {
        data,
        page,
        per_page,
        total,
    }))
}
