use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use serde_json::json;

use crate::payroll::{PayslipError, RevisionError, SalaryStructureError};

// Structure problems are the caller's to fix; they surface as validation
// messages on the compensation form.
impl ResponseError for SalaryStructureError {
    fn status_code(&self) -> StatusCode {
        StatusCode::UNPROCESSABLE_ENTITY
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(json!({
            "error": self.code(),
            "message": self.to_string(),
        }))
    }
}

impl ResponseError for RevisionError {
    fn status_code(&self) -> StatusCode {
        StatusCode::CONFLICT
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(json!({
            "error": "stale_effective_date",
            "message": self.to_string(),
        }))
    }
}

impl ResponseError for PayslipError {
    fn status_code(&self) -> StatusCode {
        match self {
            PayslipError::NoStructureInEffect { .. } => StatusCode::NOT_FOUND,
            PayslipError::InvalidStructure { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(json!({
            "error": self.code(),
            "message": self.to_string(),
        }))
    }
}
