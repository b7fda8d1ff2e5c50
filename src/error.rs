use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
    #[error("not found")]
    NotFound,
    #[error("unauthorized")]
    Unauthorized,
    #[error("forbidden")]
    Forbidden,
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("plan limit reached for {}", .0.feature)]
    PlanLimit(PlanLimitBody),
    #[error("{0}")]
    Message(String),
}

/// Structured body for quota rejections; carries enough for the caller to
/// render an upgrade prompt without a second request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanLimitBody {
    pub error: String,
    pub code: &'static str,
    pub feature: String,
    pub plan: PlanLimitPlan,
    pub suggestion: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanLimitPlan {
    pub key: String,
    pub name: String,
    pub limit: i64,
}

impl PlanLimitBody {
    pub fn new(feature: &str, plan_key: &str, plan_name: &str, limit: i64) -> Self {
        Self {
            error: format!("Monthly limit for {feature} reached"),
            code: "PLAN_LIMIT_REACHED",
            feature: feature.to_string(),
            plan: PlanLimitPlan {
                key: plan_key.to_string(),
                name: plan_name.to_string(),
                limit,
            },
            suggestion: "Upgrade your plan to raise this limit".to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::PlanLimit(body) => {
                return (StatusCode::PAYMENT_REQUIRED, Json(body.clone())).into_response();
            }
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Db(_) | AppError::Message(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        tracing::error!(?self);
        (status, self.to_string()).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
