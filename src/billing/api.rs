use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::{HeaderMap, StatusCode},
    routing::{get, post, put},
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use sqlx::PgPool;

use crate::config;
use crate::error::{AppError, AppResult};
use crate::extractor::AuthUser;

use super::latefee::{self, FeeOutcome, LateFeeRunSummary};
use super::models::{LateFeeEvent, LateFeePolicy, RecurringSchedule};
use super::period::PeriodClock;
use super::policy::{self, PolicyInput};
use super::quota::{self, UsageSnapshot};
use super::schedule::{self, ScheduleInput};
use super::notify::LogNotifier;

/// key: billing-api -> cron triggers,fee apply,schedule+policy CRUD

pub fn routes() -> Router {
    Router::new()
        .route("/cron/late-fees", post(cron_late_fees))
        .route("/cron/recurring-invoices", post(cron_recurring_invoices))
        .route("/api/invoices/late-fees/apply", post(apply_late_fee))
        .route("/api/invoices/:id/late-fees", get(list_fee_events))
        .route(
            "/api/invoices/recurring",
            get(list_schedules).post(create_schedule),
        )
        .route("/api/invoices/recurring/:id", put(update_schedule))
        .route(
            "/api/late-fee-policies",
            get(list_policies).post(create_policy),
        )
        .route(
            "/api/late-fee-policies/:id",
            put(update_policy).delete(delete_policy),
        )
        .route("/api/usage", get(usage_snapshot))
}

/// Shared-secret check for the cron endpoints. A missing configured
/// secret disables them outright rather than running open.
fn require_cron_secret(headers: &HeaderMap) -> Result<(), AppError> {
    let Some(expected) = config::CRON_SHARED_SECRET.as_deref() else {
        return Err(AppError::Forbidden);
    };
    let provided = headers
        .get("x-cron-secret")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("");
    if provided != expected {
        return Err(AppError::Unauthorized);
    }
    Ok(())
}

/// Bulk late-fee pass. Always 200 with a summary; per-invoice failures
/// ride in the body so the caller never retries the whole pass blindly.
async fn cron_late_fees(
    Extension(pool): Extension<PgPool>,
    headers: HeaderMap,
) -> AppResult<Json<LateFeeRunSummary>> {
    require_cron_secret(&headers)?;
    let summary = latefee::run_late_fee_pass(&pool, Utc::now()).await?;
    Ok(Json(summary))
}

#[derive(serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct RecurringRunResponse {
    generated: usize,
    promoted: u32,
    skipped: u32,
    errors: Vec<schedule::ScheduleItemError>,
}

async fn cron_recurring_invoices(
    Extension(pool): Extension<PgPool>,
    headers: HeaderMap,
) -> AppResult<Json<RecurringRunResponse>> {
    require_cron_secret(&headers)?;
    let summary = schedule::run_due(
        &pool,
        &LogNotifier,
        Utc::now(),
        *config::RECURRING_AUTO_SEND,
        *config::INVOICE_DUE_TERM_DAYS,
    )
    .await?;
    Ok(Json(RecurringRunResponse {
        generated: summary.generated.len(),
        promoted: summary.promoted,
        skipped: summary.skipped,
        errors: summary.errors,
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApplyFeeRequest {
    invoice_id: i32,
    #[serde(default)]
    force: bool,
}

async fn apply_late_fee(
    Extension(pool): Extension<PgPool>,
    AuthUser { user_id, .. }: AuthUser,
    Json(payload): Json<ApplyFeeRequest>,
) -> AppResult<Json<FeeOutcome>> {
    let outcome = latefee::apply_late_fee(
        &pool,
        user_id,
        payload.invoice_id,
        Utc::now(),
        payload.force,
    )
    .await?;
    Ok(Json(outcome))
}

async fn list_fee_events(
    Extension(pool): Extension<PgPool>,
    AuthUser { user_id, .. }: AuthUser,
    Path(invoice_id): Path<i32>,
) -> AppResult<Json<Vec<LateFeeEvent>>> {
    let owned: Option<i32> =
        sqlx::query_scalar("SELECT id FROM invoices WHERE id = $1 AND user_id = $2")
            .bind(invoice_id)
            .bind(user_id)
            .fetch_optional(&pool)
            .await?;
    if owned.is_none() {
        return Err(AppError::NotFound);
    }
    let events = sqlx::query_as::<_, LateFeeEvent>(
        "SELECT * FROM late_fee_events WHERE invoice_id = $1 ORDER BY created_at ASC",
    )
    .bind(invoice_id)
    .fetch_all(&pool)
    .await?;
    Ok(Json(events))
}

async fn list_schedules(
    Extension(pool): Extension<PgPool>,
    AuthUser { user_id, .. }: AuthUser,
) -> AppResult<Json<Vec<RecurringSchedule>>> {
    Ok(Json(schedule::list_schedules(&pool, user_id).await?))
}

async fn create_schedule(
    Extension(pool): Extension<PgPool>,
    AuthUser { user_id, .. }: AuthUser,
    Json(input): Json<ScheduleInput>,
) -> AppResult<(StatusCode, Json<RecurringSchedule>)> {
    let created =
        schedule::create_schedule(&pool, user_id, &input, Utc::now().date_naive()).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn update_schedule(
    Extension(pool): Extension<PgPool>,
    AuthUser { user_id, .. }: AuthUser,
    Path(schedule_id): Path<i32>,
    Json(input): Json<ScheduleInput>,
) -> AppResult<Json<RecurringSchedule>> {
    let updated =
        schedule::update_schedule(&pool, user_id, schedule_id, &input, Utc::now().date_naive())
            .await?;
    Ok(Json(updated))
}

async fn list_policies(
    Extension(pool): Extension<PgPool>,
    AuthUser { user_id, .. }: AuthUser,
) -> AppResult<Json<Vec<LateFeePolicy>>> {
    Ok(Json(policy::list_policies(&pool, user_id).await?))
}

async fn create_policy(
    Extension(pool): Extension<PgPool>,
    AuthUser { user_id, .. }: AuthUser,
    Json(input): Json<PolicyInput>,
) -> AppResult<(StatusCode, Json<LateFeePolicy>)> {
    let created = policy::create_policy(&pool, user_id, &input).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn update_policy(
    Extension(pool): Extension<PgPool>,
    AuthUser { user_id, .. }: AuthUser,
    Path(policy_id): Path<i32>,
    Json(input): Json<PolicyInput>,
) -> AppResult<Json<LateFeePolicy>> {
    Ok(Json(
        policy::update_policy(&pool, user_id, policy_id, &input).await?,
    ))
}

async fn delete_policy(
    Extension(pool): Extension<PgPool>,
    AuthUser { user_id, .. }: AuthUser,
    Path(policy_id): Path<i32>,
) -> AppResult<StatusCode> {
    policy::delete_policy(&pool, user_id, policy_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn usage_snapshot(
    Extension(pool): Extension<PgPool>,
    Extension(clock): Extension<Arc<PeriodClock>>,
    AuthUser { user_id, .. }: AuthUser,
) -> AppResult<Json<UsageSnapshot>> {
    Ok(Json(
        quota::snapshot(&pool, &clock, user_id, Utc::now()).await?,
    ))
}
