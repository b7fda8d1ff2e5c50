use std::sync::Arc;

use axum::{extract::Extension, Json};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::billing::period::PeriodClock;
use crate::billing::plans::PlanFeature;
use crate::billing::quota::{self, QuotaOutcome};
use crate::db::properties;
use crate::error::{AppError, AppResult, PlanLimitBody};
use crate::extractor::AuthUser;

/// key: ai-descriptions -> quota-gated feature endpoint

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DescriptionRequest {
    pub property_id: i32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DescriptionResponse {
    pub property_id: i32,
    pub description: String,
    pub generations_used: i64,
    pub generations_limit: Option<i64>,
}

/// Consumes one `auto_generations` unit before doing any work; a rejected
/// consume returns the structured plan-limit body and leaves no counter
/// mutation behind.
pub async fn generate_description(
    Extension(pool): Extension<PgPool>,
    Extension(clock): Extension<Arc<PeriodClock>>,
    AuthUser { user_id, .. }: AuthUser,
    Json(payload): Json<DescriptionRequest>,
) -> AppResult<Json<DescriptionResponse>> {
    let property = properties::find(&pool, user_id, payload.property_id)
        .await?
        .ok_or(AppError::NotFound)?;

    let outcome = quota::consume(
        &pool,
        &clock,
        user_id,
        PlanFeature::AutoGenerations,
        Utc::now(),
    )
    .await?;
    let (used, limit) = match outcome {
        QuotaOutcome::Allowed { used, limit } => (used, limit),
        QuotaOutcome::LimitReached {
            feature,
            plan_key,
            plan_name,
            limit,
            ..
        } => {
            return Err(AppError::PlanLimit(PlanLimitBody::new(
                feature.as_str(),
                &plan_key,
                &plan_name,
                limit,
            )));
        }
    };

    let rent_line = property
        .monthly_rent
        .map(|rent| format!(" Monthly rent: {rent}."))
        .unwrap_or_default();
    let description = format!(
        "{} is a well-kept rental at {}.{} Contact us to arrange a viewing.",
        property.title, property.address, rent_line
    );

    Ok(Json(DescriptionResponse {
        property_id: property.id,
        description,
        generations_used: used,
        generations_limit: limit,
    }))
}
