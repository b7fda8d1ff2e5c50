use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{AppError, AppResult};

use super::period::PeriodClock;
use super::plans::{plan_for, PlanFeature};

/// key: usage-quota -> upsert CAS,limit-reached outcome

/// Limit-reached is a legitimate outcome, not an error: callers render an
/// upgrade prompt from it while transport and database failures stay in
/// the Err channel.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase", tag = "outcome")]
pub enum QuotaOutcome {
    #[serde(rename_all = "camelCase")]
    Allowed { used: i64, limit: Option<i64> },
    #[serde(rename_all = "camelCase")]
    LimitReached {
        feature: PlanFeature,
        plan_key: String,
        plan_name: String,
        limit: i64,
        used: i64,
    },
}

/// Exactly-once-per-period increment against the user's plan limit. The
/// whole check-and-increment is one upsert keyed by the unique
/// (user_id, feature, period_start) row: concurrent consumers racing at
/// limit - 1 serialize on that row and at most one passes the guard.
/// Unlimited features touch no row at all.
pub async fn consume(
    pool: &PgPool,
    clock: &PeriodClock,
    user_id: i32,
    feature: PlanFeature,
    now: DateTime<Utc>,
) -> AppResult<QuotaOutcome> {
    let plan_key: String = sqlx::query_scalar("SELECT plan_key FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound)?;
    let plan = plan_for(&plan_key);

    let Some(limit) = plan.limit(feature) else {
        return Ok(QuotaOutcome::Allowed {
            used: 0,
            limit: None,
        });
    };

    let period_start = clock.period_start(now);

    if limit <= 0 {
        return limit_reached(pool, user_id, feature, plan.key, plan.name, limit, period_start).await;
    }

    let incremented: Option<i64> = sqlx::query_scalar(
        r#"
        INSERT INTO usage_counters (id, user_id, feature, period_start, usage_count)
        VALUES ($1, $2, $3, $4, 1)
        ON CONFLICT (user_id, feature, period_start) DO UPDATE
            SET usage_count = usage_counters.usage_count + 1,
                updated_at = now()
            WHERE usage_counters.usage_count < $5
        RETURNING usage_count
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(feature.as_str())
    .bind(period_start)
    .bind(limit)
    .fetch_optional(pool)
    .await?;

    match incremented {
        Some(used) => Ok(QuotaOutcome::Allowed {
            used,
            limit: Some(limit),
        }),
        None => limit_reached(pool, user_id, feature, plan.key, plan.name, limit, period_start).await,
    }
}

async fn limit_reached(
    pool: &PgPool,
    user_id: i32,
    feature: PlanFeature,
    plan_key: &str,
    plan_name: &str,
    limit: i64,
    period_start: DateTime<Utc>,
) -> AppResult<QuotaOutcome> {
    let used: Option<i64> = sqlx::query_scalar(
        "SELECT usage_count FROM usage_counters
         WHERE user_id = $1 AND feature = $2 AND period_start = $3",
    )
    .bind(user_id)
    .bind(feature.as_str())
    .bind(period_start)
    .fetch_optional(pool)
    .await?;

    Ok(QuotaOutcome::LimitReached {
        feature,
        plan_key: plan_key.to_string(),
        plan_name: plan_name.to_string(),
        limit,
        used: used.unwrap_or(0),
    })
}

/// Current-period usage against every feature limit, for the account page.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageSnapshot {
    pub plan_key: String,
    pub plan_name: String,
    pub features: Vec<FeatureUsage>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureUsage {
    pub feature: PlanFeature,
    pub used: i64,
    pub limit: Option<i64>,
}

pub async fn snapshot(
    pool: &PgPool,
    clock: &PeriodClock,
    user_id: i32,
    now: DateTime<Utc>,
) -> AppResult<UsageSnapshot> {
    let plan_key: String = sqlx::query_scalar("SELECT plan_key FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound)?;
    let plan = plan_for(&plan_key);
    let period_start = clock.period_start(now);

    let rows: Vec<(String, i64)> = sqlx::query_as(
        "SELECT feature, usage_count FROM usage_counters
         WHERE user_id = $1 AND period_start = $2",
    )
    .bind(user_id)
    .bind(period_start)
    .fetch_all(pool)
    .await?;

    let features = PlanFeature::ALL
        .into_iter()
        .map(|feature| FeatureUsage {
            feature,
            used: rows
                .iter()
                .find(|(name, _)| name == feature.as_str())
                .map(|(_, count)| *count)
                .unwrap_or(0),
            limit: plan.limit(feature),
        })
        .collect();

    Ok(UsageSnapshot {
        plan_key: plan.key.to_string(),
        plan_name: plan.name.to_string(),
        features,
    })
}
