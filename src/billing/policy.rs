use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::PgPool;

use crate::error::{AppError, AppResult};

use super::models::LateFeePolicy;

/// key: late-fee-policy -> validation,default swap,resolution

pub const POLICY_TYPE_FLAT: &str = "flat";
pub const POLICY_TYPE_PERCENTAGE: &str = "percentage";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyInput {
    pub name: String,
    #[serde(rename = "type")]
    pub policy_type: String,
    #[serde(default)]
    pub grace_period_days: i32,
    pub amount: Option<Decimal>,
    pub percentage: Option<Decimal>,
    pub max_cap: Option<Decimal>,
    #[serde(default)]
    pub is_default: bool,
}

impl PolicyInput {
    /// Rejected before any state mutation; the message names the field
    /// that failed.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("name must not be empty".into());
        }
        if self.grace_period_days < 0 {
            return Err("gracePeriodDays must be >= 0".into());
        }
        match self.policy_type.as_str() {
            POLICY_TYPE_FLAT => {
                let amount = self.amount.ok_or("amount is required for flat policies")?;
                if amount < Decimal::ZERO {
                    return Err("amount must be >= 0".into());
                }
            }
            POLICY_TYPE_PERCENTAGE => {
                let percentage = self
                    .percentage
                    .ok_or("percentage is required for percentage policies")?;
                if percentage < Decimal::ZERO || percentage > Decimal::ONE_HUNDRED {
                    return Err("percentage must be between 0 and 100".into());
                }
            }
            other => return Err(format!("unknown policy type '{other}'")),
        }
        if let Some(cap) = self.max_cap {
            if cap <= Decimal::ZERO {
                return Err("maxCap must be positive when set".into());
            }
        }
        Ok(())
    }
}

pub async fn list_policies(pool: &PgPool, user_id: i32) -> AppResult<Vec<LateFeePolicy>> {
    let policies = sqlx::query_as::<_, LateFeePolicy>(
        "SELECT * FROM late_fee_policies WHERE user_id = $1 ORDER BY created_at ASC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;
    Ok(policies)
}

pub async fn create_policy(
    pool: &PgPool,
    user_id: i32,
    input: &PolicyInput,
) -> AppResult<LateFeePolicy> {
    input.validate().map_err(AppError::BadRequest)?;

    let mut tx = pool.begin().await?;
    if input.is_default {
        clear_default(&mut tx, user_id).await?;
    }
    let policy = sqlx::query_as::<_, LateFeePolicy>(
        r#"
        INSERT INTO late_fee_policies
            (user_id, name, policy_type, grace_period_days, amount, percentage, max_cap, is_default)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING *
        "#,
    )
    .bind(user_id)
    .bind(&input.name)
    .bind(&input.policy_type)
    .bind(input.grace_period_days)
    .bind(input.amount)
    .bind(input.percentage)
    .bind(input.max_cap)
    .bind(input.is_default)
    .fetch_one(&mut tx)
    .await?;
    tx.commit().await?;
    Ok(policy)
}

pub async fn update_policy(
    pool: &PgPool,
    user_id: i32,
    policy_id: i32,
    input: &PolicyInput,
) -> AppResult<LateFeePolicy> {
    input.validate().map_err(AppError::BadRequest)?;

    let mut tx = pool.begin().await?;
    if input.is_default {
        clear_default(&mut tx, user_id).await?;
    }
    let policy = sqlx::query_as::<_, LateFeePolicy>(
        r#"
        UPDATE late_fee_policies
        SET name = $3,
            policy_type = $4,
            grace_period_days = $5,
            amount = $6,
            percentage = $7,
            max_cap = $8,
            is_default = $9,
            updated_at = now()
        WHERE id = $1 AND user_id = $2
        RETURNING *
        "#,
    )
    .bind(policy_id)
    .bind(user_id)
    .bind(&input.name)
    .bind(&input.policy_type)
    .bind(input.grace_period_days)
    .bind(input.amount)
    .bind(input.percentage)
    .bind(input.max_cap)
    .bind(input.is_default)
    .fetch_optional(&mut tx)
    .await?
    .ok_or(AppError::NotFound)?;
    tx.commit().await?;
    Ok(policy)
}

pub async fn delete_policy(pool: &PgPool, user_id: i32, policy_id: i32) -> AppResult<()> {
    let result = sqlx::query("DELETE FROM late_fee_policies WHERE id = $1 AND user_id = $2")
        .bind(policy_id)
        .bind(user_id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::NotFound);
    }
    Ok(())
}

/// Unsets the previous default inside the caller's transaction so the
/// partial unique index never sees two defaults for one user.
async fn clear_default(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    user_id: i32,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE late_fee_policies SET is_default = FALSE, updated_at = now()
         WHERE user_id = $1 AND is_default",
    )
    .bind(user_id)
    .execute(tx)
    .await?;
    Ok(())
}

/// Effective policy for a tenant: the tenant's explicit assignment wins,
/// then the owner's default, then none. A missing tenant resolves to no
/// policy rather than an error so the bulk pass keeps moving.
pub async fn resolve_policy(
    pool: &PgPool,
    user_id: i32,
    tenant_id: Option<i32>,
) -> AppResult<Option<LateFeePolicy>> {
    if let Some(tenant_id) = tenant_id {
        let assigned = sqlx::query_as::<_, LateFeePolicy>(
            r#"
            SELECT p.* FROM late_fee_policies p
            JOIN tenants t ON t.late_fee_policy_id = p.id
            WHERE t.id = $1 AND t.user_id = $2
            "#,
        )
        .bind(tenant_id)
        .bind(user_id)
        .fetch_optional(pool)
        .await?;
        if assigned.is_some() {
            return Ok(assigned);
        }
    }

    let fallback = sqlx::query_as::<_, LateFeePolicy>(
        "SELECT * FROM late_fee_policies WHERE user_id = $1 AND is_default",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?;
    Ok(fallback)
}
