use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::{FromRow, PgPool};

/// Tenant records are owned by the surrounding CRUD API. The engine reads
/// them for client snapshots and for the late-fee policy assignment.
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Tenant {
    pub id: i32,
    pub user_id: i32,
    pub property_id: Option<i32>,
    pub full_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub rent_amount: Option<Decimal>,
    pub late_fee_policy_id: Option<i32>,
    pub created_at: DateTime<Utc>,
}

pub async fn find(
    pool: &PgPool,
    user_id: i32,
    tenant_id: i32,
) -> Result<Option<Tenant>, sqlx::Error> {
    sqlx::query_as::<_, Tenant>("SELECT * FROM tenants WHERE id = $1 AND user_id = $2")
        .bind(tenant_id)
        .bind(user_id)
        .fetch_optional(pool)
        .await
}
