use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::{FromRow, PgPool};

/// Property records are owned by the surrounding CRUD API; the billing
/// engine only reads them for invoice snapshots.
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Property {
    pub id: i32,
    pub user_id: i32,
    pub title: String,
    pub address: String,
    pub monthly_rent: Option<Decimal>,
    pub created_at: DateTime<Utc>,
}

pub async fn find(
    pool: &PgPool,
    user_id: i32,
    property_id: i32,
) -> Result<Option<Property>, sqlx::Error> {
    sqlx::query_as::<_, Property>("SELECT * FROM properties WHERE id = $1 AND user_id = $2")
        .bind(property_id)
        .bind(user_id)
        .fetch_optional(pool)
        .await
}
