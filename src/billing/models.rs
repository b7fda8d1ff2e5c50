use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

/// key: billing-models -> invoices,schedules,policies,counters

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    pub description: String,
    pub quantity: Decimal,
    pub rate: Decimal,
    pub amount: Decimal,
}

#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Invoice {
    pub id: i32,
    pub user_id: i32,
    pub tenant_id: Option<i32>,
    pub property_id: Option<i32>,
    pub invoice_number: String,
    pub payment_status: String,
    pub invoice_date: NaiveDate,
    pub due_date: NaiveDate,
    pub line_items: Json<Vec<LineItem>>,
    pub subtotal: Decimal,
    pub tax_rate: Decimal,
    pub tax_amount: Decimal,
    pub late_fee_amount: Decimal,
    pub total_amount: Decimal,
    pub client_name: String,
    pub client_email: Option<String>,
    pub client_phone: Option<String>,
    pub client_address: Option<String>,
    pub late_fee_applied_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecurringSchedule {
    pub id: i32,
    pub user_id: i32,
    pub tenant_id: i32,
    pub property_id: i32,
    pub line_items: Json<Vec<LineItem>>,
    pub tax_rate: Decimal,
    pub frequency: String,
    pub day_of_month: i32,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub is_active: bool,
    pub last_generated_at: Option<DateTime<Utc>>,
    pub next_generation_date: NaiveDate,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LateFeePolicy {
    pub id: i32,
    pub user_id: i32,
    pub name: String,
    pub policy_type: String,
    pub grace_period_days: i32,
    pub amount: Option<Decimal>,
    pub percentage: Option<Decimal>,
    pub max_cap: Option<Decimal>,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LateFeeEvent {
    pub id: Uuid,
    pub invoice_id: i32,
    pub user_id: i32,
    pub policy_id: Option<i32>,
    pub fee_amount: Decimal,
    pub days_overdue: i32,
    pub applied_on: NaiveDate,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageCounter {
    pub id: Uuid,
    pub user_id: i32,
    pub feature: String,
    pub period_start: DateTime<Utc>,
    pub usage_count: i64,
    pub updated_at: DateTime<Utc>,
}

/// Computes the money parts for an invoice built from a line-item template.
/// Tax rounds to two decimals; the totals invariant
/// total = subtotal + tax + late fees holds by construction.
pub fn invoice_totals(line_items: &[LineItem], tax_rate: Decimal) -> (Decimal, Decimal, Decimal) {
    let subtotal: Decimal = line_items
        .iter()
        .map(|item| item.amount)
        .sum::<Decimal>()
        .round_dp(2);
    let tax_amount = (subtotal * tax_rate / Decimal::ONE_HUNDRED).round_dp(2);
    let total = subtotal + tax_amount;
    (subtotal, tax_amount, total)
}
