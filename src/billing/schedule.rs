use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::PgPool;
use tracing::{info, warn};

use crate::db::{properties, tenants};
use crate::error::{AppError, AppResult};

use super::models::{invoice_totals, Invoice, LineItem, RecurringSchedule};
use super::notify::InvoiceNotifier;
use super::recurrence::{self, Frequency};

/// key: recurring-runner -> due scan,idempotent materialization,CAS advance

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleInput {
    pub tenant_id: i32,
    pub property_id: i32,
    pub line_items: Vec<LineItem>,
    #[serde(default)]
    pub tax_rate: Decimal,
    pub frequency: String,
    pub day_of_month: i32,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

impl ScheduleInput {
    pub fn validate(&self) -> Result<Frequency, String> {
        let frequency = Frequency::parse(&self.frequency)
            .ok_or_else(|| format!("unknown frequency '{}'", self.frequency))?;
        if !(1..=31).contains(&self.day_of_month) {
            return Err("dayOfMonth must be between 1 and 31".into());
        }
        if self.line_items.is_empty() {
            return Err("lineItems must not be empty".into());
        }
        if self.tax_rate < Decimal::ZERO || self.tax_rate > Decimal::ONE_HUNDRED {
            return Err("taxRate must be between 0 and 100".into());
        }
        if let Some(end) = self.end_date {
            if end < self.start_date {
                return Err("endDate must not precede startDate".into());
            }
        }
        Ok(frequency)
    }
}

/// First generation date for a schedule: anchored at start_date, strictly
/// after both the start date and "today". Never trusted from the caller.
pub fn initial_generation_date(
    start_date: NaiveDate,
    frequency: Frequency,
    day_of_month: u32,
    today: NaiveDate,
) -> NaiveDate {
    recurrence::next_after(start_date, frequency, day_of_month, start_date.max(today))
}

pub async fn list_schedules(pool: &PgPool, user_id: i32) -> AppResult<Vec<RecurringSchedule>> {
    let schedules = sqlx::query_as::<_, RecurringSchedule>(
        "SELECT * FROM recurring_invoice_schedules WHERE user_id = $1 ORDER BY id",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;
    Ok(schedules)
}

pub async fn create_schedule(
    pool: &PgPool,
    user_id: i32,
    input: &ScheduleInput,
    today: NaiveDate,
) -> AppResult<RecurringSchedule> {
    let frequency = input.validate().map_err(AppError::BadRequest)?;
    let next = initial_generation_date(
        input.start_date,
        frequency,
        input.day_of_month as u32,
        today,
    );
    let schedule = sqlx::query_as::<_, RecurringSchedule>(
        r#"
        INSERT INTO recurring_invoice_schedules
            (user_id, tenant_id, property_id, line_items, tax_rate, frequency,
             day_of_month, start_date, end_date, is_active, next_generation_date)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        RETURNING *
        "#,
    )
    .bind(user_id)
    .bind(input.tenant_id)
    .bind(input.property_id)
    .bind(Json(&input.line_items))
    .bind(input.tax_rate)
    .bind(&input.frequency)
    .bind(input.day_of_month)
    .bind(input.start_date)
    .bind(input.end_date)
    .bind(input.is_active)
    .bind(next)
    .fetch_one(pool)
    .await?;
    Ok(schedule)
}

pub async fn update_schedule(
    pool: &PgPool,
    user_id: i32,
    schedule_id: i32,
    input: &ScheduleInput,
    today: NaiveDate,
) -> AppResult<RecurringSchedule> {
    let frequency = input.validate().map_err(AppError::BadRequest)?;
    let next = initial_generation_date(
        input.start_date,
        frequency,
        input.day_of_month as u32,
        today,
    );
    let schedule = sqlx::query_as::<_, RecurringSchedule>(
        r#"
        UPDATE recurring_invoice_schedules
        SET tenant_id = $3,
            property_id = $4,
            line_items = $5,
            tax_rate = $6,
            frequency = $7,
            day_of_month = $8,
            start_date = $9,
            end_date = $10,
            is_active = $11,
            next_generation_date = $12,
            updated_at = now()
        WHERE id = $1 AND user_id = $2
        RETURNING *
        "#,
    )
    .bind(schedule_id)
    .bind(user_id)
    .bind(input.tenant_id)
    .bind(input.property_id)
    .bind(Json(&input.line_items))
    .bind(input.tax_rate)
    .bind(&input.frequency)
    .bind(input.day_of_month)
    .bind(input.start_date)
    .bind(input.end_date)
    .bind(input.is_active)
    .bind(next)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::NotFound)?;
    Ok(schedule)
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub generated: Vec<Invoice>,
    pub promoted: u32,
    pub skipped: u32,
    pub errors: Vec<ScheduleItemError>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleItemError {
    pub schedule_id: i32,
    pub message: String,
}

enum Materialized {
    Generated(Invoice),
    Promoted,
    Skipped,
}

/// Materializes every due schedule. One schedule failing (missing tenant,
/// malformed template) is recorded and the pass continues; duplicate runs
/// for the same period collide on (user_id, invoice_number) and advance
/// nothing twice thanks to the CAS on next_generation_date.
pub async fn run_due(
    pool: &PgPool,
    notifier: &dyn InvoiceNotifier,
    now: DateTime<Utc>,
    auto_send: bool,
    due_term_days: i64,
) -> AppResult<RunSummary> {
    let today = now.date_naive();
    let due = sqlx::query_as::<_, RecurringSchedule>(
        "SELECT * FROM recurring_invoice_schedules
         WHERE is_active
           AND next_generation_date <= $1
           AND (end_date IS NULL OR end_date >= $1)
         ORDER BY id",
    )
    .bind(today)
    .fetch_all(pool)
    .await?;

    let mut summary = RunSummary::default();
    for schedule in due {
        match materialize(pool, &schedule, now, auto_send, due_term_days).await {
            Ok(Materialized::Generated(invoice)) => {
                info!(
                    schedule_id = schedule.id,
                    invoice_number = %invoice.invoice_number,
                    "generated recurring invoice"
                );
                notifier.invoice_generated(&invoice).await;
                summary.generated.push(invoice);
            }
            Ok(Materialized::Promoted) => summary.promoted += 1,
            Ok(Materialized::Skipped) => summary.skipped += 1,
            Err(err) => {
                warn!(schedule_id = schedule.id, ?err, "schedule materialization failed");
                summary.errors.push(ScheduleItemError {
                    schedule_id: schedule.id,
                    message: err.to_string(),
                });
            }
        }
    }
    Ok(summary)
}

/// Deterministic per-period number; re-running the same period produces
/// the same number and is caught by the unique key instead of duplicating.
pub fn invoice_number_for(schedule: &RecurringSchedule) -> String {
    let period = schedule.next_generation_date;
    format!(
        "RENT-{}-{}-{:02}",
        schedule.tenant_id,
        period.year(),
        period.month()
    )
}

async fn materialize(
    pool: &PgPool,
    schedule: &RecurringSchedule,
    now: DateTime<Utc>,
    auto_send: bool,
    due_term_days: i64,
) -> AppResult<Materialized> {
    let tenant = tenants::find(pool, schedule.user_id, schedule.tenant_id)
        .await?
        .ok_or_else(|| AppError::Message(format!("tenant {} not found", schedule.tenant_id)))?;
    let property = properties::find(pool, schedule.user_id, schedule.property_id)
        .await?
        .ok_or_else(|| AppError::Message(format!("property {} not found", schedule.property_id)))?;

    let invoice_number = invoice_number_for(schedule);
    let invoice_date = schedule.next_generation_date;
    let due_date = invoice_date + Duration::days(due_term_days);
    let (subtotal, tax_amount, total) = invoice_totals(&schedule.line_items, schedule.tax_rate);
    let status = if auto_send { "sent" } else { "draft" };

    let frequency = Frequency::parse(&schedule.frequency)
        .ok_or_else(|| AppError::Message(format!("schedule {} has unknown frequency", schedule.id)))?;
    let today = now.date_naive();
    let next = recurrence::next_after(
        schedule.start_date,
        frequency,
        schedule.day_of_month as u32,
        today,
    );

    let mut tx = pool.begin().await?;
    let inserted = sqlx::query_as::<_, Invoice>(
        r#"
        INSERT INTO invoices
            (user_id, tenant_id, property_id, invoice_number, payment_status,
             invoice_date, due_date, line_items, subtotal, tax_rate, tax_amount,
             total_amount, client_name, client_email, client_phone, client_address)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
        ON CONFLICT ON CONSTRAINT invoices_user_number_key DO NOTHING
        RETURNING *
        "#,
    )
    .bind(schedule.user_id)
    .bind(schedule.tenant_id)
    .bind(schedule.property_id)
    .bind(&invoice_number)
    .bind(status)
    .bind(invoice_date)
    .bind(due_date)
    .bind(Json(&schedule.line_items.0))
    .bind(subtotal)
    .bind(schedule.tax_rate)
    .bind(tax_amount)
    .bind(total)
    .bind(&tenant.full_name)
    .bind(&tenant.email)
    .bind(&tenant.phone)
    .bind(&property.address)
    .fetch_optional(&mut tx)
    .await?;

    let mut promoted = false;
    if inserted.is_none() && auto_send {
        // The period's invoice already exists; still honor auto-send for
        // drafts left behind by an earlier run.
        let result = sqlx::query(
            "UPDATE invoices SET payment_status = 'sent', updated_at = now()
             WHERE user_id = $1 AND invoice_number = $2 AND payment_status = 'draft'",
        )
        .bind(schedule.user_id)
        .bind(&invoice_number)
        .execute(&mut tx)
        .await?;
        promoted = result.rows_affected() > 0;
    }

    let advanced = sqlx::query(
        "UPDATE recurring_invoice_schedules
         SET last_generated_at = $3, next_generation_date = $4, updated_at = now()
         WHERE id = $1 AND next_generation_date = $2",
    )
    .bind(schedule.id)
    .bind(schedule.next_generation_date)
    .bind(now)
    .bind(next)
    .execute(&mut tx)
    .await?;

    if advanced.rows_affected() == 0 {
        // A concurrent runner already advanced this schedule.
        tx.rollback().await?;
        return Ok(Materialized::Skipped);
    }
    tx.commit().await?;

    Ok(match inserted {
        Some(invoice) => Materialized::Generated(invoice),
        None if promoted => Materialized::Promoted,
        None => Materialized::Skipped,
    })
}
