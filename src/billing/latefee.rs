use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::{PgPool, Row};
use tracing::warn;
use uuid::Uuid;

use crate::error::{AppError, AppResult};

use super::lifecycle::{self, InvoiceStatus};
use super::models::LateFeePolicy;
use super::policy::{self, POLICY_TYPE_PERCENTAGE};

/// key: late-fee-engine -> pure calculation,guarded application

/// Fee for an overdue invoice under a policy. Zero within the grace
/// period, flat amount or percentage of the invoice amount otherwise,
/// clamped to the cap and floored at zero. Pure; no I/O.
pub fn calculate_late_fee(
    invoice_amount: Decimal,
    days_overdue: i64,
    policy: &LateFeePolicy,
) -> Decimal {
    if days_overdue <= i64::from(policy.grace_period_days) {
        return Decimal::ZERO;
    }
    let raw = if policy.policy_type == POLICY_TYPE_PERCENTAGE {
        let percentage = policy.percentage.unwrap_or(Decimal::ZERO);
        (invoice_amount * percentage / Decimal::ONE_HUNDRED).round_dp(2)
    } else {
        policy.amount.unwrap_or(Decimal::ZERO)
    };
    let capped = match policy.max_cap {
        Some(cap) if raw > cap => cap,
        _ => raw,
    };
    capped.max(Decimal::ZERO)
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase", tag = "outcome")]
pub enum FeeOutcome {
    #[serde(rename_all = "camelCase")]
    Applied {
        invoice_id: i32,
        fee_amount: Decimal,
        new_total: Decimal,
        days_overdue: i64,
    },
    #[serde(rename_all = "camelCase")]
    Skipped { invoice_id: i32, reason: SkipReason },
}

/// Which guard stopped the application. Surfaced to callers so a failed
/// single-invoice request is diagnosable without blind retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SkipReason {
    NoPolicy,
    StatusFrozen,
    NotOverdue,
    AlreadyAppliedToday,
    WithinGrace,
    ConcurrentApplier,
}

/// Applies at most one fee per invoice per UTC day. `force` bypasses the
/// status and overdue guards (administrative override); the same-day guard
/// and the grace period always hold. The mutation is a single guarded
/// UPDATE so concurrent appliers serialize on the stored row: the loser
/// matches zero rows and reports `ConcurrentApplier`.
pub async fn apply_late_fee(
    pool: &PgPool,
    user_id: i32,
    invoice_id: i32,
    now: DateTime<Utc>,
    force: bool,
) -> AppResult<FeeOutcome> {
    let row = sqlx::query(
        "SELECT tenant_id, payment_status, due_date, total_amount, late_fee_applied_at
         FROM invoices WHERE id = $1 AND user_id = $2",
    )
    .bind(invoice_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::NotFound)?;

    let tenant_id: Option<i32> = row.get("tenant_id");
    let status_raw: String = row.get("payment_status");
    let due_date: chrono::NaiveDate = row.get("due_date");
    let total_amount: Decimal = row.get("total_amount");
    let applied_at: Option<DateTime<Utc>> = row.get("late_fee_applied_at");

    let status = InvoiceStatus::parse(&status_raw)
        .ok_or_else(|| AppError::Message(format!("invoice {invoice_id} has unknown status '{status_raw}'")))?;
    let days = lifecycle::days_overdue(due_date, now.date_naive());

    let skip = |reason| Ok(FeeOutcome::Skipped { invoice_id, reason });

    if lifecycle::applied_today(applied_at, now) {
        return skip(SkipReason::AlreadyAppliedToday);
    }
    if !force {
        if status.is_frozen() {
            return skip(SkipReason::StatusFrozen);
        }
        if days == 0 {
            return skip(SkipReason::NotOverdue);
        }
    }

    let Some(policy) = policy::resolve_policy(pool, user_id, tenant_id).await? else {
        return skip(SkipReason::NoPolicy);
    };

    let fee = calculate_late_fee(total_amount, days, &policy);
    if fee <= Decimal::ZERO {
        return skip(SkipReason::WithinGrace);
    }

    let applied_on = now.date_naive();
    let mut tx = pool.begin().await?;
    let updated = sqlx::query(
        r#"
        UPDATE invoices
        SET late_fee_amount = late_fee_amount + $3,
            total_amount = total_amount + $3,
            late_fee_applied_at = $4,
            updated_at = now()
        WHERE id = $1 AND user_id = $2
          AND (late_fee_applied_at IS NULL
               OR (late_fee_applied_at AT TIME ZONE 'utc')::date <> $5)
          AND (payment_status NOT IN ('paid', 'cancelled') OR $6)
        RETURNING total_amount
        "#,
    )
    .bind(invoice_id)
    .bind(user_id)
    .bind(fee)
    .bind(now)
    .bind(applied_on)
    .bind(force)
    .fetch_optional(&mut tx)
    .await?;

    let Some(updated) = updated else {
        tx.rollback().await?;
        return skip(SkipReason::ConcurrentApplier);
    };
    let new_total: Decimal = updated.get("total_amount");

    sqlx::query(
        "INSERT INTO late_fee_events
             (id, invoice_id, user_id, policy_id, fee_amount, days_overdue, applied_on)
         VALUES ($1, $2, $3, $4, $5, $6, $7)",
    )
    .bind(Uuid::new_v4())
    .bind(invoice_id)
    .bind(user_id)
    .bind(policy.id)
    .bind(fee)
    .bind(days as i32)
    .bind(applied_on)
    .execute(&mut tx)
    .await?;
    tx.commit().await?;

    Ok(FeeOutcome::Applied {
        invoice_id,
        fee_amount: fee,
        new_total,
        days_overdue: days,
    })
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LateFeeRunSummary {
    pub processed: u32,
    pub fees_applied: u32,
    pub skipped: u32,
    pub errors: Vec<InvoiceItemError>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceItemError {
    pub invoice_id: i32,
    pub message: String,
}

/// Bulk pass over every open invoice past its due date. Per-invoice
/// failures are collected, never propagated, so one broken record cannot
/// stall the rest of the cron run.
pub async fn run_late_fee_pass(pool: &PgPool, now: DateTime<Utc>) -> AppResult<LateFeeRunSummary> {
    let candidates: Vec<(i32, i32)> = sqlx::query_as(
        "SELECT id, user_id FROM invoices
         WHERE payment_status NOT IN ('paid', 'cancelled') AND due_date < $1
         ORDER BY id",
    )
    .bind(now.date_naive())
    .fetch_all(pool)
    .await?;

    let mut summary = LateFeeRunSummary::default();
    for (invoice_id, user_id) in candidates {
        summary.processed += 1;
        match apply_late_fee(pool, user_id, invoice_id, now, false).await {
            Ok(FeeOutcome::Applied { .. }) => summary.fees_applied += 1,
            Ok(FeeOutcome::Skipped { .. }) => summary.skipped += 1,
            Err(err) => {
                warn!(invoice_id, ?err, "late fee application failed");
                summary.errors.push(InvoiceItemError {
                    invoice_id,
                    message: err.to_string(),
                });
            }
        }
    }
    Ok(summary)
}
