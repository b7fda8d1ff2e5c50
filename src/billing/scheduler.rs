use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tokio::time::{self, Duration as TokioDuration};
use tracing::{info, warn};

use crate::config;
use crate::error::AppResult;

use super::latefee;
use super::notify::{InvoiceNotifier, LogNotifier};
use super::schedule;

/// key: billing-loop -> optional in-process cadence
///
/// External cron hitting the /cron endpoints is the reference trigger;
/// this loop exists for single-process deployments and stays off unless
/// BILLING_SCAN_INTERVAL_SECS is set above zero. Either way "now" is read
/// once per tick and threaded through both passes.
pub fn spawn(pool: PgPool) {
    let Some(secs) = *config::BILLING_SCAN_INTERVAL_SECS else {
        info!("billing scan loop disabled; relying on external cron");
        return;
    };
    let auto_send = *config::RECURRING_AUTO_SEND;
    let due_term_days = *config::INVOICE_DUE_TERM_DAYS;

    tokio::spawn(async move {
        let notifier = LogNotifier;
        let mut ticker = time::interval(TokioDuration::from_secs(secs));
        loop {
            ticker.tick().await;
            let now = Utc::now();
            if let Err(err) = process_tick(&pool, &notifier, now, auto_send, due_term_days).await {
                warn!(?err, "billing tick failed");
            }
        }
    });
}

/// One pass of both engines: materialize due schedules, then sweep
/// overdue invoices for late fees.
pub async fn process_tick(
    pool: &PgPool,
    notifier: &dyn InvoiceNotifier,
    now: DateTime<Utc>,
    auto_send: bool,
    due_term_days: i64,
) -> AppResult<()> {
    let run = schedule::run_due(pool, notifier, now, auto_send, due_term_days).await?;
    info!(
        generated = run.generated.len(),
        promoted = run.promoted,
        skipped = run.skipped,
        errors = run.errors.len(),
        "recurring invoice pass finished"
    );

    let fees = latefee::run_late_fee_pass(pool, now).await?;
    info!(
        processed = fees.processed,
        fees_applied = fees.fees_applied,
        skipped = fees.skipped,
        errors = fees.errors.len(),
        "late fee pass finished"
    );
    Ok(())
}
