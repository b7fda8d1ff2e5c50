use chrono::{Duration, Utc};
use rentledger::billing::latefee::{apply_late_fee, run_late_fee_pass, FeeOutcome, SkipReason};
use rentledger::billing::policy::resolve_policy;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sqlx::PgPool;

// key: late-fee-tests -> idempotency,resolution,force path

async fn seed_account(pool: &PgPool, email: &str) -> (i32, i32, i32) {
    let user_id: i32 =
        sqlx::query_scalar("INSERT INTO users (email, password_hash) VALUES ($1, $2) RETURNING id")
            .bind(email)
            .bind("hashed")
            .fetch_one(pool)
            .await
            .unwrap();
    let property_id: i32 = sqlx::query_scalar(
        "INSERT INTO properties (user_id, title, address) VALUES ($1, $2, $3) RETURNING id",
    )
    .bind(user_id)
    .bind("Elm Street Flat")
    .bind("12 Elm Street")
    .fetch_one(pool)
    .await
    .unwrap();
    let tenant_id: i32 = sqlx::query_scalar(
        "INSERT INTO tenants (user_id, property_id, full_name, email) VALUES ($1, $2, $3, $4) RETURNING id",
    )
    .bind(user_id)
    .bind(property_id)
    .bind("Jordan Miles")
    .bind("jordan@example.com")
    .fetch_one(pool)
    .await
    .unwrap();
    (user_id, tenant_id, property_id)
}

async fn seed_invoice(
    pool: &PgPool,
    user_id: i32,
    tenant_id: i32,
    number: &str,
    total: Decimal,
    days_overdue: i64,
    status: &str,
) -> i32 {
    let today = Utc::now().date_naive();
    sqlx::query_scalar(
        "INSERT INTO invoices
             (user_id, tenant_id, invoice_number, payment_status, invoice_date,
              due_date, subtotal, total_amount, client_name)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $7, 'Jordan Miles')
         RETURNING id",
    )
    .bind(user_id)
    .bind(tenant_id)
    .bind(number)
    .bind(status)
    .bind(today - Duration::days(days_overdue + 14))
    .bind(today - Duration::days(days_overdue))
    .bind(total)
    .fetch_one(pool)
    .await
    .unwrap()
}

async fn seed_flat_default_policy(pool: &PgPool, user_id: i32) -> i32 {
    sqlx::query_scalar(
        "INSERT INTO late_fee_policies
             (user_id, name, policy_type, grace_period_days, amount, is_default)
         VALUES ($1, 'Standard', 'flat', 5, 50.00, TRUE)
         RETURNING id",
    )
    .bind(user_id)
    .fetch_one(pool)
    .await
    .unwrap()
}

#[sqlx::test]
#[ignore = "requires DATABASE_URL with Postgres server"]
async fn same_day_application_is_idempotent(pool: PgPool) {
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();
    let (user_id, tenant_id, _) = seed_account(&pool, "fees@example.com").await;
    seed_flat_default_policy(&pool, user_id).await;
    let invoice_id =
        seed_invoice(&pool, user_id, tenant_id, "INV-1001", dec!(1000.00), 10, "sent").await;

    let now = Utc::now();
    let first = apply_late_fee(&pool, user_id, invoice_id, now, false)
        .await
        .unwrap();
    match first {
        FeeOutcome::Applied {
            fee_amount,
            new_total,
            ..
        } => {
            assert_eq!(fee_amount, dec!(50.00));
            assert_eq!(new_total, dec!(1050.00));
        }
        other => panic!("expected applied outcome, got {other:?}"),
    }

    // Second call on the same calendar day must change nothing.
    let second = apply_late_fee(&pool, user_id, invoice_id, now + Duration::hours(3), false)
        .await
        .unwrap();
    assert!(matches!(
        second,
        FeeOutcome::Skipped {
            reason: SkipReason::AlreadyAppliedToday,
            ..
        }
    ));

    let (late_fee, total): (Decimal, Decimal) =
        sqlx::query_as("SELECT late_fee_amount, total_amount FROM invoices WHERE id = $1")
            .bind(invoice_id)
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(late_fee, dec!(50.00));
    assert_eq!(total, dec!(1050.00));

    let events: i64 = sqlx::query_scalar("SELECT count(*) FROM late_fee_events WHERE invoice_id = $1")
        .bind(invoice_id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(events, 1);
}

#[sqlx::test]
#[ignore = "requires DATABASE_URL with Postgres server"]
async fn tenant_assignment_beats_account_default(pool: PgPool) {
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();
    let (user_id, tenant_id, _) = seed_account(&pool, "override@example.com").await;
    seed_flat_default_policy(&pool, user_id).await;

    // Tenant-specific percentage policy: 5% of 1000 is 50, capped to 40.
    let override_id: i32 = sqlx::query_scalar(
        "INSERT INTO late_fee_policies
             (user_id, name, policy_type, grace_period_days, percentage, max_cap)
         VALUES ($1, 'Strict', 'percentage', 0, 5.00, 40.00)
         RETURNING id",
    )
    .bind(user_id)
    .fetch_one(&pool)
    .await
    .unwrap();
    sqlx::query("UPDATE tenants SET late_fee_policy_id = $1 WHERE id = $2")
        .bind(override_id)
        .bind(tenant_id)
        .execute(&pool)
        .await
        .unwrap();

    let resolved = resolve_policy(&pool, user_id, Some(tenant_id))
        .await
        .unwrap()
        .expect("policy resolves");
    assert_eq!(resolved.id, override_id);

    let invoice_id =
        seed_invoice(&pool, user_id, tenant_id, "INV-2001", dec!(1000.00), 3, "sent").await;
    let outcome = apply_late_fee(&pool, user_id, invoice_id, Utc::now(), false)
        .await
        .unwrap();
    match outcome {
        FeeOutcome::Applied {
            fee_amount,
            new_total,
            ..
        } => {
            assert_eq!(fee_amount, dec!(40.00));
            assert_eq!(new_total, dec!(1040.00));
        }
        other => panic!("expected applied outcome, got {other:?}"),
    }
}

#[sqlx::test]
#[ignore = "requires DATABASE_URL with Postgres server"]
async fn missing_policy_and_missing_tenant_are_no_ops(pool: PgPool) {
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();
    let (user_id, tenant_id, _) = seed_account(&pool, "nopolicy@example.com").await;

    // No policies at all: resolution yields none, application skips.
    assert!(resolve_policy(&pool, user_id, Some(tenant_id))
        .await
        .unwrap()
        .is_none());
    // A tenant id that does not exist also resolves to none, not an error.
    assert!(resolve_policy(&pool, user_id, Some(999_999))
        .await
        .unwrap()
        .is_none());

    let invoice_id =
        seed_invoice(&pool, user_id, tenant_id, "INV-3001", dec!(800.00), 9, "sent").await;
    let outcome = apply_late_fee(&pool, user_id, invoice_id, Utc::now(), false)
        .await
        .unwrap();
    assert!(matches!(
        outcome,
        FeeOutcome::Skipped {
            reason: SkipReason::NoPolicy,
            ..
        }
    ));
}

#[sqlx::test]
#[ignore = "requires DATABASE_URL with Postgres server"]
async fn grace_period_protects_until_exceeded(pool: PgPool) {
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();
    let (user_id, tenant_id, _) = seed_account(&pool, "grace@example.com").await;
    seed_flat_default_policy(&pool, user_id).await;

    // Exactly at the grace boundary: no fee.
    let at_grace =
        seed_invoice(&pool, user_id, tenant_id, "INV-4001", dec!(500.00), 5, "sent").await;
    let outcome = apply_late_fee(&pool, user_id, at_grace, Utc::now(), false)
        .await
        .unwrap();
    assert!(matches!(
        outcome,
        FeeOutcome::Skipped {
            reason: SkipReason::WithinGrace,
            ..
        }
    ));

    // One day past the boundary: the flat fee lands.
    let past_grace =
        seed_invoice(&pool, user_id, tenant_id, "INV-4002", dec!(500.00), 6, "sent").await;
    let outcome = apply_late_fee(&pool, user_id, past_grace, Utc::now(), false)
        .await
        .unwrap();
    assert!(matches!(outcome, FeeOutcome::Applied { .. }));
}

#[sqlx::test]
#[ignore = "requires DATABASE_URL with Postgres server"]
async fn force_bypasses_status_guard_but_not_same_day(pool: PgPool) {
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();
    let (user_id, tenant_id, _) = seed_account(&pool, "force@example.com").await;
    seed_flat_default_policy(&pool, user_id).await;
    let invoice_id =
        seed_invoice(&pool, user_id, tenant_id, "INV-5001", dec!(1000.00), 10, "paid").await;

    let now = Utc::now();
    let plain = apply_late_fee(&pool, user_id, invoice_id, now, false)
        .await
        .unwrap();
    assert!(matches!(
        plain,
        FeeOutcome::Skipped {
            reason: SkipReason::StatusFrozen,
            ..
        }
    ));

    let forced = apply_late_fee(&pool, user_id, invoice_id, now, true)
        .await
        .unwrap();
    assert!(matches!(forced, FeeOutcome::Applied { .. }));

    // Even the administrative override applies at most once per day.
    let forced_again = apply_late_fee(&pool, user_id, invoice_id, now, true)
        .await
        .unwrap();
    assert!(matches!(
        forced_again,
        FeeOutcome::Skipped {
            reason: SkipReason::AlreadyAppliedToday,
            ..
        }
    ));
}

#[sqlx::test]
#[ignore = "requires DATABASE_URL with Postgres server"]
async fn bulk_pass_reports_counts_and_keeps_going(pool: PgPool) {
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();
    let (user_id, tenant_id, _) = seed_account(&pool, "bulk@example.com").await;
    seed_flat_default_policy(&pool, user_id).await;

    seed_invoice(&pool, user_id, tenant_id, "INV-6001", dec!(1000.00), 10, "sent").await;
    seed_invoice(&pool, user_id, tenant_id, "INV-6002", dec!(700.00), 8, "overdue").await;
    // Within grace: processed but skipped.
    seed_invoice(&pool, user_id, tenant_id, "INV-6003", dec!(900.00), 2, "sent").await;

    let summary = run_late_fee_pass(&pool, Utc::now()).await.unwrap();
    assert_eq!(summary.processed, 3);
    assert_eq!(summary.fees_applied, 2);
    assert_eq!(summary.skipped, 1);
    assert!(summary.errors.is_empty());

    // Re-running on the same day applies nothing further.
    let rerun = run_late_fee_pass(&pool, Utc::now()).await.unwrap();
    assert_eq!(rerun.fees_applied, 0);
    assert_eq!(rerun.skipped, 3);
}
