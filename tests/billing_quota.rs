use std::sync::Arc;

use chrono::Utc;
use rentledger::billing::period::PeriodClock;
use rentledger::billing::plans::PlanFeature;
use rentledger::billing::quota::{consume, snapshot, QuotaOutcome};
use sqlx::PgPool;

// key: quota-tests -> boundary enforcement,concurrent racers

async fn seed_user(pool: &PgPool, email: &str, plan_key: &str) -> i32 {
    sqlx::query_scalar(
        "INSERT INTO users (email, password_hash, plan_key) VALUES ($1, $2, $3) RETURNING id",
    )
    .bind(email)
    .bind("hashed")
    .bind(plan_key)
    .fetch_one(pool)
    .await
    .unwrap()
}

#[sqlx::test]
#[ignore = "requires DATABASE_URL with Postgres server"]
async fn limit_holds_at_the_boundary(pool: PgPool) {
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();
    // Free plan: 5 auto generations per period.
    let user_id = seed_user(&pool, "quota@example.com", "free").await;
    let clock = PeriodClock::new();
    let now = Utc::now();

    for expected in 1..=5_i64 {
        let outcome = consume(&pool, &clock, user_id, PlanFeature::AutoGenerations, now)
            .await
            .unwrap();
        match outcome {
            QuotaOutcome::Allowed { used, limit } => {
                assert_eq!(used, expected);
                assert_eq!(limit, Some(5));
            }
            other => panic!("call {expected} should be allowed, got {other:?}"),
        }
    }

    let sixth = consume(&pool, &clock, user_id, PlanFeature::AutoGenerations, now)
        .await
        .unwrap();
    match sixth {
        QuotaOutcome::LimitReached {
            feature,
            plan_key,
            limit,
            used,
            ..
        } => {
            assert_eq!(feature, PlanFeature::AutoGenerations);
            assert_eq!(plan_key, "free");
            assert_eq!(limit, 5);
            assert_eq!(used, 5);
        }
        other => panic!("sixth call should hit the limit, got {other:?}"),
    }

    // The rejected call left the counter untouched.
    let count: i64 =
        sqlx::query_scalar("SELECT usage_count FROM usage_counters WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(count, 5);
}

#[sqlx::test]
#[ignore = "requires DATABASE_URL with Postgres server"]
async fn concurrent_racers_never_overshoot(pool: PgPool) {
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();
    let user_id = seed_user(&pool, "racers@example.com", "free").await;
    let clock = Arc::new(PeriodClock::new());
    let now = Utc::now();

    // Walk the counter to limit - 1.
    for _ in 0..4 {
        let outcome = consume(&pool, &clock, user_id, PlanFeature::AutoGenerations, now)
            .await
            .unwrap();
        assert!(matches!(outcome, QuotaOutcome::Allowed { .. }));
    }

    // Several callers race for the final slot; exactly one may win.
    let mut handles = Vec::new();
    for _ in 0..4 {
        let pool = pool.clone();
        let clock = clock.clone();
        handles.push(tokio::spawn(async move {
            consume(&pool, &clock, user_id, PlanFeature::AutoGenerations, now).await
        }));
    }
    let mut allowed = 0;
    for handle in handles {
        if let QuotaOutcome::Allowed { .. } = handle.await.unwrap().unwrap() {
            allowed += 1;
        }
    }
    assert_eq!(allowed, 1);

    let count: i64 =
        sqlx::query_scalar("SELECT usage_count FROM usage_counters WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(count, 5);
}

#[sqlx::test]
#[ignore = "requires DATABASE_URL with Postgres server"]
async fn unlimited_plan_touches_no_rows(pool: PgPool) {
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();
    let user_id = seed_user(&pool, "business@example.com", "business").await;
    let clock = PeriodClock::new();

    for _ in 0..3 {
        let outcome = consume(&pool, &clock, user_id, PlanFeature::Leads, Utc::now())
            .await
            .unwrap();
        assert!(matches!(outcome, QuotaOutcome::Allowed { limit: None, .. }));
    }

    let rows: i64 = sqlx::query_scalar("SELECT count(*) FROM usage_counters WHERE user_id = $1")
        .bind(user_id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(rows, 0);
}

#[sqlx::test]
#[ignore = "requires DATABASE_URL with Postgres server"]
async fn snapshot_reports_per_feature_usage(pool: PgPool) {
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();
    let user_id = seed_user(&pool, "snapshot@example.com", "free").await;
    let clock = PeriodClock::new();
    let now = Utc::now();

    consume(&pool, &clock, user_id, PlanFeature::AutoGenerations, now)
        .await
        .unwrap();
    consume(&pool, &clock, user_id, PlanFeature::AutoGenerations, now)
        .await
        .unwrap();
    consume(&pool, &clock, user_id, PlanFeature::PropertyPosts, now)
        .await
        .unwrap();

    let snapshot = snapshot(&pool, &clock, user_id, now).await.unwrap();
    assert_eq!(snapshot.plan_key, "free");
    let generations = snapshot
        .features
        .iter()
        .find(|f| f.feature == PlanFeature::AutoGenerations)
        .unwrap();
    assert_eq!(generations.used, 2);
    assert_eq!(generations.limit, Some(5));
    let leads = snapshot
        .features
        .iter()
        .find(|f| f.feature == PlanFeature::Leads)
        .unwrap();
    assert_eq!(leads.used, 0);
}
