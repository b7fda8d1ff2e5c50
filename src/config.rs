use once_cell::sync::Lazy;

/// Secret used for JWT signing. Must be set via the `JWT_SECRET` env variable.
pub static JWT_SECRET: Lazy<String> =
    Lazy::new(|| std::env::var("JWT_SECRET").expect("JWT_SECRET must be set"));

/// Address the HTTP server should bind to. Defaults to `0.0.0.0`.
pub static BIND_ADDRESS: Lazy<String> =
    Lazy::new(|| std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0".to_string()));

/// Port the HTTP server should listen on. Defaults to `3000`.
pub static BIND_PORT: Lazy<u16> = Lazy::new(|| {
    std::env::var("BIND_PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(3000)
});

/// When set to a truthy value, allows the application to continue running even if database
/// migrations fail. Defaults to `false`.
pub static ALLOW_MIGRATION_FAILURE: Lazy<bool> = Lazy::new(|| {
    std::env::var("ALLOW_MIGRATION_FAILURE")
        .ok()
        .map(|value| {
            let normalized = value.trim().to_ascii_lowercase();
            matches!(normalized.as_str(), "1" | "true" | "yes")
        })
        .unwrap_or(false)
});

/// key: billing-config -> shared secret for the /cron endpoints
///
/// Unset means the cron endpoints refuse every request.
pub static CRON_SHARED_SECRET: Lazy<Option<String>> =
    Lazy::new(|| read_optional_env("CRON_SHARED_SECRET"));

/// key: billing-config -> in-process scan cadence (unset or 0 = disabled)
pub static BILLING_SCAN_INTERVAL_SECS: Lazy<Option<u64>> = Lazy::new(|| {
    std::env::var("BILLING_SCAN_INTERVAL_SECS")
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .filter(|value| *value > 0)
});

/// key: billing-config -> generated recurring invoices start as sent (true)
/// or draft (false)
pub static RECURRING_AUTO_SEND: Lazy<bool> = Lazy::new(|| {
    std::env::var("RECURRING_AUTO_SEND")
        .ok()
        .map(|value| {
            let normalized = value.trim().to_ascii_lowercase();
            !matches!(normalized.as_str(), "0" | "false" | "no")
        })
        .unwrap_or(true)
});

/// key: billing-config -> days between invoice date and due date
pub static INVOICE_DUE_TERM_DAYS: Lazy<i64> = Lazy::new(|| {
    std::env::var("INVOICE_DUE_TERM_DAYS")
        .ok()
        .and_then(|value| value.parse::<i64>().ok())
        .filter(|value| *value >= 0)
        .unwrap_or(14)
});

fn read_optional_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
