use chrono::{DateTime, Datelike, TimeZone, Utc};
use dashmap::DashMap;

/// key: billing-period -> metering window resolution
///
/// Resolves "now" to the UTC month start used to bucket usage counters.
/// Repeated calls within one calendar month return the identical instant,
/// so concurrent requests agree on which counter row to touch. The memo is
/// an optimization only; the stored counter row is the idempotency
/// authority.
#[derive(Debug, Default)]
pub struct PeriodClock {
    memo: DashMap<(i32, u32), DateTime<Utc>>,
}

impl PeriodClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// UTC midnight on the 1st of `now`'s month. Entries for other months
    /// are dropped on access so the memo never survives a period boundary.
    pub fn period_start(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let key = (now.year(), now.month());
        self.memo.retain(|k, _| *k == key);
        *self.memo.entry(key).or_insert_with(|| {
            Utc.with_ymd_and_hms(now.year(), now.month(), 1, 0, 0, 0)
                .single()
                .expect("first of month at midnight is unambiguous in UTC")
        })
    }
}
