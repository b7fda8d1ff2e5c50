use chrono::{Datelike, Months, NaiveDate};
use serde::{Deserialize, Serialize};

/// key: billing-recurrence -> calendar-anchored schedule advancement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Monthly,
    Quarterly,
    Yearly,
}

impl Frequency {
    pub fn months(&self) -> u32 {
        match self {
            Frequency::Monthly => 1,
            Frequency::Quarterly => 3,
            Frequency::Yearly => 12,
        }
    }

    /// Month offset of the first candidate relative to `base`. Monthly
    /// considers the base's own month (the target day may still be ahead);
    /// quarterly/yearly always jump a full period.
    fn first_offset(&self) -> u32 {
        match self {
            Frequency::Monthly => 0,
            Frequency::Quarterly => 3,
            Frequency::Yearly => 12,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Frequency::Monthly => "monthly",
            Frequency::Quarterly => "quarterly",
            Frequency::Yearly => "yearly",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "monthly" => Some(Frequency::Monthly),
            "quarterly" => Some(Frequency::Quarterly),
            "yearly" => Some(Frequency::Yearly),
            _ => None,
        }
    }
}

/// Next occurrence strictly after `base`. The requested day is clamped to
/// the target month's length, so day 31 lands on Feb 28/29, Apr 30, etc.
/// Pure function of its inputs; never consults the wall clock.
pub fn next_date(base: NaiveDate, frequency: Frequency, day_of_month: u32) -> NaiveDate {
    let step = Months::new(frequency.months());
    let mut anchor = base
        .with_day(1)
        .expect("day 1 exists in every month")
        .checked_add_months(Months::new(frequency.first_offset()))
        .expect("date within chrono range");
    loop {
        let candidate = clamp_to_month(anchor, day_of_month);
        if candidate > base {
            return candidate;
        }
        anchor = anchor
            .checked_add_months(step)
            .expect("date within chrono range");
    }
}

/// Iterates `next_date` from `start` until the result is strictly after
/// `after`. This is the drift-free advance: recomputing from the schedule's
/// own start date keeps the day anchor stable across missed periods.
pub fn next_after(
    start: NaiveDate,
    frequency: Frequency,
    day_of_month: u32,
    after: NaiveDate,
) -> NaiveDate {
    let mut candidate = next_date(start, frequency, day_of_month);
    while candidate <= after {
        candidate = next_date(candidate, frequency, day_of_month);
    }
    candidate
}

fn clamp_to_month(first_of_month: NaiveDate, day_of_month: u32) -> NaiveDate {
    let day = day_of_month.min(days_in_month(first_of_month.year(), first_of_month.month()));
    first_of_month
        .with_day(day)
        .expect("clamped day exists in month")
}

pub fn days_in_month(year: i32, month: u32) -> u32 {
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    };
    next.expect("first of month is valid")
        .pred_opt()
        .expect("date within chrono range")
        .day()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn monthly_day_31_clamps_to_leap_february() {
        assert_eq!(
            next_date(date(2024, 1, 31), Frequency::Monthly, 31),
            date(2024, 2, 29)
        );
    }

    #[test]
    fn monthly_day_31_clamps_to_short_february() {
        assert_eq!(
            next_date(date(2023, 1, 31), Frequency::Monthly, 31),
            date(2023, 2, 28)
        );
    }

    #[test]
    fn quarterly_mid_month_advances_three_months() {
        assert_eq!(
            next_date(date(2024, 1, 15), Frequency::Quarterly, 15),
            date(2024, 4, 15)
        );
    }

    #[test]
    fn clamp_recovers_after_short_month() {
        // Feb 29 base, day 31 requested: March has 31 days again.
        assert_eq!(
            next_date(date(2024, 2, 29), Frequency::Monthly, 31),
            date(2024, 3, 31)
        );
    }

    #[test]
    fn result_is_strictly_after_base() {
        // Base already on the target day: skip to the following period.
        assert_eq!(
            next_date(date(2024, 3, 1), Frequency::Monthly, 1),
            date(2024, 4, 1)
        );
        assert_eq!(
            next_date(date(2024, 3, 1), Frequency::Yearly, 1),
            date(2025, 3, 1)
        );
    }

    #[test]
    fn monthly_target_still_ahead_in_base_month() {
        assert_eq!(
            next_date(date(2024, 1, 5), Frequency::Monthly, 20),
            date(2024, 1, 20)
        );
    }

    #[test]
    fn base_after_target_day_rolls_forward() {
        // Base on the 20th, target day 5: candidate Feb 5 is already
        // after base, no extra period needed.
        assert_eq!(
            next_date(date(2024, 1, 20), Frequency::Monthly, 5),
            date(2024, 2, 5)
        );
    }

    #[test]
    fn next_after_skips_missed_periods_without_drift() {
        // Schedule anchored at Jan 31; catching up from June stays on
        // the clamped month-end anchor rather than drifting to the 28th.
        assert_eq!(
            next_after(date(2024, 1, 31), Frequency::Monthly, 31, date(2024, 6, 10)),
            date(2024, 6, 30)
        );
    }

    #[test]
    fn next_after_from_untouched_start_returns_first_occurrence() {
        assert_eq!(
            next_after(date(2024, 1, 15), Frequency::Quarterly, 15, date(2024, 1, 15)),
            date(2024, 4, 15)
        );
    }

    #[test]
    fn days_in_month_handles_leap_years() {
        assert_eq!(days_in_month(2024, 2), 29);
        assert_eq!(days_in_month(2023, 2), 28);
        assert_eq!(days_in_month(2024, 12), 31);
        assert_eq!(days_in_month(2024, 4), 30);
    }
}
