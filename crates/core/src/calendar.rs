//! Business-day arithmetic for estimated delivery dates.

use chrono::{DateTime, Datelike, Duration, Utc, Weekday};

/// Adds `days` business days (Monday to Friday) to `start`.
///
/// Walks forward one calendar day at a time and counts only weekdays, so the
/// result is the day on which the Nth business day falls. The time of day is
/// preserved. Zero days returns `start` unchanged.
pub fn add_business_days(start: DateTime<Utc>, days: u32) -> DateTime<Utc> {
    let mut current = start;
    let mut counted = 0;

    while counted < days {
        current += Duration::days(1);
        if is_business_day(current.weekday()) {
            counted += 1;
        }
    }

    current
}

pub fn is_business_day(weekday: Weekday) -> bool {
    !matches!(weekday, Weekday::Sat | Weekday::Sun)
}
