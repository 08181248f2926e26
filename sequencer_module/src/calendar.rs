//! Timezone-aware wall-clock helpers for the sequencing engine.
//!
//! These are pure functions over a timestamp and a timezone identifier; the
//! only side effect is a warning log when a timezone name fails to resolve.

use chrono::{DateTime, Datelike, Duration, Timelike, Utc, Weekday};
use chrono_tz::Tz;
use tracing::warn;

/// Resolve an IANA timezone name, falling back to UTC on anything invalid.
pub fn resolve_timezone(name: &str) -> Tz {
    match name.parse::<Tz>() {
        Ok(tz) => tz,
        Err(_) => {
            warn!("unknown timezone {:?}, falling back to UTC", name);
            Tz::UTC
        }
    }
}

pub fn local_now(tz: Tz) -> DateTime<Tz> {
    Utc::now().with_timezone(&tz)
}

pub fn is_weekend(tz: Tz, at: DateTime<Utc>) -> bool {
    let local = at.with_timezone(&tz);
    matches!(local.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Advance `start` until `days` working days (Monday through Friday in the
/// given timezone) have been added, one calendar day at a time. Returns a
/// UTC-normalized timestamp; `days <= 0` returns `start` unchanged.
pub fn add_working_days(tz: Tz, start: DateTime<Utc>, days: i64) -> DateTime<Utc> {
    if days <= 0 {
        return start;
    }
    let mut current = start.with_timezone(&tz);
    let mut added = 0i64;
    while added < days {
        current = current + Duration::days(1);
        if !matches!(current.weekday(), Weekday::Sat | Weekday::Sun) {
            added += 1;
        }
    }
    current.with_timezone(&Utc)
}

/// Local hour within `[start_hour, end_hour)` on a weekday.
pub fn is_business_hours(tz: Tz, at: DateTime<Utc>, start_hour: u32, end_hour: u32) -> bool {
    if is_weekend(tz, at) {
        return false;
    }
    let hour = at.with_timezone(&tz).hour();
    hour >= start_hour && hour < end_hour
}
