use chrono::{DateTime, Duration, NaiveDate, TimeZone, Timelike, Utc};
use chrono_tz::Tz;

/// Returns the current time in the configured timezone.
pub fn now_in_timezone(tz: &Tz) -> DateTime<Tz> {
    Utc::now().with_timezone(tz)
}

/// Returns today's date in the configured timezone.
pub fn today_local(tz: &Tz) -> NaiveDate {
    now_in_timezone(tz).date_naive()
}

/// Local calendar date of a UTC instant.
pub fn local_date(instant: DateTime<Utc>, tz: &Tz) -> NaiveDate {
    instant.with_timezone(tz).date_naive()
}

/// Start of the local hour containing `instant`, expressed in UTC.
pub fn truncate_to_local_hour(instant: DateTime<Utc>, tz: &Tz) -> DateTime<Utc> {
    let local = instant.with_timezone(tz);
    let truncated = local
        .with_minute(0)
        .and_then(|value| value.with_second(0))
        .and_then(|value| value.with_nanosecond(0))
        .unwrap_or(local);
    truncated.with_timezone(&Utc)
}

/// Local midnight of `date` in UTC. Falls back to UTC midnight when the local
/// midnight does not exist (DST gap).
pub fn local_midnight_utc(date: NaiveDate, tz: &Tz) -> DateTime<Utc> {
    let naive = date.and_hms_opt(0, 0, 0).unwrap_or_default();
    tz.from_local_datetime(&naive)
        .earliest()
        .map(|value| value.with_timezone(&Utc))
        .unwrap_or_else(|| DateTime::<Utc>::from_naive_utc_and_offset(naive, Utc))
}

/// The `days` local dates ending today (oldest first).
pub fn trailing_local_days(today: NaiveDate, days: u32) -> Vec<NaiveDate> {
    (0..days as i64)
        .rev()
        .map(|offset| today - Duration::days(offset))
        .collect()
}
