use chrono::{DateTime, Duration, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use sqlx::PgPool;
use std::{collections::HashMap, fmt, str::FromStr};
use uuid::Uuid;

use crate::{
    models::page_view::{
        PageView, RealtimeStats, TrackPageViewRequest, TrafficBucket, TrafficChange, TrafficStats,
    },
    repositories::traffic::{self as traffic_repo, Breakdown, BucketUnit},
    utils::{
        time::{local_date, local_midnight_utc, truncate_to_local_hour},
        user_agent::{classify_browser, classify_device},
    },
};

pub const TOP_PAGES_LIMIT: i64 = 10;
pub const BREAKDOWN_LIMIT: i64 = 10;
pub const REALTIME_WINDOW_MINUTES: i64 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrafficPeriod {
    Day,
    #[default]
    Week,
    Month,
    Quarter,
}

impl TrafficPeriod {
    pub fn as_str(self) -> &'static str {
        match self {
            TrafficPeriod::Day => "24h",
            TrafficPeriod::Week => "7d",
            TrafficPeriod::Month => "30d",
            TrafficPeriod::Quarter => "90d",
        }
    }

    pub fn length(self) -> Duration {
        match self {
            TrafficPeriod::Day => Duration::hours(24),
            TrafficPeriod::Week => Duration::days(7),
            TrafficPeriod::Month => Duration::days(30),
            TrafficPeriod::Quarter => Duration::days(90),
        }
    }

    pub fn bucket_unit(self) -> BucketUnit {
        match self {
            TrafficPeriod::Day => BucketUnit::Hour,
            _ => BucketUnit::Day,
        }
    }

    /// Missing or blank input means the default window.
    pub fn parse_opt(raw: Option<&str>) -> Result<Self, String> {
        match raw.map(str::trim).filter(|value| !value.is_empty()) {
            Some(value) => value.parse(),
            None => Ok(Self::default()),
        }
    }
}

impl FromStr for TrafficPeriod {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "24h" => Ok(TrafficPeriod::Day),
            "7d" => Ok(TrafficPeriod::Week),
            "30d" => Ok(TrafficPeriod::Month),
            "90d" => Ok(TrafficPeriod::Quarter),
            other => Err(format!(
                "Invalid period '{}'; expected one of 24h, 7d, 30d, 90d",
                other
            )),
        }
    }
}

impl fmt::Display for TrafficPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Percentage change from `previous` to `current`, rounded to one decimal.
/// Zero when there is nothing to compare against.
pub fn percent_change(current: i64, previous: i64) -> f64 {
    if previous == 0 {
        return 0.0;
    }
    let change = (current - previous) as f64 / previous as f64 * 100.0;
    (change * 10.0).round() / 10.0
}

/// Start instants of every bucket overlapping `[from, to)`.
pub fn bucket_starts(
    unit: BucketUnit,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
    tz: &Tz,
) -> Vec<DateTime<Utc>> {
    let mut starts = Vec::new();
    match unit {
        BucketUnit::Hour => {
            let mut cursor = truncate_to_local_hour(from, tz);
            while cursor < to {
                starts.push(cursor);
                cursor += Duration::hours(1);
            }
        }
        BucketUnit::Day => {
            let mut day = local_date(from, tz);
            let last = local_date(to - Duration::nanoseconds(1), tz);
            while day <= last {
                starts.push(local_midnight_utc(day, tz));
                day = match day.succ_opt() {
                    Some(next) => next,
                    None => break,
                };
            }
        }
    }
    starts
}

/// Lays the sparse per-bucket counts onto the full bucket grid.
pub fn fill_series(
    starts: &[DateTime<Utc>],
    counts: &[(NaiveDateTime, i64, i64)],
    tz: &Tz,
) -> Vec<TrafficBucket> {
    let by_start: HashMap<DateTime<Utc>, (i64, i64)> = counts
        .iter()
        .filter_map(|(local, views, visitors)| {
            tz.from_local_datetime(local)
                .earliest()
                .map(|start| (start.with_timezone(&Utc), (*views, *visitors)))
        })
        .collect();

    starts
        .iter()
        .map(|start| {
            let (views, visitors) = by_start.get(start).copied().unwrap_or((0, 0));
            TrafficBucket {
                bucket: *start,
                views,
                visitors,
            }
        })
        .collect()
}

pub async fn compute_stats(
    pool: &PgPool,
    period: TrafficPeriod,
    now: DateTime<Utc>,
    tz: &Tz,
) -> Result<TrafficStats, sqlx::Error> {
    let from = now - period.length();
    let previous_from = from - period.length();

    let (total_views, unique_visitors) = traffic_repo::totals(pool, from, now).await?;
    let (previous_views, previous_visitors) = traffic_repo::totals(pool, previous_from, from).await?;
    let top_pages = traffic_repo::top_paths(pool, from, now, TOP_PAGES_LIMIT).await?;
    let unit = period.bucket_unit();
    let counts = traffic_repo::bucket_counts(pool, unit, from, now, tz.name()).await?;
    let devices = traffic_repo::breakdown(pool, Breakdown::Device, from, now, BREAKDOWN_LIMIT).await?;
    let browsers =
        traffic_repo::breakdown(pool, Breakdown::Browser, from, now, BREAKDOWN_LIMIT).await?;
    let referrers =
        traffic_repo::breakdown(pool, Breakdown::Referrer, from, now, BREAKDOWN_LIMIT).await?;

    let starts = bucket_starts(unit, from, now, tz);
    Ok(TrafficStats {
        period: period.to_string(),
        from,
        to: now,
        total_views,
        unique_visitors,
        change: TrafficChange {
            views_percent: percent_change(total_views, previous_views),
            visitors_percent: percent_change(unique_visitors, previous_visitors),
        },
        top_pages,
        series: fill_series(&starts, &counts, tz),
        devices,
        browsers,
        referrers,
    })
}

pub async fn realtime(pool: &PgPool, now: DateTime<Utc>) -> Result<RealtimeStats, sqlx::Error> {
    let since = now - Duration::minutes(REALTIME_WINDOW_MINUTES);
    let pages = traffic_repo::active_sessions_by_page(pool, since).await?;
    Ok(RealtimeStats {
        active_visitors: pages.iter().map(|page| page.count).sum(),
        window_minutes: REALTIME_WINDOW_MINUTES,
        pages,
    })
}

/// Builds the stored row for one tracked page view.
pub fn page_view_from(
    payload: TrackPageViewRequest,
    ip: Option<String>,
    user_agent: Option<String>,
    now: DateTime<Utc>,
) -> PageView {
    let ua = user_agent.as_deref().unwrap_or_default();
    PageView {
        id: Uuid::new_v4().to_string(),
        path: payload.path.trim().to_string(),
        referrer: payload
            .referrer
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty()),
        session_id: payload.session_id.trim().to_string(),
        device: classify_device(ua).as_str().to_string(),
        browser: classify_browser(ua).to_string(),
        ip,
        user_agent,
        created_at: now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn period_defaults_to_seven_days_and_rejects_unknown() {
        assert_eq!(TrafficPeriod::parse_opt(None), Ok(TrafficPeriod::Week));
        assert_eq!(TrafficPeriod::parse_opt(Some(" ")), Ok(TrafficPeriod::Week));
        assert_eq!(TrafficPeriod::parse_opt(Some("24H")), Ok(TrafficPeriod::Day));
        assert!(TrafficPeriod::parse_opt(Some("1y")).is_err());
    }

    #[test]
    fn change_is_zero_without_prior_traffic() {
        assert_eq!(percent_change(120, 0), 0.0);
        assert_eq!(percent_change(0, 0), 0.0);
    }

    #[test]
    fn change_is_rounded_percentage() {
        assert_eq!(percent_change(150, 100), 50.0);
        assert_eq!(percent_change(1, 3), -66.7);
    }

    #[test]
    fn hourly_grid_covers_a_day() {
        let tz = chrono_tz::UTC;
        let now = Utc.with_ymd_and_hms(2026, 6, 1, 12, 30, 0).unwrap();
        let starts = bucket_starts(BucketUnit::Hour, now - Duration::hours(24), now, &tz);
        assert_eq!(starts.len(), 25);
        assert_eq!(starts[0], Utc.with_ymd_and_hms(2026, 5, 31, 12, 0, 0).unwrap());
        assert_eq!(starts[24], Utc.with_ymd_and_hms(2026, 6, 1, 12, 0, 0).unwrap());
    }

    #[test]
    fn daily_grid_uses_local_midnight() {
        let tz: Tz = "Asia/Seoul".parse().expect("tz");
        let now = Utc.with_ymd_and_hms(2026, 6, 7, 3, 0, 0).unwrap();
        let starts = bucket_starts(BucketUnit::Day, now - Duration::days(7), now, &tz);
        assert_eq!(starts.len(), 8);
        assert_eq!(starts[0], Utc.with_ymd_and_hms(2026, 5, 30, 15, 0, 0).unwrap());
    }

    #[test]
    fn series_fills_gaps_with_zero() {
        let tz = chrono_tz::UTC;
        let day = |d| NaiveDate::from_ymd_opt(2026, 6, d).unwrap();
        let starts: Vec<_> = (1..=3).map(|d| local_midnight_utc(day(d), &tz)).collect();
        let counts = vec![(day(2).and_hms_opt(0, 0, 0).unwrap(), 9, 4)];
        let series = fill_series(&starts, &counts, &tz);
        assert_eq!(
            series.iter().map(|b| (b.views, b.visitors)).collect::<Vec<_>>(),
            vec![(0, 0), (9, 4), (0, 0)]
        );
    }

    #[test]
    fn page_view_classifies_agent() {
        let view = page_view_from(
            TrackPageViewRequest {
                path: " /events ".into(),
                referrer: Some("".into()),
                session_id: "s-1".into(),
            },
            Some("10.0.0.1".into()),
            Some("Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) Mobile/15E148 Safari/604.1".into()),
            Utc::now(),
        );
        assert_eq!(view.path, "/events");
        assert!(view.referrer.is_none());
        assert_eq!(view.device, "mobile");
        assert_eq!(view.browser, "Safari");
    }
}
