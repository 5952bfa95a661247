use chrono::NaiveDate;
use chrono_tz::Tz;
use sqlx::PgPool;
use std::collections::{BTreeMap, HashMap};

use crate::{
    models::tip::{DailyViews, PlatformShares, Tip, TipAnalytics, TipCounters},
    repositories::tip as tip_repo,
    utils::time::{local_midnight_utc, today_local, trailing_local_days},
};

pub const HISTOGRAM_DAYS: u32 = 7;
pub const RECENT_EVENT_LIMIT: i64 = 20;

/// Builds the analytics view of one tip from its event log.
pub async fn analytics_for(
    pool: &PgPool,
    tip: &Tip,
    time_zone: &Tz,
) -> Result<TipAnalytics, sqlx::Error> {
    let days = trailing_local_days(today_local(time_zone), HISTOGRAM_DAYS);
    let since = days
        .first()
        .map(|day| local_midnight_utc(*day, time_zone))
        .unwrap_or_else(chrono::Utc::now);

    let counts = tip_repo::daily_view_counts(pool, &tip.id, since, time_zone.name()).await?;
    let platforms = tip_repo::share_platforms(pool, &tip.id).await?;
    let recent_events = tip_repo::recent_events(pool, &tip.id, RECENT_EVENT_LIMIT).await?;

    Ok(TipAnalytics {
        tip_id: tip.id.clone(),
        title: tip.title.clone(),
        totals: TipCounters {
            views: tip.views,
            unique_viewers: tip.unique_viewers,
            shares: tip.shares,
        },
        daily_views: fill_daily_views(&days, &counts),
        shares_by_platform: tally_platforms(platforms),
        recent_events,
    })
}

/// One entry per day in `days`, zero where nothing was counted.
pub fn fill_daily_views(days: &[NaiveDate], counts: &[(NaiveDate, i64)]) -> Vec<DailyViews> {
    let by_day: HashMap<NaiveDate, i64> = counts.iter().copied().collect();
    days.iter()
        .map(|date| DailyViews {
            date: *date,
            views: by_day.get(date).copied().unwrap_or(0),
        })
        .collect()
}

/// Counts shares per platform, most shared first.
pub fn tally_platforms(platforms: Vec<String>) -> Vec<PlatformShares> {
    let mut tally: BTreeMap<String, i64> = BTreeMap::new();
    for platform in platforms {
        let key = platform.trim().to_lowercase();
        let key = if key.is_empty() { "unknown".to_string() } else { key };
        *tally.entry(key).or_insert(0) += 1;
    }
    let mut shares: Vec<PlatformShares> = tally
        .into_iter()
        .map(|(platform, count)| PlatformShares { platform, count })
        .collect();
    shares.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.platform.cmp(&b.platform)));
    shares
}
