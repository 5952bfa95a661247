use axum::{
    extract::{Query, State},
    Json,
};
use chrono::Duration;

use crate::{
    error::AppError,
    handlers::common::{parse_filter, parse_timestamp, trimmed},
    models::{
        activity_log::{ActivityLog, ActivityLogQuery, ActivityStats, ActivityStatsQuery},
        pagination::{Paginated, Pagination},
    },
    repositories::activity_log::{self as activity_repo, ActivityLogFilters},
    state::AppState,
    utils::time::{local_midnight_utc, today_local},
};

const DEFAULT_STATS_DAYS: i64 = 7;
const MAX_STATS_DAYS: i64 = 365;

pub async fn list_activity_logs(
    State(state): State<AppState>,
    Query(q): Query<ActivityLogQuery>,
) -> Result<Json<Paginated<ActivityLog>>, AppError> {
    let pagination = Pagination::new(q.page, q.limit);
    let filters = ActivityLogFilters {
        user_id: trimmed(q.user_id),
        action: parse_filter(q.action.as_deref(), "action")?,
        module: parse_filter(q.module.as_deref(), "module")?,
        from: parse_timestamp(q.from.as_deref(), "from")?,
        to: parse_timestamp(q.to.as_deref(), "to")?,
    };
    if let (Some(from), Some(to)) = (filters.from, filters.to) {
        if from > to {
            return Err(AppError::BadRequest(
                "`from` must be before or equal to `to`".into(),
            ));
        }
    }

    let (items, total) = activity_repo::list_activity_logs(
        &state.pool,
        &filters,
        pagination.limit,
        pagination.offset(),
    )
    .await?;
    Ok(Json(Paginated::new(items, pagination, total)))
}

pub async fn activity_stats(
    State(state): State<AppState>,
    Query(q): Query<ActivityStatsQuery>,
) -> Result<Json<ActivityStats>, AppError> {
    let days = stats_window(q.days);
    let tz = state.config.time_zone;
    let first_day = today_local(&tz) - Duration::days(days - 1);
    let since = local_midnight_utc(first_day, &tz);

    let total = activity_repo::count_since(&state.pool, since).await?;
    let by_action = activity_repo::counts_by_action(&state.pool, since).await?;
    let by_module = activity_repo::counts_by_module(&state.pool, since).await?;
    let by_day = activity_repo::counts_by_day(&state.pool, since, tz.name()).await?;

    Ok(Json(ActivityStats {
        days,
        total,
        by_action,
        by_module,
        by_day,
    }))
}

fn stats_window(days: Option<i64>) -> i64 {
    days.unwrap_or(DEFAULT_STATS_DAYS).clamp(1, MAX_STATS_DAYS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_window_defaults_and_clamps() {
        assert_eq!(stats_window(None), 7);
        assert_eq!(stats_window(Some(0)), 1);
        assert_eq!(stats_window(Some(10_000)), 365);
        assert_eq!(stats_window(Some(30)), 30);
    }
}
