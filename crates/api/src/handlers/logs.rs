use axum::{
    extract::{Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use docker_cron_core::LogEntry;
use serde::Deserialize;

use super::parse_day;
use crate::error::{ApiError, ApiResult};
use crate::routes::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct LogsQuery {
    pub container: Option<String>,
    /// `yyyy-MM-dd` 或毫秒时间戳，缺省时从头开始
    pub start: Option<String>,
}

fn parse_start(value: Option<&str>) -> ApiResult<DateTime<Utc>> {
    match value {
        None => Ok(DateTime::<Utc>::UNIX_EPOCH),
        Some(value) if value.contains('-') => parse_day("start", value),
        Some(value) => value
            .trim()
            .parse::<i64>()
            .ok()
            .and_then(DateTime::from_timestamp_millis)
            .ok_or_else(|| ApiError::bad_request(format!("start 不是有效的毫秒时间戳: {value}"))),
    }
}

pub async fn container_logs(
    State(state): State<AppState>,
    Query(query): Query<LogsQuery>,
) -> ApiResult<Json<Vec<LogEntry>>> {
    let container = query
        .container
        .as_deref()
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("缺少参数 container"))?;
    let since = parse_start(query.start.as_deref())?;

    let entries = state.fleet.get_logs(container, since, None).await?;
    Ok(Json(entries))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_start() {
        assert_eq!(parse_start(None).unwrap(), DateTime::<Utc>::UNIX_EPOCH);
        assert_eq!(
            parse_start(Some("2024-03-01")).unwrap(),
            Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap()
        );
        assert_eq!(
            parse_start(Some("1700000000000")).unwrap(),
            Utc.with_ymd_and_hms(2023, 11, 14, 22, 13, 20).unwrap()
        );
        assert!(parse_start(Some("yesterday")).is_err());
        assert!(parse_start(Some("2024-13-01")).is_err());
    }
}
