use axum::{
    extract::{Query, State},
    Json,
};
use chrono::Utc;
use docker_cron_core::ScheduleEvent;
use serde::Deserialize;
use tracing::info;

use super::parse_day;
use crate::error::ApiResult;
use crate::routes::AppState;

const DEFAULT_START: &str = "2017-01-01";

#[derive(Debug, Default, Deserialize)]
pub struct EventsQuery {
    pub start: Option<String>,
    pub end: Option<String>,
}

/// 日历事件：`start` 默认 2017-01-01，`end` 默认今天
pub async fn list_events(
    State(state): State<AppState>,
    Query(query): Query<EventsQuery>,
) -> ApiResult<Json<Vec<ScheduleEvent>>> {
    let now = Utc::now();
    let from = parse_day("start", query.start.as_deref().unwrap_or(DEFAULT_START))?;
    let to = match query.end.as_deref() {
        Some(end) => parse_day("end", end)?,
        None => parse_day("end", &now.format("%Y-%m-%d").to_string())?,
    };

    let events = state.fleet.get_events(from, to, now).await;
    info!("查询日历事件 {} - {}: {} 个", from, to, events.len());
    Ok(Json(events.into_iter().collect()))
}
