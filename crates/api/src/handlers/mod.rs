pub mod events;
pub mod health;
pub mod logs;
pub mod metrics;

use chrono::{DateTime, NaiveDate, Utc};

use crate::error::{ApiError, ApiResult};

/// 解析 `yyyy-MM-dd`，结果为当天零点 (UTC)
pub(crate) fn parse_day(name: &str, value: &str) -> ApiResult<DateTime<Utc>> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|date| date.and_utc())
        .ok_or_else(|| ApiError::bad_request(format!("{name} 不是有效日期 (yyyy-MM-dd): {value}")))
}
