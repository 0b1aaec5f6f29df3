use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};

/// 事件和日志中使用的日期格式
pub const DISPLAY_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// 空字符串或仅包含空白
pub fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}

/// 解析容器运行时返回的时间戳
///
/// 优先按 RFC 3339 解析；失败时截取前23个字符按 `yyyy-MM-ddTHH:mm:ss.SSS` 解析。
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }

    let prefix = value.get(..23)?;
    NaiveDateTime::parse_from_str(prefix, "%Y-%m-%dT%H:%M:%S%.3f")
        .ok()
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// 当天零点（UTC）
pub fn start_of_day(now: DateTime<Utc>) -> DateTime<Utc> {
    let midnight = now.date_naive().and_hms_opt(0, 0, 0).unwrap_or_default();
    Utc.from_utc_datetime(&midnight)
}

pub fn format_display(date: &DateTime<Utc>) -> String {
    date.format(DISPLAY_DATE_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_blank() {
        assert!(is_blank(""));
        assert!(is_blank("   \t"));
        assert!(!is_blank(" a "));
    }

    #[test]
    fn test_parse_rfc3339_with_nanos() {
        let dt = parse_timestamp("2018-01-07T10:15:30.123456789Z").unwrap();
        assert_eq!(format_display(&dt), "2018-01-07 10:15:30");
    }

    #[test]
    fn test_parse_millis_prefix_fallback() {
        let dt = parse_timestamp("2018-01-07T10:15:30.123garbage").unwrap();
        assert_eq!(dt, Utc.with_ymd_and_hms(2018, 1, 7, 10, 15, 30).unwrap() + chrono::Duration::milliseconds(123));
    }

    #[test]
    fn test_parse_invalid() {
        assert!(parse_timestamp("").is_none());
        assert!(parse_timestamp("yesterday").is_none());
    }

    #[test]
    fn test_start_of_day() {
        let now = Utc.with_ymd_and_hms(2024, 5, 17, 13, 45, 10).unwrap();
        assert_eq!(
            start_of_day(now),
            Utc.with_ymd_and_hms(2024, 5, 17, 0, 0, 0).unwrap()
        );
    }
}
