use chrono::{DateTime, Utc};
use cron::Schedule;
use std::str::FromStr;
use tracing::warn;

use docker_cron_core::{SchedulerError, SchedulerResult};

const DAY_NAMES: [&str; 8] = ["SUN", "MON", "TUE", "WED", "THU", "FRI", "SAT", "SUN"];

/// 把 crontab 风格的表达式转换为带秒字段的形式
///
/// 五个字段时补 `0` 秒，星期字段中的数字 (0-7，0 和 7 都是周日) 转换为英文缩写。
/// 六、七个字段的表达式原样使用。
pub fn normalize_expression(expr: &str) -> String {
    let fields: Vec<&str> = expr.split_whitespace().collect();
    if fields.len() != 5 {
        return fields.join(" ");
    }

    format!(
        "0 {} {} {} {} {}",
        fields[0],
        fields[1],
        fields[2],
        fields[3],
        day_of_week_names(fields[4])
    )
}

fn day_of_week_names(field: &str) -> String {
    field
        .split(',')
        .map(day_of_week_item)
        .collect::<Vec<_>>()
        .join(",")
}

fn day_name(part: &str) -> String {
    match part.parse::<usize>() {
        Ok(n) if n < DAY_NAMES.len() => DAY_NAMES[n].to_string(),
        _ => part.to_string(),
    }
}

fn day_of_week_item(item: &str) -> String {
    let (base, step) = match item.split_once('/') {
        Some((base, step)) => (base, Some(step)),
        None => (item, None),
    };

    // 以 7 结尾的区间拆成 "<起始>-SAT" 加单独的 SUN，命名区间不能倒序
    if let Some((start, "7")) = base.split_once('-') {
        if let Ok(start) = start.parse::<usize>() {
            if start < 7 {
                return weekday_range_to_sunday(start, step);
            }
        }
    }

    let base = base.split('-').map(day_name).collect::<Vec<_>>().join("-");
    match step {
        Some(step) => format!("{base}/{step}"),
        None => base,
    }
}

fn weekday_range_to_sunday(start: usize, step: Option<&str>) -> String {
    let range = if start == 6 {
        "SAT".to_string()
    } else {
        match step {
            Some(step) => format!("{}-SAT/{}", DAY_NAMES[start], step),
            None => format!("{}-SAT", DAY_NAMES[start]),
        }
    };

    // 起始为 0 时周日已在区间内
    let includes_sunday = start > 0
        && match step {
            None => true,
            Some(step) => step
                .parse::<usize>()
                .is_ok_and(|step| step > 0 && (7 - start) % step == 0),
        };

    if includes_sunday {
        format!("{range},SUN")
    } else {
        range
    }
}

/// CRON表达式解析和触发时间计算
#[derive(Debug, Clone)]
pub struct CronExpression {
    source: String,
    schedule: Schedule,
}

impl CronExpression {
    pub fn parse(cron_expr: &str) -> SchedulerResult<Self> {
        if cron_expr.trim().is_empty() {
            return Err(SchedulerError::invalid_cron(cron_expr, "表达式为空"));
        }
        let normalized = normalize_expression(cron_expr);
        let schedule = Schedule::from_str(&normalized)
            .map_err(|e| SchedulerError::invalid_cron(cron_expr, e.to_string()))?;

        Ok(Self {
            source: cron_expr.to_string(),
            schedule,
        })
    }

    /// 验证CRON表达式是否有效
    pub fn validate(cron_expr: &str) -> SchedulerResult<()> {
        Self::parse(cron_expr).map(|_| ())
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// 获取下一次执行时间
    pub fn next_after(&self, from: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.schedule.after(&from).next()
    }

    /// 获取从指定时间开始的多个执行时间
    pub fn upcoming_times(&self, from: DateTime<Utc>, count: usize) -> Vec<DateTime<Utc>> {
        self.schedule.after(&from).take(count).collect()
    }

    /// (from, to) 区间内的全部触发时间，最多迭代 `max_iterations` 次
    pub fn fire_dates_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        max_iterations: usize,
    ) -> Vec<DateTime<Utc>> {
        let mut dates = Vec::new();
        for (i, date) in self.schedule.after(&from).enumerate() {
            if date >= to {
                break;
            }
            if i >= max_iterations {
                warn!(
                    "表达式 {} 在区间内超过 {} 次触发，结果已截断",
                    self.source, max_iterations
                );
                break;
            }
            dates.push(date);
        }
        dates
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_normalize_five_fields() {
        assert_eq!(normalize_expression("*/5 * * * *"), "0 */5 * * * *");
        assert_eq!(normalize_expression("0 2 * * 1-5"), "0 0 2 * * MON-FRI");
        assert_eq!(normalize_expression("0 2 * * 0,6"), "0 0 2 * * SUN,SAT");
        assert_eq!(normalize_expression("0 2 * * 7"), "0 0 2 * * SUN");
        assert_eq!(normalize_expression("0 2 * * */2"), "0 0 2 * * */2");
    }

    #[test]
    fn test_weekday_ranges_ending_on_seven() {
        assert_eq!(normalize_expression("0 2 * * 5-7"), "0 0 2 * * FRI-SAT,SUN");
        assert_eq!(normalize_expression("0 2 * * 1-7"), "0 0 2 * * MON-SAT,SUN");
        assert_eq!(normalize_expression("0 2 * * 0-7"), "0 0 2 * * SUN-SAT");
        assert_eq!(normalize_expression("0 2 * * 6-7"), "0 0 2 * * SAT,SUN");
        assert_eq!(normalize_expression("0 2 * * 1-7/2"), "0 0 2 * * MON-SAT/2,SUN");
        assert_eq!(normalize_expression("0 2 * * 2-7/2"), "0 0 2 * * TUE-SAT/2");

        assert!(CronExpression::validate("0 2 * * 5-7").is_ok());
        assert!(CronExpression::validate("0 2 * * 1-7").is_ok());
        assert!(CronExpression::validate("0 2 * * 0-7").is_ok());
        assert!(CronExpression::validate("0 2 * * 6-7").is_ok());
    }

    #[test]
    fn test_friday_to_sunday_fires_three_days() {
        let cron = CronExpression::parse("0 2 * * 5-7").unwrap();
        // 2024-01-05 是周五
        let from = Utc.with_ymd_and_hms(2024, 1, 4, 12, 0, 0).unwrap();
        assert_eq!(
            cron.upcoming_times(from, 4),
            vec![
                Utc.with_ymd_and_hms(2024, 1, 5, 2, 0, 0).unwrap(),
                Utc.with_ymd_and_hms(2024, 1, 6, 2, 0, 0).unwrap(),
                Utc.with_ymd_and_hms(2024, 1, 7, 2, 0, 0).unwrap(),
                Utc.with_ymd_and_hms(2024, 1, 12, 2, 0, 0).unwrap(),
            ]
        );
    }

    #[test]
    fn test_normalize_keeps_six_fields() {
        assert_eq!(normalize_expression("30  0 2 * * *"), "30 0 2 * * *");
    }

    #[test]
    fn test_invalid_expression() {
        assert!(CronExpression::validate("not a cron").is_err());
        assert!(CronExpression::validate("   ").is_err());
        assert!(CronExpression::validate("0 1 * * *").is_ok());
    }

    #[test]
    fn test_fire_dates_are_strictly_inside_range() {
        let cron = CronExpression::parse("0 * * * *").unwrap();
        let from = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let to = Utc.with_ymd_and_hms(2024, 1, 1, 3, 0, 0).unwrap();

        let dates = cron.fire_dates_between(from, to, 100);
        assert_eq!(
            dates,
            vec![
                Utc.with_ymd_and_hms(2024, 1, 1, 1, 0, 0).unwrap(),
                Utc.with_ymd_and_hms(2024, 1, 1, 2, 0, 0).unwrap(),
            ]
        );
    }

    #[test]
    fn test_fire_dates_are_capped() {
        let cron = CronExpression::parse("* * * * *").unwrap();
        let from = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let to = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();

        assert_eq!(cron.fire_dates_between(from, to, 10).len(), 10);
    }

    #[test]
    fn test_weekday_schedule() {
        let cron = CronExpression::parse("0 2 * * 1").unwrap();
        // 2024-01-01 是周一
        let from = Utc.with_ymd_and_hms(2023, 12, 31, 12, 0, 0).unwrap();
        assert_eq!(
            cron.next_after(from),
            Some(Utc.with_ymd_and_hms(2024, 1, 1, 2, 0, 0).unwrap())
        );
        assert_eq!(cron.upcoming_times(from, 3).len(), 3);
    }
}
