use chrono::{DateTime, Utc};
use serde::ser::{Serialize, SerializeStruct, Serializer};
use std::cmp::Ordering;

use crate::utils::format_display;

const FUTURE_COLOR: &str = "Yellow";
const PAST_COLOR: &str = "lime";
const BORDER_COLOR: &str = "gray";

/// 日历中的一个事件：历史运行区间或预测的触发时间
///
/// 排序和相等性只看 (title, start)，放入有序集合时同一容器同一时刻的事件只保留一个。
#[derive(Debug, Clone)]
pub struct ScheduleEvent {
    pub title: String,
    pub start: DateTime<Utc>,
    pub end: Option<DateTime<Utc>>,
    pub future: bool,
    pub all_day: bool,
    pub schedule: Option<String>,
    pub commands: Vec<String>,
}

impl ScheduleEvent {
    pub fn new(
        title: impl Into<String>,
        start: DateTime<Utc>,
        end: Option<DateTime<Utc>>,
        future: bool,
        all_day: bool,
    ) -> Self {
        Self {
            title: title.into(),
            start,
            end,
            future,
            all_day,
            schedule: None,
            commands: Vec::new(),
        }
    }

    pub fn with_schedule(mut self, schedule: impl Into<String>, commands: Vec<String>) -> Self {
        self.schedule = Some(schedule.into());
        self.commands = commands;
        self
    }

    pub fn id(&self) -> String {
        if self.all_day {
            format!("{}_hist", self.title)
        } else {
            self.title.clone()
        }
    }

    pub fn background_color(&self) -> &'static str {
        if self.future {
            FUTURE_COLOR
        } else {
            PAST_COLOR
        }
    }

    pub fn border_color(&self) -> &'static str {
        BORDER_COLOR
    }

    /// 日历悬浮提示（HTML表格）
    pub fn tooltip(&self) -> String {
        let mut rows = vec![
            ("Name:", escape_html(&self.title)),
            ("Start:", self.start.format("%d.%m.%Y %H:%M:%S").to_string()),
        ];
        if let Some(end) = &self.end {
            rows.push(("End:", end.format("%d.%m.%Y %H:%M:%S").to_string()));
        }
        if let Some(schedule) = &self.schedule {
            rows.push(("Cron Schedule:", escape_html(schedule)));
        }
        if !self.commands.is_empty() {
            let commands: String = self
                .commands
                .iter()
                .map(|c| format!("{}<br/>", escape_html(c)))
                .collect();
            rows.push(("Commands:", commands));
        }

        let body: String = rows
            .into_iter()
            .map(|(label, value)| format!("<tr><td>{label}</td><td>{value}</td></tr>"))
            .collect();
        format!("<table>{body}</table>")
    }
}

fn escape_html(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('\'', "&#39;")
        .replace('"', "&quot;")
}

impl PartialEq for ScheduleEvent {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for ScheduleEvent {}

impl PartialOrd for ScheduleEvent {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScheduleEvent {
    fn cmp(&self, other: &Self) -> Ordering {
        self.title
            .cmp(&other.title)
            .then_with(|| self.start.cmp(&other.start))
    }
}

impl Serialize for ScheduleEvent {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("ScheduleEvent", 10)?;
        state.serialize_field("id", &self.id())?;
        state.serialize_field("title", &self.title)?;
        state.serialize_field("start", &format_display(&self.start))?;
        state.serialize_field("end", &self.end.as_ref().map(format_display))?;
        state.serialize_field("backgroundColor", self.background_color())?;
        state.serialize_field("borderColor", self.border_color())?;
        state.serialize_field("allDay", &self.all_day)?;
        state.serialize_field("schedule", &self.schedule)?;
        state.serialize_field("commands", &self.commands)?;
        state.serialize_field("tooltip", &self.tooltip())?;
        state.end()
    }
}
