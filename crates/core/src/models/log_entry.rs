use serde::{Deserialize, Serialize};

use crate::utils::{format_display, parse_timestamp};

/// 容器日志中的一行
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// 从1开始的行号
    pub line: u64,
    /// `yyyy-MM-dd HH:mm:ss`，无法解析时为空
    pub date: String,
    pub message: String,
}

impl LogEntry {
    /// 解析带时间戳的日志行：`<timestamp> <message>`
    pub fn parse(line: u64, payload: &str) -> Self {
        let payload = payload.trim_end_matches(['\r', '\n']);
        let (stamp, rest) = payload.split_once(' ').unwrap_or((payload, ""));

        match parse_timestamp(stamp) {
            Some(date) => Self {
                line,
                date: format_display(&date),
                message: rest.to_string(),
            },
            None => Self {
                line,
                date: String::new(),
                message: payload.to_string(),
            },
        }
    }
}
