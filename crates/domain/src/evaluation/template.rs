use std::collections::HashMap;

use docker_cron_core::utils::is_blank;
use docker_cron_core::{SchedulerError, SchedulerResult};
use tracing::warn;

use super::Evaluator;

/// `{name}` 占位符替换
///
/// 只扫描一遍：替换后的值不会再被解析。找不到或值为空的占位符原样保留并记录日志，
/// 扫描位置越过该占位符的起始分隔符继续向后查找。
#[derive(Debug, Clone)]
pub struct DelimiterRenderer {
    start: String,
    end: String,
    parameters: HashMap<String, String>,
}

impl DelimiterRenderer {
    pub fn new(parameters: HashMap<String, String>) -> Self {
        Self::with_delimiters(parameters, "{", "}")
    }

    pub fn with_delimiters(
        parameters: HashMap<String, String>,
        start: impl Into<String>,
        end: impl Into<String>,
    ) -> Self {
        Self {
            start: start.into(),
            end: end.into(),
            parameters,
        }
    }

    pub fn render(&self, input: &str) -> SchedulerResult<String> {
        if self.start.is_empty() || self.end.is_empty() {
            return Err(SchedulerError::config_error("模板分隔符不能为空"));
        }

        let mut output = String::with_capacity(input.len());
        let mut rest = input;

        while let Some(pos) = rest.find(&self.start) {
            output.push_str(&rest[..pos]);
            let after_start = &rest[pos + self.start.len()..];

            let Some(end_pos) = after_start.find(&self.end) else {
                return Err(SchedulerError::evaluation_error(format!(
                    "模板占位符未闭合: {input}"
                )));
            };

            let key = &after_start[..end_pos];
            match self.parameters.get(key).filter(|v| !is_blank(v)) {
                Some(value) => {
                    output.push_str(value);
                    rest = &after_start[end_pos + self.end.len()..];
                }
                None => {
                    warn!("找不到模板变量 '{}'，可用的变量: {}", key, self.available_keys());
                    output.push_str(&self.start);
                    rest = after_start;
                }
            }
        }

        output.push_str(rest);
        Ok(output)
    }

    fn available_keys(&self) -> String {
        let mut keys: Vec<&str> = self.parameters.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys.join(", ")
    }
}

impl Evaluator for DelimiterRenderer {
    fn evaluate(&self, expression: &str) -> SchedulerResult<String> {
        self.render(expression)
    }
}
