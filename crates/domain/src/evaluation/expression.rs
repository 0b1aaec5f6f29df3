use std::collections::HashMap;
use std::error::Error as _;

use docker_cron_core::{SchedulerError, SchedulerResult};
use tera::{Context, Tera};

use super::Evaluator;

/// 基于 Tera 表达式的求值器
///
/// 单个表达式按 `{{ expr }}` 求值；已经包含 `{{` 或 `{%` 的文本按完整模板渲染。
/// 参数名中的 `.` 和 `-` 不能出现在 Tera 标识符里，另外以 `_` 替换后的名字注册一份，
/// 例如 `volume.name` 可写作 `volume_name`。
pub struct ExpressionEvaluator {
    context: Context,
}

impl ExpressionEvaluator {
    pub fn new(parameters: &HashMap<String, String>) -> Self {
        let mut context = Context::new();
        for (key, value) in parameters {
            context.insert(key.as_str(), value);
            let identifier = to_identifier(key);
            if identifier != *key {
                context.insert(identifier, value);
            }
        }
        Self { context }
    }
}

impl Evaluator for ExpressionEvaluator {
    fn evaluate(&self, expression: &str) -> SchedulerResult<String> {
        let template = if expression.contains("{{") || expression.contains("{%") {
            expression.to_string()
        } else {
            format!("{{{{ {} }}}}", expression.trim())
        };

        Tera::one_off(&template, &self.context, false).map_err(|e| {
            let mut message = e.to_string();
            let mut source = e.source();
            while let Some(cause) = source {
                message.push_str(": ");
                message.push_str(&cause.to_string());
                source = cause.source();
            }
            SchedulerError::evaluation_error(format!("{expression} -> {message}"))
        })
    }
}

fn to_identifier(key: &str) -> String {
    key.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn evaluator(pairs: &[(&str, &str)]) -> ExpressionEvaluator {
        let params = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ExpressionEvaluator::new(&params)
    }

    #[test]
    fn test_boolean_conditions() {
        let e = evaluator(&[("name", "db"), ("image", "postgres:16")]);
        assert_eq!(e.evaluate("true").unwrap(), "true");
        assert_eq!(e.evaluate("name == \"db\"").unwrap(), "true");
        assert_eq!(e.evaluate("name == \"web\"").unwrap(), "false");
        assert_eq!(e.evaluate("name != \"web\" and image == \"postgres:16\"").unwrap(), "true");
    }

    #[test]
    fn test_string_concatenation() {
        let e = evaluator(&[("name", "db"), ("volume.destination", "/data")]);
        assert_eq!(
            e.evaluate("\"tar czf /backup/\" ~ name ~ \".tgz \" ~ volume_destination").unwrap(),
            "tar czf /backup/db.tgz /data"
        );
    }

    #[test]
    fn test_full_template() {
        let e = evaluator(&[("name", "db")]);
        assert_eq!(
            e.evaluate("{% if name == \"db\" %}pg_dump{% endif %}").unwrap(),
            "pg_dump"
        );
    }

    #[test]
    fn test_unknown_variable_is_error() {
        let e = evaluator(&[]);
        assert!(e.evaluate("missing").is_err());
    }

    #[test]
    fn test_identifier_mapping() {
        assert_eq!(to_identifier("volumes.localpath"), "volumes_localpath");
        assert_eq!(to_identifier("docker-cron-host"), "docker_cron_host");
    }
}
