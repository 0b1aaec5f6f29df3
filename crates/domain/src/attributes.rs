//! 作业标签解析
//!
//! 标签语法（大小写不敏感）：
//!
//! ```text
//! job.<scriptengine|scriptingastemplates>
//! job.<job>.<scriptengine|scriptingastemplates|condition|level|scenario|schedule|command>
//! job.<job>.<condition|level|scenario|schedule|command>.<step>
//! ```
//!
//! 同一属性按 全局 < 作业 < 作业步骤 的顺序解析，越具体的键越优先。

use std::collections::{BTreeMap, HashMap};

pub const JOB_PREFIX: &str = "job.";

/// 只包含 `job.` 开头的标签，键已转小写并去除空白
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttributeSet {
    values: BTreeMap<String, String>,
}

impl AttributeSet {
    pub fn from_attributes(attributes: &HashMap<String, String>) -> Self {
        let values = attributes
            .iter()
            .filter_map(|(key, value)| {
                let key = key.trim().to_lowercase();
                key.starts_with(JOB_PREFIX).then(|| (key, value.clone()))
            })
            .collect();
        Self { values }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// 发现全部 (作业名, 步骤名)
    ///
    /// `job.<job>.command` 是作业级步骤（步骤名为空），`job.<job>.command.<step>` 是具名步骤。
    pub fn step_keys(&self) -> Vec<(String, String)> {
        self.values
            .keys()
            .filter_map(|key| {
                let parts: Vec<&str> = key.split('.').collect();
                match parts.as_slice() {
                    [_, job, "command"] => Some((job.to_string(), String::new())),
                    [_, job, "command", step] => Some((job.to_string(), step.to_string())),
                    _ => None,
                }
            })
            .collect()
    }
}

/// 一个步骤的原始解析结果，尚未校验
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedStep {
    pub job_name: String,
    pub step_name: String,
    pub script_engine: String,
    pub scripting_as_template: bool,
    pub condition: Option<String>,
    /// 生效的场景键和值
    pub scenario: Option<(String, String)>,
    pub schedule: Option<String>,
    pub command: Option<String>,
}

/// 按优先级链解析步骤属性
#[derive(Debug, Clone)]
pub struct AttributeResolver {
    default_script_engine: String,
    default_scripting_as_template: bool,
}

impl AttributeResolver {
    pub fn new(default_script_engine: impl Into<String>, default_scripting_as_template: bool) -> Self {
        Self {
            default_script_engine: default_script_engine.into(),
            default_scripting_as_template,
        }
    }

    pub fn resolve(&self, attributes: &AttributeSet) -> Vec<ResolvedStep> {
        attributes
            .step_keys()
            .into_iter()
            .map(|(job, step)| self.resolve_step(attributes, &job, &step))
            .collect()
    }

    pub fn resolve_step(&self, attributes: &AttributeSet, job: &str, step: &str) -> ResolvedStep {
        let script_engine = resolve_entry(attributes, &["scriptengine"], job, step, false)
            .map(|(_, v)| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| self.default_script_engine.clone());

        let scripting_as_template =
            match resolve_entry(attributes, &["scriptingastemplates"], job, step, false) {
                Some((_, value)) => value.trim().eq_ignore_ascii_case("true"),
                None => self.default_scripting_as_template,
            };

        ResolvedStep {
            job_name: job.to_string(),
            step_name: step.to_string(),
            script_engine,
            scripting_as_template,
            condition: resolve_value(attributes, "condition", job, step),
            scenario: resolve_entry(attributes, &["level", "scenario"], job, step, true),
            schedule: resolve_value(attributes, "schedule", job, step),
            command: resolve_value(attributes, "command", job, step),
        }
    }
}

impl Default for AttributeResolver {
    fn default() -> Self {
        Self::new("javascript", false)
    }
}

fn resolve_value(attributes: &AttributeSet, action: &str, job: &str, step: &str) -> Option<String> {
    resolve_entry(attributes, &[action], job, step, true).map(|(_, value)| value)
}

/// 依次查找 全局、作业、作业步骤 三级键，后找到的覆盖先找到的
///
/// 同一级内按 `actions` 的顺序查找，靠后的同义键优先。
fn resolve_entry(
    attributes: &AttributeSet,
    actions: &[&str],
    job: &str,
    step: &str,
    step_tier: bool,
) -> Option<(String, String)> {
    let mut keys = Vec::with_capacity(actions.len() * 3);
    keys.extend(actions.iter().map(|a| format!("{JOB_PREFIX}{a}")));
    keys.extend(actions.iter().map(|a| format!("{JOB_PREFIX}{job}.{a}")));
    if step_tier && !step.is_empty() {
        keys.extend(actions.iter().map(|a| format!("{JOB_PREFIX}{job}.{a}.{step}")));
    }

    let mut result = None;
    for key in keys {
        if let Some(value) = attributes.get(&key) {
            result = Some((key, value.to_string()));
        }
    }
    result
}
