use std::collections::HashMap;

use docker_cron_core::utils::is_blank;
use docker_cron_core::{Scenario, SchedulerError, SchedulerResult};
use tracing::warn;

use crate::attributes::{AttributeResolver, AttributeSet, ResolvedStep};

/// 编译后的作业步骤，不可变
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepDescriptor {
    pub job_name: String,
    pub step_name: String,
    pub schedule: String,
    pub command: String,
    pub condition: Option<String>,
    pub scenario: Scenario,
    pub script_engine: String,
    pub scripting_as_template: bool,
}

impl StepDescriptor {
    /// 是否在批处理容器上执行
    pub fn is_central_executor(&self) -> bool {
        self.scenario.is_central_executor()
    }
}

/// 把容器标签编译成步骤列表
#[derive(Debug, Clone, Default)]
pub struct StepCompiler {
    resolver: AttributeResolver,
}

impl StepCompiler {
    pub fn new(resolver: AttributeResolver) -> Self {
        Self { resolver }
    }

    /// 编译容器的全部步骤，失败的步骤记录日志后跳过
    pub fn compile_all(
        &self,
        container_name: &str,
        attributes: &HashMap<String, String>,
        is_batch_container: bool,
    ) -> Vec<StepDescriptor> {
        let attributes = AttributeSet::from_attributes(attributes);
        self.resolver
            .resolve(&attributes)
            .into_iter()
            .filter_map(|resolved| match self.compile(resolved, is_batch_container) {
                Ok(step) => Some(step),
                Err(e) => {
                    warn!("容器 {} 的作业步骤无法编译，已跳过: {}", container_name, e);
                    None
                }
            })
            .collect()
    }

    pub fn compile(
        &self,
        resolved: ResolvedStep,
        is_batch_container: bool,
    ) -> SchedulerResult<StepDescriptor> {
        let scenario = match &resolved.scenario {
            Some((key, value)) => Scenario::parse(key, value)?,
            None => Scenario::default_for(is_batch_container),
        };

        let schedule = resolved
            .schedule
            .filter(|s| !is_blank(s))
            .ok_or_else(|| {
                SchedulerError::invalid_attribute(
                    schedule_key(&resolved.job_name, &resolved.step_name),
                    "",
                )
            })?;

        Ok(StepDescriptor {
            job_name: resolved.job_name,
            step_name: resolved.step_name,
            schedule: schedule.trim().to_string(),
            command: resolved.command.unwrap_or_default(),
            condition: resolved.condition,
            scenario,
            script_engine: resolved.script_engine,
            scripting_as_template: resolved.scripting_as_template,
        })
    }
}

fn schedule_key(job: &str, step: &str) -> String {
    if step.is_empty() {
        format!("job.{job}.schedule")
    } else {
        format!("job.{job}.schedule.{step}")
    }
}
