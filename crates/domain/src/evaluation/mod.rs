//! 条件求值与命令模板渲染
//!
//! 每个命令组求值时都会用当前数据源容器的参数新建求值器实例，求值器之间不共享状态。

mod expression;
mod template;

pub use expression::ExpressionEvaluator;
pub use template::DelimiterRenderer;

use std::collections::HashMap;

use docker_cron_core::config::EvaluationConfig;
use docker_cron_core::utils::is_blank;
use docker_cron_core::{ContainerInfo, SchedulerError, SchedulerResult, Volume};
use tracing::warn;

/// 表达式求值能力
pub trait Evaluator: Send + Sync {
    fn evaluate(&self, expression: &str) -> SchedulerResult<String>;
}

type EvaluatorFactory = fn(&HashMap<String, String>) -> Box<dyn Evaluator>;

/// 脚本引擎注册表，按名称（不区分大小写）创建求值器
#[derive(Clone)]
pub struct EvaluatorRegistry {
    factories: HashMap<String, EvaluatorFactory>,
}

impl EvaluatorRegistry {
    pub fn empty() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// 内置 Tera 表达式引擎，注册为 `javascript`、`js` 和 `tera`
    pub fn new() -> Self {
        let mut registry = Self::empty();
        for name in ["javascript", "js", "tera"] {
            registry.register(name, expression_evaluator);
        }
        registry
    }

    pub fn register(&mut self, name: &str, factory: EvaluatorFactory) {
        self.factories.insert(name.trim().to_lowercase(), factory);
    }

    pub fn engines(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn create(
        &self,
        engine: &str,
        parameters: &HashMap<String, String>,
    ) -> SchedulerResult<Box<dyn Evaluator>> {
        self.factories
            .get(&engine.trim().to_lowercase())
            .map(|factory| factory(parameters))
            .ok_or_else(|| SchedulerError::UnknownScriptEngine(engine.to_string()))
    }
}

impl Default for EvaluatorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn expression_evaluator(parameters: &HashMap<String, String>) -> Box<dyn Evaluator> {
    Box::new(ExpressionEvaluator::new(parameters))
}

/// 一次求值的结果
#[derive(Debug)]
pub struct Evaluation {
    pub condition: bool,
    pub rendered: SchedulerResult<String>,
}

/// 为一个命令组绑定条件求值器和模板渲染器
pub struct EvaluationFacade {
    scripting: Box<dyn Evaluator>,
    template: Option<DelimiterRenderer>,
}

impl EvaluationFacade {
    /// `scripting_as_template` 为真时命令也交给脚本引擎渲染，否则使用占位符替换
    pub fn new(
        registry: &EvaluatorRegistry,
        config: &EvaluationConfig,
        script_engine: &str,
        scripting_as_template: bool,
        parameters: HashMap<String, String>,
    ) -> SchedulerResult<Self> {
        let engine = if is_blank(script_engine) {
            config.default_script_engine.as_str()
        } else {
            script_engine
        };
        let scripting = registry.create(engine, &parameters)?;
        let template = (!scripting_as_template).then(|| {
            DelimiterRenderer::with_delimiters(
                parameters,
                config.template_start.clone(),
                config.template_end.clone(),
            )
        });

        Ok(Self {
            scripting,
            template,
        })
    }

    /// 空条件视为真；求值结果必须是 `true`（不区分大小写）；求值失败视为假
    pub fn is_valid(&self, condition: Option<&str>) -> bool {
        let condition = match condition {
            Some(c) if !is_blank(c) => c,
            _ => return true,
        };

        match self.scripting.evaluate(condition) {
            Ok(result) => result.trim().eq_ignore_ascii_case("true"),
            Err(e) => {
                warn!("条件表达式求值失败 {}: {}", condition, e);
                false
            }
        }
    }

    pub fn render(&self, command: &str) -> SchedulerResult<String> {
        match &self.template {
            Some(renderer) => renderer.render(command),
            None => self.scripting.evaluate(command),
        }
    }

    pub fn evaluate(&self, condition: Option<&str>, command: &str) -> Evaluation {
        let condition = self.is_valid(condition);
        let rendered = if condition {
            self.render(command)
        } else {
            Ok(String::new())
        };
        Evaluation {
            condition,
            rendered,
        }
    }
}

/// 求值参数：数据源容器的全部属性，按卷展开时再加上卷信息
pub fn parameters_for(container: &ContainerInfo, volume: Option<&Volume>) -> HashMap<String, String> {
    let mut values = container.attributes.clone();
    if let Some(volume) = volume {
        values.insert("volume.local".to_string(), volume.local_path().to_string());
        values.insert("volume".to_string(), volume.destination.clone());
        values.insert("volume.name".to_string(), volume.name.clone());
        values.insert("volume.destination".to_string(), volume.destination.clone());
    }
    values
}
