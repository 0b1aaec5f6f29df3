use thiserror::Error;

/// 调度器错误类型定义
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("无效的CRON表达式: {expr} - {message}")]
    InvalidCron { expr: String, message: String },

    #[error("无效的标签属性: {key} = {value}")]
    InvalidAttribute { key: String, value: String },

    #[error("表达式求值错误: {0}")]
    Evaluation(String),

    #[error("未知的脚本引擎: {0}")]
    UnknownScriptEngine(String),

    #[error("容器未找到: {id}")]
    ContainerNotFound { id: String },

    #[error("容器运行时错误: {0}")]
    ContainerRuntime(String),

    #[error("任务执行错误: {0}")]
    TaskExecution(String),

    #[error("配置错误: {0}")]
    Configuration(String),

    #[error("序列化错误: {0}")]
    Serialization(String),

    #[error("IO错误: {0}")]
    Io(#[from] std::io::Error),

    #[error("内部错误: {0}")]
    Internal(String),
}

impl SchedulerError {
    pub fn invalid_cron(expr: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidCron {
            expr: expr.into(),
            message: message.into(),
        }
    }

    pub fn invalid_attribute(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::InvalidAttribute {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn evaluation_error(msg: impl Into<String>) -> Self {
        Self::Evaluation(msg.into())
    }

    pub fn container_not_found(id: impl Into<String>) -> Self {
        Self::ContainerNotFound { id: id.into() }
    }

    pub fn runtime_error(msg: impl Into<String>) -> Self {
        Self::ContainerRuntime(msg.into())
    }

    pub fn execution_error(msg: impl Into<String>) -> Self {
        Self::TaskExecution(msg.into())
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// 容器已经不存在
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::ContainerNotFound { .. })
    }
}

impl From<serde_json::Error> for SchedulerError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// 统一的Result类型
pub type SchedulerResult<T> = std::result::Result<T, SchedulerError>;
