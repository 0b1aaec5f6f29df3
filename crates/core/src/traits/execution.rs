use async_trait::async_trait;

use crate::SchedulerResult;

/// 命令执行结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            exit_code: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// 命令执行后端
#[async_trait]
pub trait ExecutionBackend: Send + Sync {
    /// 在指定容器内执行
    async fn run_command(&self, argv: &[String], container_id: &str) -> SchedulerResult<CommandOutput>;

    /// 在主机上执行
    async fn run_host_command(&self, argv: &[String]) -> SchedulerResult<CommandOutput>;
}

/// 容器停止与删除的底层操作
///
/// 容器不存在时返回 `SchedulerError::ContainerNotFound`。
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    async fn stop_container(&self, id: &str) -> SchedulerResult<()>;

    async fn remove_container(&self, id: &str) -> SchedulerResult<()>;
}
