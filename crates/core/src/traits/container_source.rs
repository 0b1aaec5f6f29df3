use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;
use tokio::sync::mpsc;

use crate::models::{ContainerFilter, ContainerInfo, JobDestination, LogEntry};
use crate::SchedulerResult;

/// 容器生命周期状态
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleStatus {
    Start,
    Restart,
    Die,
    Other(String),
}

impl LifecycleStatus {
    pub fn from_status(status: &str) -> Self {
        match status.trim().to_lowercase().as_str() {
            "start" => LifecycleStatus::Start,
            "restart" => LifecycleStatus::Restart,
            "die" => LifecycleStatus::Die,
            other => LifecycleStatus::Other(other.to_string()),
        }
    }
}

/// 容器运行时推送的生命周期事件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecycleEvent {
    pub container_id: String,
    pub status: LifecycleStatus,
}

impl LifecycleEvent {
    pub fn new(container_id: impl Into<String>, status: LifecycleStatus) -> Self {
        Self {
            container_id: container_id.into(),
            status,
        }
    }
}

/// 容器注册与生命周期来源
#[async_trait]
pub trait ContainerSource: Send + Sync {
    /// 列出名称匹配过滤器的运行中容器（含标签与读写挂载）
    async fn list_containers(&self, filter: &ContainerFilter) -> SchedulerResult<Vec<ContainerInfo>>;

    /// 订阅生命周期事件，通道关闭表示订阅结束
    async fn subscribe_lifecycle_events(&self) -> SchedulerResult<mpsc::Receiver<LifecycleEvent>>;

    /// 创建并启动容器，共享目标中两个容器的卷
    async fn create_container(
        &self,
        image: &str,
        destination: &JobDestination,
        name: &str,
        command: &str,
    ) -> SchedulerResult<ContainerInfo>;

    /// 停止并删除容器，失败时尽力重试后放弃
    async fn delete_container(&self, id: &str) -> SchedulerResult<()>;

    async fn fetch_logs(
        &self,
        container_id: &str,
        since: DateTime<Utc>,
        timeout: Duration,
    ) -> SchedulerResult<Vec<LogEntry>>;
}
