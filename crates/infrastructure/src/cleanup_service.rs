use std::time::Duration;

use docker_cron_core::config::CleanupConfig;
use docker_cron_core::ContainerRuntime;
use tracing::{debug, error, info, warn};

/// 容器删除的重试策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            backoff: Duration::from_secs(1),
        }
    }
}

impl From<&CleanupConfig> for RetryPolicy {
    fn from(config: &CleanupConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            backoff: Duration::from_millis(config.backoff_ms),
        }
    }
}

/// 删除结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    /// 容器已不存在，视为成功
    NotFound,
    /// 重试次数用尽后放弃
    Abandoned,
}

impl DeleteOutcome {
    pub fn is_success(&self) -> bool {
        !matches!(self, DeleteOutcome::Abandoned)
    }
}

/// 停止并删除容器
///
/// 每次尝试先停止再删除；任一步返回“不存在”立即成功返回。其他失败在间隔后重试，
/// 用尽次数后记录错误并放弃，不向调用方报错。
pub async fn delete_with_retry(
    runtime: &dyn ContainerRuntime,
    id: &str,
    policy: RetryPolicy,
) -> DeleteOutcome {
    for attempt in 1..=policy.max_attempts {
        match runtime.stop_container(id).await {
            Err(e) if e.is_not_found() => {
                debug!("容器 {} 不存在", id);
                return DeleteOutcome::NotFound;
            }
            Err(e) => debug!("停止容器 {} 失败 (第{}次): {}", id, attempt, e),
            Ok(()) => {}
        }

        match runtime.remove_container(id).await {
            Ok(()) => {
                info!("容器已删除 {}", id);
                return DeleteOutcome::Deleted;
            }
            Err(e) if e.is_not_found() => return DeleteOutcome::NotFound,
            Err(e) => warn!("删除容器 {} 失败 (第{}次): {}", id, attempt, e),
        }

        if attempt < policy.max_attempts {
            tokio::time::sleep(policy.backoff).await;
        }
    }

    error!("容器 {} 在 {} 次尝试后仍无法删除，已放弃", id, policy.max_attempts);
    DeleteOutcome::Abandoned
}
