use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use docker_cron_core::{ContainerFilter, LifecycleEvent, LifecycleStatus, SchedulerResult};

use crate::fleet::Fleet;

/// 容器生命周期事件监听器
///
/// 新容器启动时重新加载容器列表（只处理新ID），容器退出时移除并取消其作业。
/// 单个事件处理失败只记录日志，不会结束订阅。
pub struct StateListener {
    fleet: Arc<Fleet>,
}

impl StateListener {
    pub fn new(fleet: Arc<Fleet>) -> Self {
        Self { fleet }
    }

    /// 消费事件直到通道关闭
    pub async fn run(self, mut events: mpsc::Receiver<LifecycleEvent>) {
        info!("开始监听容器生命周期事件");
        while let Some(event) = events.recv().await {
            if let Err(e) = self.process_event(&event).await {
                error!("处理容器 {} 的事件 {:?} 失败: {}", event.container_id, event.status, e);
            }
        }
        warn!("容器生命周期事件订阅已结束");
    }

    pub async fn process_event(&self, event: &LifecycleEvent) -> SchedulerResult<()> {
        match &event.status {
            LifecycleStatus::Start | LifecycleStatus::Restart => {
                info!("容器 {} 启动，重新加载容器", event.container_id);
                self.fleet
                    .load_containers_matching(&ContainerFilter::all())
                    .await?;
            }
            LifecycleStatus::Die => match self.fleet.delete_container(&event.container_id).await {
                Some(container) => info!("容器 {} 已退出，作业已停止", container.info),
                None => debug!("退出的容器 {} 不在注册表中", event.container_id),
            },
            LifecycleStatus::Other(status) => {
                debug!("忽略容器 {} 的事件 {}", event.container_id, status);
            }
        }
        Ok(())
    }
}
