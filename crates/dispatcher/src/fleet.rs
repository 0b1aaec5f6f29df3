//! 容器注册表
//!
//! 保存所有已知容器及其作业，负责在容器加入时规划并注册作业、在容器退出时取消调度。
//! 容器表和批处理容器槽位由同一把读写锁保护。

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use docker_cron_core::config::{DockerConfig, LogsConfig};
use docker_cron_core::{
    AppConfig, Container, ContainerFilter, ContainerInfo, ContainerSource, JobScheduler, LogEntry,
    ScheduleEvent, SchedulerError, SchedulerResult,
};
use docker_cron_domain::{project_into, EvaluatorRegistry, JobPlanner};
use docker_cron_worker::ExecutorDispatcher;

use crate::runner::JobRunner;
use crate::state_listener::StateListener;

/// 历史事件标题的后缀，查询日志时去掉
const HISTORY_SUFFIX: &str = "_hist";

#[derive(Default)]
struct FleetState {
    containers: HashMap<String, Container>,
    batch: Option<ContainerInfo>,
}

pub struct Fleet {
    docker: DockerConfig,
    logs: LogsConfig,
    filter: ContainerFilter,
    source: Arc<dyn ContainerSource>,
    scheduler: Arc<dyn JobScheduler>,
    executors: Arc<ExecutorDispatcher>,
    planner: JobPlanner,
    state: RwLock<FleetState>,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl Fleet {
    pub fn new(
        config: &AppConfig,
        source: Arc<dyn ContainerSource>,
        scheduler: Arc<dyn JobScheduler>,
        executors: Arc<ExecutorDispatcher>,
    ) -> SchedulerResult<Self> {
        let planner = JobPlanner::new(config.evaluation.clone(), EvaluatorRegistry::new());
        Self::with_planner(config, source, scheduler, executors, planner)
    }

    pub fn with_planner(
        config: &AppConfig,
        source: Arc<dyn ContainerSource>,
        scheduler: Arc<dyn JobScheduler>,
        executors: Arc<ExecutorDispatcher>,
        planner: JobPlanner,
    ) -> SchedulerResult<Self> {
        Ok(Self {
            docker: config.docker.clone(),
            logs: config.logs.clone(),
            filter: ContainerFilter::new(&config.docker.container_filter)?,
            source,
            scheduler,
            executors,
            planner,
            state: RwLock::new(FleetState::default()),
            listener: Mutex::new(None),
        })
    }

    pub fn source(&self) -> &Arc<dyn ContainerSource> {
        &self.source
    }

    pub fn scheduler(&self) -> &Arc<dyn JobScheduler> {
        &self.scheduler
    }

    /// 加入单个容器
    pub async fn add_container(&self, info: ContainerInfo) -> bool {
        self.add_containers(vec![info]).await == 1
    }

    /// 加入一批容器，已注册的ID被忽略，返回新加入的数量
    ///
    /// 同一批容器共用一轮规划，批处理容器的步骤只编译一次。临时工作容器只登记不规划。
    pub async fn add_containers(&self, infos: Vec<ContainerInfo>) -> usize {
        let mut state = self.state.write().await;
        let batch = state.batch.clone();

        let mut added = Vec::new();
        {
            let mut pass = self.planner.pass(batch.as_ref());
            for mut info in infos {
                if state.containers.contains_key(&info.id)
                    || added.iter().any(|c: &Container| c.id() == info.id)
                {
                    continue;
                }

                info.add_volume_attributes();
                let mut container = Container::new(info);
                if container.info.is_temp_container() {
                    debug!("临时工作容器 {} 不规划作业", container.info);
                } else {
                    pass.plan(&mut container);
                }
                added.push(container);
            }
        }

        let count = added.len();
        for mut container in added {
            self.schedule_jobs(&mut container).await;
            info!("容器已加入: {}", container.info);
            state.containers.insert(container.id().to_string(), container);
        }
        count
    }

    async fn schedule_jobs(&self, container: &mut Container) {
        let name = container.name().to_string();
        for job in container.jobs.iter_mut().filter(|job| job.is_valid()) {
            let runner = JobRunner::new(&name, job, self.executors.clone());
            match self.scheduler.schedule(&job.schedule, Arc::new(runner)).await {
                Ok(id) => job.id = Some(id),
                Err(e) => warn!("容器 {} 的作业 {} 注册失败: {}", name, job.name, e),
            }
        }
    }

    /// 移除容器并取消其全部作业
    pub async fn delete_container(&self, id: &str) -> Option<Container> {
        let removed = {
            let mut state = self.state.write().await;
            let removed = state.containers.remove(id);
            if state.batch.as_ref().is_some_and(|batch| batch.id == id) {
                info!("批处理容器 {} 已移除", id);
                state.batch = None;
            }
            removed
        };

        let container = removed?;
        info!("容器已从注册表移除: {}", container.info);
        for job in &container.jobs {
            if let Some(job_id) = &job.id {
                match self.scheduler.deschedule(job_id).await {
                    Ok(()) => info!("作业 {} 已取消调度", job),
                    Err(e) => warn!("取消作业 {} 失败: {}", job, e),
                }
            }
        }
        Some(container)
    }

    pub async fn containers(&self) -> Vec<Container> {
        let state = self.state.read().await;
        let mut containers: Vec<Container> = state.containers.values().cloned().collect();
        containers.sort_by(|a, b| a.name().cmp(b.name()));
        containers
    }

    pub async fn container(&self, id: &str) -> Option<Container> {
        self.state.read().await.containers.get(id).cloned()
    }

    pub async fn container_by_name(&self, name: &str) -> Option<Container> {
        self.state
            .read()
            .await
            .containers
            .values()
            .find(|c| c.name() == name)
            .cloned()
    }

    pub async fn set_batch_container(&self, mut info: ContainerInfo) {
        info.add_volume_attributes();
        info!("批处理容器: {}", info);
        self.state.write().await.batch = Some(info);
    }

    pub async fn batch_container(&self) -> Option<ContainerInfo> {
        self.state.read().await.batch.clone()
    }

    pub async fn count_of_scheduled_jobs(&self) -> usize {
        self.scheduler.count_of_scheduled_jobs().await
    }

    fn is_batch_candidate(&self, info: &ContainerInfo) -> bool {
        info.hostname() == Some(self.docker.hostname.as_str())
            || info.name == self.docker.batch_container_name
    }

    /// 按配置的名称过滤器加载容器
    pub async fn load_containers(&self) -> SchedulerResult<usize> {
        self.load_containers_matching(&self.filter).await
    }

    /// 从容器来源加载容器，先确定批处理容器再逐个加入
    pub async fn load_containers_matching(&self, filter: &ContainerFilter) -> SchedulerResult<usize> {
        info!("从容器来源加载容器");
        let infos = self.source.list_containers(filter).await?;

        if let Some(batch) = infos.iter().find(|info| self.is_batch_candidate(info)) {
            let known = self
                .batch_container()
                .await
                .is_some_and(|current| current.id == batch.id);
            if !known {
                self.set_batch_container(batch.clone()).await;
            }
        }

        let added = self.add_containers(infos).await;
        info!("新加入 {} 个容器，共注册 {} 个作业", added, self.count_of_scheduled_jobs().await);
        Ok(added)
    }

    /// 加载容器、启动调度器并订阅生命周期事件
    pub async fn start(self: &Arc<Self>) -> SchedulerResult<()> {
        self.load_containers().await?;
        self.start_scheduling().await
    }

    /// 启动调度器并订阅生命周期事件，不重新加载容器
    pub async fn start_scheduling(self: &Arc<Self>) -> SchedulerResult<()> {
        self.scheduler.start().await?;

        let events = self.source.subscribe_lifecycle_events().await?;
        let listener = StateListener::new(self.clone());
        *self.listener.lock().await = Some(tokio::spawn(listener.run(events)));

        info!("容器注册表已启动");
        Ok(())
    }

    /// 停止调度器，删除遗留的临时工作容器
    pub async fn stop(&self) -> SchedulerResult<()> {
        if let Some(handle) = self.listener.lock().await.take() {
            handle.abort();
        }
        if let Err(e) = self.scheduler.stop().await {
            error!("停止调度器失败: {}", e);
        }
        self.delete_worker_containers().await;
        info!("容器注册表已停止");
        Ok(())
    }

    /// 删除所有登记在册的临时工作容器
    pub async fn delete_worker_containers(&self) -> usize {
        let workers: Vec<String> = self
            .state
            .read()
            .await
            .containers
            .values()
            .filter(|c| c.info.is_temp_container())
            .map(|c| c.id().to_string())
            .collect();

        info!("删除 {} 个临时工作容器", workers.len());
        for id in &workers {
            if let Err(e) = self.source.delete_container(id).await {
                warn!("删除临时工作容器 {} 失败: {}", id, e);
            }
            self.delete_container(id).await;
        }
        workers.len()
    }

    /// 汇总所有容器的日历事件
    pub async fn get_events(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> BTreeSet<ScheduleEvent> {
        let started = std::time::Instant::now();
        let state = self.state.read().await;

        let mut events = BTreeSet::new();
        for container in state.containers.values() {
            project_into(&mut events, container, self.scheduler.as_ref(), from, to, now);
        }
        debug!(
            "日历事件 {} 到 {}: {} 个, 耗时 {:?}",
            from,
            to,
            events.len(),
            started.elapsed()
        );
        events
    }

    /// 按容器名查询日志，最多保留最新的 `logs.max_entries` 条
    pub async fn get_logs(
        &self,
        container_name: &str,
        since: DateTime<Utc>,
        timeout: Option<Duration>,
    ) -> SchedulerResult<Vec<LogEntry>> {
        let name = container_name
            .strip_suffix(HISTORY_SUFFIX)
            .unwrap_or(container_name);
        let container = self
            .container_by_name(name)
            .await
            .ok_or_else(|| SchedulerError::container_not_found(name))?;

        let timeout = timeout.unwrap_or(Duration::from_secs(self.logs.timeout_seconds));
        let mut entries = self
            .source
            .fetch_logs(container.id(), since, timeout)
            .await?;

        if entries.len() > self.logs.max_entries {
            let excess = entries.len() - self.logs.max_entries;
            entries.drain(..excess);
        }
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docker_cron_testing_utils::{ContainerBuilder, InMemoryContainerSource, RecordingScheduler};
    use docker_cron_worker::InvocationCounter;

    fn fleet(source: InMemoryContainerSource, scheduler: RecordingScheduler) -> Fleet {
        let mut config = AppConfig::default();
        config.docker.hostname = "scheduler-host".to_string();
        Fleet::new(
            &config,
            Arc::new(source),
            Arc::new(scheduler),
            Arc::new(ExecutorDispatcher::simulated(InvocationCounter::new())),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_add_ignores_known_ids() {
        let fleet = fleet(InMemoryContainerSource::new(), RecordingScheduler::new());
        let info = ContainerBuilder::new("1", "db").build();

        assert!(fleet.add_container(info.clone()).await);
        assert!(!fleet.add_container(info).await);
        assert_eq!(fleet.containers().await.len(), 1);
    }

    #[tokio::test]
    async fn test_temp_container_is_not_planned() {
        let scheduler = RecordingScheduler::new();
        let fleet = fleet(InMemoryContainerSource::new(), scheduler.clone());
        let info = ContainerBuilder::new("t1", "Temp-Container-backup-1-db")
            .with_job("backup", "0 1 * * *", "echo hi", None)
            .build();

        fleet.add_container(info).await;

        let container = fleet.container("t1").await.unwrap();
        assert!(container.jobs.is_empty());
        assert!(scheduler.registrations().is_empty());
    }

    #[tokio::test]
    async fn test_delete_clears_batch_slot() {
        let fleet = fleet(InMemoryContainerSource::new(), RecordingScheduler::new());
        let batch = ContainerBuilder::new("b", "docker-cron").build();
        fleet.set_batch_container(batch.clone()).await;
        fleet.add_container(batch).await;

        assert!(fleet.delete_container("b").await.is_some());
        assert!(fleet.batch_container().await.is_none());
        assert!(fleet.delete_container("b").await.is_none());
    }

    #[tokio::test]
    async fn test_batch_detected_by_hostname() {
        let source = InMemoryContainerSource::new();
        source.add(
            ContainerBuilder::new("x", "scheduler")
                .with_attribute("host", "scheduler-host")
                .build(),
        );
        source.add(ContainerBuilder::new("y", "db").build());
        let fleet = fleet(source, RecordingScheduler::new());

        assert_eq!(fleet.load_containers().await.unwrap(), 2);
        assert_eq!(fleet.batch_container().await.unwrap().id, "x");
    }
}
