use std::sync::Arc;

use docker_cron_core::config::ExecutorConfig;
use docker_cron_core::{ContainerSource, ExecutionBackend, ExecutionStrategy, Scenario};
use tracing::info;

use super::executors::{
    ArtifactExecutor, ContainerShellExecutor, HostShellExecutor, InvocationCounter,
    SimulatedExecutor, TempContainerExecutor,
};

/// 执行策略种类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyKind {
    Artifact,
    HostShell,
    ContainerShell,
    TempContainer,
}

/// 场景到执行策略的映射；未声明场景时使用临时容器
pub fn select_strategy(scenario: Option<Scenario>, _is_one_source: bool) -> StrategyKind {
    match scenario {
        Some(Scenario::Maven) => StrategyKind::Artifact,
        Some(Scenario::Central) => StrategyKind::HostShell,
        Some(Scenario::Local) => StrategyKind::ContainerShell,
        None => StrategyKind::TempContainer,
    }
}

/// 持有全部执行策略实例，按命令组的场景选择
pub struct ExecutorDispatcher {
    artifact: Arc<dyn ExecutionStrategy>,
    host: Arc<dyn ExecutionStrategy>,
    container: Arc<dyn ExecutionStrategy>,
    temp: Arc<dyn ExecutionStrategy>,
}

impl ExecutorDispatcher {
    pub fn new(
        backend: Arc<dyn ExecutionBackend>,
        source: Arc<dyn ContainerSource>,
        config: &ExecutorConfig,
    ) -> Self {
        Self {
            artifact: Arc::new(ArtifactExecutor::new(backend.clone(), config.clone())),
            host: Arc::new(HostShellExecutor::new(backend.clone())),
            container: Arc::new(ContainerShellExecutor::new(backend.clone())),
            temp: Arc::new(TempContainerExecutor::new(backend, source)),
        }
    }

    /// 所有策略都替换为模拟执行器
    pub fn simulated(counter: InvocationCounter) -> Self {
        let simulator: Arc<dyn ExecutionStrategy> = Arc::new(SimulatedExecutor::new(counter));
        Self {
            artifact: simulator.clone(),
            host: simulator.clone(),
            container: simulator.clone(),
            temp: simulator,
        }
    }

    /// 按配置创建：`dry_run` 时使用模拟执行器
    pub fn from_config(
        backend: Arc<dyn ExecutionBackend>,
        source: Arc<dyn ContainerSource>,
        config: &ExecutorConfig,
        counter: InvocationCounter,
    ) -> Self {
        if config.dry_run {
            info!("dry_run 已启用，命令只记录不执行");
            Self::simulated(counter)
        } else {
            Self::new(backend, source, config)
        }
    }

    pub fn dispatch(&self, scenario: Option<Scenario>, is_one_source: bool) -> Arc<dyn ExecutionStrategy> {
        match select_strategy(scenario, is_one_source) {
            StrategyKind::Artifact => self.artifact.clone(),
            StrategyKind::HostShell => self.host.clone(),
            StrategyKind::ContainerShell => self.container.clone(),
            StrategyKind::TempContainer => self.temp.clone(),
        }
    }
}
