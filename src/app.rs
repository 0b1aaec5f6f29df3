use std::sync::Arc;

use anyhow::{Context, Result};
use docker_cron_api::{create_app, AppState};
use docker_cron_core::{AppConfig, ContainerSource, ExecutionBackend, JobScheduler};
use docker_cron_dispatcher::{CronJobScheduler, Fleet};
use docker_cron_infrastructure::DockerCli;
use docker_cron_worker::{ExecutorDispatcher, InvocationCounter};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tokio::{net::TcpListener, sync::broadcast};
use tracing::{error, info, warn};

/// 主应用程序
pub struct Application {
    config: AppConfig,
    fleet: Arc<Fleet>,
    metrics: Option<PrometheusHandle>,
}

impl Application {
    /// 使用 docker 命令行和内置CRON调度器创建应用
    pub fn new(config: AppConfig) -> Result<Self> {
        info!("初始化应用程序");

        let docker = Arc::new(DockerCli::new(&config.docker, &config.cleanup));
        let scheduler = Arc::new(CronJobScheduler::new(config.scheduler.clone()));
        let metrics = install_metrics_recorder();

        let mut app = Self::from_parts(config, docker.clone(), docker, scheduler)?;
        app.metrics = metrics;
        Ok(app)
    }

    /// 由给定的协作者组装应用
    pub fn from_parts(
        config: AppConfig,
        source: Arc<dyn ContainerSource>,
        backend: Arc<dyn ExecutionBackend>,
        scheduler: Arc<dyn JobScheduler>,
    ) -> Result<Self> {
        let executors = Arc::new(ExecutorDispatcher::from_config(
            backend,
            source.clone(),
            &config.executor,
            InvocationCounter::new(),
        ));
        let fleet = Fleet::new(&config, source, scheduler, executors).context("创建容器注册表失败")?;

        Ok(Self {
            config,
            fleet: Arc::new(fleet),
            metrics: None,
        })
    }

    pub fn fleet(&self) -> &Arc<Fleet> {
        &self.fleet
    }

    /// 启动调度并提供API，直到收到关闭信号
    pub async fn run(&self, mut shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
        self.fleet.load_containers().await.context("加载容器失败")?;
        self.fleet.delete_worker_containers().await;
        self.fleet.start_scheduling().await.context("启动调度失败")?;
        info!(
            "初始化完成，已注册 {} 个作业",
            self.fleet.count_of_scheduled_jobs().await
        );

        if self.config.api.enabled {
            self.run_api(shutdown_rx).await?;
        } else {
            let _ = shutdown_rx.recv().await;
        }

        info!("停止调度");
        self.fleet.stop().await.context("停止调度失败")?;
        Ok(())
    }

    async fn run_api(&self, mut shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
        let mut state = AppState::new(self.fleet.clone());
        if let Some(handle) = &self.metrics {
            state = state.with_metrics(handle.clone());
        }
        let app = create_app(state);

        let bind_address = &self.config.api.bind_address;
        let listener = TcpListener::bind(bind_address)
            .await
            .with_context(|| format!("绑定API地址失败: {bind_address}"))?;
        info!("API服务器监听地址: {}", bind_address);

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
                info!("API服务器收到关闭信号");
            })
            .await
            .map_err(|e| {
                error!("API服务器运行失败: {e}");
                anyhow::anyhow!("API服务器运行失败: {e}")
            })
    }
}

fn install_metrics_recorder() -> Option<PrometheusHandle> {
    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => Some(handle),
        Err(e) => {
            warn!("安装Prometheus指标导出器失败: {}", e);
            None
        }
    }
}
