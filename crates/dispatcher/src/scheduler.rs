use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use metrics::{counter, gauge};
use tokio::sync::{oneshot, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use docker_cron_core::config::SchedulerConfig;
use docker_cron_core::{JobScheduler, ScheduledJob, SchedulerError, SchedulerResult};

use crate::cron_utils::CronExpression;

struct Registration {
    expression: CronExpression,
    job: Arc<dyn ScheduledJob>,
    next_fire: Option<DateTime<Utc>>,
}

/// 基于 `cron` 的作业调度器
///
/// 单个后台任务按固定间隔检查到期的作业，每次触发都在独立的任务中运行，
/// 长时间运行的命令不会阻塞检查循环。
pub struct CronJobScheduler {
    config: SchedulerConfig,
    registrations: Arc<RwLock<HashMap<String, Registration>>>,
    shutdown_tx: Mutex<Option<oneshot::Sender<()>>>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl CronJobScheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            config,
            registrations: Arc::new(RwLock::new(HashMap::new())),
            shutdown_tx: Mutex::new(None),
            handle: Mutex::new(None),
        }
    }

    /// 触发 `now` 时已到期的作业，返回各次运行的句柄
    pub async fn fire_due(&self, now: DateTime<Utc>) -> Vec<JoinHandle<()>> {
        Self::fire_due_in(&self.registrations, now).await
    }

    async fn fire_due_in(
        registrations: &RwLock<HashMap<String, Registration>>,
        now: DateTime<Utc>,
    ) -> Vec<JoinHandle<()>> {
        let due: Vec<Arc<dyn ScheduledJob>> = {
            let mut registrations = registrations.write().await;
            registrations
                .values_mut()
                .filter(|r| r.next_fire.is_some_and(|next| next <= now))
                .map(|r| {
                    r.next_fire = r.expression.next_after(now);
                    r.job.clone()
                })
                .collect()
        };

        due.into_iter()
            .map(|job| {
                debug!("触发作业 {}", job.name());
                counter!("docker_cron_jobs_fired_total").increment(1);
                tokio::spawn(async move { job.run().await })
            })
            .collect()
    }

    pub async fn is_running(&self) -> bool {
        self.handle.lock().await.is_some()
    }
}

impl Default for CronJobScheduler {
    fn default() -> Self {
        Self::new(SchedulerConfig::default())
    }
}

#[async_trait]
impl JobScheduler for CronJobScheduler {
    async fn schedule(&self, cron_expr: &str, job: Arc<dyn ScheduledJob>) -> SchedulerResult<String> {
        let expression = CronExpression::parse(cron_expr)?;
        let next_fire = expression.next_after(Utc::now());
        let id = Uuid::new_v4().to_string();

        let mut registrations = self.registrations.write().await;
        info!("作业 {} 已注册: {} (下次执行 {:?})", job.name(), cron_expr, next_fire);
        registrations.insert(
            id.clone(),
            Registration {
                expression,
                job,
                next_fire,
            },
        );
        gauge!("docker_cron_scheduled_jobs").set(registrations.len() as f64);
        Ok(id)
    }

    async fn deschedule(&self, id: &str) -> SchedulerResult<()> {
        let mut registrations = self.registrations.write().await;
        match registrations.remove(id) {
            Some(registration) => {
                info!("作业 {} 已取消调度", registration.job.name());
                gauge!("docker_cron_scheduled_jobs").set(registrations.len() as f64);
                Ok(())
            }
            None => {
                debug!("未找到要取消的调度 {}", id);
                Ok(())
            }
        }
    }

    async fn count_of_scheduled_jobs(&self) -> usize {
        self.registrations.read().await.len()
    }

    fn predict_fire_dates(
        &self,
        cron_expr: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> SchedulerResult<Vec<DateTime<Utc>>> {
        let expression = CronExpression::parse(cron_expr)?;
        Ok(expression.fire_dates_between(from, to, self.config.max_prediction_iterations))
    }

    async fn start(&self) -> SchedulerResult<()> {
        let mut handle = self.handle.lock().await;
        if handle.is_some() {
            warn!("调度器已经在运行");
            return Ok(());
        }

        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();
        let registrations = self.registrations.clone();
        let tick = Duration::from_millis(self.config.tick_interval_ms);

        *handle = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(tick);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        Self::fire_due_in(&registrations, Utc::now()).await;
                    }
                    _ = &mut shutdown_rx => {
                        info!("调度器收到停止信号");
                        break;
                    }
                }
            }
        }));
        *self.shutdown_tx.lock().await = Some(shutdown_tx);

        info!("调度器已启动，检查间隔 {}ms", self.config.tick_interval_ms);
        Ok(())
    }

    async fn stop(&self) -> SchedulerResult<()> {
        if let Some(tx) = self.shutdown_tx.lock().await.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.lock().await.take() {
            handle
                .await
                .map_err(|e| SchedulerError::internal(format!("调度循环异常退出: {e}")))?;
        }
        info!("调度器已停止");
        Ok(())
    }
}
