use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::models::JobDestination;
use crate::SchedulerResult;

/// 可被调度器触发的作业
#[async_trait]
pub trait ScheduledJob: Send + Sync {
    fn name(&self) -> &str;

    async fn run(&self);
}

/// 外部CRON调度器接口
#[async_trait]
pub trait JobScheduler: Send + Sync {
    /// 注册作业，返回注册ID
    async fn schedule(&self, cron_expr: &str, job: Arc<dyn ScheduledJob>) -> SchedulerResult<String>;

    async fn deschedule(&self, id: &str) -> SchedulerResult<()>;

    async fn count_of_scheduled_jobs(&self) -> usize;

    /// 预测 (from, to) 区间内的触发时间，迭代次数有上限
    fn predict_fire_dates(
        &self,
        cron_expr: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> SchedulerResult<Vec<DateTime<Utc>>>;

    async fn start(&self) -> SchedulerResult<()>;

    async fn stop(&self) -> SchedulerResult<()>;
}

/// 命令组执行策略
#[async_trait]
pub trait ExecutionStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    async fn execute(
        &self,
        commands: &[String],
        destination: &JobDestination,
        group_name: &str,
    ) -> SchedulerResult<()>;
}
