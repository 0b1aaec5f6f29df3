use std::sync::Arc;

use async_trait::async_trait;
use metrics::counter;
use tracing::{error, info};

use docker_cron_core::{CommandGroup, Job, ScheduledJob};
use docker_cron_worker::ExecutorDispatcher;

/// 注册到调度器的作业：保存作业命令组的快照，触发时逐组执行
pub struct JobRunner {
    name: String,
    groups: Vec<CommandGroup>,
    executors: Arc<ExecutorDispatcher>,
}

impl JobRunner {
    pub fn new(container_name: &str, job: &Job, executors: Arc<ExecutorDispatcher>) -> Self {
        Self {
            name: format!("{}/{}", container_name, job.name),
            groups: job
                .command_groups()
                .iter()
                .filter(|g| g.is_valid())
                .cloned()
                .collect(),
            executors,
        }
    }
}

#[async_trait]
impl ScheduledJob for JobRunner {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self) {
        info!("------------------ 作业 {} 开始 ------------------", self.name);
        for group in &self.groups {
            let strategy = self
                .executors
                .dispatch(group.scenario, group.destination.is_one_source());
            info!("命令组 {} 使用 {} 执行", group.name, strategy.name());

            match strategy
                .execute(group.commands(), &group.destination, &group.name)
                .await
            {
                Ok(()) => counter!("docker_cron_groups_succeeded_total").increment(1),
                Err(e) => {
                    counter!("docker_cron_groups_failed_total").increment(1);
                    error!("命令组 {} 执行失败: {}", group.name, e);
                }
            }
        }
        info!("------------------ 作业 {} 结束 ------------------", self.name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docker_cron_core::{ContainerRef, Scenario};
    use docker_cron_worker::InvocationCounter;

    fn reference(id: &str) -> ContainerRef {
        ContainerRef {
            id: id.to_string(),
            name: id.to_string(),
            image: None,
        }
    }

    #[tokio::test]
    async fn test_each_group_runs_once() {
        let mut job = Job::new("backup", "0 1 * * *");
        let (a, b) = (reference("a"), reference("b"));
        let group = job.find_command_group(&a, &a, Some(Scenario::Local), "javascript", false);
        group.add_command("one");
        group.add_command("two");
        job.find_command_group(&b, &a, Some(Scenario::Central), "javascript", false)
            .add_command("three");
        job.find_command_group(&b, &b, None, "javascript", false);
        job.activate();

        let counter = InvocationCounter::new();
        let runner = JobRunner::new(
            "db",
            &job,
            Arc::new(ExecutorDispatcher::simulated(counter.clone())),
        );

        assert_eq!(runner.name(), "db/backup");
        runner.run().await;
        assert_eq!(counter.get(), 3);
    }
}
