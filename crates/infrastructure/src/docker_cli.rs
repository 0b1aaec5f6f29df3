//! 通过 docker 命令行访问容器运行时

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use docker_cron_core::config::{CleanupConfig, DockerConfig};
use docker_cron_core::{
    CommandOutput, ContainerFilter, ContainerInfo, ContainerRuntime, ContainerSource,
    ExecutionBackend, JobDestination, LifecycleEvent, LifecycleStatus, LogEntry, SchedulerError,
    SchedulerResult, Volume,
};
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::cleanup_service::{delete_with_retry, RetryPolicy};
use crate::process::ProcessRunner;

const NOT_FOUND_MARKER: &str = "no such container";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectedContainer {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    created: Option<String>,
    #[serde(default)]
    config: Option<InspectedConfig>,
    #[serde(default)]
    mounts: Option<Vec<InspectedMount>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectedConfig {
    #[serde(default)]
    hostname: Option<String>,
    #[serde(default)]
    image: Option<String>,
    #[serde(default)]
    labels: Option<HashMap<String, String>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectedMount {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    source: String,
    #[serde(default)]
    destination: String,
    #[serde(default, rename = "RW")]
    rw: bool,
}

/// 解析 `docker inspect` 的输出
///
/// 属性表包含 name（去掉前导 `/`）、host、docker-cron-host、image、created、id 以及全部标签；
/// 只保留读写挂载。
pub fn parse_inspect(json: &str, local_hostname: &str) -> SchedulerResult<Vec<ContainerInfo>> {
    let inspected: Vec<InspectedContainer> = serde_json::from_str(json)?;
    inspected
        .into_iter()
        .map(|container| -> SchedulerResult<ContainerInfo> {
            let config = container.config.unwrap_or_default();
            let mut attributes = HashMap::new();
            attributes.insert(
                "name".to_string(),
                container.name.trim_start_matches('/').to_string(),
            );
            if let Some(host) = config.hostname {
                attributes.insert("host".to_string(), host);
            }
            attributes.insert("docker-cron-host".to_string(), local_hostname.to_string());
            if let Some(image) = config.image {
                attributes.insert("image".to_string(), image);
            }
            if let Some(created) = container.created {
                attributes.insert("created".to_string(), created);
            }
            attributes.insert("id".to_string(), container.id);
            attributes.extend(config.labels.unwrap_or_default());

            let mounts = container
                .mounts
                .unwrap_or_default()
                .into_iter()
                .filter(|m| m.rw)
                .map(|m| Volume::new(m.name.unwrap_or_default(), m.source, m.destination, m.rw))
                .collect();

            Ok(ContainerInfo::from_attributes(attributes)?.with_mounts(mounts))
        })
        .collect()
}

#[derive(Debug, Deserialize)]
struct RawEvent {
    #[serde(default)]
    status: Option<String>,
    #[serde(default, rename = "Action")]
    action: Option<String>,
    #[serde(default)]
    id: Option<String>,
    #[serde(default, rename = "Actor")]
    actor: Option<RawActor>,
}

#[derive(Debug, Deserialize)]
struct RawActor {
    #[serde(default, rename = "ID")]
    id: Option<String>,
}

/// 解析 `docker events --format '{{json .}}'` 的一行
pub fn parse_event(line: &str) -> SchedulerResult<Option<LifecycleEvent>> {
    let raw: RawEvent = serde_json::from_str(line)?;
    let Some(status) = raw.status.or(raw.action) else {
        return Ok(None);
    };
    let Some(id) = raw.id.or_else(|| raw.actor.and_then(|a| a.id)) else {
        return Ok(None);
    };
    Ok(Some(LifecycleEvent::new(id, LifecycleStatus::from_status(&status))))
}

fn is_not_found(output: &CommandOutput) -> bool {
    output.stderr.to_lowercase().contains(NOT_FOUND_MARKER)
}

/// docker 命令行适配器
#[derive(Debug, Clone)]
pub struct DockerCli {
    binary: String,
    hostname: String,
    runner: ProcessRunner,
    retry: RetryPolicy,
}

impl DockerCli {
    pub fn new(config: &DockerConfig, cleanup: &CleanupConfig) -> Self {
        Self {
            binary: config.binary.clone(),
            hostname: config.hostname.clone(),
            runner: ProcessRunner::new(),
            retry: RetryPolicy::from(cleanup),
        }
    }

    fn argv<I, S>(&self, args: I) -> Vec<String>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        std::iter::once(self.binary.clone())
            .chain(args.into_iter().map(Into::into))
            .collect()
    }

    async fn docker<I, S>(&self, args: I) -> SchedulerResult<CommandOutput>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.runner.run(&self.argv(args)).await
    }

    /// 执行 docker 子命令，要求成功；容器不存在时返回 ContainerNotFound
    async fn docker_checked(&self, id: &str, args: Vec<String>) -> SchedulerResult<String> {
        let output = self.docker(args).await?;
        if output.is_success() {
            return Ok(output.stdout);
        }
        if is_not_found(&output) {
            return Err(SchedulerError::container_not_found(id));
        }
        Err(SchedulerError::runtime_error(output.stderr.trim().to_string()))
    }

    pub async fn inspect(&self, ids: &[String]) -> SchedulerResult<Vec<ContainerInfo>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut args = vec!["inspect".to_string()];
        args.extend(ids.iter().cloned());
        let json = self.docker_checked(&ids.join(","), args).await?;
        parse_inspect(&json, &self.hostname)
    }
}

#[async_trait]
impl ContainerSource for DockerCli {
    async fn list_containers(&self, filter: &ContainerFilter) -> SchedulerResult<Vec<ContainerInfo>> {
        let ids = self
            .docker_checked("", vec!["ps".into(), "-a".into(), "-q".into(), "--no-trunc".into()])
            .await?;
        let ids: Vec<String> = ids.lines().map(str::trim).filter(|l| !l.is_empty()).map(String::from).collect();

        let mut containers = Vec::new();
        for id in ids {
            match self.inspect(std::slice::from_ref(&id)).await {
                Ok(found) => containers.extend(found.into_iter().filter(|c| filter.matches(&c.name))),
                Err(e) => warn!("无法读取容器 {} 的详细信息: {}", id, e),
            }
        }
        debug!("共发现 {} 个匹配的容器", containers.len());
        Ok(containers)
    }

    async fn subscribe_lifecycle_events(&self) -> SchedulerResult<mpsc::Receiver<LifecycleEvent>> {
        let since = Utc::now().timestamp().to_string();
        let mut lines = self.runner.stream_lines(&self.argv([
            "events",
            "--filter",
            "type=container",
            "--since",
            since.as_str(),
            "--format",
            "{{json .}}",
        ]))?;

        let (tx, rx) = mpsc::channel(64);
        tokio::spawn(async move {
            while let Some(line) = lines.recv().await {
                match parse_event(&line) {
                    Ok(Some(event)) => {
                        if tx.send(event).await.is_err() {
                            break;
                        }
                    }
                    Ok(None) => debug!("忽略事件: {}", line),
                    Err(e) => warn!("无法解析容器事件 {}: {}", line, e),
                }
            }
            info!("容器事件订阅已结束");
        });
        Ok(rx)
    }

    async fn create_container(
        &self,
        image: &str,
        destination: &JobDestination,
        name: &str,
        command: &str,
    ) -> SchedulerResult<ContainerInfo> {
        let mut args: Vec<String> = vec!["run".into(), "-d".into(), "-i".into(), "--name".into(), name.into()];
        args.push("--volumes-from".into());
        args.push(destination.execution_container.id.clone());
        if !destination.is_one_source() {
            args.push("--volumes-from".into());
            args.push(destination.data_source_container.id.clone());
        }
        args.push(image.into());
        args.extend(command.split_whitespace().map(String::from));

        let id = self.docker_checked(name, args).await?.trim().to_string();
        info!("已创建容器 {} ({})", name, id);

        let found = self.inspect(std::slice::from_ref(&id)).await?;
        found
            .into_iter()
            .next()
            .ok_or_else(|| SchedulerError::container_not_found(id))
    }

    async fn delete_container(&self, id: &str) -> SchedulerResult<()> {
        delete_with_retry(self, id, self.retry).await;
        Ok(())
    }

    async fn fetch_logs(
        &self,
        container_id: &str,
        since: DateTime<Utc>,
        timeout: Duration,
    ) -> SchedulerResult<Vec<LogEntry>> {
        let argv = self.argv([
            "logs".to_string(),
            "--timestamps".to_string(),
            "--since".to_string(),
            since.timestamp().to_string(),
            container_id.to_string(),
        ]);
        let output = self.runner.run_with_timeout(&argv, Some(timeout)).await?;
        if !output.is_success() {
            if is_not_found(&output) {
                return Err(SchedulerError::container_not_found(container_id));
            }
            return Err(SchedulerError::runtime_error(output.stderr.trim().to_string()));
        }

        Ok(output
            .stdout
            .lines()
            .chain(output.stderr.lines())
            .filter(|line| !line.trim().is_empty())
            .enumerate()
            .map(|(i, line)| LogEntry::parse(i as u64 + 1, line))
            .collect())
    }
}

#[async_trait]
impl ExecutionBackend for DockerCli {
    async fn run_command(&self, argv: &[String], container_id: &str) -> SchedulerResult<CommandOutput> {
        let mut args = vec!["exec".to_string(), container_id.to_string()];
        args.extend(argv.iter().cloned());
        let output = self.docker(args).await?;
        if !output.is_success() && is_not_found(&output) {
            return Err(SchedulerError::container_not_found(container_id));
        }
        Ok(output)
    }

    async fn run_host_command(&self, argv: &[String]) -> SchedulerResult<CommandOutput> {
        self.runner.run(argv).await
    }
}

#[async_trait]
impl ContainerRuntime for DockerCli {
    async fn stop_container(&self, id: &str) -> SchedulerResult<()> {
        self.docker_checked(id, vec!["stop".into(), id.into()]).await.map(|_| ())
    }

    async fn remove_container(&self, id: &str) -> SchedulerResult<()> {
        self.docker_checked(id, vec!["rm".into(), id.into()]).await.map(|_| ())
    }
}
