//! In-memory implementations of the collaborator traits
//!
//! These doubles never touch a container runtime, a cron timer or a process.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use docker_cron_core::{
    CommandOutput, ContainerFilter, ContainerInfo, ContainerRuntime, ContainerSource,
    ExecutionBackend, JobDestination, JobScheduler, LifecycleEvent, LogEntry, ScheduledJob,
    SchedulerError, SchedulerResult,
};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

/// Container creation request recorded by InMemoryContainerSource
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedContainer {
    pub id: String,
    pub image: String,
    pub name: String,
    pub command: String,
    pub execution_container: String,
    pub data_source_container: String,
}

/// Mock implementation of ContainerSource for testing
#[derive(Clone, Default)]
pub struct InMemoryContainerSource {
    containers: Arc<Mutex<Vec<ContainerInfo>>>,
    created: Arc<Mutex<Vec<CreatedContainer>>>,
    deleted: Arc<Mutex<Vec<String>>>,
    logs: Arc<Mutex<HashMap<String, Vec<String>>>>,
    subscribers: Arc<Mutex<Vec<mpsc::Sender<LifecycleEvent>>>>,
    fail_create: Arc<Mutex<bool>>,
    fail_list: Arc<Mutex<bool>>,
    list_calls: Arc<Mutex<usize>>,
}

impl InMemoryContainerSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_containers(containers: Vec<ContainerInfo>) -> Self {
        let source = Self::new();
        *source.containers.lock().unwrap() = containers;
        source
    }

    pub fn add(&self, container: ContainerInfo) {
        self.containers.lock().unwrap().push(container);
    }

    pub fn remove(&self, id: &str) {
        self.containers.lock().unwrap().retain(|c| c.id != id);
    }

    pub fn set_logs(&self, container_id: &str, lines: Vec<&str>) {
        self.logs.lock().unwrap().insert(
            container_id.to_string(),
            lines.into_iter().map(String::from).collect(),
        );
    }

    pub fn fail_create(&self, fail: bool) {
        *self.fail_create.lock().unwrap() = fail;
    }

    /// Make `list_containers` fail until reset
    pub fn fail_list(&self, fail: bool) {
        *self.fail_list.lock().unwrap() = fail;
    }

    /// Number of `list_containers` calls, failed ones included
    pub fn list_calls(&self) -> usize {
        *self.list_calls.lock().unwrap()
    }

    /// Push a lifecycle event to every subscriber
    pub async fn emit(&self, event: LifecycleEvent) {
        let subscribers = self.subscribers.lock().unwrap().clone();
        for tx in subscribers {
            let _ = tx.send(event.clone()).await;
        }
    }

    /// Close every subscription
    pub fn close_subscriptions(&self) {
        self.subscribers.lock().unwrap().clear();
    }

    pub fn created(&self) -> Vec<CreatedContainer> {
        self.created.lock().unwrap().clone()
    }

    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }
}

#[async_trait]
impl ContainerSource for InMemoryContainerSource {
    async fn list_containers(&self, filter: &ContainerFilter) -> SchedulerResult<Vec<ContainerInfo>> {
        let fail = *self.fail_list.lock().unwrap();
        *self.list_calls.lock().unwrap() += 1;
        if fail {
            return Err(SchedulerError::runtime_error("无法列出容器"));
        }

        Ok(self
            .containers
            .lock()
            .unwrap()
            .iter()
            .filter(|c| filter.matches(&c.name))
            .cloned()
            .collect())
    }

    async fn subscribe_lifecycle_events(&self) -> SchedulerResult<mpsc::Receiver<LifecycleEvent>> {
        let (tx, rx) = mpsc::channel(64);
        self.subscribers.lock().unwrap().push(tx);
        Ok(rx)
    }

    async fn create_container(
        &self,
        image: &str,
        destination: &JobDestination,
        name: &str,
        command: &str,
    ) -> SchedulerResult<ContainerInfo> {
        if *self.fail_create.lock().unwrap() {
            return Err(SchedulerError::runtime_error(format!("无法创建容器 {name}")));
        }

        let mut created = self.created.lock().unwrap();
        let id = format!("created-{}", created.len() + 1);
        created.push(CreatedContainer {
            id: id.clone(),
            image: image.to_string(),
            name: name.to_string(),
            command: command.to_string(),
            execution_container: destination.execution_container.id.clone(),
            data_source_container: destination.data_source_container.id.clone(),
        });

        let mut attributes = HashMap::new();
        attributes.insert("id".to_string(), id);
        attributes.insert("name".to_string(), name.to_string());
        attributes.insert("image".to_string(), image.to_string());
        let info = ContainerInfo::from_attributes(attributes)?;
        self.containers.lock().unwrap().push(info.clone());
        Ok(info)
    }

    async fn delete_container(&self, id: &str) -> SchedulerResult<()> {
        self.deleted.lock().unwrap().push(id.to_string());
        self.remove(id);
        Ok(())
    }

    async fn fetch_logs(
        &self,
        container_id: &str,
        _since: DateTime<Utc>,
        _timeout: Duration,
    ) -> SchedulerResult<Vec<LogEntry>> {
        Ok(self
            .logs
            .lock()
            .unwrap()
            .get(container_id)
            .map(|lines| {
                lines
                    .iter()
                    .enumerate()
                    .map(|(i, line)| LogEntry::parse(i as u64 + 1, line))
                    .collect()
            })
            .unwrap_or_default())
    }
}

/// Registration recorded by RecordingScheduler
#[derive(Clone)]
pub struct Registration {
    pub id: String,
    pub cron_expr: String,
    pub job: Arc<dyn ScheduledJob>,
}

/// Mock implementation of JobScheduler for testing
///
/// Predictions come from a scripted list of fire dates filtered to the open interval (from, to).
#[derive(Clone, Default)]
pub struct RecordingScheduler {
    registrations: Arc<Mutex<Vec<Registration>>>,
    fire_dates: Arc<Mutex<Vec<DateTime<Utc>>>>,
    next_id: Arc<AtomicUsize>,
    running: Arc<Mutex<bool>>,
}

impl RecordingScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fire_dates(dates: Vec<DateTime<Utc>>) -> Self {
        let scheduler = Self::new();
        *scheduler.fire_dates.lock().unwrap() = dates;
        scheduler
    }

    pub fn registrations(&self) -> Vec<Registration> {
        self.registrations.lock().unwrap().clone()
    }

    pub fn is_running(&self) -> bool {
        *self.running.lock().unwrap()
    }

    /// Run every registered job once
    pub async fn fire_all(&self) {
        for registration in self.registrations() {
            registration.job.run().await;
        }
    }
}

#[async_trait]
impl JobScheduler for RecordingScheduler {
    async fn schedule(&self, cron_expr: &str, job: Arc<dyn ScheduledJob>) -> SchedulerResult<String> {
        if cron_expr.trim().is_empty() {
            return Err(SchedulerError::invalid_cron(cron_expr, "表达式为空"));
        }
        let id = format!("job-{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        self.registrations.lock().unwrap().push(Registration {
            id: id.clone(),
            cron_expr: cron_expr.to_string(),
            job,
        });
        Ok(id)
    }

    async fn deschedule(&self, id: &str) -> SchedulerResult<()> {
        self.registrations.lock().unwrap().retain(|r| r.id != id);
        Ok(())
    }

    async fn count_of_scheduled_jobs(&self) -> usize {
        self.registrations.lock().unwrap().len()
    }

    fn predict_fire_dates(
        &self,
        cron_expr: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> SchedulerResult<Vec<DateTime<Utc>>> {
        if cron_expr.trim().is_empty() {
            return Err(SchedulerError::invalid_cron(cron_expr, "表达式为空"));
        }
        Ok(self
            .fire_dates
            .lock()
            .unwrap()
            .iter()
            .filter(|d| **d > from && **d < to)
            .cloned()
            .collect())
    }

    async fn start(&self) -> SchedulerResult<()> {
        *self.running.lock().unwrap() = true;
        Ok(())
    }

    async fn stop(&self) -> SchedulerResult<()> {
        *self.running.lock().unwrap() = false;
        Ok(())
    }
}

/// Scripted outcome of a stop/remove call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeResponse {
    Ok,
    NotFound,
    Fail,
}

/// Command recorded by RecordingBackend; `container` is None for host commands
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCommand {
    pub container: Option<String>,
    pub argv: Vec<String>,
}

/// Mock implementation of ExecutionBackend and ContainerRuntime for testing
#[derive(Clone, Default)]
pub struct RecordingBackend {
    commands: Arc<Mutex<Vec<RecordedCommand>>>,
    stop_responses: Arc<Mutex<VecDeque<RuntimeResponse>>>,
    remove_responses: Arc<Mutex<VecDeque<RuntimeResponse>>>,
    stop_calls: Arc<AtomicUsize>,
    remove_calls: Arc<AtomicUsize>,
    fail_commands: Arc<Mutex<bool>>,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_stop_responses(self, responses: Vec<RuntimeResponse>) -> Self {
        *self.stop_responses.lock().unwrap() = responses.into();
        self
    }

    pub fn with_remove_responses(self, responses: Vec<RuntimeResponse>) -> Self {
        *self.remove_responses.lock().unwrap() = responses.into();
        self
    }

    pub fn fail_commands(&self, fail: bool) {
        *self.fail_commands.lock().unwrap() = fail;
    }

    pub fn commands(&self) -> Vec<RecordedCommand> {
        self.commands.lock().unwrap().clone()
    }

    pub fn stop_calls(&self) -> usize {
        self.stop_calls.load(Ordering::SeqCst)
    }

    pub fn remove_calls(&self) -> usize {
        self.remove_calls.load(Ordering::SeqCst)
    }

    fn record(&self, container: Option<&str>, argv: &[String]) -> SchedulerResult<CommandOutput> {
        self.commands.lock().unwrap().push(RecordedCommand {
            container: container.map(String::from),
            argv: argv.to_vec(),
        });
        if *self.fail_commands.lock().unwrap() {
            return Err(SchedulerError::execution_error(format!("命令失败: {}", argv.join(" "))));
        }
        Ok(CommandOutput::success(""))
    }

    fn respond(queue: &Mutex<VecDeque<RuntimeResponse>>, id: &str) -> SchedulerResult<()> {
        match queue.lock().unwrap().pop_front().unwrap_or(RuntimeResponse::Ok) {
            RuntimeResponse::Ok => Ok(()),
            RuntimeResponse::NotFound => Err(SchedulerError::container_not_found(id)),
            RuntimeResponse::Fail => Err(SchedulerError::runtime_error(format!("操作失败: {id}"))),
        }
    }
}

#[async_trait]
impl ExecutionBackend for RecordingBackend {
    async fn run_command(&self, argv: &[String], container_id: &str) -> SchedulerResult<CommandOutput> {
        self.record(Some(container_id), argv)
    }

    async fn run_host_command(&self, argv: &[String]) -> SchedulerResult<CommandOutput> {
        self.record(None, argv)
    }
}

#[async_trait]
impl ContainerRuntime for RecordingBackend {
    async fn stop_container(&self, id: &str) -> SchedulerResult<()> {
        self.stop_calls.fetch_add(1, Ordering::SeqCst);
        Self::respond(&self.stop_responses, id)
    }

    async fn remove_container(&self, id: &str) -> SchedulerResult<()> {
        self.remove_calls.fetch_add(1, Ordering::SeqCst);
        Self::respond(&self.remove_responses, id)
    }
}
