use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use docker_cron_core::config::ExecutorConfig;
use docker_cron_core::{
    temp_container_name, CommandOutput, ContainerSource, ExecutionBackend, ExecutionStrategy,
    JobDestination, SchedulerError, SchedulerResult,
};
use tracing::{error, info, warn};

/// 按空白拆分命令行
pub fn split_command(command: &str) -> Vec<String> {
    command.split_whitespace().map(String::from).collect()
}

fn log_output(command: &str, output: &CommandOutput) {
    if output.is_success() {
        info!("命令执行完成: {} -> {}", command, output.stdout.trim_end());
    } else {
        warn!(
            "命令执行失败: {}, exit_code={:?}, stderr={}",
            command,
            output.exit_code,
            output.stderr.trim_end()
        );
    }
    if output.is_success() && !output.stderr.trim().is_empty() {
        info!("{}", output.stderr.trim_end());
    }
}

/// 逐条执行命令，单条失败只记录日志；全部执行后汇总失败数
async fn run_each<F, Fut>(commands: &[String], group_name: &str, mut run: F) -> SchedulerResult<()>
where
    F: FnMut(Vec<String>) -> Fut,
    Fut: std::future::Future<Output = SchedulerResult<CommandOutput>>,
{
    let mut failed = 0;
    for command in commands {
        let argv = split_command(command);
        if argv.is_empty() {
            continue;
        }

        match run(argv).await {
            Ok(output) => {
                log_output(command, &output);
                if !output.is_success() {
                    failed += 1;
                }
            }
            Err(e) => {
                error!("无法执行命令 '{}': {}", command, e);
                failed += 1;
            }
        }
    }

    if failed > 0 {
        return Err(SchedulerError::execution_error(format!(
            "命令组 {group_name}: {failed}/{} 条命令失败",
            commands.len()
        )));
    }
    Ok(())
}

/// 在调度器所在主机上执行
pub struct HostShellExecutor {
    backend: Arc<dyn ExecutionBackend>,
}

impl HostShellExecutor {
    pub fn new(backend: Arc<dyn ExecutionBackend>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl ExecutionStrategy for HostShellExecutor {
    fn name(&self) -> &'static str {
        "host-shell"
    }

    async fn execute(
        &self,
        commands: &[String],
        _destination: &JobDestination,
        group_name: &str,
    ) -> SchedulerResult<()> {
        info!("主机执行命令组 {}", group_name);
        run_each(commands, group_name, |argv| async move {
            self.backend.run_host_command(&argv).await
        })
        .await
    }
}

/// 在数据源容器内执行
pub struct ContainerShellExecutor {
    backend: Arc<dyn ExecutionBackend>,
}

impl ContainerShellExecutor {
    pub fn new(backend: Arc<dyn ExecutionBackend>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl ExecutionStrategy for ContainerShellExecutor {
    fn name(&self) -> &'static str {
        "container-shell"
    }

    async fn execute(
        &self,
        commands: &[String],
        destination: &JobDestination,
        group_name: &str,
    ) -> SchedulerResult<()> {
        let target = &destination.data_source_container;
        info!("在容器 {} 内执行命令组 {}", target, group_name);
        run_each(commands, group_name, |argv| async move {
            self.backend.run_command(&argv, &target.id).await
        })
        .await
    }
}

/// 用执行容器的镜像创建临时容器，挂载执行容器和数据源容器的卷
///
/// 临时容器无论命令是否成功都会被删除。
pub struct TempContainerExecutor {
    backend: Arc<dyn ExecutionBackend>,
    source: Arc<dyn ContainerSource>,
}

impl TempContainerExecutor {
    pub fn new(backend: Arc<dyn ExecutionBackend>, source: Arc<dyn ContainerSource>) -> Self {
        Self { backend, source }
    }
}

#[async_trait]
impl ExecutionStrategy for TempContainerExecutor {
    fn name(&self) -> &'static str {
        "temp-container"
    }

    async fn execute(
        &self,
        commands: &[String],
        destination: &JobDestination,
        group_name: &str,
    ) -> SchedulerResult<()> {
        let execution = &destination.execution_container;
        let image = execution.image.as_deref().ok_or_else(|| {
            SchedulerError::execution_error(format!("执行容器 {} 没有镜像信息", execution))
        })?;

        let name = temp_container_name(group_name);
        let temp = self
            .source
            .create_container(image, destination, &name, "sh")
            .await?;
        info!(
            "临时容器 {} 已创建，执行容器 {}，数据源 {}",
            temp.name, execution, destination.data_source_container
        );

        let result = run_each(commands, group_name, |argv| {
            let id = temp.id.clone();
            async move { self.backend.run_command(&argv, &id).await }
        })
        .await;

        if let Err(e) = self.source.delete_container(&temp.id).await {
            error!("无法删除临时容器 {}: {}", temp.name, e);
        }
        result
    }
}

/// 制品命令：`仓库列表;groupId:artifactId:version;主类;参数`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactCommand {
    pub repositories: Vec<String>,
    pub group_id: String,
    pub artifact_id: String,
    pub version: String,
    pub main_class: String,
    pub args: Vec<String>,
}

impl ArtifactCommand {
    pub fn parse(command: &str) -> SchedulerResult<Self> {
        let parts: Vec<&str> = command.splitn(4, ';').map(str::trim).collect();
        let [repositories, coordinates, main_class, rest @ ..] = parts.as_slice() else {
            return Err(SchedulerError::execution_error(format!(
                "制品命令格式错误，应为 仓库;groupId:artifactId:version;主类;参数: {command}"
            )));
        };

        let coordinates: Vec<&str> = coordinates.split(':').collect();
        let [group_id, artifact_id, version] = coordinates.as_slice() else {
            return Err(SchedulerError::execution_error(format!(
                "无效的制品坐标: {}",
                coordinates.join(":")
            )));
        };

        if main_class.is_empty() {
            return Err(SchedulerError::execution_error(format!("缺少主类: {command}")));
        }

        Ok(Self {
            repositories: split_command(repositories),
            group_id: group_id.to_string(),
            artifact_id: artifact_id.to_string(),
            version: version.to_string(),
            main_class: main_class.to_string(),
            args: rest.first().map(|a| split_command(a)).unwrap_or_default(),
        })
    }

    pub fn coordinates(&self) -> String {
        format!("{}:{}:{}", self.group_id, self.artifact_id, self.version)
    }

    /// 制品在本地仓库中的路径
    pub fn jar_path(&self, local_repository: &str) -> String {
        format!(
            "{}/{}/{}/{}/{}-{}.jar",
            local_repository.trim_end_matches('/'),
            self.group_id.replace('.', "/"),
            self.artifact_id,
            self.version,
            self.artifact_id,
            self.version
        )
    }
}

/// 先用 maven 解析制品到本地仓库，再用 java 调用主类
pub struct ArtifactExecutor {
    backend: Arc<dyn ExecutionBackend>,
    config: ExecutorConfig,
}

impl ArtifactExecutor {
    pub fn new(backend: Arc<dyn ExecutionBackend>, config: ExecutorConfig) -> Self {
        Self { backend, config }
    }

    pub fn resolve_argv(&self, artifact: &ArtifactCommand) -> Vec<String> {
        let mut argv = vec![
            self.config.maven_binary.clone(),
            "-q".to_string(),
            "dependency:get".to_string(),
            format!("-Dartifact={}", artifact.coordinates()),
            format!("-Dmaven.repo.local={}", self.config.maven_local_repository),
        ];
        if !artifact.repositories.is_empty() {
            argv.push(format!(
                "-DremoteRepositories={}",
                artifact.repositories.join(",")
            ));
        }
        argv
    }

    pub fn invoke_argv(&self, artifact: &ArtifactCommand) -> Vec<String> {
        let mut argv = vec![
            self.config.java_binary.clone(),
            "-cp".to_string(),
            artifact.jar_path(&self.config.maven_local_repository),
            artifact.main_class.clone(),
        ];
        argv.extend(artifact.args.iter().cloned());
        argv
    }

    async fn run(&self, command: &str) -> SchedulerResult<CommandOutput> {
        let artifact = ArtifactCommand::parse(command)?;

        let resolved = self.backend.run_host_command(&self.resolve_argv(&artifact)).await?;
        if !resolved.is_success() {
            return Err(SchedulerError::execution_error(format!(
                "无法解析制品 {}: {}",
                artifact.coordinates(),
                resolved.stderr.trim_end()
            )));
        }

        self.backend.run_host_command(&self.invoke_argv(&artifact)).await
    }
}

#[async_trait]
impl ExecutionStrategy for ArtifactExecutor {
    fn name(&self) -> &'static str {
        "artifact"
    }

    async fn execute(
        &self,
        commands: &[String],
        _destination: &JobDestination,
        group_name: &str,
    ) -> SchedulerResult<()> {
        let mut failed = 0;
        for command in commands {
            info!("{} -> {}", group_name, command);
            match self.run(command).await {
                Ok(output) => {
                    log_output(command, &output);
                    if !output.is_success() {
                        failed += 1;
                    }
                }
                Err(e) => {
                    error!("制品命令执行失败 '{}': {}", command, e);
                    failed += 1;
                }
            }
        }

        if failed > 0 {
            return Err(SchedulerError::execution_error(format!(
                "命令组 {group_name}: {failed}/{} 条制品命令失败",
                commands.len()
            )));
        }
        Ok(())
    }
}

/// 命令执行计数，由调用方持有并注入模拟执行器
#[derive(Debug, Clone, Default)]
pub struct InvocationCounter {
    count: Arc<AtomicU64>,
}

impl InvocationCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(&self) {
        self.count.fetch_add(1, Ordering::SeqCst);
    }

    pub fn get(&self) -> u64 {
        self.count.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.count.store(0, Ordering::SeqCst);
    }
}

/// 只记录命令，不执行
#[derive(Debug, Clone, Default)]
pub struct SimulatedExecutor {
    counter: InvocationCounter,
}

impl SimulatedExecutor {
    pub fn new(counter: InvocationCounter) -> Self {
        Self { counter }
    }
}

#[async_trait]
impl ExecutionStrategy for SimulatedExecutor {
    fn name(&self) -> &'static str {
        "simulator"
    }

    async fn execute(
        &self,
        commands: &[String],
        destination: &JobDestination,
        group_name: &str,
    ) -> SchedulerResult<()> {
        for command in commands {
            info!(
                "模拟执行 {} -> '{}' (执行容器 {}, 数据源 {})",
                group_name,
                command,
                destination.execution_container,
                destination.data_source_container
            );
            self.counter.increment();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docker_cron_core::ContainerRef;
    use docker_cron_testing_utils::{InMemoryContainerSource, RecordingBackend};

    fn reference(id: &str, image: Option<&str>) -> ContainerRef {
        ContainerRef {
            id: id.to_string(),
            name: id.to_string(),
            image: image.map(String::from),
        }
    }

    fn destination(exec: &str, source: &str) -> JobDestination {
        JobDestination::new(reference(exec, Some("alpine")), reference(source, Some("postgres")))
    }

    fn commands(list: &[&str]) -> Vec<String> {
        list.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn test_split_command() {
        assert_eq!(split_command("  tar  czf /b.tgz /data "), vec!["tar", "czf", "/b.tgz", "/data"]);
        assert!(split_command("   ").is_empty());
    }

    #[tokio::test]
    async fn test_host_shell_runs_on_host() {
        let backend = Arc::new(RecordingBackend::new());
        let executor = HostShellExecutor::new(backend.clone());

        executor
            .execute(&commands(&["echo one", "echo two"]), &destination("b", "db"), "g")
            .await
            .unwrap();

        let recorded = backend.commands();
        assert_eq!(recorded.len(), 2);
        assert!(recorded.iter().all(|c| c.container.is_none()));
        assert_eq!(recorded[1].argv, vec!["echo", "two"]);
    }

    #[tokio::test]
    async fn test_container_shell_targets_data_source() {
        let backend = Arc::new(RecordingBackend::new());
        let executor = ContainerShellExecutor::new(backend.clone());

        executor
            .execute(&commands(&["ls /data"]), &destination("db", "db"), "g")
            .await
            .unwrap();

        assert_eq!(backend.commands()[0].container.as_deref(), Some("db"));
    }

    #[tokio::test]
    async fn test_failures_are_reported_after_all_commands() {
        let backend = Arc::new(RecordingBackend::new());
        backend.fail_commands(true);
        let executor = ContainerShellExecutor::new(backend.clone());

        let result = executor
            .execute(&commands(&["a", "b"]), &destination("db", "db"), "g")
            .await;

        assert!(result.is_err());
        assert_eq!(backend.commands().len(), 2);
    }

    #[tokio::test]
    async fn test_temp_container_lifecycle() {
        let backend = Arc::new(RecordingBackend::new());
        let source = Arc::new(InMemoryContainerSource::new());
        let executor = TempContainerExecutor::new(backend.clone(), source.clone());

        executor
            .execute(&commands(&["du -sh /data"]), &destination("b", "db"), "backup-1-db")
            .await
            .unwrap();

        let created = source.created();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].name, "Temp-Container-backup-1-db");
        assert_eq!(created[0].image, "alpine");
        assert_eq!(created[0].command, "sh");
        assert_eq!(created[0].execution_container, "b");
        assert_eq!(created[0].data_source_container, "db");
        assert_eq!(backend.commands()[0].container.as_deref(), Some(created[0].id.as_str()));
        assert_eq!(source.deleted(), vec![created[0].id.clone()]);
    }

    #[tokio::test]
    async fn test_temp_container_deleted_when_commands_fail() {
        let backend = Arc::new(RecordingBackend::new());
        backend.fail_commands(true);
        let source = Arc::new(InMemoryContainerSource::new());
        let executor = TempContainerExecutor::new(backend, source.clone());

        let result = executor
            .execute(&commands(&["false"]), &destination("b", "db"), "g")
            .await;

        assert!(result.is_err());
        assert_eq!(source.deleted().len(), 1);
    }

    #[tokio::test]
    async fn test_temp_container_requires_image() {
        let source = Arc::new(InMemoryContainerSource::new());
        let executor = TempContainerExecutor::new(Arc::new(RecordingBackend::new()), source.clone());
        let destination = JobDestination::new(reference("b", None), reference("db", None));

        assert!(executor.execute(&commands(&["x"]), &destination, "g").await.is_err());
        assert!(source.created().is_empty());
    }

    #[test]
    fn test_parse_artifact_command() {
        let artifact = ArtifactCommand::parse(
            "https://repo1.maven.org/maven2 https://jitpack.io;ch.pschatzmann:backup:1.0;ch.pschatzmann.Backup;--all /data",
        )
        .unwrap();

        assert_eq!(artifact.repositories.len(), 2);
        assert_eq!(artifact.coordinates(), "ch.pschatzmann:backup:1.0");
        assert_eq!(artifact.main_class, "ch.pschatzmann.Backup");
        assert_eq!(artifact.args, vec!["--all", "/data"]);
        assert_eq!(
            artifact.jar_path("/root/.m2/repository/"),
            "/root/.m2/repository/ch/pschatzmann/backup/1.0/backup-1.0.jar"
        );

        assert!(ArtifactCommand::parse("only;two").is_err());
        assert!(ArtifactCommand::parse("r;g:a;Main;").is_err());
    }

    #[tokio::test]
    async fn test_artifact_resolves_then_invokes() {
        let backend = Arc::new(RecordingBackend::new());
        let config = ExecutorConfig {
            maven_local_repository: "/m2".to_string(),
            ..ExecutorConfig::default()
        };
        let executor = ArtifactExecutor::new(backend.clone(), config);

        executor
            .execute(&commands(&["https://repo;g.h:a:1;Main;x y"]), &destination("b", "db"), "g")
            .await
            .unwrap();

        let recorded = backend.commands();
        assert_eq!(recorded.len(), 2);
        assert_eq!(recorded[0].argv[0], "mvn");
        assert!(recorded[0].argv.contains(&"-Dartifact=g.h:a:1".to_string()));
        assert!(recorded[0].argv.contains(&"-DremoteRepositories=https://repo".to_string()));
        assert_eq!(recorded[1].argv, vec!["java", "-cp", "/m2/g/h/a/1/a-1.jar", "Main", "x", "y"]);
    }

    #[tokio::test]
    async fn test_simulator_counts_commands() {
        let counter = InvocationCounter::new();
        let executor = SimulatedExecutor::new(counter.clone());

        executor
            .execute(&commands(&["a", "b", "c"]), &destination("b", "db"), "g")
            .await
            .unwrap();

        assert_eq!(counter.get(), 3);
        counter.reset();
        assert_eq!(counter.get(), 0);
    }
}
