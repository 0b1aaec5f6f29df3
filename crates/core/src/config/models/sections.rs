use serde::{Deserialize, Serialize};

/// 本机主机名，用于识别调度器自身所在的批处理容器
fn local_hostname() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "localhost".to_string())
}

fn default_maven_repository() -> String {
    match std::env::var("HOME") {
        Ok(home) if !home.is_empty() => format!("{home}/.m2/repository"),
        _ => "/root/.m2/repository".to_string(),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DockerConfig {
    pub binary: String,
    /// 容器名过滤正则
    pub container_filter: String,
    pub batch_container_name: String,
    pub hostname: String,
}

impl Default for DockerConfig {
    fn default() -> Self {
        Self {
            binary: "docker".to_string(),
            container_filter: ".*".to_string(),
            batch_container_name: "docker-cron".to_string(),
            hostname: local_hostname(),
        }
    }
}

impl DockerConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.binary.trim().is_empty() {
            return Err(anyhow::anyhow!("docker命令路径不能为空"));
        }

        regex::Regex::new(&self.container_filter)
            .map_err(|e| anyhow::anyhow!("无效的容器过滤表达式 {}: {e}", self.container_filter))?;

        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub tick_interval_ms: u64,
    pub max_prediction_iterations: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 1000,
            max_prediction_iterations: 100_000,
        }
    }
}

impl SchedulerConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.tick_interval_ms == 0 {
            return Err(anyhow::anyhow!("调度间隔必须大于0"));
        }

        if self.max_prediction_iterations == 0 {
            return Err(anyhow::anyhow!("最大预测次数必须大于0"));
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationConfig {
    pub default_script_engine: String,
    pub scripting_as_template: bool,
    pub template_start: String,
    pub template_end: String,
    /// 按挂载卷展开参数
    pub expand_per_mount: bool,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            default_script_engine: "javascript".to_string(),
            scripting_as_template: false,
            template_start: "{".to_string(),
            template_end: "}".to_string(),
            expand_per_mount: false,
        }
    }
}

impl EvaluationConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.template_start.is_empty() || self.template_end.is_empty() {
            return Err(anyhow::anyhow!("模板分隔符不能为空"));
        }

        if self.default_script_engine.trim().is_empty() {
            return Err(anyhow::anyhow!("默认脚本引擎不能为空"));
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// 只记录命令，不真正执行
    pub dry_run: bool,
    pub maven_local_repository: String,
    pub maven_binary: String,
    pub java_binary: String,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            dry_run: false,
            maven_local_repository: default_maven_repository(),
            maven_binary: "mvn".to_string(),
            java_binary: "java".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CleanupConfig {
    pub max_attempts: u32,
    pub backoff_ms: u64,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            backoff_ms: 1000,
        }
    }
}

impl CleanupConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.max_attempts == 0 {
            return Err(anyhow::anyhow!("删除重试次数必须大于0"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogsConfig {
    pub max_entries: usize,
    pub timeout_seconds: u64,
}

impl Default for LogsConfig {
    fn default() -> Self {
        Self {
            max_entries: 100_000,
            timeout_seconds: 60,
        }
    }
}

impl LogsConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.max_entries == 0 {
            return Err(anyhow::anyhow!("日志条数上限必须大于0"));
        }
        if self.timeout_seconds == 0 {
            return Err(anyhow::anyhow!("日志查询超时必须大于0"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub enabled: bool,
    pub bind_address: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

impl ApiConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.enabled && self.bind_address.trim().is_empty() {
            return Err(anyhow::anyhow!("API绑定地址不能为空"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub log_level: String,
    pub log_format: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
        }
    }
}

impl ObservabilityConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.as_str()) {
            return Err(anyhow::anyhow!(
                "无效的日志级别: {}，支持的级别: {:?}",
                self.log_level,
                valid_levels
            ));
        }

        let valid_formats = ["pretty", "json"];
        if !valid_formats.contains(&self.log_format.as_str()) {
            return Err(anyhow::anyhow!(
                "无效的日志格式: {}，支持的格式: {:?}",
                self.log_format,
                valid_formats
            ));
        }

        Ok(())
    }
}
