use anyhow::{Context, Result};
use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

use super::sections::{
    ApiConfig, CleanupConfig, DockerConfig, EvaluationConfig, ExecutorConfig, LogsConfig,
    ObservabilityConfig, SchedulerConfig,
};

/// System configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub docker: DockerConfig,
    pub scheduler: SchedulerConfig,
    pub evaluation: EvaluationConfig,
    pub executor: ExecutorConfig,
    pub cleanup: CleanupConfig,
    pub logs: LogsConfig,
    pub api: ApiConfig,
    pub observability: ObservabilityConfig,
}

impl AppConfig {
    /// Load configuration from config file and environment variables
    ///
    /// Load order:
    /// 1. Default configuration
    /// 2. Config file (TOML format)
    /// 3. Environment variable overrides (prefix: DOCKER_CRON_, nested with `__`)
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut builder = ConfigBuilder::builder().add_source(
            ConfigBuilder::try_from(&AppConfig::default()).context("生成默认配置失败")?,
        );

        if let Some(path) = config_path {
            if Path::new(path).exists() {
                info!("加载配置文件: {}", path);
                builder = builder.add_source(File::new(path, FileFormat::Toml));
            } else {
                return Err(anyhow::anyhow!("配置文件不存在: {}", path));
            }
        } else {
            let default_paths = [
                "config/docker-cron.toml",
                "docker-cron.toml",
                "/etc/docker-cron/config.toml",
            ];

            match default_paths.iter().find(|p| Path::new(p).exists()) {
                Some(path) => {
                    info!("加载配置文件: {}", path);
                    builder = builder.add_source(File::new(path, FileFormat::Toml));
                }
                None => debug!("未找到配置文件，使用默认配置"),
            }
        }

        builder = builder.add_source(
            Environment::with_prefix("DOCKER_CRON")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: AppConfig = builder
            .build()
            .context("构建配置失败")?
            .try_deserialize()
            .context("反序列化配置失败")?;

        config.validate()?;

        Ok(config)
    }

    /// Load configuration from TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(toml_str).context("解析TOML配置失败")?;

        config.validate()?;
        Ok(config)
    }

    /// Serialize configuration to TOML string
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("序列化配置为TOML失败")
    }

    pub fn validate(&self) -> Result<()> {
        self.docker.validate().context("Docker配置验证失败")?;
        self.scheduler.validate().context("调度器配置验证失败")?;
        self.evaluation.validate().context("表达式配置验证失败")?;
        self.cleanup.validate().context("清理配置验证失败")?;
        self.logs.validate().context("日志查询配置验证失败")?;
        self.api.validate().context("API配置验证失败")?;
        self.observability
            .validate()
            .context("可观测性配置验证失败")?;

        Ok(())
    }
}
