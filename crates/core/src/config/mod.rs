//! 配置管理
//!
//! 配置按以下顺序叠加，后者覆盖前者：
//! - 内置默认值
//! - TOML配置文件
//! - 环境变量（前缀 `DOCKER_CRON_`，嵌套字段用 `__` 分隔，例如 `DOCKER_CRON_EXECUTOR__DRY_RUN=true`）

pub mod models;

pub use models::*;
