//! docker-cron 核心库：错误类型、配置、数据模型以及外部协作者接口

pub mod config;
pub mod errors;
pub mod models;
pub mod traits;
pub mod utils;

pub use config::AppConfig;
pub use errors::*;
pub use models::*;
pub use traits::*;
