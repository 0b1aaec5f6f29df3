//! 作业调度：CRON调度器、容器注册表、生命周期事件监听与作业触发

pub mod cron_utils;
pub mod fleet;
pub mod runner;
pub mod scheduler;
pub mod state_listener;

pub use cron_utils::{normalize_expression, CronExpression};
pub use fleet::Fleet;
pub use runner::JobRunner;
pub use scheduler::CronJobScheduler;
pub use state_listener::StateListener;
