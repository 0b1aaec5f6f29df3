//! docker-cron：读取容器标签推导定时作业，按CRON表达式在合适的容器中执行

pub mod app;
pub mod shutdown;

pub use app::Application;
pub use shutdown::ShutdownManager;
