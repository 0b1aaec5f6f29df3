//! 基础设施：本地进程执行、docker 命令行适配器、带重试的容器删除

pub mod cleanup_service;
pub mod docker_cli;
pub mod process;

pub use cleanup_service::{delete_with_retry, DeleteOutcome, RetryPolicy};
pub use docker_cli::{parse_event, parse_inspect, DockerCli};
pub use process::ProcessRunner;
