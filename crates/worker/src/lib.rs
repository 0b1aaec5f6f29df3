//! 命令组执行：执行策略以及按场景选择策略的分发器

pub mod executor_factory;
pub mod executors;

pub use executor_factory::{select_strategy, ExecutorDispatcher, StrategyKind};
pub use executors::{
    split_command, ArtifactCommand, ArtifactExecutor, ContainerShellExecutor, HostShellExecutor,
    InvocationCounter, SimulatedExecutor, TempContainerExecutor,
};
