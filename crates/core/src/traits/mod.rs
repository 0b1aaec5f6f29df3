pub mod container_source;
pub mod execution;
pub mod scheduler;

pub use container_source::{ContainerSource, LifecycleEvent, LifecycleStatus};
pub use execution::{CommandOutput, ContainerRuntime, ExecutionBackend};
pub use scheduler::{ExecutionStrategy, JobScheduler, ScheduledJob};
